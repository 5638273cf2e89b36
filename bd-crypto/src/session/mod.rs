//! # Session
//!
//! Drives one run of the protocol for co-located participants through
//! `Uninitialized → ParametersValidated → KeysGenerated → ExchangesComputed →
//! KeysDerived → Verified | Failed`.
//!
//! Every transition needs the complete previous round. Any failure wipes all
//! private exponents before the error is handed back.

pub mod actor;
pub mod bus;

use crate::config::SessionConfig;
use crate::errors::{BDCryptoError, SessionFailure};
use crate::group::GroupParameters;
use crate::keypair::{Participant, PublicValue, RandomSource};
use crate::protocol::{ExchangeValue, SessionKey, ordered_round, verify_consistency};

use crossbeam_channel::RecvTimeoutError;

use serde::{Deserialize, Serialize};

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info};

/// The step of the protocol an operation or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Round {
    ParameterValidation,
    KeyGeneration,
    ExchangeComputation,
    KeyDerivation,
    Verification,
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Round::ParameterValidation => "parameter validation",
            Round::KeyGeneration => "key generation",
            Round::ExchangeComputation => "exchange computation",
            Round::KeyDerivation => "key derivation",
            Round::Verification => "verification",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    ParametersValidated,
    /// All N public values collected.
    KeysGenerated,
    /// All N exchange values collected.
    ExchangesComputed,
    KeysDerived,
    Verified,
    Failed,
}

#[derive(Debug)]
pub struct Session {
    params: Arc<GroupParameters>,
    config: SessionConfig,
    state: SessionState,
    participants: Vec<Participant>,
    public_values: Vec<PublicValue>,
    keys: Vec<SessionKey>,
}

impl Session {
    pub fn new(params: Arc<GroupParameters>, config: SessionConfig) -> Self {
        Self {
            params,
            config,
            state: SessionState::Uninitialized,
            participants: Vec::new(),
            public_values: Vec::new(),
            keys: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &GroupParameters {
        &self.params
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of participants still holding a private exponent.
    pub fn live_participants(&self) -> usize {
        self.participants.len()
    }

    /// Runs every round and the consistency check.
    pub fn run(&mut self, source: Arc<dyn RandomSource>) -> Result<SessionKey, SessionFailure> {
        let started = Instant::now();

        self.validate_parameters(source.as_ref())?;
        let public_values = self.generate_keys(source)?;
        let exchange_values = self.compute_exchanges(public_values)?;
        self.derive_keys(exchange_values)?;
        let key = self.verify()?;

        info!(
            participants = self.config.participants,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "session verified"
        );

        Ok(key)
    }

    pub fn validate_parameters(&mut self, source: &dyn RandomSource) -> Result<(), SessionFailure> {
        let round = Round::ParameterValidation;
        self.expect_state(SessionState::Uninitialized, round)?;

        if let Err(error) = self.params.validate(self.config.security_iterations, source) {
            return Err(self.fail(round, error));
        }

        self.state = SessionState::ParametersValidated;
        Ok(())
    }

    /// Round 1: N workers draw keypairs in parallel; the fan-in waits at most
    /// `entropy_timeout`. Returns the public values to broadcast.
    pub fn generate_keys(
        &mut self,
        source: Arc<dyn RandomSource>,
    ) -> Result<Vec<PublicValue>, SessionFailure> {
        let round = Round::KeyGeneration;
        self.expect_state(SessionState::ParametersValidated, round)?;

        let ring_size = self.config.participants;
        let (sender, receiver) = crossbeam_channel::bounded(ring_size);

        for index in 0..ring_size {
            let sender = sender.clone();
            let params = Arc::clone(&self.params);
            let source = Arc::clone(&source);

            let spawned = thread::Builder::new()
                .name(format!("bd-keygen-{}", index))
                .spawn(move || {
                    let result = Participant::generate(index, &params, source.as_ref());
                    // A closed channel means the session already gave up; the
                    // unsent participant is dropped and wiped here.
                    let _ = sender.send((index, result));
                });

            if let Err(e) = spawned {
                return Err(self.fail(
                    round,
                    BDCryptoError::RandomSourceExhausted(format!(
                        "Could not start key generation worker: {}",
                        e
                    )),
                ));
            }
        }
        drop(sender);

        let deadline = Instant::now() + self.config.entropy_timeout;
        let mut slots: Vec<Option<Participant>> = (0..ring_size).map(|_| None).collect();

        for _ in 0..ring_size {
            match receiver.recv_deadline(deadline) {
                Ok((index, Ok(participant))) => {
                    debug!(participant = index, "keypair generated");
                    slots[index] = Some(participant);
                }
                Ok((index, Err(error))) => {
                    debug!(participant = index, "keypair generation failed");
                    drop(slots);
                    return Err(self.fail(round, error));
                }
                Err(RecvTimeoutError::Timeout) => {
                    drop(slots);
                    return Err(self.fail(
                        round,
                        BDCryptoError::RandomSourceExhausted(format!(
                            "Key generation did not finish within {:?}",
                            self.config.entropy_timeout
                        )),
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    drop(slots);
                    return Err(self.fail(
                        round,
                        BDCryptoError::RandomSourceExhausted(
                            "Key generation worker exited without a result".to_string(),
                        ),
                    ));
                }
            }
        }

        self.install_participants(slots.into_iter().flatten().collect())
    }

    /// Round 1 with caller-built participants, e.g. fixed exponents for reproducible runs.
    pub fn load_participants(
        &mut self,
        participants: Vec<Participant>,
    ) -> Result<Vec<PublicValue>, SessionFailure> {
        self.expect_state(SessionState::ParametersValidated, Round::KeyGeneration)?;
        self.install_participants(participants)
    }

    /// Round 2: every participant computes X_i from the complete round 1 broadcast.
    ///
    /// Each received public value is checked for subgroup membership first.
    pub fn compute_exchanges(
        &mut self,
        public_values: Vec<PublicValue>,
    ) -> Result<Vec<ExchangeValue>, SessionFailure> {
        let round = Round::ExchangeComputation;
        self.expect_state(SessionState::KeysGenerated, round)?;

        let checked = ordered_round(&public_values, self.config.participants, |value| value.index)
            .and_then(|_| {
                public_values
                    .iter()
                    .try_for_each(|value| self.params.check_element(&value.value))
            });
        if let Err(error) = checked {
            return Err(self.fail(round, error));
        }

        let computed: Result<Vec<ExchangeValue>, BDCryptoError> = self
            .participants
            .iter()
            .map(|participant| participant.compute_exchange_value(&self.params, &public_values))
            .collect();

        match computed {
            Ok(exchange_values) => {
                self.public_values = public_values;
                self.state = SessionState::ExchangesComputed;
                info!(participants = exchange_values.len(), "round 2 values computed");
                Ok(exchange_values)
            }
            Err(error) => Err(self.fail(round, error)),
        }
    }

    /// Every participant folds the complete round 2 broadcast into its own key.
    pub fn derive_keys(
        &mut self,
        exchange_values: Vec<ExchangeValue>,
    ) -> Result<(), SessionFailure> {
        let round = Round::KeyDerivation;
        self.expect_state(SessionState::ExchangesComputed, round)?;

        let derived: Result<Vec<SessionKey>, BDCryptoError> = self
            .participants
            .iter()
            .map(|participant| {
                participant.derive_session_key(&self.params, &self.public_values, &exchange_values)
            })
            .collect();

        match derived {
            Ok(keys) => {
                self.keys = keys;
                self.state = SessionState::KeysDerived;
                Ok(())
            }
            Err(error) => Err(self.fail(round, error)),
        }
    }

    /// Checks K_0 = K_1 = ... = K_{N-1}. Private exponents are dropped either way.
    pub fn verify(&mut self) -> Result<SessionKey, SessionFailure> {
        let round = Round::Verification;
        self.expect_state(SessionState::KeysDerived, round)?;

        match verify_consistency(&self.keys) {
            Ok(key) => {
                self.participants.clear();
                self.keys.clear();
                self.state = SessionState::Verified;
                Ok(key)
            }
            Err(error) => Err(self.fail(round, error)),
        }
    }

    fn install_participants(
        &mut self,
        participants: Vec<Participant>,
    ) -> Result<Vec<PublicValue>, SessionFailure> {
        let round = Round::KeyGeneration;

        if let Err(error) =
            ordered_round(&participants, self.config.participants, Participant::index)
        {
            drop(participants);
            return Err(self.fail(round, error));
        }

        let public_values: Vec<PublicValue> =
            participants.iter().map(Participant::public_value).collect();

        self.participants = participants;
        self.state = SessionState::KeysGenerated;
        info!(participants = public_values.len(), "round 1 public values collected");

        Ok(public_values)
    }

    fn expect_state(&mut self, expected: SessionState, round: Round) -> Result<(), SessionFailure> {
        if self.state == expected {
            return Ok(());
        }

        let error = BDCryptoError::InvalidState(format!(
            "{} needs state {:?}, session is {:?}",
            round, expected, self.state
        ));

        if self.state == SessionState::Failed || self.state == SessionState::Verified {
            return Err(SessionFailure::new(round, error));
        }

        Err(self.fail(round, error))
    }

    /// Aborts the session: wipes every secret and moves to `Failed`.
    fn fail(&mut self, round: Round, error: BDCryptoError) -> SessionFailure {
        error!(%round, %error, "session aborted");

        self.participants.clear();
        self.public_values.clear();
        self.keys.clear();
        self.state = SessionState::Failed;

        SessionFailure::new(round, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::SeededRandomSource;
    use crate::preset::TOY_GROUP_1019;

    use num_bigint::BigUint;

    use std::time::Duration;

    fn session(participants: usize) -> Session {
        let config = SessionConfig::try_with(participants, 3, Duration::from_secs(5)).unwrap();
        Session::new(Arc::new(TOY_GROUP_1019.clone()), config)
    }

    #[test]
    fn test_full_run_reaches_verified() {
        let mut session = session(4);
        let source: Arc<dyn RandomSource> = Arc::new(SeededRandomSource::from_seed(4));

        let key = session.run(source);
        assert!(key.is_ok());
        assert_eq!(session.state(), SessionState::Verified);
        assert_eq!(session.live_participants(), 0);
    }

    #[test]
    fn test_out_of_order_call_fails_session() {
        let mut session = session(3);

        let result = session.derive_keys(Vec::new());
        let failure = result.unwrap_err();
        assert_eq!(failure.round, Round::KeyDerivation);
        assert!(matches!(failure.error, BDCryptoError::InvalidState(_)));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut session = session(3);
        let source = SeededRandomSource::from_seed(1);
        let _ = session.verify();

        let result = session.validate_parameters(&source);
        assert!(matches!(
            result,
            Err(SessionFailure { error: BDCryptoError::InvalidState(_), .. })
        ));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_wrong_participant_count_is_rejected() {
        let mut session = session(4);
        let source = SeededRandomSource::from_seed(1);
        session.validate_parameters(&source).unwrap();

        let participants: Vec<Participant> = (0..3)
            .map(|i| Participant::from_private_exponent(i, &TOY_GROUP_1019, &BigUint::from(7u32)))
            .collect::<Result<_, _>>()
            .unwrap();

        let failure = session.load_participants(participants).unwrap_err();
        assert_eq!(failure.round, Round::KeyGeneration);
        assert!(matches!(failure.error, BDCryptoError::IncompleteRound(_)));
    }

    #[test]
    fn test_degenerate_public_value_wipes_participants() {
        let mut session = session(3);
        let source: Arc<dyn RandomSource> = Arc::new(SeededRandomSource::from_seed(9));
        session.validate_parameters(source.as_ref()).unwrap();

        let mut public_values = session.generate_keys(source).unwrap();
        assert_eq!(session.live_participants(), 3);

        public_values[2].value = BigUint::from(0u32);
        let failure = session.compute_exchanges(public_values).unwrap_err();

        assert_eq!(failure.round, Round::ExchangeComputation);
        assert!(failure.is_security_incident());
        assert_eq!(session.live_participants(), 0);
        assert_eq!(session.state(), SessionState::Failed);
    }

    struct SlowSource;

    impl RandomSource for SlowSource {
        fn fill(&self, dest: &mut [u8]) -> Result<(), BDCryptoError> {
            thread::sleep(Duration::from_secs(2));
            dest.fill(0x5a);
            Ok(())
        }
    }

    struct DeadSource;

    impl RandomSource for DeadSource {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), BDCryptoError> {
            Err(BDCryptoError::RandomSourceExhausted("no entropy".to_string()))
        }
    }

    fn assert_entropy_failure(session: &Session, failure: &SessionFailure) {
        assert_eq!(failure.round, Round::KeyGeneration);
        assert!(matches!(failure.error, BDCryptoError::RandomSourceExhausted(_)));
        assert!(failure.is_retryable());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.live_participants(), 0);
    }

    #[test]
    fn test_slow_entropy_hits_timeout() {
        let config = SessionConfig::try_with(3, 3, Duration::from_millis(100)).unwrap();
        let mut session = Session::new(Arc::new(TOY_GROUP_1019.clone()), config);
        session
            .validate_parameters(&SeededRandomSource::from_seed(6))
            .unwrap();

        let started = Instant::now();
        let failure = session.generate_keys(Arc::new(SlowSource)).unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_entropy_failure(&session, &failure);
    }

    #[test]
    fn test_dead_entropy_fails_key_generation() {
        let mut session = session(4);
        session
            .validate_parameters(&SeededRandomSource::from_seed(6))
            .unwrap();

        let failure = session.generate_keys(Arc::new(DeadSource)).unwrap_err();
        assert_entropy_failure(&session, &failure);
    }

    #[test]
    fn test_round_display() {
        assert_eq!(Round::KeyGeneration.to_string(), "key generation");
        assert_eq!(Round::Verification.to_string(), "verification");
    }
}
