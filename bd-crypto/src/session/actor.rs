//! One thread per participant, talking only through a [`RingBus`] endpoint.
//!
//! Each actor owns its keypair for the whole run. The only things that leave
//! an actor are its broadcasts and, at the end, its copy of the session key
//! for the consistency check.

use crate::config::SessionConfig;
use crate::errors::{BDCryptoError, SessionFailure};
use crate::group::GroupParameters;
use crate::keypair::{Participant, RandomSource};
use crate::protocol::{SessionKey, ordered_round, verify_consistency};
use crate::session::Round;
use crate::session::bus::{BroadcastMessage, Endpoint, RingBus};

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

type Keygen<'a> = Box<dyn FnOnce() -> Result<Participant, BDCryptoError> + Send + 'a>;

/// Validates the parameters, then runs N actors that generate fresh keypairs.
pub fn run_actors(
    params: Arc<GroupParameters>,
    config: &SessionConfig,
    source: Arc<dyn RandomSource>,
) -> Result<SessionKey, SessionFailure> {
    validate(&params, config, source.as_ref())?;

    let keygens: Vec<Keygen> = (0..config.participants)
        .map(|index| {
            let params = Arc::clone(&params);
            let source = Arc::clone(&source);
            Box::new(move || Participant::generate(index, &params, source.as_ref())) as Keygen
        })
        .collect();

    run_ring(&params, config, keygens)
}

/// Validates the parameters, then runs one actor per supplied participant.
pub fn run_actors_with_participants(
    params: Arc<GroupParameters>,
    config: &SessionConfig,
    participants: Vec<Participant>,
    source: &dyn RandomSource,
) -> Result<SessionKey, SessionFailure> {
    validate(&params, config, source)?;

    let mut participants = participants;
    participants.sort_by_key(Participant::index);

    // Indices must be exactly 0..N-1.
    ordered_round(&participants, config.participants, Participant::index).map_err(|error| {
        error!(%error, "participant list rejected");
        SessionFailure::new(Round::KeyGeneration, error)
    })?;

    let keygens: Vec<Keygen> = participants
        .into_iter()
        .map(|participant| Box::new(move || Ok(participant)) as Keygen)
        .collect();

    run_ring(&params, config, keygens)
}

fn validate(
    params: &GroupParameters,
    config: &SessionConfig,
    source: &dyn RandomSource,
) -> Result<(), SessionFailure> {
    params
        .validate(config.security_iterations, source)
        .map_err(|error| {
            error!(%error, "group parameters rejected");
            SessionFailure::new(Round::ParameterValidation, error)
        })
}

fn run_ring(
    params: &GroupParameters,
    config: &SessionConfig,
    keygens: Vec<Keygen>,
) -> Result<SessionKey, SessionFailure> {
    let started = Instant::now();
    let timeout = config.entropy_timeout;
    let endpoints = RingBus::connect(config.participants);

    let results: Vec<Result<SessionKey, SessionFailure>> = thread::scope(|scope| {
        let handles: Vec<_> = endpoints
            .into_iter()
            .zip(keygens)
            .map(|(endpoint, keygen)| {
                scope.spawn(move || participant_actor(endpoint, params, keygen, timeout))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(SessionFailure::new(
                        Round::KeyDerivation,
                        BDCryptoError::InvalidState("participant thread panicked".to_string()),
                    ))
                })
            })
            .collect()
    });

    let mut keys = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(key) => keys.push(key),
            Err(failure) => failures.push(failure),
        }
    }

    if !failures.is_empty() {
        drop(keys);
        return Err(root_cause(failures));
    }

    let key = verify_consistency(&keys).map_err(|error| {
        error!(%error, "actors disagree on the session key");
        SessionFailure::new(Round::Verification, error)
    })?;

    info!(
        participants = config.participants,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "actor session verified"
    );

    Ok(key)
}

/// The failure that started a cascade; peers that merely saw an abort or a
/// timeout report `IncompleteRound`.
fn root_cause(failures: Vec<SessionFailure>) -> SessionFailure {
    let position = failures
        .iter()
        .position(|failure| !matches!(failure.error, BDCryptoError::IncompleteRound(_)))
        .unwrap_or(0);

    failures
        .into_iter()
        .nth(position)
        .unwrap_or_else(|| {
            SessionFailure::new(
                Round::Verification,
                BDCryptoError::InvalidState("no failure recorded".to_string()),
            )
        })
}

fn participant_actor(
    mut endpoint: Endpoint,
    params: &GroupParameters,
    keygen: Keygen,
    timeout: Duration,
) -> Result<SessionKey, SessionFailure> {
    let index = endpoint.index();

    let participant = keygen().map_err(|e| abort(&endpoint, Round::KeyGeneration, e))?;
    endpoint
        .broadcast(&BroadcastMessage::Round1(participant.public_value()))
        .map_err(|e| abort(&endpoint, Round::KeyGeneration, e))?;

    let public_values = endpoint
        .collect_public_values(timeout)
        .map_err(|e| abort(&endpoint, Round::KeyGeneration, e))?;
    public_values
        .iter()
        .try_for_each(|value| params.check_element(&value.value))
        .map_err(|e| abort(&endpoint, Round::ExchangeComputation, e))?;

    let exchange = participant
        .compute_exchange_value(params, &public_values)
        .map_err(|e| abort(&endpoint, Round::ExchangeComputation, e))?;
    endpoint
        .broadcast(&BroadcastMessage::Round2(exchange))
        .map_err(|e| abort(&endpoint, Round::ExchangeComputation, e))?;

    let exchange_values = endpoint
        .collect_exchange_values(timeout)
        .map_err(|e| abort(&endpoint, Round::ExchangeComputation, e))?;

    let key = participant
        .derive_session_key(params, &public_values, &exchange_values)
        .map_err(|e| abort(&endpoint, Round::KeyDerivation, e))?;

    debug!(participant = index, "session key derived");
    Ok(key)
}

fn abort(endpoint: &Endpoint, round: Round, error: BDCryptoError) -> SessionFailure {
    debug!(participant = endpoint.index(), %round, %error, "participant aborting");
    endpoint.abort(round);

    SessionFailure::new(round, error)
}
