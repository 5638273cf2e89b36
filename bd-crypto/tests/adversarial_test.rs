use bd_crypto::errors::BDCryptoError;
use bd_crypto::keypair::{Participant, PublicValue, SeededRandomSource};
use bd_crypto::preset::{MODP_2048_256, TOY_GROUP_1019};
use bd_crypto::protocol::{ExchangeValue, verify_consistency};
use bd_crypto::session::{Round, Session, SessionState};
use bd_crypto::{GroupParameters, SessionConfig};

use num_bigint::BigUint;

use std::sync::Arc;
use std::time::Duration;

fn toy_participants(exponents: &[u32]) -> Result<Vec<Participant>, BDCryptoError> {
    exponents
        .iter()
        .enumerate()
        .map(|(index, &x)| {
            Participant::from_private_exponent(index, &TOY_GROUP_1019, &BigUint::from(x))
        })
        .collect()
}

fn toy_session(participants: usize) -> Result<Session, BDCryptoError> {
    let config = SessionConfig::try_with(participants, 3, Duration::from_secs(5))?;
    let mut session = Session::new(Arc::new(TOY_GROUP_1019.clone()), config);
    session
        .validate_parameters(&SeededRandomSource::from_seed(3))
        .map_err(|failure| failure.error)?;

    Ok(session)
}

#[test]
fn out_of_subgroup_public_value_is_rejected() -> Result<(), BDCryptoError> {
    // p - 1 has order 2, so it never lies in the order-q subgroup.
    for forged in [1018u32, 1, 0] {
        let mut session = toy_session(4)?;
        let mut public_values = session
            .load_participants(toy_participants(&[2, 3, 5, 7])?)
            .map_err(|failure| failure.error)?;

        public_values[1].value = BigUint::from(forged);

        let failure = session.compute_exchanges(public_values).unwrap_err();
        assert_eq!(failure.round, Round::ExchangeComputation);
        assert!(matches!(failure.error, BDCryptoError::DegenerateGroupElement(_)));
        assert!(failure.is_security_incident());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.live_participants(), 0);
    }

    Ok(())
}

#[test]
fn tampered_exchange_value_breaks_agreement() -> Result<(), BDCryptoError> {
    let params = &*TOY_GROUP_1019;
    let participants = toy_participants(&[2, 3, 5, 7])?;

    let public_values: Vec<PublicValue> =
        participants.iter().map(Participant::public_value).collect();
    let exchange_values: Vec<ExchangeValue> = participants
        .iter()
        .map(|participant| participant.compute_exchange_value(params, &public_values))
        .collect::<Result<_, _>>()?;

    // Participant 3 receives a forged X_1; everyone else sees the honest one.
    let mut forged = exchange_values.clone();
    forged[1].value = BigUint::from(2u32);

    let keys = participants
        .iter()
        .map(|participant| {
            let seen = if participant.index() == 3 {
                &forged
            } else {
                &exchange_values
            };
            participant.derive_session_key(params, &public_values, seen)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let result = verify_consistency(&keys);
    assert!(matches!(result, Err(BDCryptoError::KeyAgreementFailed(_))));
    Ok(())
}

#[test]
fn mismatched_round_sizes_are_rejected() -> Result<(), BDCryptoError> {
    let mut session = toy_session(4)?;
    let mut public_values = session
        .load_participants(toy_participants(&[2, 3, 5, 7])?)
        .map_err(|failure| failure.error)?;
    public_values.pop();

    let failure = session.compute_exchanges(public_values).unwrap_err();
    assert!(matches!(failure.error, BDCryptoError::IncompleteRound(_)));
    assert!(!failure.is_retryable());
    Ok(())
}

#[test]
fn wrong_participant_count_is_rejected() -> Result<(), BDCryptoError> {
    let mut session = toy_session(5)?;

    let failure = session
        .load_participants(toy_participants(&[2, 3, 5, 7])?)
        .unwrap_err();
    assert_eq!(failure.round, Round::KeyGeneration);
    assert!(matches!(failure.error, BDCryptoError::IncompleteRound(_)));
    Ok(())
}

#[test]
fn out_of_order_operations_fail_the_session() -> Result<(), BDCryptoError> {
    let config = SessionConfig::try_with(3, 3, Duration::from_secs(5))?;
    let mut session = Session::new(Arc::new(TOY_GROUP_1019.clone()), config);

    let failure = session.derive_keys(Vec::new()).unwrap_err();
    assert!(matches!(failure.error, BDCryptoError::InvalidState(_)));
    assert_eq!(session.state(), SessionState::Failed);

    // Failed is terminal.
    let failure = session
        .validate_parameters(&SeededRandomSource::from_seed(1))
        .unwrap_err();
    assert!(matches!(failure.error, BDCryptoError::InvalidState(_)));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[test]
fn generator_outside_subgroup_is_rejected() -> Result<(), BDCryptoError> {
    let source = SeededRandomSource::from_seed(9);
    let params = &*MODP_2048_256;

    // p and q are prime and q | p - 1, but 2^q != 1 mod p.
    let forged =
        GroupParameters::try_with(params.p().clone(), params.q().clone(), BigUint::from(2u32))?;
    assert!(matches!(
        forged.validate(3, &source),
        Err(BDCryptoError::InvalidGroupParameters(_))
    ));

    let composite = GroupParameters::try_with(
        BigUint::from(1023u32),
        BigUint::from(509u32),
        BigUint::from(4u32),
    )?;
    assert!(matches!(
        composite.validate(3, &source),
        Err(BDCryptoError::InvalidGroupParameters(_))
    ));

    // q prime but not dividing p - 1.
    let unrelated = GroupParameters::try_with(
        BigUint::from(1019u32),
        BigUint::from(101u32),
        BigUint::from(4u32),
    )?;
    assert!(matches!(
        unrelated.validate(3, &source),
        Err(BDCryptoError::InvalidGroupParameters(_))
    ));
    Ok(())
}

#[test]
fn session_with_forged_generator_stops_at_validation() -> Result<(), BDCryptoError> {
    let params = &*MODP_2048_256;
    let forged =
        GroupParameters::try_with(params.p().clone(), params.q().clone(), BigUint::from(3u32))?;

    let mut session = Session::new(Arc::new(forged), SessionConfig::default());
    let failure = session
        .run(Arc::new(SeededRandomSource::from_seed(11)))
        .unwrap_err();

    assert_eq!(failure.round, Round::ParameterValidation);
    assert!(matches!(failure.error, BDCryptoError::InvalidGroupParameters(_)));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}
