//! # Protocol
//!
//! The two Burmester–Desmedt computations every participant performs:
//! the round 2 exchange value and the final session key.

pub mod exchange;
pub mod session_key;

use crate::errors::BDCryptoError;

pub use exchange::{ExchangeValue, compute_exchange_value, left_neighbor, right_neighbor};
pub use session_key::{SessionKey, derive_session_key, verify_consistency};

/// Smallest ring for which every member has two distinct neighbors.
pub const MIN_RING_SIZE: usize = 3;

/// Checks that a round holds exactly `ring_size` values ordered by participant index.
pub fn ordered_round<T>(
    values: &[T],
    ring_size: usize,
    index_of: impl Fn(&T) -> usize,
) -> Result<(), BDCryptoError> {
    if ring_size < MIN_RING_SIZE {
        return Err(BDCryptoError::InvalidParameters(format!(
            "Ring needs at least {} participants, got {}",
            MIN_RING_SIZE, ring_size
        )));
    }

    if values.len() != ring_size {
        return Err(BDCryptoError::IncompleteRound(format!(
            "Expected {} values, collected {}",
            ring_size,
            values.len()
        )));
    }

    if let Some((position, value)) = values
        .iter()
        .enumerate()
        .find(|(position, value)| index_of(*value) != *position)
    {
        return Err(BDCryptoError::IncompleteRound(format!(
            "Slot {} holds the value of participant {}",
            position,
            index_of(value)
        )));
    }

    Ok(())
}
