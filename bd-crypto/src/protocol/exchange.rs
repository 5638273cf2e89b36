//! Round 2 of the protocol: X_i = (z_{i+1} / z_{i-1})^{x_i} mod p.

use crate::errors::BDCryptoError;
use crate::keypair::PrivateExponent;
use crate::ring::Ring;

use num_bigint::BigUint;
use num_traits::Zero;

use serde::{Deserialize, Serialize};

/// Index of the left neighbor; participant 0 wraps to `ring_size - 1`.
pub fn left_neighbor(index: usize, ring_size: usize) -> usize {
    (index + ring_size - 1) % ring_size
}

/// Index of the right neighbor; participant `ring_size - 1` wraps to 0.
pub fn right_neighbor(index: usize, ring_size: usize) -> usize {
    (index + 1) % ring_size
}

/// Round 2 broadcast of participant `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeValue {
    pub index: usize,
    pub value: BigUint,
}

/// Computes X_i = (z_{i+1} · z_{i-1}^{-1} mod p)^{x_i} mod p.
///
/// # Errors
///
/// `DegenerateGroupElement` when either neighbor value is 0 mod p. The arithmetic
/// layer's `NoInverse` is never returned as is.
pub fn compute_exchange_value(
    index: usize,
    left: &BigUint,
    right: &BigUint,
    exponent: &PrivateExponent,
    ring: &Ring,
) -> Result<ExchangeValue, BDCryptoError> {
    if ring.normalize(right).is_zero() {
        return Err(BDCryptoError::DegenerateGroupElement(format!(
            "Right neighbor of participant {} published 0",
            index
        )));
    }

    let left_inverse = ring.inv(left).map_err(|e| {
        BDCryptoError::DegenerateGroupElement(format!(
            "Left neighbor of participant {} is not invertible: {}",
            index, e
        ))
    })?;

    let quotient = ring.mul(right, &left_inverse);

    Ok(ExchangeValue {
        index,
        value: exponent.raise(&quotient, ring),
    })
}
