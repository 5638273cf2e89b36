//! Key computation: K_i = z_{i-1}^{N·x_i} · ∏_{j=0}^{N-2} X_{i+j}^{N-1-j} mod p.
//!
//! With a_k = x_k · x_{k+1}, the exchange values satisfy log X_k = a_k - a_{k-1},
//! so the ring walk telescopes to a_0 + a_1 + ... + a_{N-1} for every i and all
//! participants land on g^{x_0 x_1 + x_1 x_2 + ... + x_{N-1} x_0}.

use crate::errors::BDCryptoError;
use crate::keypair::PrivateExponent;
use crate::protocol::exchange::ExchangeValue;
use crate::protocol::ordered_round;
use crate::ring::Ring;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use itertools::Itertools;

use num_bigint::BigUint;
use num_traits::Zero;

use std::fmt;

use zeroize::Zeroizing;

/// The shared secret, held as a big-endian buffer padded to the byte length of p.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl SessionKey {
    fn from_biguint(value: &BigUint, ring: &Ring) -> Self {
        let width = ring.modulus().bits().div_ceil(8) as usize;
        let digits = value.to_bytes_be();

        let mut bytes = Zeroizing::new(vec![0u8; width.saturating_sub(digits.len())]);
        bytes.extend_from_slice(&digits);

        Self { bytes }
    }

    pub fn to_bytes_be(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes.as_slice())
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey(<{} bytes>)", self.bytes.len())
    }
}

/// Derives participant `index`'s copy of the session key.
///
/// `exchange_values` must be the complete round 2 set ordered by index.
pub fn derive_session_key(
    index: usize,
    left: &BigUint,
    exponent: &PrivateExponent,
    exchange_values: &[ExchangeValue],
    ring_size: usize,
    ring: &Ring,
) -> Result<SessionKey, BDCryptoError> {
    ordered_round(exchange_values, ring_size, |value| value.index)?;

    if index >= ring_size {
        return Err(BDCryptoError::InvalidParameters(format!(
            "Participant index {} outside a ring of {}",
            index, ring_size
        )));
    }

    if ring.normalize(left).is_zero() {
        return Err(BDCryptoError::DegenerateGroupElement(format!(
            "Left neighbor of participant {} published 0",
            index
        )));
    }

    // z_{i-1}^{N·x_i} as (z_{i-1}^{x_i})^N.
    let mut key = ring.pow(&exponent.raise(left, ring), &BigUint::from(ring_size));

    for j in 0..ring_size - 1 {
        let exchange = &exchange_values[(index + j) % ring_size];
        let weight = BigUint::from(ring_size - 1 - j);
        key = ring.mul(&key, &ring.pow(&exchange.value, &weight));
    }

    Ok(SessionKey::from_biguint(&key, ring))
}

/// Checks that every participant derived the same key and returns it.
///
/// # Errors
///
/// `KeyAgreementFailed` on any mismatch. The session must be discarded; no
/// participant's value is ever picked over another's.
pub fn verify_consistency(keys: &[SessionKey]) -> Result<SessionKey, BDCryptoError> {
    let Some(first) = keys.first() else {
        return Err(BDCryptoError::KeyAgreementFailed(
            "No session keys were derived".to_string(),
        ));
    };

    if !keys.iter().all_equal() {
        let mismatched = keys.iter().positions(|key| key != first).collect_vec();
        return Err(BDCryptoError::KeyAgreementFailed(format!(
            "Participants {:?} disagree with participant 0",
            mismatched
        )));
    }

    Ok(first.clone())
}
