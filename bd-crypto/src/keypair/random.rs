//! Secure random sources shared by every participant of a session.

use crate::errors::BDCryptoError;
use crate::ring::wipe;

use num_bigint::BigUint;

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng, TryRngCore};

use std::sync::Mutex;

use zeroize::Zeroizing;

/// Upper bound on rejection-sampling rounds before the source is declared exhausted.
/// Each round succeeds with probability > 1/2.
const MAX_SAMPLING_ATTEMPTS: usize = 128;

/// A cryptographically secure random source usable from N generation sites at once.
pub trait RandomSource: Send + Sync {
    /// Fills `dest` with random bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<(), BDCryptoError>;

    /// Draws an integer uniformly from the inclusive range `[low, high]`.
    fn next_in_range(&self, low: &BigUint, high: &BigUint) -> Result<BigUint, BDCryptoError> {
        if low > high {
            return Err(BDCryptoError::InvalidParameters(format!(
                "Empty sampling range [{}, {}]",
                low, high
            )));
        }

        let span = high - low + 1u32;
        let bits = span.bits();
        let byte_len = bits.div_ceil(8) as usize;
        let excess_bits = byte_len * 8 - bits as usize;

        let mut buffer = Zeroizing::new(vec![0u8; byte_len]);
        for _ in 0..MAX_SAMPLING_ATTEMPTS {
            self.fill(&mut buffer)?;
            buffer[0] &= 0xffu8 >> excess_bits;

            let mut candidate = BigUint::from_bytes_be(&buffer);
            if candidate < span {
                return Ok(low + candidate);
            }
            wipe(&mut candidate);
        }

        Err(BDCryptoError::RandomSourceExhausted(format!(
            "No sample below {} after {} attempts",
            span, MAX_SAMPLING_ATTEMPTS
        )))
    }
}

/// Operating system entropy. Stateless, so concurrent use never serializes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), BDCryptoError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| BDCryptoError::RandomSourceExhausted(format!("OS entropy: {}", e)))
    }
}

/// A ChaCha-based `StdRng` behind a mutex. Deterministic when built from a seed.
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: Mutex<StdRng>,
}

impl SeededRandomSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), BDCryptoError> {
        let mut rng = self.rng.lock().map_err(|_| {
            BDCryptoError::RandomSourceExhausted("random source lock poisoned".to_string())
        })?;
        rng.fill_bytes(dest);

        Ok(())
    }
}
