//! Probabilistic primality testing over `BigUint`.

use crate::errors::BDCryptoError;
use crate::keypair::random::RandomSource;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

const SMALL_PRIMES: [u32; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Miller–Rabin test with `rounds` witnesses drawn from `source`.
///
/// A composite passes with probability at most 4^-rounds. Candidates up to 97
/// and candidates with a small factor are decided exactly by trial division.
pub fn is_probable_prime(
    candidate: &BigUint,
    rounds: u32,
    source: &dyn RandomSource,
) -> Result<bool, BDCryptoError> {
    if candidate < &BigUint::from(2u32) {
        return Ok(false);
    }

    for &small in SMALL_PRIMES.iter() {
        let small = BigUint::from(small);
        if candidate == &small {
            return Ok(true);
        }
        if (candidate % &small).is_zero() {
            return Ok(false);
        }
    }

    // candidate - 1 = d * 2^s with d odd
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    let candidate_minus_one = candidate - &one;
    let s = candidate_minus_one.trailing_zeros().unwrap_or(0);
    let d = &candidate_minus_one >> s;

    let witness_high = candidate - &two;
    'witness: for _ in 0..rounds {
        let a = source.next_in_range(&two, &witness_high)?;
        let mut x = a.modpow(&d, candidate);
        if x.is_one() || x == candidate_minus_one {
            continue;
        }

        for _ in 1..s {
            x = x.modpow(&two, candidate);
            if x == candidate_minus_one {
                continue 'witness;
            }
        }

        return Ok(false);
    }

    Ok(true)
}

/// True when `divisor` divides `value` without remainder.
pub fn divides(divisor: &BigUint, value: &BigUint) -> bool {
    !divisor.is_zero() && value.is_multiple_of(divisor)
}
