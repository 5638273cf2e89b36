//! Implementation of ring ops using modular arithmetic over `BigUint`.

use crate::errors::BDCryptoError;

use super::extended_gcd;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};

use serde::{Deserialize, Serialize};

/// Represents the ring Z_p using modular arithmetic.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    pub modulus: BigUint,
}

impl Ring {
    /// Create a new Ring with the given modulus.
    ///
    /// The modulus must be greater than 1.
    pub fn try_with(modulus: BigUint) -> Result<Self, BDCryptoError> {
        if modulus <= BigUint::one() {
            return Err(BDCryptoError::InvalidModulus(format!(
                "Modulus must be greater than 1, got {}",
                modulus
            )));
        }

        Ok(Ring { modulus })
    }

    /// Returns the modulus of the ring.
    ///
    /// # Example
    ///
    /// ```
    /// # use bd_crypto::ring::Ring;
    /// # use num_bigint::BigUint;
    /// let ring = Ring::try_with(BigUint::from(13u32)).unwrap();
    /// assert_eq!(ring.modulus(), &BigUint::from(13u32));
    /// ```
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Normalizes a value to be within the range `[0, modulus - 1]`.
    pub fn normalize(&self, value: &BigUint) -> BigUint {
        value % &self.modulus
    }

    /// Computes `(a + b) mod modulus`.
    ///
    /// # Example
    ///
    /// ```
    /// # use bd_crypto::ring::Ring;
    /// # use num_bigint::BigUint;
    /// let ring = Ring::try_with(BigUint::from(10u32)).unwrap();
    /// assert_eq!(ring.add(&BigUint::from(7u32), &BigUint::from(5u32)), BigUint::from(2u32));
    /// ```
    pub fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (self.normalize(a) + self.normalize(b)) % &self.modulus
    }

    /// Computes `(a - b) mod modulus`.
    pub fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let a_norm = self.normalize(a);
        let b_norm = self.normalize(b);

        (a_norm + &self.modulus - b_norm) % &self.modulus
    }

    /// Computes `(a * b) mod modulus`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (self.normalize(a) * self.normalize(b)) % &self.modulus
    }

    /// Computes `base^exponent mod modulus`.
    ///
    /// # Example
    ///
    /// ```
    /// # use bd_crypto::ring::Ring;
    /// # use num_bigint::BigUint;
    /// let ring = Ring::try_with(BigUint::from(23u32)).unwrap();
    /// // 2 has order 11 in Z_23^*
    /// assert_eq!(ring.pow(&BigUint::from(2u32), &BigUint::from(11u32)), BigUint::from(1u32));
    /// ```
    pub fn pow(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        base.modpow(exponent, &self.modulus)
    }

    /// Computes the modular multiplicative inverse `a^-1 mod modulus`.
    ///
    /// The inverse exists if and only if `gcd(a, modulus) == 1`.
    /// Uses the Extended Euclidean Algorithm.
    ///
    /// # Errors
    ///
    /// Returns `BDCryptoError::NoInverse` if `a` is 0 or the inverse does not exist.
    ///
    /// # Example
    ///
    /// ```
    /// # use bd_crypto::ring::Ring;
    /// # use num_bigint::BigUint;
    /// let ring = Ring::try_with(BigUint::from(10u32)).unwrap();
    /// assert_eq!(ring.inv(&BigUint::from(3u32)).unwrap(), BigUint::from(7u32));
    /// assert!(ring.inv(&BigUint::from(2u32)).is_err());
    /// assert!(ring.inv(&BigUint::from(0u32)).is_err());
    /// ```
    pub fn inv(&self, a: &BigUint) -> Result<BigUint, BDCryptoError> {
        let a_norm = self.normalize(a);
        if a_norm.is_zero() {
            return Err(BDCryptoError::NoInverse(format!(
                "Cannot invert 0 in mod {}",
                self.modulus
            )));
        }

        let modulus = BigInt::from(self.modulus.clone());
        let (g, x, _) = extended_gcd(&BigInt::from(a_norm.clone()), &modulus);
        if !g.is_one() {
            return Err(BDCryptoError::NoInverse(format!(
                "Modular inverse does not exist for {} mod {} (gcd={})",
                a_norm, self.modulus, g
            )));
        }

        x.mod_floor(&modulus).to_biguint().ok_or_else(|| {
            BDCryptoError::NoInverse(format!("Inverse of {} reduced to a negative value", a_norm))
        })
    }
}
