//! # Group Parameters
//!
//! The public (p, q, g) triple every participant of a session shares: a prime
//! modulus `p`, the prime order `q` of a subgroup of Z_p^*, and a generator `g`
//! of that subgroup.

pub mod primality;

use crate::errors::BDCryptoError;
use crate::keypair::random::RandomSource;
use crate::ring::Ring;

use num_bigint::BigUint;
use num_traits::{Num, One, Zero};

use serde::{Deserialize, Serialize};

use tracing::{debug, warn};

use primality::{divides, is_probable_prime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GroupParametersRepr")]
pub struct GroupParameters {
    p: BigUint,
    q: BigUint,
    g: BigUint,
    #[serde(skip_serializing)]
    ring: Ring,
}

#[derive(Deserialize)]
struct GroupParametersRepr {
    p: BigUint,
    q: BigUint,
    g: BigUint,
}

impl TryFrom<GroupParametersRepr> for GroupParameters {
    type Error = BDCryptoError;

    fn try_from(repr: GroupParametersRepr) -> Result<Self, Self::Error> {
        GroupParameters::try_with(repr.p, repr.q, repr.g)
    }
}

impl GroupParameters {
    /// Creates a new parameter set after cheap structural checks.
    ///
    /// This does not prove anything about primality or the order of `g`;
    /// call [`GroupParameters::validate`] before generating any secret.
    pub fn try_with(p: BigUint, q: BigUint, g: BigUint) -> Result<Self, BDCryptoError> {
        if p <= BigUint::from(3u32) {
            return Err(BDCryptoError::InvalidGroupParameters(format!(
                "Modulus p must be > 3, got {}",
                p
            )));
        }

        if q <= BigUint::one() || q >= p {
            return Err(BDCryptoError::InvalidGroupParameters(
                "Subgroup order q must satisfy 1 < q < p".to_string(),
            ));
        }

        if g <= BigUint::one() || g >= &p - 1u32 {
            return Err(BDCryptoError::InvalidGroupParameters(
                "Generator g must satisfy 1 < g < p - 1".to_string(),
            ));
        }

        let ring = Ring::try_with(p.clone())?;

        Ok(Self { p, q, g, ring })
    }

    /// Parses hexadecimal strings, ignoring whitespace (the layout RFCs print constants in).
    pub fn from_hex(p: &str, q: &str, g: &str) -> Result<Self, BDCryptoError> {
        Self::try_with(parse_hex("p", p)?, parse_hex("q", q)?, parse_hex("g", g)?)
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    pub fn g(&self) -> &BigUint {
        &self.g
    }

    /// Z_p, the ring every group operation is computed in.
    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// Validates the group structure.
    ///
    /// 1. `p` and `q` pass `security_iterations` rounds of Miller–Rabin.
    /// 2. `q` divides `p - 1`.
    /// 3. `g^q ≡ 1 (mod p)`, so `g` generates the order-q subgroup and not a larger one.
    ///
    /// # Errors
    ///
    /// `InvalidGroupParameters` when any check fails. Callers must abort the session.
    pub fn validate(
        &self,
        security_iterations: u32,
        source: &dyn RandomSource,
    ) -> Result<(), BDCryptoError> {
        if security_iterations == 0 {
            return Err(BDCryptoError::InvalidParameters(
                "security_iterations must be > 0".to_string(),
            ));
        }

        if !is_probable_prime(&self.p, security_iterations, source)? {
            warn!("group validation failed: p is composite");
            return Err(BDCryptoError::InvalidGroupParameters(
                "Modulus p is not prime".to_string(),
            ));
        }

        if !is_probable_prime(&self.q, security_iterations, source)? {
            warn!("group validation failed: q is composite");
            return Err(BDCryptoError::InvalidGroupParameters(
                "Subgroup order q is not prime".to_string(),
            ));
        }

        if !divides(&self.q, &(&self.p - 1u32)) {
            warn!("group validation failed: q does not divide p - 1");
            return Err(BDCryptoError::InvalidGroupParameters(
                "Subgroup order q does not divide p - 1".to_string(),
            ));
        }

        if !self.ring.pow(&self.g, &self.q).is_one() {
            warn!("group validation failed: g^q != 1 mod p");
            return Err(BDCryptoError::InvalidGroupParameters(
                "Failed to verify order of the subgroup: g^q != 1 mod p".to_string(),
            ));
        }

        debug!(
            p_bits = self.p.bits(),
            q_bits = self.q.bits(),
            security_iterations,
            "group parameters validated"
        );

        Ok(())
    }

    /// Checks that `value` is a non-trivial member of the order-q subgroup.
    ///
    /// Legitimate public values always pass; anything else is corrupted or crafted input.
    pub fn check_element(&self, value: &BigUint) -> Result<(), BDCryptoError> {
        if value.is_one() || value >= &self.p || value.is_zero() {
            return Err(BDCryptoError::DegenerateGroupElement(format!(
                "Value is not in [2, p - 1]: {}",
                value
            )));
        }

        if !self.ring.pow(value, &self.q).is_one() {
            return Err(BDCryptoError::DegenerateGroupElement(
                "Value is outside the order-q subgroup".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_hex(name: &str, value: &str) -> Result<BigUint, BDCryptoError> {
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();

    BigUint::from_str_radix(&digits, 16).map_err(|e| {
        BDCryptoError::InvalidGroupParameters(format!("Failed to parse {} as hex: {}", name, e))
    })
}
