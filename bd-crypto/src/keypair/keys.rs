use crate::errors::BDCryptoError;
use crate::group::GroupParameters;
use crate::keypair::random::RandomSource;
use crate::protocol::exchange::{
    ExchangeValue, compute_exchange_value, left_neighbor, right_neighbor,
};
use crate::protocol::ordered_round;
use crate::protocol::session_key::{SessionKey, derive_session_key};
use crate::ring::{Ring, wipe};

use num_bigint::BigUint;
use num_traits::One;

use serde::{Deserialize, Serialize};

use std::fmt;

use zeroize::Zeroizing;

/// The secret exponent x_i in [1, q - 1].
///
/// Stored as big-endian bytes that are wiped on drop. Deliberately neither
/// `Serialize` nor `Clone`, and `Debug` never prints the value.
pub struct PrivateExponent {
    bytes: Zeroizing<Vec<u8>>,
}

impl PrivateExponent {
    /// Wraps a caller-chosen exponent. Range is checked by [`Participant::from_private_exponent`].
    pub fn from_biguint(value: &BigUint) -> Self {
        Self {
            bytes: Zeroizing::new(value.to_bytes_be()),
        }
    }

    /// Computes `base^x mod p`. The plain copy of x exists only for the
    /// duration of the call and is wiped before it is freed.
    pub(crate) fn raise(&self, base: &BigUint, ring: &Ring) -> BigUint {
        let mut x = BigUint::from_bytes_be(&self.bytes);
        let result = ring.pow(base, &x);
        wipe(&mut x);

        result
    }

    #[cfg(test)]
    pub(crate) fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.bytes)
    }
}

impl fmt::Debug for PrivateExponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateExponent(<redacted>)")
    }
}

/// Round 1 broadcast: z_i = g^{x_i} mod p.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicValue {
    pub index: usize,
    pub value: BigUint,
}

/// Draws x uniformly from [1, q - 1] and computes z = g^x mod p.
///
/// # Errors
///
/// `RandomSourceExhausted` if `source` cannot service the request.
pub fn generate_keypair(
    params: &GroupParameters,
    source: &dyn RandomSource,
) -> Result<(PrivateExponent, BigUint), BDCryptoError> {
    let mut sampled = source.next_in_range(&BigUint::one(), &(params.q() - 1u32))?;
    let private_exponent = PrivateExponent::from_biguint(&sampled);
    wipe(&mut sampled);

    let public_value = private_exponent.raise(params.g(), params.ring());

    Ok((private_exponent, public_value))
}

/// One member of the ring: its index, its secret exponent and its public value.
#[derive(Debug)]
pub struct Participant {
    index: usize,
    private_exponent: PrivateExponent,
    public_value: BigUint,
}

impl Participant {
    pub fn generate(
        index: usize,
        params: &GroupParameters,
        source: &dyn RandomSource,
    ) -> Result<Self, BDCryptoError> {
        let (private_exponent, public_value) = generate_keypair(params, source)?;

        Ok(Self {
            index,
            private_exponent,
            public_value,
        })
    }

    /// Builds a participant from a fixed exponent, e.g. for reproducible runs.
    pub fn from_private_exponent(
        index: usize,
        params: &GroupParameters,
        exponent: &BigUint,
    ) -> Result<Self, BDCryptoError> {
        if exponent < &BigUint::one() || exponent >= params.q() {
            return Err(BDCryptoError::InvalidParameters(format!(
                "Private exponent of participant {} must lie in [1, q - 1]",
                index
            )));
        }

        let private_exponent = PrivateExponent::from_biguint(exponent);
        let public_value = private_exponent.raise(params.g(), params.ring());

        Ok(Self {
            index,
            private_exponent,
            public_value,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn public_value(&self) -> PublicValue {
        PublicValue {
            index: self.index,
            value: self.public_value.clone(),
        }
    }

    /// Round 2: X_i from the two ring neighbors in the complete, ordered round 1 set.
    pub fn compute_exchange_value(
        &self,
        params: &GroupParameters,
        public_values: &[PublicValue],
    ) -> Result<ExchangeValue, BDCryptoError> {
        let ring_size = public_values.len();
        ordered_round(public_values, ring_size, |value| value.index)?;
        self.check_own_slot(public_values)?;

        compute_exchange_value(
            self.index,
            &public_values[left_neighbor(self.index, ring_size)].value,
            &public_values[right_neighbor(self.index, ring_size)].value,
            &self.private_exponent,
            params.ring(),
        )
    }

    /// Folds the complete ring of exchange values into this participant's copy of the key.
    pub fn derive_session_key(
        &self,
        params: &GroupParameters,
        public_values: &[PublicValue],
        exchange_values: &[ExchangeValue],
    ) -> Result<SessionKey, BDCryptoError> {
        let ring_size = public_values.len();
        ordered_round(public_values, ring_size, |value| value.index)?;

        derive_session_key(
            self.index,
            &public_values[left_neighbor(self.index, ring_size)].value,
            &self.private_exponent,
            exchange_values,
            ring_size,
            params.ring(),
        )
    }

    fn check_own_slot(&self, public_values: &[PublicValue]) -> Result<(), BDCryptoError> {
        match public_values.get(self.index) {
            Some(own) if own.value == self.public_value => Ok(()),
            Some(_) => Err(BDCryptoError::DegenerateGroupElement(format!(
                "Round 1 carries a different public value for participant {}",
                self.index
            ))),
            None => Err(BDCryptoError::IncompleteRound(format!(
                "Participant {} is missing from round 1",
                self.index
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::random::SeededRandomSource;
    use crate::preset::TOY_GROUP_1019;

    #[test]
    fn test_generated_exponent_stays_in_range() -> Result<(), BDCryptoError> {
        let params = &*TOY_GROUP_1019;
        let source = SeededRandomSource::from_seed(17);

        for _ in 0..200 {
            let (exponent, public_value) = generate_keypair(params, &source)?;
            let x = exponent.to_biguint();
            assert!(x >= BigUint::one() && &x < params.q());
            assert_eq!(public_value, params.ring().pow(params.g(), &x));
            params.check_element(&public_value)?;
        }
        Ok(())
    }

    #[test]
    fn test_raise_matches_plain_exponentiation() {
        let params = &*TOY_GROUP_1019;
        let exponent = PrivateExponent::from_biguint(&BigUint::from(170u32));

        for base in [4u32, 16, 1018] {
            let base = BigUint::from(base);
            assert_eq!(
                exponent.raise(&base, params.ring()),
                params.ring().pow(&base, &BigUint::from(170u32))
            );
        }
        // The stored bytes survive the transient copy being wiped.
        assert_eq!(exponent.to_biguint(), BigUint::from(170u32));
    }

    #[test]
    fn test_fixed_exponent_participant() -> Result<(), BDCryptoError> {
        let params = &*TOY_GROUP_1019;
        let participant = Participant::from_private_exponent(2, params, &BigUint::from(3u32))?;

        assert_eq!(participant.index(), 2);
        assert_eq!(participant.public_value().value, BigUint::from(64u32));
        Ok(())
    }

    #[test]
    fn test_fixed_exponent_out_of_range() {
        let params = &*TOY_GROUP_1019;

        for bad in [BigUint::from(0u32), params.q().clone(), params.q() + 1u32] {
            let result = Participant::from_private_exponent(0, params, &bad);
            assert!(matches!(result, Err(BDCryptoError::InvalidParameters(_))));
        }
    }

    #[test]
    fn test_debug_never_prints_exponent() -> Result<(), BDCryptoError> {
        let params = &*TOY_GROUP_1019;
        let participant = Participant::from_private_exponent(0, params, &BigUint::from(170u32))?;

        let rendered = format!("{:?}", participant);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("private_exponent: 170"));
        Ok(())
    }

    #[test]
    fn test_swapped_own_value_is_rejected() -> Result<(), BDCryptoError> {
        let params = &*TOY_GROUP_1019;
        let participants: Vec<Participant> = (0..3)
            .map(|i| Participant::from_private_exponent(i, params, &BigUint::from(i as u32 + 2)))
            .collect::<Result<_, _>>()?;

        let mut public_values: Vec<PublicValue> =
            participants.iter().map(Participant::public_value).collect();
        public_values[1].value = BigUint::from(4u32);

        let result = participants[1].compute_exchange_value(params, &public_values);
        assert!(matches!(result, Err(BDCryptoError::DegenerateGroupElement(_))));
        Ok(())
    }
}
