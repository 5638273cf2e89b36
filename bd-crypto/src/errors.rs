use crate::session::Round;

#[derive(thiserror::Error, Debug)]
pub enum BDCryptoError {
    /// Error when trying to find a modular inverse that doesn't exist (gcd(a, p) != 1).
    #[error("NoInverse: {0}")]
    NoInverse(String),
    /// Error when creating a ring with an invalid modulus (p <= 1).
    #[error("InvalidModulus: {0}")]
    InvalidModulus(String),

    /// (p, q, g) failed primality, order or generator checks. Fatal before any secret exists.
    #[error("InvalidGroupParameters: {0}")]
    InvalidGroupParameters(String),
    /// A received or computed value is not a usable element of the order-q subgroup.
    #[error("DegenerateGroupElement: {0}")]
    DegenerateGroupElement(String),
    /// The random source failed or did not answer in time. Retryable.
    #[error("RandomSourceExhausted: {0}")]
    RandomSourceExhausted(String),
    /// Participants derived different session keys.
    #[error("KeyAgreementFailed: {0}")]
    KeyAgreementFailed(String),

    #[error("InvalidParameters: {0}")]
    InvalidParameters(String),
    #[error("InvalidState: {0}")]
    InvalidState(String),
    #[error("IncompleteRound: {0}")]
    IncompleteRound(String),

    #[error("Data serialization: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BDCryptoError {
    /// Only entropy exhaustion is worth retrying with the same parameters.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BDCryptoError::RandomSourceExhausted(_))
    }

    /// Errors that point at corrupted or adversarial input rather than a local fault.
    pub fn is_security_incident(&self) -> bool {
        matches!(
            self,
            BDCryptoError::DegenerateGroupElement(_) | BDCryptoError::KeyAgreementFailed(_)
        )
    }
}

/// A failed session: the error plus the round in which it surfaced.
#[derive(thiserror::Error, Debug)]
#[error("session failed during {round}: {error}")]
pub struct SessionFailure {
    pub round: Round,
    #[source]
    pub error: BDCryptoError,
}

impl SessionFailure {
    pub fn new(round: Round, error: BDCryptoError) -> Self {
        Self { round, error }
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }

    pub fn is_security_incident(&self) -> bool {
        self.error.is_security_incident()
    }
}
