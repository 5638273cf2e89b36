use crate::errors::BDCryptoError;
use crate::protocol::MIN_RING_SIZE;

use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Per-session settings. The ring size is fixed for the life of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of ring members N, at least 3.
    pub participants: usize,
    /// Miller–Rabin rounds used when validating p and q.
    pub security_iterations: u32,
    /// Upper bound on waiting for a round's values, entropy included.
    pub entropy_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            participants: 4,
            security_iterations: 3,
            entropy_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    pub fn try_with(
        participants: usize,
        security_iterations: u32,
        entropy_timeout: Duration,
    ) -> Result<Self, BDCryptoError> {
        let config = Self {
            participants,
            security_iterations,
            entropy_timeout,
        };
        config.check()?;

        Ok(config)
    }

    /// Parses a JSON config and runs the same checks as [`SessionConfig::try_with`].
    pub fn from_json(data: &str) -> Result<Self, BDCryptoError> {
        let config: Self = serde_json::from_str(data)?;
        config.check()?;

        Ok(config)
    }

    fn check(&self) -> Result<(), BDCryptoError> {
        if self.participants < MIN_RING_SIZE {
            return Err(BDCryptoError::InvalidParameters(format!(
                "A ring needs at least {} participants, got {}",
                MIN_RING_SIZE, self.participants
            )));
        }

        if self.security_iterations == 0 {
            return Err(BDCryptoError::InvalidParameters(
                "security_iterations must be > 0".to_string(),
            ));
        }

        if self.entropy_timeout.is_zero() {
            return Err(BDCryptoError::InvalidParameters(
                "entropy_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
