//! # BD Crypto
//!
//! Burmester–Desmedt group key agreement: N participants on a logical ring
//! derive one shared secret in two broadcast rounds over a prime-order
//! subgroup of Z_p^*.
//!
//! ```
//! # use bd_crypto::config::SessionConfig;
//! # use bd_crypto::keypair::{RandomSource, SeededRandomSource};
//! # use bd_crypto::preset::TOY_GROUP_1019;
//! # use bd_crypto::session::Session;
//! # use std::sync::Arc;
//! let source: Arc<dyn RandomSource> = Arc::new(SeededRandomSource::from_seed(7));
//! let mut session = Session::new(Arc::new(TOY_GROUP_1019.clone()), SessionConfig::default());
//!
//! let key = session.run(source).unwrap();
//! assert_eq!(key.to_bytes_be().len(), 2);
//! ```

pub mod config;
pub mod errors;
pub mod group;
pub mod keypair;
pub mod preset;
pub mod protocol;
pub mod ring;
pub mod session;

pub use config::SessionConfig;
pub use errors::{BDCryptoError, SessionFailure};
pub use group::GroupParameters;
pub use keypair::{OsRandomSource, Participant, RandomSource, SeededRandomSource};
pub use protocol::SessionKey;
pub use session::{Round, Session, SessionState};
