pub mod keys;
pub mod random;

pub use keys::{Participant, PrivateExponent, PublicValue, generate_keypair};
pub use random::{OsRandomSource, RandomSource, SeededRandomSource};
