//! # Ring Module
//!
//! Provides the [`Ring`] struct for representing Z_p over arbitrary-precision integers
//! and performing the modular arithmetic the protocol needs.

pub mod helper;
pub mod math;

pub use helper::{extended_gcd, wipe};
pub use math::Ring;
