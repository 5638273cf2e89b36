//! Well-known group parameter sets.

pub mod rfc5114;

pub use rfc5114::{MODP_2048_256, TOY_GROUP_1019};
