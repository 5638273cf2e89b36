use num_bigint::{BigInt, BigUint};
use num_integer::Integer;

/// Computes the extended GCD of `a` and `b`.
///
/// Returns `(g, x, y)` such that `a * x + b * y = g`.
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let egcd = a.extended_gcd(b);
    (egcd.gcd, egcd.x, egcd.y)
}

/// Overwrites the digits of `value` with zeros in place, leaving it equal to 0.
///
/// `BigUint` has no `Zeroize` support, so secret copies are cleared through
/// their own buffer before they are dropped.
pub fn wipe(value: &mut BigUint) {
    let words = value.iter_u32_digits().len();
    value.assign_from_slice(&vec![0u32; words]);
}
