//! Exact integer math for the constant-product curve.
//!
//! Products of two amounts are formed in 256 bits and wider products use
//! checked multiplication, so nothing here can overflow silently. A result
//! that does not fit back into an [`Amount`] is an
//! [`DexError::ArithmeticOverflow`].

use dexcore_types::{Amount, DexError, Result, constants};
use primitive_types::U256;

#[must_use]
pub fn wide(x: Amount) -> U256 {
    U256::from(x)
}

/// Narrow a 256-bit intermediate back to an [`Amount`].
pub fn narrow(x: U256, what: &'static str) -> Result<Amount> {
    if x > U256::from(Amount::MAX) {
        return Err(DexError::ArithmeticOverflow(what));
    }
    Ok(x.low_u128())
}

/// `a * b` in 256 bits. Never overflows.
#[must_use]
pub fn product(a: Amount, b: Amount) -> U256 {
    wide(a) * wide(b)
}

/// `floor(a * b / d)`.
pub fn mul_div(a: Amount, b: Amount, d: Amount) -> Result<Amount> {
    if d == 0 {
        return Err(DexError::ArithmeticOverflow("division by zero"));
    }
    narrow(product(a, b) / wide(d), "mul_div")
}

/// Integer square root (floor) via Newton's method.
#[must_use]
pub fn isqrt(n: U256) -> U256 {
    if n.is_zero() {
        return n;
    }
    let mut x = n;
    let mut y = (x >> 1) + (x & U256::one());
    while y < x {
        x = y;
        y = (x + n / x) >> 1;
    }
    x
}

/// `floor(sqrt(a * b))`. Always fits in an [`Amount`].
pub fn sqrt_product(a: Amount, b: Amount) -> Result<Amount> {
    narrow(isqrt(product(a, b)), "sqrt_product")
}

/// Output of a swap of `amount_in` against `(reserve_in, reserve_out)`,
/// after the 0.3% fee:
///
/// ```text
/// in_with_fee = amount_in * 997
/// amount_out  = in_with_fee * reserve_out / (reserve_in * 1000 + in_with_fee)
/// ```
pub fn get_amount_out(amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> Result<Amount> {
    if amount_in == 0 {
        return Err(DexError::InsufficientInputAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(DexError::InsufficientLiquidity);
    }
    let in_with_fee = wide(amount_in) * wide(constants::FEE_NUMERATOR);
    let numerator = in_with_fee
        .checked_mul(wide(reserve_out))
        .ok_or(DexError::ArithmeticOverflow("get_amount_out"))?;
    let denominator = wide(reserve_in) * wide(constants::FEE_DENOMINATOR) + in_with_fee;
    narrow(numerator / denominator, "get_amount_out")
}

/// Amount of B worth `amount_a` of A at the current reserve ratio, no fee.
pub fn quote(amount_a: Amount, reserve_a: Amount, reserve_b: Amount) -> Result<Amount> {
    if amount_a == 0 {
        return Err(DexError::InsufficientInputAmount);
    }
    if reserve_a == 0 || reserve_b == 0 {
        return Err(DexError::InsufficientLiquidity);
    }
    mul_div(amount_a, reserve_b, reserve_a)
}
