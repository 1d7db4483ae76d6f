//! Fixed-point U256 arithmetic.
//!
//! Pool quantities arrive as 18-decimal WAD integers, rates included. All
//! ledger arithmetic stays in U256; conversion to a decimal type happens
//! only when the store is serialised.

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Half a WAD, used for round-half-up
pub const HALF_WAD: U256 = U256::from_limbs([500_000_000_000_000_000u64, 0, 0, 0]);

/// Power of 10 as U256.
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Multiply two WAD values, rounding half up: (a * b + WAD/2) / WAD
#[inline(always)]
pub fn wmul(a: U256, b: U256) -> U256 {
    a.saturating_mul(b).saturating_add(HALF_WAD) / WAD
}

/// Divide two WAD values, rounding half up: (a * WAD + b/2) / b
///
/// Division by zero yields zero.
#[inline(always)]
pub fn wdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::ZERO;
    }
    a.saturating_mul(WAD).saturating_add(b / U256::from(2u8)) / b
}

/// Number of whole tokens in a WAD amount: floor(amount / WAD)
#[inline(always)]
pub fn whole_tokens(amount: U256) -> usize {
    usize::try_from(amount / WAD).unwrap_or(usize::MAX)
}

/// Rescale a raw token amount with `decimals` to 18-decimal WAD.
#[inline(always)]
pub fn scale_to_wad(amount: U256, decimals: u8) -> U256 {
    match decimals.cmp(&18) {
        std::cmp::Ordering::Equal => amount,
        std::cmp::Ordering::Less => amount.saturating_mul(pow10(18 - decimals)),
        std::cmp::Ordering::Greater => amount / pow10(decimals - 18),
    }
}

/// WAD from a decimal literal, for fixtures and constants.
///
/// `wad_from_str("3.9675")` is 3.9675e18. Returns `None` on malformed input
/// or more than 18 fractional digits.
pub fn wad_from_str(s: &str) -> Option<U256> {
    let (int, frac) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if frac.len() > 18 || (int.is_empty() && frac.is_empty()) {
        return None;
    }
    let int = if int.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(int, 10).ok()?
    };
    let frac = if frac.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(frac, 10).ok()? * pow10(18 - frac.len() as u8)
    };
    Some(int.checked_mul(WAD)?.checked_add(frac)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wad_constant() {
        assert_eq!(WAD, pow10(18));
        assert_eq!(HALF_WAD * U256::from(2u8), WAD);
    }

    #[test]
    fn test_wmul_rounds_half_up() {
        let a = U256::from(3u64) * WAD;
        let b = WAD / U256::from(2u64);
        assert_eq!(wmul(a, b), U256::from(1_500_000_000_000_000_000u128));

        // 1 wei * 0.5 rounds up to 1 wei
        assert_eq!(wmul(U256::from(1u64), HALF_WAD), U256::from(1u64));
    }

    #[test]
    fn test_wdiv() {
        let a = U256::from(10u64) * WAD;
        let b = U256::from(4u64) * WAD;
        assert_eq!(wdiv(a, b), U256::from(2_500_000_000_000_000_000u128));
        assert_eq!(wdiv(a, U256::ZERO), U256::ZERO);
    }

    #[test]
    fn test_whole_tokens_floors() {
        assert_eq!(whole_tokens(wad_from_str("3.9675").unwrap()), 3);
        assert_eq!(whole_tokens(wad_from_str("0.99").unwrap()), 0);
        assert_eq!(whole_tokens(U256::from(5u64) * WAD), 5);
    }

    #[test]
    fn test_scale_to_wad() {
        // 1000 USDC (6 decimals)
        let amount = U256::from(1_000_000_000u64);
        assert_eq!(scale_to_wad(amount, 6), U256::from(1000u64) * WAD);
        assert_eq!(scale_to_wad(WAD, 18), WAD);
    }

    #[test]
    fn test_wad_from_str() {
        assert_eq!(wad_from_str("1"), Some(WAD));
        assert_eq!(wad_from_str("0.000000000000000001"), Some(U256::from(1u64)));
        assert_eq!(wad_from_str("1.0000000000000000001"), None);
        assert_eq!(wad_from_str("abc"), None);
    }
}
