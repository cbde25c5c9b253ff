//! Settlement arithmetic.
//!
//! Converts option units into underlying, strike and premium quantities under
//! the fixed ratio `quantity / amount`. All functions are pure; every product
//! is checked and no floating point is involved.

use alloy_primitives::U256;

use crate::error::{ArithmeticOverflow, OptionsError, ZeroAmount, ZeroPremium, ZeroStrikeIncrement};

/// `floor(units * numerator / denominator)`.
///
/// # Errors
/// - `ZeroAmount`: If `denominator` is zero
/// - `ArithmeticOverflow`: If `units * numerator` overflows U256
pub fn proportional_share(
    units: U256,
    numerator: U256,
    denominator: U256,
) -> Result<U256, OptionsError> {
    if denominator.is_zero() {
        return Err(OptionsError::ZeroAmount(ZeroAmount {}));
    }

    let product = units
        .checked_mul(numerator)
        .ok_or(OptionsError::ArithmeticOverflow(ArithmeticOverflow {}))?;

    Ok(product / denominator)
}

/// `ceil(units * numerator / denominator)`.
///
/// # Errors
/// Same as [`proportional_share`].
pub fn proportional_share_ceil(
    units: U256,
    numerator: U256,
    denominator: U256,
) -> Result<U256, OptionsError> {
    if denominator.is_zero() {
        return Err(OptionsError::ZeroAmount(ZeroAmount {}));
    }

    let product = units
        .checked_mul(numerator)
        .ok_or(OptionsError::ArithmeticOverflow(ArithmeticOverflow {}))?;

    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        Ok(quotient)
    } else {
        // quotient < product here, so the increment cannot overflow
        Ok(quotient + U256::from(1))
    }
}

/// Largest multiple of `lot` that is `<= units`. Zero when `lot` is zero.
#[must_use]
pub fn floor_to_lot(units: U256, lot: U256) -> U256 {
    if lot.is_zero() {
        return U256::ZERO;
    }
    units - units % lot
}

/// Premium owed for `units` option units.
///
/// Charged rounded up so the writer is never underpaid, but a purchase whose
/// premium truncates to zero is refused outright.
///
/// # Errors
/// - `ZeroPremium`: If `floor(units * premium / amount)` is zero
/// - `ZeroAmount` / `ArithmeticOverflow`: See [`proportional_share`]
pub fn premium_owed(units: U256, premium: U256, amount: U256) -> Result<U256, OptionsError> {
    if proportional_share(units, premium, amount)?.is_zero() {
        return Err(OptionsError::ZeroPremium(ZeroPremium { units }));
    }
    proportional_share_ceil(units, premium, amount)
}

/// Direction a cumulative strike share is rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Strike flows out of escrow; never pay out more than was locked.
    Down,
    /// Strike flows to the writer; never collect less than owed.
    Up,
}

/// Strike asset that changes hands when `units` more option units are
/// exercised on top of `exercised` already settled ones.
///
/// The share is recomputed for the new cumulative exercised amount and the
/// strike already moved (`settled`) is subtracted, so rounding never
/// compounds across repeated small exercises.
///
/// Returns `(new_cumulative_share, increment)`.
///
/// # Errors
/// - `ZeroStrikeIncrement`: If the increment is zero
/// - `ZeroAmount` / `ArithmeticOverflow`: See [`proportional_share`]
pub fn strike_increment(
    exercised: U256,
    units: U256,
    settled: U256,
    strike: U256,
    amount: U256,
    rounding: Rounding,
) -> Result<(U256, U256), OptionsError> {
    let cumulative = exercised
        .checked_add(units)
        .ok_or(OptionsError::ArithmeticOverflow(ArithmeticOverflow {}))?;
    let total_share = match rounding {
        Rounding::Down => proportional_share(cumulative, strike, amount)?,
        Rounding::Up => proportional_share_ceil(cumulative, strike, amount)?,
    };

    let increment = total_share.saturating_sub(settled);
    if increment.is_zero() {
        return Err(OptionsError::ZeroStrikeIncrement(ZeroStrikeIncrement { units }));
    }

    Ok((total_share, increment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_proportional_share_floors() {
        assert_eq!(
            proportional_share(u(100_000), u(400_000), u(1_000_000)).unwrap(),
            u(40_000)
        );
        assert_eq!(proportional_share(u(9), u(30_000), u(1_000_000)).unwrap(), u(0));
        assert_eq!(proportional_share(u(7), u(10), u(3)).unwrap(), u(23));
    }

    #[test]
    fn test_proportional_share_ceil_rounds_up_only_on_remainder() {
        assert_eq!(
            proportional_share_ceil(u(100_000), u(30_000), u(1_000_000)).unwrap(),
            u(3_000)
        );
        assert_eq!(
            proportional_share_ceil(u(9), u(30_000), u(1_000_000)).unwrap(),
            u(1)
        );
        assert_eq!(proportional_share_ceil(u(7), u(10), u(3)).unwrap(), u(24));
    }

    #[test]
    fn test_zero_denominator_rejected() {
        assert!(matches!(
            proportional_share(u(1), u(1), U256::ZERO),
            Err(OptionsError::ZeroAmount(_))
        ));
        assert!(matches!(
            proportional_share_ceil(u(1), u(1), U256::ZERO),
            Err(OptionsError::ZeroAmount(_))
        ));
    }

    #[test]
    fn test_overflow_detected() {
        assert!(matches!(
            proportional_share(U256::MAX, u(2), u(1)),
            Err(OptionsError::ArithmeticOverflow(_))
        ));
    }

    #[test]
    fn test_floor_to_lot() {
        assert_eq!(floor_to_lot(u(1_017), u(100)), u(1_000));
        assert_eq!(floor_to_lot(u(99), u(100)), u(0));
        assert_eq!(floor_to_lot(u(500), u(100)), u(500));
        assert_eq!(floor_to_lot(u(500), U256::ZERO), u(0));
    }

    #[test]
    fn test_premium_owed_rounds_up() {
        // 333_333 * 30_000 / 1_000_000 = 9_999.99
        assert_eq!(
            premium_owed(u(333_333), u(30_000), u(1_000_000)).unwrap(),
            u(10_000)
        );
    }

    #[test]
    fn test_premium_owed_rejects_truncated_zero() {
        assert!(matches!(
            premium_owed(u(9), u(30_000), u(1_000_000)),
            Err(OptionsError::ZeroPremium(_))
        ));
    }

    #[test]
    fn test_strike_increment_uses_cumulative_share() {
        // strike 0.4 per unit: three single-unit steps move 0, 0, 1 naively
        let (total, inc) =
            strike_increment(u(0), u(3), u(0), u(400_000), u(1_000_000), Rounding::Down).unwrap();
        assert_eq!((total, inc), (u(1), u(1)));

        let (total, inc) =
            strike_increment(u(3), u(2), total, u(400_000), u(1_000_000), Rounding::Down).unwrap();
        assert_eq!((total, inc), (u(2), u(1)));
    }

    #[test]
    fn test_strike_increment_rounds_up_for_writer() {
        // 1 * 0.4 rounds up to 1
        let (total, inc) =
            strike_increment(u(0), u(1), u(0), u(400_000), u(1_000_000), Rounding::Up).unwrap();
        assert_eq!((total, inc), (u(1), u(1)));

        // 2 * 0.4 = 0.8 still rounds up to the 1 already settled
        assert!(matches!(
            strike_increment(u(1), u(1), total, u(400_000), u(1_000_000), Rounding::Up),
            Err(OptionsError::ZeroStrikeIncrement(_))
        ));

        // 3 * 0.4 = 1.2 rounds up to 2
        let (total, inc) =
            strike_increment(u(1), u(2), total, u(400_000), u(1_000_000), Rounding::Up).unwrap();
        assert_eq!((total, inc), (u(2), u(1)));
    }

    #[test]
    fn test_strike_increment_rejects_stalemate() {
        assert!(matches!(
            strike_increment(u(0), u(1), u(0), u(400_000), u(1_000_000), Rounding::Down),
            Err(OptionsError::ZeroStrikeIncrement(_))
        ));
        // 5 * 0.4 = 2 already settled; one more unit still floors to 2
        assert!(matches!(
            strike_increment(u(5), u(1), u(2), u(400_000), u(1_000_000), Rounding::Down),
            Err(OptionsError::ZeroStrikeIncrement(_))
        ));
    }

    #[test]
    fn test_full_exercise_settles_exact_strike() {
        for rounding in [Rounding::Down, Rounding::Up] {
            let (settled, _) =
                strike_increment(u(0), u(333_333), u(0), u(400_000), u(1_000_000), rounding)
                    .unwrap();
            let (total, _) = strike_increment(
                u(333_333),
                u(666_667),
                settled,
                u(400_000),
                u(1_000_000),
                rounding,
            )
            .unwrap();
            assert_eq!(total, u(400_000));
        }
    }
}
