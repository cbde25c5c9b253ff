use alloy_primitives::{Address, U256};

use crate::error::{
    ArithmeticOverflow, InvalidBuyingWindow, InvalidExerciseWindow, InvalidMinBuyingLot,
    OptionsError, ZeroAmount,
};
use crate::OptionType;

/// Immutable terms of one issuance.
///
/// `strike` and `premium` are totals for the whole `amount`, not per-unit
/// prices: buying or exercising `n` units moves `n * strike / amount` of the
/// strike asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceTerms {
    pub option_type: OptionType,
    pub underlying: Address,
    /// Option units issued, in the underlying's smallest denomination.
    pub amount: U256,
    pub strike_asset: Address,
    pub strike: U256,
    pub premium_asset: Address,
    pub premium: U256,
    pub exercise_window_start: u64,
    pub exercise_window_end: u64,
    /// Last moment a buy is accepted. `None` keeps buying open until the
    /// exercise window closes.
    pub buying_window_end: Option<u64>,
    pub min_buying_lot: U256,
    /// Whether positions may be transferred between holders.
    pub renounceable: bool,
}

impl IssuanceTerms {
    /// Checks the terms before any escrow moves.
    ///
    /// # Errors
    /// - `ZeroAmount`: If `amount` is zero
    /// - `InvalidExerciseWindow`: If start is not before end
    /// - `InvalidBuyingWindow`: If the buying deadline lies outside the exercise window
    /// - `InvalidMinBuyingLot`: If the lot is zero or exceeds `amount`
    /// - `ArithmeticOverflow`: If `amount * strike` or `amount * premium` overflows
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.amount.is_zero() {
            return Err(OptionsError::ZeroAmount(ZeroAmount {}));
        }

        if self.exercise_window_start >= self.exercise_window_end {
            return Err(OptionsError::InvalidExerciseWindow(InvalidExerciseWindow {
                start: self.exercise_window_start,
                end: self.exercise_window_end,
            }));
        }

        if let Some(buying_window_end) = self.buying_window_end {
            if buying_window_end < self.exercise_window_start
                || buying_window_end > self.exercise_window_end
            {
                return Err(OptionsError::InvalidBuyingWindow(InvalidBuyingWindow {
                    buying_window_end,
                    start: self.exercise_window_start,
                    end: self.exercise_window_end,
                }));
            }
        }

        if self.min_buying_lot.is_zero() || self.min_buying_lot > self.amount {
            return Err(OptionsError::InvalidMinBuyingLot(InvalidMinBuyingLot {
                min_buying_lot: self.min_buying_lot,
                amount: self.amount,
            }));
        }

        check_ratio(self.amount, self.strike)?;
        check_ratio(self.amount, self.premium)
    }

    /// Asset the writer locks at creation.
    #[must_use]
    pub const fn escrow_asset(&self) -> Address {
        match self.option_type {
            OptionType::Call => self.underlying,
            OptionType::Put => self.strike_asset,
        }
    }

    /// Quantity of [`Self::escrow_asset`] locked at creation: the whole
    /// underlying for a call, the full strike notional for a put.
    #[must_use]
    pub const fn escrow_commitment(&self) -> U256 {
        match self.option_type {
            OptionType::Call => self.amount,
            OptionType::Put => self.strike,
        }
    }

    /// Latest timestamp at which a buy is still accepted.
    #[must_use]
    pub fn buying_deadline(&self) -> u64 {
        self.buying_window_end
            .map_or(self.exercise_window_end, |end| end.min(self.exercise_window_end))
    }
}

/// Every settlement multiplies at most `amount` units by `factor`; reject
/// terms for which that product cannot be represented.
pub(crate) fn check_ratio(amount: U256, factor: U256) -> Result<(), OptionsError> {
    amount
        .checked_mul(factor)
        .map(|_| ())
        .ok_or(OptionsError::ArithmeticOverflow(ArithmeticOverflow {}))
}
