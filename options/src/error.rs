//! Solidity custom errors raised by the settlement engine.
//!
//! Every variant ABI-encodes to EVM revert data through the `SolidityError`
//! derive, and maps onto one [`ErrorKind`] so callers can decide whether a
//! retry makes sense after fixing the triggering condition.

use alloc::vec::Vec;
use alloy_sol_types::{sol, SolError};
use core::fmt;
use stylus_sdk::prelude::*;

sol! {
    #[derive(Debug)]
    error ZeroAmount();
    #[derive(Debug)]
    error InvalidExerciseWindow(uint64 start, uint64 end);
    #[derive(Debug)]
    error InvalidBuyingWindow(uint64 buying_window_end, uint64 start, uint64 end);
    #[derive(Debug)]
    error InvalidMinBuyingLot(uint256 min_buying_lot, uint256 amount);
    #[derive(Debug)]
    error ZeroUnits();
    #[derive(Debug)]
    error BelowMinimumLot(uint256 requested, uint256 min_buying_lot);
    #[derive(Debug)]
    error ExactFillUnavailable(uint256 requested, uint256 fillable);
    #[derive(Debug)]
    error InvalidRecipient();
    #[derive(Debug)]
    error ArithmeticOverflow();
    #[derive(Debug)]
    error LengthMismatch(uint256 ids, uint256 amounts);
    #[derive(Debug)]
    error InvalidOptionType(uint8 value);

    #[derive(Debug)]
    error NotWriter(uint256 issuance_id, address caller);
    #[derive(Debug)]
    error BuyerNotAllowed(uint256 issuance_id, address buyer);
    #[derive(Debug)]
    error NotApproved(address owner, address operator);
    #[derive(Debug)]
    error NotRenounceable(uint256 issuance_id);

    #[derive(Debug)]
    error UnknownIssuance(uint256 issuance_id);
    #[derive(Debug)]
    error IssuanceClosed(uint256 issuance_id);
    #[derive(Debug)]
    error AlreadySold(uint256 issuance_id, uint256 sold_amount);
    #[derive(Debug)]
    error SoldOut(uint256 issuance_id);

    #[derive(Debug)]
    error BuyingWindowClosed(uint64 deadline, uint64 now);
    #[derive(Debug)]
    error ExerciseWindowNotOpen(uint64 start, uint64 now);
    #[derive(Debug)]
    error ExerciseWindowClosed(uint64 end, uint64 now);
    #[derive(Debug)]
    error ExerciseWindowOpen(uint64 end, uint64 now);

    #[derive(Debug)]
    error TransferRejected(address asset, address from, address to, uint256 amount);
    #[derive(Debug)]
    error InsufficientPosition(address holder, uint256 balance, uint256 requested);

    #[derive(Debug)]
    error ZeroPremium(uint256 units);
    #[derive(Debug)]
    error ZeroStrikeIncrement(uint256 units);
}

/// Errors that can occur in the options engine.
#[derive(SolidityError, Debug)]
pub enum OptionsError {
    /// Issuance amount is zero.
    ZeroAmount(ZeroAmount),
    /// Exercise window start is not strictly before its end.
    InvalidExerciseWindow(InvalidExerciseWindow),
    /// Buying window end falls outside the exercise window.
    InvalidBuyingWindow(InvalidBuyingWindow),
    /// Minimum buying lot is zero or larger than the issuance.
    InvalidMinBuyingLot(InvalidMinBuyingLot),
    /// Zero option units requested.
    ZeroUnits(ZeroUnits),
    /// Request floors to zero whole lots.
    BelowMinimumLot(BelowMinimumLot),
    /// An exact-fill purchase cannot be filled as requested.
    ExactFillUnavailable(ExactFillUnavailable),
    /// Position transfer to the zero address.
    InvalidRecipient(InvalidRecipient),
    /// Settlement products do not fit in 256 bits.
    ArithmeticOverflow(ArithmeticOverflow),
    /// Batch transfer ids and amounts differ in length.
    LengthMismatch(LengthMismatch),
    /// Option type code is neither call nor put.
    InvalidOptionType(InvalidOptionType),
    /// Caller is not the issuance writer.
    NotWriter(NotWriter),
    /// Buyer is not on the issuance allow-list.
    BuyerNotAllowed(BuyerNotAllowed),
    /// Operator is not approved to move the owner's positions.
    NotApproved(NotApproved),
    /// Positions of this issuance cannot change hands.
    NotRenounceable(NotRenounceable),
    /// No issuance was ever created under this id.
    UnknownIssuance(UnknownIssuance),
    /// Issuance was canceled or reclaimed after expiry.
    IssuanceClosed(IssuanceClosed),
    /// Cancel attempted after option units were sold.
    AlreadySold(AlreadySold),
    /// Nothing left to sell.
    SoldOut(SoldOut),
    /// Buy attempted after the buying deadline.
    BuyingWindowClosed(BuyingWindowClosed),
    /// Exercise attempted before the window opens.
    ExerciseWindowNotOpen(ExerciseWindowNotOpen),
    /// Exercise attempted after the window closed.
    ExerciseWindowClosed(ExerciseWindowClosed),
    /// Reclaim attempted while the exercise window is still open.
    ExerciseWindowOpen(ExerciseWindowOpen),
    /// The asset transfer port refused a settlement leg.
    TransferRejected(TransferRejected),
    /// Position balance is smaller than the units requested.
    InsufficientPosition(InsufficientPosition),
    /// Premium for the purchase rounds down to zero.
    ZeroPremium(ZeroPremium),
    /// Exercise would move no strike asset.
    ZeroStrikeIncrement(ZeroStrikeIncrement),
}

/// Coarse classification of [`OptionsError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed terms or request quantities.
    Validation,
    /// Caller lacks the role the operation requires.
    Authorization,
    /// Issuance missing, closed, or in the wrong lifecycle phase.
    State,
    /// Outside the buying or exercise window.
    TimeWindow,
    /// Asset transfer or position debit could not be covered.
    InsufficientFunds,
    /// A non-zero request rounds to a zero settlement amount.
    RoundingStalemate,
}

impl OptionsError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount(_)
            | Self::InvalidExerciseWindow(_)
            | Self::InvalidBuyingWindow(_)
            | Self::InvalidMinBuyingLot(_)
            | Self::ZeroUnits(_)
            | Self::BelowMinimumLot(_)
            | Self::ExactFillUnavailable(_)
            | Self::InvalidRecipient(_)
            | Self::ArithmeticOverflow(_)
            | Self::LengthMismatch(_)
            | Self::InvalidOptionType(_) => ErrorKind::Validation,
            Self::NotWriter(_)
            | Self::BuyerNotAllowed(_)
            | Self::NotApproved(_)
            | Self::NotRenounceable(_) => ErrorKind::Authorization,
            Self::UnknownIssuance(_)
            | Self::IssuanceClosed(_)
            | Self::AlreadySold(_)
            | Self::SoldOut(_) => ErrorKind::State,
            Self::BuyingWindowClosed(_)
            | Self::ExerciseWindowNotOpen(_)
            | Self::ExerciseWindowClosed(_)
            | Self::ExerciseWindowOpen(_) => ErrorKind::TimeWindow,
            Self::TransferRejected(_) | Self::InsufficientPosition(_) => {
                ErrorKind::InsufficientFunds
            }
            Self::ZeroPremium(_) | Self::ZeroStrikeIncrement(_) => ErrorKind::RoundingStalemate,
        }
    }

    /// ABI-encoded revert data for this error.
    #[must_use]
    pub fn revert_data(self) -> Vec<u8> {
        self.into()
    }
}

/// Signatures of every custom error, in declaration order.
#[must_use]
pub fn signatures() -> Vec<&'static str> {
    alloc::vec![
        ZeroAmount::SIGNATURE,
        InvalidExerciseWindow::SIGNATURE,
        InvalidBuyingWindow::SIGNATURE,
        InvalidMinBuyingLot::SIGNATURE,
        ZeroUnits::SIGNATURE,
        BelowMinimumLot::SIGNATURE,
        ExactFillUnavailable::SIGNATURE,
        InvalidRecipient::SIGNATURE,
        ArithmeticOverflow::SIGNATURE,
        LengthMismatch::SIGNATURE,
        InvalidOptionType::SIGNATURE,
        NotWriter::SIGNATURE,
        BuyerNotAllowed::SIGNATURE,
        NotApproved::SIGNATURE,
        NotRenounceable::SIGNATURE,
        UnknownIssuance::SIGNATURE,
        IssuanceClosed::SIGNATURE,
        AlreadySold::SIGNATURE,
        SoldOut::SIGNATURE,
        BuyingWindowClosed::SIGNATURE,
        ExerciseWindowNotOpen::SIGNATURE,
        ExerciseWindowClosed::SIGNATURE,
        ExerciseWindowOpen::SIGNATURE,
        TransferRejected::SIGNATURE,
        InsufficientPosition::SIGNATURE,
        ZeroPremium::SIGNATURE,
        ZeroStrikeIncrement::SIGNATURE,
    ]
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAmount(_) => write!(f, "issuance amount must be non-zero"),
            Self::InvalidExerciseWindow(e) => {
                write!(f, "exercise window [{}, {}] is empty", e.start, e.end)
            }
            Self::InvalidBuyingWindow(e) => write!(
                f,
                "buying window end {} outside exercise window [{}, {}]",
                e.buying_window_end, e.start, e.end
            ),
            Self::InvalidMinBuyingLot(e) => write!(
                f,
                "minimum buying lot {} invalid for amount {}",
                e.min_buying_lot, e.amount
            ),
            Self::ZeroUnits(_) => write!(f, "zero option units requested"),
            Self::BelowMinimumLot(e) => write!(
                f,
                "{} units is below the minimum buying lot {}",
                e.requested, e.min_buying_lot
            ),
            Self::ExactFillUnavailable(e) => write!(
                f,
                "exact fill of {} units unavailable, {} fillable",
                e.requested, e.fillable
            ),
            Self::InvalidRecipient(_) => write!(f, "transfer to the zero address"),
            Self::ArithmeticOverflow(_) => write!(f, "settlement arithmetic overflow"),
            Self::LengthMismatch(e) => {
                write!(f, "{} ids but {} amounts", e.ids, e.amounts)
            }
            Self::InvalidOptionType(e) => write!(f, "unknown option type {}", e.value),
            Self::NotWriter(e) => {
                write!(f, "{} is not the writer of issuance {}", e.caller, e.issuance_id)
            }
            Self::BuyerNotAllowed(e) => {
                write!(f, "{} may not buy issuance {}", e.buyer, e.issuance_id)
            }
            Self::NotApproved(e) => {
                write!(f, "{} is not approved for {}", e.operator, e.owner)
            }
            Self::NotRenounceable(e) => {
                write!(f, "positions of issuance {} are not transferable", e.issuance_id)
            }
            Self::UnknownIssuance(e) => write!(f, "issuance {} does not exist", e.issuance_id),
            Self::IssuanceClosed(e) => write!(f, "issuance {} is closed", e.issuance_id),
            Self::AlreadySold(e) => write!(
                f,
                "issuance {} already sold {} units",
                e.issuance_id, e.sold_amount
            ),
            Self::SoldOut(e) => write!(f, "issuance {} is sold out", e.issuance_id),
            Self::BuyingWindowClosed(e) => {
                write!(f, "buying closed at {}, now {}", e.deadline, e.now)
            }
            Self::ExerciseWindowNotOpen(e) => {
                write!(f, "exercise opens at {}, now {}", e.start, e.now)
            }
            Self::ExerciseWindowClosed(e) => {
                write!(f, "exercise closed at {}, now {}", e.end, e.now)
            }
            Self::ExerciseWindowOpen(e) => {
                write!(f, "exercise window open until {}, now {}", e.end, e.now)
            }
            Self::TransferRejected(e) => write!(
                f,
                "transfer of {} {} from {} to {} rejected",
                e.amount, e.asset, e.from, e.to
            ),
            Self::InsufficientPosition(e) => write!(
                f,
                "{} holds {} units, {} requested",
                e.holder, e.balance, e.requested
            ),
            Self::ZeroPremium(e) => write!(f, "premium for {} units rounds to zero", e.units),
            Self::ZeroStrikeIncrement(e) => {
                write!(f, "exercising {} units moves no strike asset", e.units)
            }
        }
    }
}

impl core::error::Error for OptionsError {}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};

    use super::*;

    #[test]
    fn test_kind_covers_taxonomy() {
        let id = U256::from(3);
        assert_eq!(
            OptionsError::ZeroAmount(ZeroAmount {}).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            OptionsError::NotWriter(NotWriter {
                issuance_id: id,
                caller: Address::ZERO,
            })
            .kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            OptionsError::IssuanceClosed(IssuanceClosed { issuance_id: id }).kind(),
            ErrorKind::State
        );
        assert_eq!(
            OptionsError::ExerciseWindowClosed(ExerciseWindowClosed { end: 10, now: 11 }).kind(),
            ErrorKind::TimeWindow
        );
        assert_eq!(
            OptionsError::TransferRejected(TransferRejected {
                asset: Address::ZERO,
                from: Address::ZERO,
                to: Address::ZERO,
                amount: id,
            })
            .kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            OptionsError::ZeroPremium(ZeroPremium { units: U256::from(9) }).kind(),
            ErrorKind::RoundingStalemate
        );
    }

    #[test]
    fn test_revert_data_starts_with_selector() {
        let err = OptionsError::SoldOut(SoldOut {
            issuance_id: U256::from(7),
        });
        let data = err.revert_data();

        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], SoldOut::SELECTOR.as_slice());
        assert_eq!(data[35], 7);
    }

    #[test]
    fn test_display_mentions_values() {
        let err = OptionsError::ZeroStrikeIncrement(ZeroStrikeIncrement {
            units: U256::from(1),
        });
        assert_eq!(err.to_string(), "exercising 1 units moves no strike asset");
    }

    #[test]
    fn test_signatures_listed() {
        let all = signatures();
        assert_eq!(all.len(), 27);
        assert!(all.contains(&"SoldOut(uint256)"));
        assert!(all.contains(&"ExerciseWindowClosed(uint64,uint64)"));
    }
}
