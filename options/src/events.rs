//! Observer events.
//!
//! Emitted only after an operation commits; the engine never reads them
//! back. `to_log_data` yields the EVM log encoding for indexers.

use alloc::vec::Vec;
use alloy_primitives::LogData;
use alloy_sol_types::{sol, SolEvent};

sol! {
    /// Emitted when a writer creates an issuance and escrows collateral.
    #[derive(Debug, PartialEq, Eq)]
    event Created(
        uint256 indexed issuance_id,
        address indexed writer,
        uint256 escrowed
    );

    /// Emitted when a buyer purchases option units.
    #[derive(Debug, PartialEq, Eq)]
    event Bought(
        uint256 indexed issuance_id,
        address indexed buyer,
        uint256 amount,
        uint256 premium_paid
    );

    /// Emitted when a holder exercises option units.
    #[derive(Debug, PartialEq, Eq)]
    event Exercised(
        uint256 indexed issuance_id,
        address indexed holder,
        uint256 amount,
        uint256 strike_transferred
    );

    /// Emitted when a writer cancels an unsold issuance.
    #[derive(Debug, PartialEq, Eq)]
    event Canceled(
        uint256 indexed issuance_id,
        address indexed writer,
        uint256 returned
    );

    /// Emitted when a writer reclaims escrow after the exercise window.
    #[derive(Debug, PartialEq, Eq)]
    event Expired(
        uint256 indexed issuance_id,
        address indexed writer,
        uint256 returned
    );

    #[derive(Debug, PartialEq, Eq)]
    event PremiumUpdated(uint256 indexed issuance_id, uint256 premium);

    #[derive(Debug, PartialEq, Eq)]
    event AllowedBuyersUpdated(uint256 indexed issuance_id, address[] allowed_buyers);

    /// Position movement, including mints on buy and burns on exercise.
    #[derive(Debug, PartialEq, Eq)]
    event TransferSingle(
        address indexed operator,
        address indexed from,
        address indexed to,
        uint256 id,
        uint256 value
    );

    #[derive(Debug, PartialEq, Eq)]
    event TransferBatch(
        address indexed operator,
        address indexed from,
        address indexed to,
        uint256[] ids,
        uint256[] values
    );

    #[derive(Debug, PartialEq, Eq)]
    event ApprovalForAll(address indexed account, address indexed operator, bool approved);
}

/// Journal entry recorded by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsEvent {
    Created(Created),
    Bought(Bought),
    Exercised(Exercised),
    Canceled(Canceled),
    Expired(Expired),
    PremiumUpdated(PremiumUpdated),
    AllowedBuyersUpdated(AllowedBuyersUpdated),
    TransferSingle(TransferSingle),
    TransferBatch(TransferBatch),
    ApprovalForAll(ApprovalForAll),
}

impl OptionsEvent {
    /// Topics and ABI-encoded data as an EVM log would carry them.
    #[must_use]
    pub fn to_log_data(&self) -> LogData {
        match self {
            Self::Created(e) => e.encode_log_data(),
            Self::Bought(e) => e.encode_log_data(),
            Self::Exercised(e) => e.encode_log_data(),
            Self::Canceled(e) => e.encode_log_data(),
            Self::Expired(e) => e.encode_log_data(),
            Self::PremiumUpdated(e) => e.encode_log_data(),
            Self::AllowedBuyersUpdated(e) => e.encode_log_data(),
            Self::TransferSingle(e) => e.encode_log_data(),
            Self::TransferBatch(e) => e.encode_log_data(),
            Self::ApprovalForAll(e) => e.encode_log_data(),
        }
    }

    /// Solidity signature of the event, e.g. `Created(uint256,address,uint256)`.
    #[must_use]
    pub const fn signature(&self) -> &'static str {
        match self {
            Self::Created(_) => Created::SIGNATURE,
            Self::Bought(_) => Bought::SIGNATURE,
            Self::Exercised(_) => Exercised::SIGNATURE,
            Self::Canceled(_) => Canceled::SIGNATURE,
            Self::Expired(_) => Expired::SIGNATURE,
            Self::PremiumUpdated(_) => PremiumUpdated::SIGNATURE,
            Self::AllowedBuyersUpdated(_) => AllowedBuyersUpdated::SIGNATURE,
            Self::TransferSingle(_) => TransferSingle::SIGNATURE,
            Self::TransferBatch(_) => TransferBatch::SIGNATURE,
            Self::ApprovalForAll(_) => ApprovalForAll::SIGNATURE,
        }
    }
}

/// Signatures of every event the engine can emit.
#[must_use]
pub fn signatures() -> Vec<&'static str> {
    alloc::vec![
        Created::SIGNATURE,
        Bought::SIGNATURE,
        Exercised::SIGNATURE,
        Canceled::SIGNATURE,
        Expired::SIGNATURE,
        PremiumUpdated::SIGNATURE,
        AllowedBuyersUpdated::SIGNATURE,
        TransferSingle::SIGNATURE,
        TransferBatch::SIGNATURE,
        ApprovalForAll::SIGNATURE,
    ]
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256, U256};

    use super::*;

    #[test]
    fn test_created_log_topics() {
        let writer = Address::from([0xAA; 20]);
        let event = OptionsEvent::Created(Created {
            issuance_id: U256::from(4),
            writer,
            escrowed: U256::from(1_000_000),
        });

        let log = event.to_log_data();

        assert_eq!(log.topics().len(), 3);
        assert_eq!(log.topics()[0], Created::SIGNATURE_HASH);
        assert_eq!(log.topics()[1], B256::from(U256::from(4).to_be_bytes::<32>()));
        assert_eq!(log.topics()[2], writer.into_word());
        assert_eq!(log.data.len(), 32);
    }

    #[test]
    fn test_signature_strings() {
        let event = OptionsEvent::Exercised(Exercised {
            issuance_id: U256::ZERO,
            holder: Address::ZERO,
            amount: U256::from(1),
            strike_transferred: U256::from(1),
        });
        assert_eq!(
            event.signature(),
            "Exercised(uint256,address,uint256,uint256)"
        );
        assert_eq!(signatures().len(), 10);
    }
}
