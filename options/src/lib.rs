//! Bilateral vanilla option settlement.
//!
//! A writer escrows collateral and publishes an issuance; buyers pay premium
//! for option units; holders exercise within a time window against that
//! escrow. Calls escrow the underlying, puts escrow the strike notional.
//!
//! The engine is host-agnostic: asset movement and time come in through the
//! [`AssetTransfer`] and [`Clock`] ports, errors encode as Solidity revert
//! data and events as EVM logs. [`Options`] is the Stylus contract that
//! backs those ports with contract storage and ERC-20 calls.
#![cfg_attr(not(any(test, feature = "export-abi")), no_main)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]
extern crate alloc;

pub mod contract;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod math;
pub mod mock_erc20;
pub mod port;
pub mod registry;
pub mod terms;

pub use contract::{BlockClock, DeferredTransfers, IssuanceParams, Options};
pub use engine::{ExerciseReceipt, Purchase, VanillaOption};
pub use error::{ErrorKind, OptionsError};
pub use events::OptionsEvent;
pub use ledger::{MemoryLedger, PositionLedger};
pub use mock_erc20::{MockAssets, MockERC20};
pub use port::{AssetTransfer, Clock, ManualClock, TransferLeg};
#[cfg(feature = "std")]
pub use port::SystemClock;
pub use registry::{Closure, Issuance, IssuanceRegistry, IssuanceState, IssuanceStore};
pub use terms::IssuanceTerms;

/// Represents the type of option contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionType {
    /// Call option: Right to BUY underlying at strike price.
    #[default]
    Call,
    /// Put option: Right to SELL underlying at strike price.
    Put,
}

impl OptionType {
    /// Converts option type to u8 for encoding.
    ///
    /// # Returns
    /// - `0` for Call
    /// - `1` for Put
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Call => 0,
            Self::Put => 1,
        }
    }

    /// Inverse of [`Self::to_u8`]. `None` for any other value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Call),
            1 => Some(Self::Put),
            _ => None,
        }
    }
}

/// Prints every event and custom error the engine can produce, with the
/// error selectors, for wiring into an ABI-aware frontend.
#[cfg(feature = "export-abi")]
pub fn print_abi() {
    use alloy_primitives::keccak256;

    println!("// events");
    for signature in events::signatures() {
        println!("event {signature};");
    }

    println!("// errors");
    for signature in error::signatures() {
        let hash = keccak256(signature.as_bytes());
        println!(
            "error {signature}; // 0x{}",
            hash[..4]
                .iter()
                .map(|byte| format!("{byte:02x}"))
                .collect::<String>()
        );
    }
}
