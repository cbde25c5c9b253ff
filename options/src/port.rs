//! Collaborators supplied by the execution environment.

use alloc::rc::Rc;
use alloy_primitives::{Address, U256};
use core::cell::Cell;

/// One movement of a fungible asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLeg {
    pub asset: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

impl TransferLeg {
    #[must_use]
    pub const fn new(asset: Address, from: Address, to: Address, amount: U256) -> Self {
        Self {
            asset,
            from,
            to,
            amount,
        }
    }
}

/// Moves fungible assets between holders on the engine's behalf.
///
/// Holders are expected to have authorized the engine's custody account
/// beforehand; checking that authorization is the implementor's job.
pub trait AssetTransfer {
    /// Applies every leg or none of them. On refusal nothing has moved and
    /// the first leg that could not be applied is returned.
    ///
    /// # Errors
    /// The rejected leg.
    fn transfer_all(&mut self, legs: &[TransferLeg]) -> Result<(), TransferLeg>;

    /// Single-leg form of [`Self::transfer_all`].
    ///
    /// # Errors
    /// The rejected leg.
    fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TransferLeg> {
        self.transfer_all(&[TransferLeg::new(asset, from, to, amount)])
    }
}

/// Read-only source of the current time, in seconds.
pub trait Clock {
    fn now(&self) -> u64;
}

/// Clock advanced by hand. Clones share the same time, so a test can keep a
/// handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.set(now);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.set(self.now.get().saturating_add(seconds));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.get()
    }
}

/// Wall-clock time since the Unix epoch.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}
