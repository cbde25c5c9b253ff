//! Per-issuance, per-holder option unit balances.
//!
//! The ledger knows nothing about settlement. Transferability is decided by
//! the caller passing the issuance's `renounceable` flag, which keeps the
//! ledger replaceable without touching the state machine.

use alloc::collections::{BTreeMap, BTreeSet};
use alloy_primitives::{Address, U256};

use crate::error::{InsufficientPosition, NotRenounceable, OptionsError};

/// Balance store behind the position ownership interface.
pub trait PositionLedger {
    /// Units of issuance `id` held by `holder`.
    fn balance_of(&self, id: U256, holder: Address) -> U256;

    /// Sum of all holders' balances for issuance `id`.
    fn outstanding(&self, id: U256) -> U256;

    fn credit(&mut self, id: U256, holder: Address, units: U256);

    /// # Errors
    /// - `InsufficientPosition`: If `holder` has fewer than `units`
    fn debit(&mut self, id: U256, holder: Address, units: U256) -> Result<(), OptionsError>;

    /// Moves units between holders outside of buy/exercise.
    ///
    /// # Errors
    /// - `NotRenounceable`: If `renounceable` is false
    /// - `InsufficientPosition`: If `from` has fewer than `units`
    fn try_transfer(
        &mut self,
        id: U256,
        from: Address,
        to: Address,
        units: U256,
        renounceable: bool,
    ) -> Result<(), OptionsError>;

    fn set_approval_for_all(&mut self, owner: Address, operator: Address, approved: bool);

    fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool;
}

impl<T: PositionLedger + ?Sized> PositionLedger for &mut T {
    fn balance_of(&self, id: U256, holder: Address) -> U256 {
        (**self).balance_of(id, holder)
    }

    fn outstanding(&self, id: U256) -> U256 {
        (**self).outstanding(id)
    }

    fn credit(&mut self, id: U256, holder: Address, units: U256) {
        (**self).credit(id, holder, units);
    }

    fn debit(&mut self, id: U256, holder: Address, units: U256) -> Result<(), OptionsError> {
        (**self).debit(id, holder, units)
    }

    fn try_transfer(
        &mut self,
        id: U256,
        from: Address,
        to: Address,
        units: U256,
        renounceable: bool,
    ) -> Result<(), OptionsError> {
        (**self).try_transfer(id, from, to, units, renounceable)
    }

    fn set_approval_for_all(&mut self, owner: Address, operator: Address, approved: bool) {
        (**self).set_approval_for_all(owner, operator, approved);
    }

    fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        (**self).is_approved_for_all(owner, operator)
    }
}

/// [`PositionLedger`] kept in ordered maps.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    balances: BTreeMap<(U256, Address), U256>,
    outstanding: BTreeMap<U256, U256>,
    operators: BTreeSet<(Address, Address)>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Holders with a non-zero balance of issuance `id`.
    pub fn holders(&self, id: U256) -> impl Iterator<Item = (Address, U256)> + '_ {
        self.balances
            .range((id, Address::ZERO)..=(id, Address::repeat_byte(0xFF)))
            .map(|(&(_, holder), &units)| (holder, units))
    }

    fn set_balance(&mut self, id: U256, holder: Address, units: U256) {
        // zero cells are dropped so positions disappear with their balance
        if units.is_zero() {
            self.balances.remove(&(id, holder));
        } else {
            self.balances.insert((id, holder), units);
        }
    }
}

impl PositionLedger for MemoryLedger {
    fn balance_of(&self, id: U256, holder: Address) -> U256 {
        self.balances
            .get(&(id, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn outstanding(&self, id: U256) -> U256 {
        self.outstanding.get(&id).copied().unwrap_or(U256::ZERO)
    }

    fn credit(&mut self, id: U256, holder: Address, units: U256) {
        let balance = self.balance_of(id, holder);
        self.set_balance(id, holder, balance + units);
        *self.outstanding.entry(id).or_default() += units;
    }

    fn debit(&mut self, id: U256, holder: Address, units: U256) -> Result<(), OptionsError> {
        let balance = self.balance_of(id, holder);
        if balance < units {
            return Err(OptionsError::InsufficientPosition(InsufficientPosition {
                holder,
                balance,
                requested: units,
            }));
        }

        self.set_balance(id, holder, balance - units);
        if let Some(total) = self.outstanding.get_mut(&id) {
            *total -= units;
        }
        Ok(())
    }

    fn try_transfer(
        &mut self,
        id: U256,
        from: Address,
        to: Address,
        units: U256,
        renounceable: bool,
    ) -> Result<(), OptionsError> {
        if !renounceable {
            return Err(OptionsError::NotRenounceable(NotRenounceable {
                issuance_id: id,
            }));
        }

        let from_balance = self.balance_of(id, from);
        if from_balance < units {
            return Err(OptionsError::InsufficientPosition(InsufficientPosition {
                holder: from,
                balance: from_balance,
                requested: units,
            }));
        }

        if from != to {
            self.set_balance(id, from, from_balance - units);
            let to_balance = self.balance_of(id, to);
            self.set_balance(id, to, to_balance + units);
        }
        Ok(())
    }

    fn set_approval_for_all(&mut self, owner: Address, operator: Address, approved: bool) {
        if approved {
            self.operators.insert((owner, operator));
        } else {
            self.operators.remove(&(owner, operator));
        }
    }

    fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.operators.contains(&(owner, operator))
    }
}
