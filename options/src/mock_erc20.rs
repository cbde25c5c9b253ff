use alloc::collections::{BTreeMap, BTreeSet};
use alloy_primitives::{Address, U256};

use crate::port::{AssetTransfer, TransferLeg};

#[derive(Debug, Default, Clone)]
pub struct MockERC20 {
    balances: BTreeMap<Address, U256>,
    allowances: BTreeMap<Address, BTreeMap<Address, U256>>,
}

impl MockERC20 {
    pub fn mint(&mut self, to: Address, amount: U256) {
        let current_balance = self.balance_of(to);
        self.balances.insert(to, current_balance + amount);
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> bool {
        let sender_balance = self.balance_of(from);

        if sender_balance < amount {
            return false;
        }

        self.balances.insert(from, sender_balance - amount);
        let recipient_balance = self.balance_of(to);
        self.balances.insert(to, recipient_balance + amount);
        true
    }

    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> bool {
        let allowance = self.allowance(from, spender);

        if allowance < amount {
            return false;
        }

        if !self.transfer(from, to, amount) {
            return false;
        }

        self.allowances
            .entry(from)
            .or_default()
            .insert(spender, allowance - amount);

        true
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
    }

    #[must_use]
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&owner)
            .and_then(|m| m.get(&spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    #[must_use]
    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or(U256::ZERO)
    }
}

/// A set of [`MockERC20`] tokens keyed by asset address, moved on behalf of
/// a single custody account.
///
/// Legs leaving custody are plain transfers; every other leg is a
/// `transfer_from` with custody as spender, so holders must approve custody
/// first, as they would approve the contract on chain.
#[derive(Debug, Clone)]
pub struct MockAssets {
    custody: Address,
    tokens: BTreeMap<Address, MockERC20>,
    frozen: BTreeSet<Address>,
}

impl MockAssets {
    #[must_use]
    pub const fn new(custody: Address) -> Self {
        Self {
            custody,
            tokens: BTreeMap::new(),
            frozen: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn custody(&self) -> Address {
        self.custody
    }

    pub fn mint(&mut self, asset: Address, to: Address, amount: U256) {
        self.tokens.entry(asset).or_default().mint(to, amount);
    }

    /// `owner` authorizes custody to pull up to `amount` of `asset`.
    pub fn approve(&mut self, asset: Address, owner: Address, amount: U256) {
        let custody = self.custody;
        self.tokens
            .entry(asset)
            .or_default()
            .approve(owner, custody, amount);
    }

    #[must_use]
    pub fn allowance(&self, asset: Address, owner: Address) -> U256 {
        self.tokens
            .get(&asset)
            .map_or(U256::ZERO, |token| token.allowance(owner, self.custody))
    }

    #[must_use]
    pub fn balance_of(&self, asset: Address, account: Address) -> U256 {
        self.tokens
            .get(&asset)
            .map_or(U256::ZERO, |token| token.balance_of(account))
    }

    /// Makes every transfer of `asset` fail, like a paused token.
    pub fn freeze(&mut self, asset: Address) {
        self.frozen.insert(asset);
    }

    pub fn unfreeze(&mut self, asset: Address) {
        self.frozen.remove(&asset);
    }

    fn apply(&mut self, leg: &TransferLeg) -> bool {
        if self.frozen.contains(&leg.asset) {
            return false;
        }

        let custody = self.custody;
        let token = self.tokens.entry(leg.asset).or_default();
        if leg.from == custody {
            token.transfer(leg.from, leg.to, leg.amount)
        } else {
            token.transfer_from(custody, leg.from, leg.to, leg.amount)
        }
    }
}

impl AssetTransfer for MockAssets {
    fn transfer_all(&mut self, legs: &[TransferLeg]) -> Result<(), TransferLeg> {
        let snapshot = self.tokens.clone();

        for leg in legs {
            if !self.apply(leg) {
                self.tokens = snapshot;
                return Err(*leg);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTODY: Address = Address::new([0xC0; 20]);
    const TOKEN: Address = Address::new([0x11; 20]);
    const ALICE: Address = Address::new([0xA1; 20]);
    const BOB: Address = Address::new([0xB0; 20]);

    #[test]
    fn test_transfer_from_requires_allowance() {
        let mut assets = MockAssets::new(CUSTODY);
        assets.mint(TOKEN, ALICE, U256::from(100));

        let denied = assets.transfer(TOKEN, ALICE, BOB, U256::from(10));
        assert!(denied.is_err());

        assets.approve(TOKEN, ALICE, U256::from(10));
        assets.transfer(TOKEN, ALICE, BOB, U256::from(10)).unwrap();

        assert_eq!(assets.balance_of(TOKEN, ALICE), U256::from(90));
        assert_eq!(assets.balance_of(TOKEN, BOB), U256::from(10));
        assert_eq!(assets.allowance(TOKEN, ALICE), U256::ZERO);
    }

    #[test]
    fn test_custody_moves_without_allowance() {
        let mut assets = MockAssets::new(CUSTODY);
        assets.mint(TOKEN, CUSTODY, U256::from(50));

        assets.transfer(TOKEN, CUSTODY, BOB, U256::from(50)).unwrap();
        assert_eq!(assets.balance_of(TOKEN, BOB), U256::from(50));
    }

    #[test]
    fn test_transfer_all_is_atomic() {
        let mut assets = MockAssets::new(CUSTODY);
        assets.mint(TOKEN, CUSTODY, U256::from(50));
        assets.mint(TOKEN, ALICE, U256::from(5));
        assets.approve(TOKEN, ALICE, U256::from(5));

        let legs = [
            TransferLeg::new(TOKEN, CUSTODY, BOB, U256::from(50)),
            TransferLeg::new(TOKEN, ALICE, BOB, U256::from(6)),
        ];
        let rejected = assets.transfer_all(&legs).unwrap_err();

        assert_eq!(rejected, legs[1]);
        assert_eq!(assets.balance_of(TOKEN, CUSTODY), U256::from(50));
        assert_eq!(assets.balance_of(TOKEN, BOB), U256::ZERO);
        assert_eq!(assets.allowance(TOKEN, ALICE), U256::from(5));
    }

    #[test]
    fn test_frozen_asset_rejects() {
        let mut assets = MockAssets::new(CUSTODY);
        assets.mint(TOKEN, CUSTODY, U256::from(1));
        assets.freeze(TOKEN);

        assert!(assets.transfer(TOKEN, CUSTODY, BOB, U256::from(1)).is_err());

        assets.unfreeze(TOKEN);
        assert!(assets.transfer(TOKEN, CUSTODY, BOB, U256::from(1)).is_ok());
    }
}
