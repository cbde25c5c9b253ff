//! Issuance records and their lifecycle.
//!
//! Closed issuances stay in the registry as tombstones tagged with how they
//! closed; nothing is inferred from a zeroed writer.

use alloc::collections::{BTreeMap, BTreeSet};
use alloy_primitives::{Address, U256};

use crate::error::{IssuanceClosed, NotWriter, OptionsError, UnknownIssuance};
use crate::terms::IssuanceTerms;
use crate::OptionType;

/// How an issuance left the `Active` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// Writer withdrew the issuance before anything was sold.
    Canceled,
    /// Writer reclaimed the remaining escrow after the exercise window.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceState {
    Active,
    Closed(Closure),
}

/// One option contract instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuance {
    pub writer: Address,
    pub terms: IssuanceTerms,
    /// Cumulative option units sold. Never exceeds `terms.amount`.
    pub sold_amount: U256,
    /// Cumulative option units exercised. Never exceeds `sold_amount`.
    pub exercised_amount: U256,
    /// Strike asset moved so far by exercises; always equals the
    /// proportional share of `exercised_amount`, rounded up for a call and
    /// down for a put.
    pub settled_exercise_cost: U256,
    pub state: IssuanceState,
    allowed_buyers: BTreeSet<Address>,
}

impl Issuance {
    #[must_use]
    pub fn new(writer: Address, terms: IssuanceTerms, allowed_buyers: BTreeSet<Address>) -> Self {
        Self {
            writer,
            terms,
            sold_amount: U256::ZERO,
            exercised_amount: U256::ZERO,
            settled_exercise_cost: U256::ZERO,
            state: IssuanceState::Active,
            allowed_buyers,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, IssuanceState::Active)
    }

    /// Option units still available to buyers.
    #[must_use]
    pub fn remaining_sellable(&self) -> U256 {
        self.terms.amount.saturating_sub(self.sold_amount)
    }

    /// Escrow still held for this issuance.
    ///
    /// A call releases underlying unit for unit as it is exercised; a put
    /// releases the strike already paid out to exercisers.
    #[must_use]
    pub fn remaining_escrow(&self) -> U256 {
        if !self.is_active() {
            return U256::ZERO;
        }
        match self.terms.option_type {
            OptionType::Call => self.terms.amount.saturating_sub(self.exercised_amount),
            OptionType::Put => self
                .terms
                .strike
                .saturating_sub(self.settled_exercise_cost),
        }
    }

    /// Whether `buyer` may purchase. An empty allow-list admits everyone.
    #[must_use]
    pub fn admits(&self, buyer: Address) -> bool {
        self.allowed_buyers.is_empty() || self.allowed_buyers.contains(&buyer)
    }

    #[must_use]
    pub const fn allowed_buyers(&self) -> &BTreeSet<Address> {
        &self.allowed_buyers
    }

    pub fn set_allowed_buyers(&mut self, buyers: BTreeSet<Address>) {
        self.allowed_buyers = buyers;
    }

    pub(crate) fn require_writer(&self, id: U256, caller: Address) -> Result<(), OptionsError> {
        if self.writer == caller {
            Ok(())
        } else {
            Err(OptionsError::NotWriter(NotWriter {
                issuance_id: id,
                caller,
            }))
        }
    }

    pub(crate) fn close(&mut self, closure: Closure) {
        self.state = IssuanceState::Closed(closure);
        self.allowed_buyers.clear();
    }
}

/// Storage behind the issuance registry.
///
/// Records are handed out by value and written back whole, so a backend
/// can live in contract storage as easily as in memory.
pub trait IssuanceStore {
    /// Number of issuances created so far; also the next id to be assigned.
    fn counter(&self) -> U256;

    /// Issuance stored under `id`, in any state.
    fn load(&self, id: U256) -> Option<Issuance>;

    /// Stores a new issuance under the next id and returns that id.
    fn insert(&mut self, issuance: Issuance) -> U256;

    /// Overwrites the record of an existing issuance.
    fn update(&mut self, id: U256, issuance: Issuance);

    /// Looks up an issuance in any state.
    ///
    /// # Errors
    /// - `UnknownIssuance`: If `id` was never assigned
    fn get(&self, id: U256) -> Result<Issuance, OptionsError> {
        self.load(id)
            .ok_or(OptionsError::UnknownIssuance(UnknownIssuance { issuance_id: id }))
    }

    /// Looks up an issuance that still accepts operations.
    ///
    /// # Errors
    /// - `UnknownIssuance`: If `id` was never assigned
    /// - `IssuanceClosed`: If the issuance was canceled or reclaimed
    fn active(&self, id: U256) -> Result<Issuance, OptionsError> {
        let issuance = self.get(id)?;
        if issuance.is_active() {
            Ok(issuance)
        } else {
            Err(OptionsError::IssuanceClosed(IssuanceClosed { issuance_id: id }))
        }
    }
}

impl<T: IssuanceStore + ?Sized> IssuanceStore for &mut T {
    fn counter(&self) -> U256 {
        (**self).counter()
    }

    fn load(&self, id: U256) -> Option<Issuance> {
        (**self).load(id)
    }

    fn insert(&mut self, issuance: Issuance) -> U256 {
        (**self).insert(issuance)
    }

    fn update(&mut self, id: U256, issuance: Issuance) {
        (**self).update(id, issuance);
    }
}

/// All issuances ever created, keyed by id.
#[derive(Debug, Default)]
pub struct IssuanceRegistry {
    next_id: U256,
    issuances: BTreeMap<U256, Issuance>,
}

impl IssuanceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&U256, &Issuance)> {
        self.issuances.iter()
    }
}

impl IssuanceStore for IssuanceRegistry {
    fn counter(&self) -> U256 {
        self.next_id
    }

    fn load(&self, id: U256) -> Option<Issuance> {
        self.issuances.get(&id).cloned()
    }

    fn insert(&mut self, issuance: Issuance) -> U256 {
        let id = self.next_id;
        self.issuances.insert(id, issuance);
        self.next_id = id + U256::from(1);
        id
    }

    fn update(&mut self, id: U256, issuance: Issuance) {
        self.issuances.insert(id, issuance);
    }
}
