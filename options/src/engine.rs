//! Issuance state machine.
//!
//! Every operation validates all preconditions and computes every amount
//! before the first asset moves, hands the whole settlement to the
//! [`AssetTransfer`] port as one atomic batch, and only then touches the
//! registry, the ledger and the event journal. A failed operation therefore
//! leaves no trace.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use alloy_primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::error::{
    AlreadySold, BelowMinimumLot, BuyerNotAllowed, BuyingWindowClosed, ExactFillUnavailable,
    ExerciseWindowClosed, ExerciseWindowNotOpen, ExerciseWindowOpen, InsufficientPosition,
    InvalidRecipient, LengthMismatch, NotApproved, NotRenounceable, OptionsError, SoldOut,
    TransferRejected, ZeroUnits,
};
use crate::events::{
    AllowedBuyersUpdated, ApprovalForAll, Bought, Canceled, Created, Exercised, Expired,
    OptionsEvent, PremiumUpdated, TransferBatch, TransferSingle,
};
use crate::ledger::{MemoryLedger, PositionLedger};
use crate::math::{self, Rounding};
use crate::port::{AssetTransfer, Clock, TransferLeg};
use crate::registry::{Closure, Issuance, IssuanceRegistry, IssuanceStore};
use crate::terms::{self, IssuanceTerms};
use crate::OptionType;

/// Result of a successful [`VanillaOption::buy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purchase {
    /// Option units credited to the buyer.
    pub units: U256,
    /// Premium moved from the buyer to the writer.
    pub premium_paid: U256,
}

/// Result of a successful [`VanillaOption::exercise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExerciseReceipt {
    /// Option units burned from the exerciser's position.
    pub units: U256,
    /// Strike asset paid to the writer (call) or out of escrow (put).
    pub strike_transferred: U256,
    /// Underlying paid out of escrow (call) or delivered to the writer (put).
    pub underlying_transferred: U256,
}

/// Vanilla option issuance engine.
///
/// Owns the issuance registry and the position ledger; moves assets only
/// through `A`, reads time only through `C`. Operations take the calling
/// identity explicitly, the way a contract reads its message sender.
#[derive(Debug)]
pub struct VanillaOption<A, C, L = MemoryLedger, R = IssuanceRegistry> {
    custody: Address,
    assets: A,
    clock: C,
    ledger: L,
    registry: R,
    events: Vec<OptionsEvent>,
}

impl<A: AssetTransfer, C: Clock> VanillaOption<A, C> {
    /// Engine over an in-memory registry and position ledger.
    ///
    /// `custody` is the account holding escrow, the one holders authorize
    /// on the asset side.
    pub fn new(custody: Address, assets: A, clock: C) -> Self {
        Self::with_storage(
            custody,
            assets,
            clock,
            MemoryLedger::new(),
            IssuanceRegistry::new(),
        )
    }
}

impl<A, C, L, R> VanillaOption<A, C, L, R>
where
    A: AssetTransfer,
    C: Clock,
    L: PositionLedger,
    R: IssuanceStore,
{
    /// Engine over caller-supplied position and issuance storage, such as
    /// a contract's persistent state.
    pub fn with_storage(custody: Address, assets: A, clock: C, ledger: L, registry: R) -> Self {
        Self {
            custody,
            assets,
            clock,
            ledger,
            registry,
            events: Vec::new(),
        }
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Creates an issuance and escrows its collateral from the writer.
    ///
    /// A call locks the full `amount` of underlying, a put the full
    /// `strike` notional of the strike asset.
    ///
    /// # Returns
    /// Id of the new issuance, counting up from zero.
    ///
    /// # Errors
    /// - Any term validation error (see [`IssuanceTerms::validate`])
    /// - `TransferRejected`: If the escrow cannot be pulled from the writer
    pub fn create(
        &mut self,
        caller: Address,
        terms: IssuanceTerms,
        allowed_buyers: &[Address],
    ) -> Result<U256, OptionsError> {
        self.execute_create(caller, terms, allowed_buyers)
            .inspect_err(|err| debug!(writer = %caller, error = %err, "create rejected"))
    }

    fn execute_create(
        &mut self,
        caller: Address,
        terms: IssuanceTerms,
        allowed_buyers: &[Address],
    ) -> Result<U256, OptionsError> {
        terms.validate()?;

        let escrowed = terms.escrow_commitment();
        let leg = TransferLeg::new(terms.escrow_asset(), caller, self.custody, escrowed);
        self.settle(&[leg])?;

        let buyers: BTreeSet<Address> = allowed_buyers.iter().copied().collect();
        let id = self.registry.insert(Issuance::new(caller, terms, buyers));

        info!(issuance_id = %id, writer = %caller, escrowed = %escrowed, "issuance created");
        self.events.push(OptionsEvent::Created(Created {
            issuance_id: id,
            writer: caller,
            escrowed,
        }));

        Ok(id)
    }

    /// Buys option units, paying premium to the writer.
    ///
    /// The request is clamped to what is left to sell and floored to a whole
    /// number of minimum lots. With `require_exact_fill` any such adjustment
    /// fails the purchase instead.
    ///
    /// # Errors
    /// - `UnknownIssuance` / `IssuanceClosed`
    /// - `BuyingWindowClosed`: If past the buying deadline
    /// - `BuyerNotAllowed`: If the allow-list excludes the caller
    /// - `ZeroUnits`, `SoldOut`, `ExactFillUnavailable`, `BelowMinimumLot`
    /// - `ZeroPremium`: If the premium truncates to zero
    /// - `TransferRejected`: If the premium cannot be pulled from the buyer
    pub fn buy(
        &mut self,
        caller: Address,
        id: U256,
        requested: U256,
        require_exact_fill: bool,
    ) -> Result<Purchase, OptionsError> {
        self.execute_buy(caller, id, requested, require_exact_fill)
            .inspect_err(|err| {
                debug!(issuance_id = %id, buyer = %caller, requested = %requested, error = %err, "buy rejected");
            })
    }

    fn execute_buy(
        &mut self,
        caller: Address,
        id: U256,
        requested: U256,
        require_exact_fill: bool,
    ) -> Result<Purchase, OptionsError> {
        let now = self.clock.now();
        let mut issuance = self.registry.active(id)?;
        let terms = &issuance.terms;

        let deadline = terms.buying_deadline();
        if now > deadline {
            return Err(OptionsError::BuyingWindowClosed(BuyingWindowClosed {
                deadline,
                now,
            }));
        }

        if !issuance.admits(caller) {
            return Err(OptionsError::BuyerNotAllowed(BuyerNotAllowed {
                issuance_id: id,
                buyer: caller,
            }));
        }

        if requested.is_zero() {
            return Err(OptionsError::ZeroUnits(ZeroUnits {}));
        }

        let remaining = issuance.remaining_sellable();
        if remaining.is_zero() {
            return Err(OptionsError::SoldOut(SoldOut { issuance_id: id }));
        }

        let units = math::floor_to_lot(requested.min(remaining), terms.min_buying_lot);
        if require_exact_fill && units != requested {
            return Err(OptionsError::ExactFillUnavailable(ExactFillUnavailable {
                requested,
                fillable: units,
            }));
        }
        if units.is_zero() {
            return Err(OptionsError::BelowMinimumLot(BelowMinimumLot {
                requested,
                min_buying_lot: terms.min_buying_lot,
            }));
        }

        let premium_paid = math::premium_owed(units, terms.premium, terms.amount)?;
        let leg = TransferLeg::new(terms.premium_asset, caller, issuance.writer, premium_paid);

        self.settle(&[leg])?;

        issuance.sold_amount += units;
        self.registry.update(id, issuance);
        self.ledger.credit(id, caller, units);

        info!(issuance_id = %id, buyer = %caller, units = %units, premium = %premium_paid, "option units bought");
        self.events.push(OptionsEvent::Bought(Bought {
            issuance_id: id,
            buyer: caller,
            amount: units,
            premium_paid,
        }));
        self.events.push(OptionsEvent::TransferSingle(TransferSingle {
            operator: caller,
            from: Address::ZERO,
            to: caller,
            id,
            value: units,
        }));

        Ok(Purchase {
            units,
            premium_paid,
        })
    }

    /// Exercises `units` of the caller's own position.
    ///
    /// The strike asset owed is the proportional share of the new cumulative
    /// exercised amount minus what earlier exercises already moved. A call
    /// rounds that share up, since the writer receives it; a put rounds it
    /// down, since escrow pays it out.
    ///
    /// - Call: exerciser pays strike to the writer, receives underlying from escrow.
    /// - Put: exerciser delivers underlying to the writer, receives strike from escrow.
    ///
    /// # Errors
    /// - `UnknownIssuance` / `IssuanceClosed`
    /// - `ZeroUnits`
    /// - `ExerciseWindowNotOpen` / `ExerciseWindowClosed`
    /// - `InsufficientPosition`: If the caller holds fewer than `units`
    /// - `ZeroStrikeIncrement`: If no strike asset would move
    /// - `TransferRejected`: If either settlement leg is refused
    pub fn exercise(
        &mut self,
        caller: Address,
        id: U256,
        units: U256,
    ) -> Result<ExerciseReceipt, OptionsError> {
        self.execute_exercise(caller, id, units).inspect_err(|err| {
            debug!(issuance_id = %id, holder = %caller, units = %units, error = %err, "exercise rejected");
        })
    }

    fn execute_exercise(
        &mut self,
        caller: Address,
        id: U256,
        units: U256,
    ) -> Result<ExerciseReceipt, OptionsError> {
        let now = self.clock.now();
        let mut issuance = self.registry.active(id)?;
        let terms = &issuance.terms;

        if units.is_zero() {
            return Err(OptionsError::ZeroUnits(ZeroUnits {}));
        }

        if now < terms.exercise_window_start {
            return Err(OptionsError::ExerciseWindowNotOpen(ExerciseWindowNotOpen {
                start: terms.exercise_window_start,
                now,
            }));
        }
        if now > terms.exercise_window_end {
            return Err(OptionsError::ExerciseWindowClosed(ExerciseWindowClosed {
                end: terms.exercise_window_end,
                now,
            }));
        }

        let balance = self.ledger.balance_of(id, caller);
        if balance < units {
            return Err(OptionsError::InsufficientPosition(InsufficientPosition {
                holder: caller,
                balance,
                requested: units,
            }));
        }

        let rounding = match terms.option_type {
            OptionType::Call => Rounding::Up,
            OptionType::Put => Rounding::Down,
        };
        let (settled_total, strike_transferred) = math::strike_increment(
            issuance.exercised_amount,
            units,
            issuance.settled_exercise_cost,
            terms.strike,
            terms.amount,
            rounding,
        )?;

        let writer = issuance.writer;
        let legs = match terms.option_type {
            OptionType::Call => [
                TransferLeg::new(terms.strike_asset, caller, writer, strike_transferred),
                TransferLeg::new(terms.underlying, self.custody, caller, units),
            ],
            OptionType::Put => [
                TransferLeg::new(terms.underlying, caller, writer, units),
                TransferLeg::new(terms.strike_asset, self.custody, caller, strike_transferred),
            ],
        };

        self.settle(&legs)?;

        self.ledger.debit(id, caller, units)?;
        issuance.exercised_amount += units;
        issuance.settled_exercise_cost = settled_total;
        self.registry.update(id, issuance);

        info!(issuance_id = %id, holder = %caller, units = %units, strike = %strike_transferred, "option units exercised");
        self.events.push(OptionsEvent::Exercised(Exercised {
            issuance_id: id,
            holder: caller,
            amount: units,
            strike_transferred,
        }));
        self.events.push(OptionsEvent::TransferSingle(TransferSingle {
            operator: caller,
            from: caller,
            to: Address::ZERO,
            id,
            value: units,
        }));

        Ok(ExerciseReceipt {
            units,
            strike_transferred,
            underlying_transferred: units,
        })
    }

    /// Withdraws an issuance nobody has bought into, returning the full
    /// escrow to the writer.
    ///
    /// # Returns
    /// Escrow returned.
    ///
    /// # Errors
    /// - `UnknownIssuance` / `IssuanceClosed`
    /// - `NotWriter`
    /// - `AlreadySold`: If any unit was sold
    /// - `TransferRejected`
    pub fn cancel(&mut self, caller: Address, id: U256) -> Result<U256, OptionsError> {
        let mut issuance = self.registry.active(id)?;
        issuance.require_writer(id, caller)?;

        if !issuance.sold_amount.is_zero() {
            return Err(OptionsError::AlreadySold(AlreadySold {
                issuance_id: id,
                sold_amount: issuance.sold_amount,
            }));
        }

        let returned = issuance.remaining_escrow();
        let leg = TransferLeg::new(issuance.terms.escrow_asset(), self.custody, caller, returned);
        self.settle(&[leg])?;

        issuance.close(Closure::Canceled);
        self.registry.update(id, issuance);

        info!(issuance_id = %id, writer = %caller, returned = %returned, "issuance canceled");
        self.events.push(OptionsEvent::Canceled(Canceled {
            issuance_id: id,
            writer: caller,
            returned,
        }));

        Ok(returned)
    }

    /// Returns the unexercised escrow to the writer once the exercise window
    /// has closed and closes the issuance.
    ///
    /// Positions still held become permanently unredeemable.
    ///
    /// # Returns
    /// Escrow returned: `amount - exercised` underlying for a call, the
    /// strike not yet paid out for a put.
    ///
    /// # Errors
    /// - `UnknownIssuance` / `IssuanceClosed`
    /// - `NotWriter`
    /// - `ExerciseWindowOpen`: If the window has not yet ended
    /// - `TransferRejected`
    pub fn retrieve_expired_tokens(
        &mut self,
        caller: Address,
        id: U256,
    ) -> Result<U256, OptionsError> {
        let now = self.clock.now();
        let mut issuance = self.registry.active(id)?;
        issuance.require_writer(id, caller)?;

        let end = issuance.terms.exercise_window_end;
        if now <= end {
            return Err(OptionsError::ExerciseWindowOpen(ExerciseWindowOpen { end, now }));
        }

        let returned = issuance.remaining_escrow();
        let leg = TransferLeg::new(issuance.terms.escrow_asset(), self.custody, caller, returned);
        self.settle(&[leg])?;

        issuance.close(Closure::Expired);
        self.registry.update(id, issuance);

        info!(issuance_id = %id, writer = %caller, returned = %returned, "expired escrow retrieved");
        self.events.push(OptionsEvent::Expired(Expired {
            issuance_id: id,
            writer: caller,
            returned,
        }));

        Ok(returned)
    }

    /// Sets the premium future buys pay. Past purchases are unaffected.
    ///
    /// # Errors
    /// - `UnknownIssuance` / `IssuanceClosed`
    /// - `NotWriter`
    /// - `ArithmeticOverflow`: If `amount * premium` overflows
    pub fn update_premium(
        &mut self,
        caller: Address,
        id: U256,
        premium: U256,
    ) -> Result<(), OptionsError> {
        let mut issuance = self.registry.active(id)?;
        issuance.require_writer(id, caller)?;
        terms::check_ratio(issuance.terms.amount, premium)?;

        issuance.terms.premium = premium;
        self.registry.update(id, issuance);

        info!(issuance_id = %id, premium = %premium, "premium updated");
        self.events.push(OptionsEvent::PremiumUpdated(PremiumUpdated {
            issuance_id: id,
            premium,
        }));
        Ok(())
    }

    /// Replaces the allow-list. An empty list opens buying to everyone.
    ///
    /// # Errors
    /// - `UnknownIssuance` / `IssuanceClosed`
    /// - `NotWriter`
    pub fn update_allowed_buyers(
        &mut self,
        caller: Address,
        id: U256,
        buyers: &[Address],
    ) -> Result<(), OptionsError> {
        let mut issuance = self.registry.active(id)?;
        issuance.require_writer(id, caller)?;

        issuance.set_allowed_buyers(buyers.iter().copied().collect());
        self.registry.update(id, issuance);

        info!(issuance_id = %id, buyers = buyers.len(), "allowed buyers updated");
        self.events.push(OptionsEvent::AllowedBuyersUpdated(AllowedBuyersUpdated {
            issuance_id: id,
            allowed_buyers: buyers.to_vec(),
        }));
        Ok(())
    }

    // ========================================
    // Position ownership
    // ========================================

    #[must_use]
    pub fn balance_of(&self, holder: Address, id: U256) -> U256 {
        self.ledger.balance_of(id, holder)
    }

    /// # Errors
    /// - `LengthMismatch`: If `holders` and `ids` differ in length
    pub fn balance_of_batch(
        &self,
        holders: &[Address],
        ids: &[U256],
    ) -> Result<Vec<U256>, OptionsError> {
        if holders.len() != ids.len() {
            return Err(length_mismatch(holders.len(), ids.len()));
        }
        Ok(holders
            .iter()
            .zip(ids)
            .map(|(&holder, &id)| self.ledger.balance_of(id, holder))
            .collect())
    }

    pub fn set_approval_for_all(&mut self, caller: Address, operator: Address, approved: bool) {
        self.ledger.set_approval_for_all(caller, operator, approved);
        self.events.push(OptionsEvent::ApprovalForAll(ApprovalForAll {
            account: caller,
            operator,
            approved,
        }));
    }

    #[must_use]
    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.ledger.is_approved_for_all(owner, operator)
    }

    /// Moves a position to another holder. Only renounceable issuances allow
    /// this, and only while they are active.
    ///
    /// # Errors
    /// - `NotApproved`: If the caller is neither `from` nor its operator
    /// - `InvalidRecipient`: If `to` is the zero address
    /// - `UnknownIssuance` / `IssuanceClosed`
    /// - `NotRenounceable`
    /// - `InsufficientPosition`
    pub fn safe_transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: U256,
        units: U256,
    ) -> Result<(), OptionsError> {
        self.check_transfer(caller, from, to)?;
        let renounceable = self.registry.active(id)?.terms.renounceable;

        self.ledger.try_transfer(id, from, to, units, renounceable)?;

        self.events.push(OptionsEvent::TransferSingle(TransferSingle {
            operator: caller,
            from,
            to,
            id,
            value: units,
        }));
        Ok(())
    }

    /// All-or-nothing form of [`Self::safe_transfer_from`]. Repeated ids are
    /// checked against their combined amount.
    ///
    /// # Errors
    /// Same as [`Self::safe_transfer_from`], plus `LengthMismatch`.
    pub fn safe_batch_transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        ids: &[U256],
        units: &[U256],
    ) -> Result<(), OptionsError> {
        if ids.len() != units.len() {
            return Err(length_mismatch(ids.len(), units.len()));
        }
        self.check_transfer(caller, from, to)?;

        let mut totals: BTreeMap<U256, U256> = BTreeMap::new();
        for (&id, &amount) in ids.iter().zip(units) {
            let total = totals.entry(id).or_default();
            *total = total.saturating_add(amount);
        }
        for (&id, &total) in &totals {
            if !self.registry.active(id)?.terms.renounceable {
                return Err(OptionsError::NotRenounceable(NotRenounceable {
                    issuance_id: id,
                }));
            }
            let balance = self.ledger.balance_of(id, from);
            if balance < total {
                return Err(OptionsError::InsufficientPosition(InsufficientPosition {
                    holder: from,
                    balance,
                    requested: total,
                }));
            }
        }

        for (&id, &amount) in ids.iter().zip(units) {
            self.ledger.try_transfer(id, from, to, amount, true)?;
        }

        self.events.push(OptionsEvent::TransferBatch(TransferBatch {
            operator: caller,
            from,
            to,
            ids: ids.to_vec(),
            values: units.to_vec(),
        }));
        Ok(())
    }

    fn check_transfer(
        &self,
        caller: Address,
        from: Address,
        to: Address,
    ) -> Result<(), OptionsError> {
        if caller != from && !self.ledger.is_approved_for_all(from, caller) {
            return Err(OptionsError::NotApproved(NotApproved {
                owner: from,
                operator: caller,
            }));
        }
        if to == Address::ZERO {
            return Err(OptionsError::InvalidRecipient(InvalidRecipient {}));
        }
        Ok(())
    }

    // ========================================
    // Views
    // ========================================

    /// Issuance record in any state, including closed tombstones.
    ///
    /// # Errors
    /// - `UnknownIssuance`
    pub fn issuance(&self, id: U256) -> Result<Issuance, OptionsError> {
        self.registry.get(id)
    }

    /// Number of issuances created; the id the next one will get.
    #[must_use]
    pub fn issuance_counter(&self) -> U256 {
        self.registry.counter()
    }

    /// # Errors
    /// - `UnknownIssuance` / `IssuanceClosed`
    pub fn remaining_sellable(&self, id: U256) -> Result<U256, OptionsError> {
        Ok(self.registry.active(id)?.remaining_sellable())
    }

    /// # Errors
    /// - `UnknownIssuance`
    pub fn allowed_buyers(&self, id: U256) -> Result<Vec<Address>, OptionsError> {
        Ok(self
            .registry
            .get(id)?
            .allowed_buyers()
            .iter()
            .copied()
            .collect())
    }

    #[must_use]
    pub const fn registry(&self) -> &R {
        &self.registry
    }

    #[must_use]
    pub const fn custody(&self) -> Address {
        self.custody
    }

    #[must_use]
    pub const fn assets(&self) -> &A {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut A {
        &mut self.assets
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Events recorded since the last [`Self::take_events`].
    #[must_use]
    pub fn events(&self) -> &[OptionsEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<OptionsEvent> {
        core::mem::take(&mut self.events)
    }

    /// Hands the non-zero legs to the asset port as one batch.
    fn settle(&mut self, legs: &[TransferLeg]) -> Result<(), OptionsError> {
        let legs: Vec<TransferLeg> = legs
            .iter()
            .filter(|leg| !leg.amount.is_zero())
            .copied()
            .collect();
        if legs.is_empty() {
            return Ok(());
        }

        self.assets.transfer_all(&legs).map_err(|leg| {
            warn!(asset = %leg.asset, from = %leg.from, to = %leg.to, amount = %leg.amount, "settlement rejected");
            OptionsError::TransferRejected(TransferRejected {
                asset: leg.asset,
                from: leg.from,
                to: leg.to,
                amount: leg.amount,
            })
        })
    }
}

pub(crate) fn length_mismatch(ids: usize, amounts: usize) -> OptionsError {
    OptionsError::LengthMismatch(LengthMismatch {
        ids: U256::from(ids),
        amounts: U256::from(amounts),
    })
}
