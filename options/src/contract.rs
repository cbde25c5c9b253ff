//! Stylus entrypoint around [`VanillaOption`].
//!
//! Issuances and positions live in contract storage behind the
//! [`IssuanceStore`] and [`PositionLedger`] traits. The caller, the custody
//! account and the time come from the VM. Settlement legs are collected while
//! the engine runs and executed as ERC-20 calls after every state change is
//! written; a refused call reverts the whole transaction.

use alloc::{collections::BTreeSet, vec, vec::Vec};
use alloy_primitives::{Address, U256, U64, U8};
use alloy_sol_types::{sol, sol_data, SolCall, SolType};
use stylus_sdk::prelude::*;
use stylus_sdk::stylus_core::calls::{context::Call, CallAccess};
use tracing::warn;

use crate::engine::VanillaOption;
use crate::error::{
    InsufficientPosition, InvalidOptionType, NotRenounceable, OptionsError, TransferRejected,
};
use crate::events::OptionsEvent;
use crate::ledger::PositionLedger;
use crate::port::{AssetTransfer, Clock, TransferLeg};
use crate::registry::{Closure, Issuance, IssuanceState, IssuanceStore};
use crate::terms::IssuanceTerms;
use crate::OptionType;

sol! {
    /// Issuance terms as passed by callers.
    ///
    /// `buying_window_end` of zero means no separate buying deadline.
    #[derive(Copy)]
    struct IssuanceParams {
        uint8 option_type;
        address underlying;
        uint256 amount;
        address strike_asset;
        uint256 strike;
        address premium_asset;
        uint256 premium;
        uint64 exercise_window_start;
        uint64 exercise_window_end;
        uint64 buying_window_end;
        uint256 min_buying_lot;
        bool renounceable;
    }

    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }
}

// Implement AbiType for IssuanceParams to make it usable in #[public] functions
impl stylus_sdk::abi::AbiType for IssuanceParams {
    type SolType = Self;
    const ABI: stylus_sdk::abi::ConstString = stylus_sdk::abi::ConstString::new(
        "(uint8,address,uint256,address,uint256,address,uint256,uint64,uint64,uint64,uint256,bool)",
    );
}

impl TryFrom<IssuanceParams> for IssuanceTerms {
    type Error = OptionsError;

    fn try_from(params: IssuanceParams) -> Result<Self, Self::Error> {
        let option_type = OptionType::from_u8(params.option_type).ok_or(
            OptionsError::InvalidOptionType(InvalidOptionType {
                value: params.option_type,
            }),
        )?;

        Ok(Self {
            option_type,
            underlying: params.underlying,
            amount: params.amount,
            strike_asset: params.strike_asset,
            strike: params.strike,
            premium_asset: params.premium_asset,
            premium: params.premium,
            exercise_window_start: params.exercise_window_start,
            exercise_window_end: params.exercise_window_end,
            buying_window_end: (params.buying_window_end != 0).then_some(params.buying_window_end),
            min_buying_lot: params.min_buying_lot,
            renounceable: params.renounceable,
        })
    }
}

sol_storage! {
    /// One issuance record, flattened into storage slots.
    pub struct StoredIssuance {
        address writer;
        uint8 option_type;
        address underlying;
        uint256 amount;
        address strike_asset;
        uint256 strike;
        address premium_asset;
        uint256 premium;
        uint64 exercise_window_start;
        uint64 exercise_window_end;
        bool has_buying_window_end;
        uint64 buying_window_end;
        uint256 min_buying_lot;
        bool renounceable;
        uint256 sold_amount;
        uint256 exercised_amount;
        uint256 settled_exercise_cost;
        uint8 state;
        address[] allowed_buyers;
    }

    /// Issuances keyed by id, ids counting up from zero.
    pub struct IssuanceBook {
        uint256 next_id;
        mapping(uint256 => StoredIssuance) issuances;
    }

    /// Option unit balances and operator approvals.
    pub struct PositionBook {
        mapping(uint256 => mapping(address => uint256)) balances;
        mapping(uint256 => uint256) outstanding;
        mapping(address => mapping(address => bool)) operators;
    }

    #[entrypoint]
    pub struct Options {
        IssuanceBook issuances;
        PositionBook positions;
    }
}

const fn state_code(state: IssuanceState) -> u8 {
    match state {
        IssuanceState::Active => 0,
        IssuanceState::Closed(Closure::Canceled) => 1,
        IssuanceState::Closed(Closure::Expired) => 2,
    }
}

const fn state_from_code(code: u8) -> IssuanceState {
    match code {
        1 => IssuanceState::Closed(Closure::Canceled),
        2 => IssuanceState::Closed(Closure::Expired),
        _ => IssuanceState::Active,
    }
}

impl StoredIssuance {
    fn issuance(&self) -> Issuance {
        let terms = IssuanceTerms {
            // only codes written by `store` ever reach this slot
            option_type: OptionType::from_u8(self.option_type.get().to::<u8>())
                .unwrap_or_default(),
            underlying: self.underlying.get(),
            amount: self.amount.get(),
            strike_asset: self.strike_asset.get(),
            strike: self.strike.get(),
            premium_asset: self.premium_asset.get(),
            premium: self.premium.get(),
            exercise_window_start: self.exercise_window_start.get().to::<u64>(),
            exercise_window_end: self.exercise_window_end.get().to::<u64>(),
            buying_window_end: self
                .has_buying_window_end
                .get()
                .then(|| self.buying_window_end.get().to::<u64>()),
            min_buying_lot: self.min_buying_lot.get(),
            renounceable: self.renounceable.get(),
        };

        let allowed_buyers = (0..self.allowed_buyers.len())
            .filter_map(|index| self.allowed_buyers.get(index))
            .collect::<BTreeSet<Address>>();

        let mut issuance = Issuance::new(self.writer.get(), terms, allowed_buyers);
        issuance.sold_amount = self.sold_amount.get();
        issuance.exercised_amount = self.exercised_amount.get();
        issuance.settled_exercise_cost = self.settled_exercise_cost.get();
        issuance.state = state_from_code(self.state.get().to::<u8>());
        issuance
    }

    fn store(&mut self, issuance: &Issuance) {
        let terms = &issuance.terms;
        self.writer.set(issuance.writer);
        self.option_type.set(U8::from(terms.option_type.to_u8()));
        self.underlying.set(terms.underlying);
        self.amount.set(terms.amount);
        self.strike_asset.set(terms.strike_asset);
        self.strike.set(terms.strike);
        self.premium_asset.set(terms.premium_asset);
        self.premium.set(terms.premium);
        self.exercise_window_start.set(U64::from(terms.exercise_window_start));
        self.exercise_window_end.set(U64::from(terms.exercise_window_end));
        self.has_buying_window_end.set(terms.buying_window_end.is_some());
        self.buying_window_end.set(U64::from(terms.buying_window_end.unwrap_or_default()));
        self.min_buying_lot.set(terms.min_buying_lot);
        self.renounceable.set(terms.renounceable);
        self.sold_amount.set(issuance.sold_amount);
        self.exercised_amount.set(issuance.exercised_amount);
        self.settled_exercise_cost.set(issuance.settled_exercise_cost);
        self.state.set(U8::from(state_code(issuance.state)));

        self.allowed_buyers.truncate(0);
        for buyer in issuance.allowed_buyers() {
            self.allowed_buyers.push(*buyer);
        }
    }
}

impl IssuanceStore for IssuanceBook {
    fn counter(&self) -> U256 {
        self.next_id.get()
    }

    fn load(&self, id: U256) -> Option<Issuance> {
        if id >= self.next_id.get() {
            return None;
        }
        Some(self.issuances.getter(id).issuance())
    }

    fn insert(&mut self, issuance: Issuance) -> U256 {
        let id = self.next_id.get();
        self.issuances.setter(id).store(&issuance);
        self.next_id.set(id + U256::from(1));
        id
    }

    fn update(&mut self, id: U256, issuance: Issuance) {
        self.issuances.setter(id).store(&issuance);
    }
}

impl PositionBook {
    fn set_balance(&mut self, id: U256, holder: Address, units: U256) {
        self.balances.setter(id).insert(holder, units);
    }
}

impl PositionLedger for PositionBook {
    fn balance_of(&self, id: U256, holder: Address) -> U256 {
        self.balances.getter(id).get(holder)
    }

    fn outstanding(&self, id: U256) -> U256 {
        self.outstanding.get(id)
    }

    fn credit(&mut self, id: U256, holder: Address, units: U256) {
        let balance = self.balance_of(id, holder);
        self.set_balance(id, holder, balance + units);
        let total = self.outstanding.get(id);
        self.outstanding.insert(id, total + units);
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
        let total = self.outstanding.get(id);
        self.outstanding.insert(id, total.saturating_sub(units));
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
        self.operators.setter(owner).insert(operator, approved);
    }

    fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.operators.getter(owner).get(operator)
    }
}

/// Block timestamp captured once per call.
#[derive(Debug, Clone, Copy)]
pub struct BlockClock(pub u64);

impl Clock for BlockClock {
    fn now(&self) -> u64 {
        self.0
    }
}

/// Accepts every leg and keeps it for execution once the engine is done.
#[derive(Debug, Default)]
pub struct DeferredTransfers {
    legs: Vec<TransferLeg>,
}

impl DeferredTransfers {
    /// Drains the legs collected so far, in submission order.
    pub fn take(&mut self) -> Vec<TransferLeg> {
        core::mem::take(&mut self.legs)
    }
}

impl AssetTransfer for DeferredTransfers {
    fn transfer_all(&mut self, legs: &[TransferLeg]) -> Result<(), TransferLeg> {
        self.legs.extend_from_slice(legs);
        Ok(())
    }
}

type Engine<'a> =
    VanillaOption<DeferredTransfers, BlockClock, &'a mut PositionBook, &'a mut IssuanceBook>;

impl Options {
    /// Runs one engine operation as `msg.sender`, then settles its legs and
    /// emits its events.
    fn run<T>(
        &mut self,
        operation: impl FnOnce(&mut Engine<'_>, Address) -> Result<T, OptionsError>,
    ) -> Result<T, OptionsError> {
        let caller = self.vm().msg_sender();
        let custody = self.vm().contract_address();
        let clock = BlockClock(self.vm().block_timestamp());

        let mut engine = VanillaOption::with_storage(
            custody,
            DeferredTransfers::default(),
            clock,
            &mut self.positions,
            &mut self.issuances,
        );
        let output = operation(&mut engine, caller)?;
        let legs = engine.assets_mut().take();
        let events = engine.take_events();

        self.execute_legs(custody, &legs)?;
        self.emit(&events);
        Ok(output)
    }

    /// Custody pays out with `transfer`; every other leg is pulled with
    /// `transferFrom` against the allowance granted to this contract.
    fn execute_legs(&self, custody: Address, legs: &[TransferLeg]) -> Result<(), OptionsError> {
        for leg in legs {
            let calldata = if leg.from == custody {
                IERC20::transferCall {
                    to: leg.to,
                    amount: leg.amount,
                }
                .abi_encode()
            } else {
                IERC20::transferFromCall {
                    from: leg.from,
                    to: leg.to,
                    amount: leg.amount,
                }
                .abi_encode()
            };

            let accepted = self
                .vm()
                .call(&Call::new(), leg.asset, &calldata)
                .is_ok_and(|returned| {
                    <sol_data::Bool as SolType>::abi_decode(&returned, true).unwrap_or(false)
                });

            if !accepted {
                warn!(asset = %leg.asset, from = %leg.from, to = %leg.to, amount = %leg.amount, "erc20 transfer refused");
                return Err(OptionsError::TransferRejected(TransferRejected {
                    asset: leg.asset,
                    from: leg.from,
                    to: leg.to,
                    amount: leg.amount,
                }));
            }
        }
        Ok(())
    }

    fn emit(&self, events: &[OptionsEvent]) {
        for event in events {
            let log = event.to_log_data();
            let topics = log.topics();
            let mut input = Vec::with_capacity(32 * topics.len() + log.data.len());
            for topic in topics {
                input.extend_from_slice(topic.as_slice());
            }
            input.extend_from_slice(&log.data);
            self.vm().emit_log(&input, topics.len());
        }
    }
}

#[public]
impl Options {
    /// Writes a new issuance and pulls its escrow from the caller.
    ///
    /// # Parameters
    /// - `params`: Issuance terms
    /// - `allowed_buyers`: Buyers admitted; empty admits everyone
    ///
    /// # Returns
    /// Id of the new issuance.
    ///
    /// # Errors
    /// - `InvalidOptionType` and any term validation error
    /// - `TransferRejected`: If the escrow cannot be pulled
    #[allow(clippy::needless_pass_by_value)]
    pub fn create(
        &mut self,
        params: IssuanceParams,
        allowed_buyers: Vec<Address>,
    ) -> Result<U256, OptionsError> {
        let terms = IssuanceTerms::try_from(params)?;
        self.run(|engine, caller| engine.create(caller, terms, &allowed_buyers))
    }

    /// Buys option units against premium.
    ///
    /// # Returns
    /// `(units bought, premium paid)`.
    ///
    /// # Errors
    /// Any purchase error of [`VanillaOption::buy`].
    pub fn buy(
        &mut self,
        id: U256,
        units: U256,
        require_exact_fill: bool,
    ) -> Result<(U256, U256), OptionsError> {
        let purchase =
            self.run(|engine, caller| engine.buy(caller, id, units, require_exact_fill))?;
        Ok((purchase.units, purchase.premium_paid))
    }

    /// Exercises option units held by the caller.
    ///
    /// # Returns
    /// Strike asset moved by this exercise.
    ///
    /// # Errors
    /// Any exercise error of [`VanillaOption::exercise`].
    pub fn exercise(&mut self, id: U256, units: U256) -> Result<U256, OptionsError> {
        let receipt = self.run(|engine, caller| engine.exercise(caller, id, units))?;
        Ok(receipt.strike_transferred)
    }

    /// # Errors
    /// Any error of [`VanillaOption::cancel`].
    pub fn cancel(&mut self, id: U256) -> Result<U256, OptionsError> {
        self.run(|engine, caller| engine.cancel(caller, id))
    }

    /// # Errors
    /// Any error of [`VanillaOption::retrieve_expired_tokens`].
    pub fn retrieve_expired_tokens(&mut self, id: U256) -> Result<U256, OptionsError> {
        self.run(|engine, caller| engine.retrieve_expired_tokens(caller, id))
    }

    /// # Errors
    /// Any error of [`VanillaOption::update_premium`].
    pub fn update_premium(&mut self, id: U256, premium: U256) -> Result<(), OptionsError> {
        self.run(|engine, caller| engine.update_premium(caller, id, premium))
    }

    /// # Errors
    /// Any error of [`VanillaOption::update_allowed_buyers`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn update_allowed_buyers(
        &mut self,
        id: U256,
        buyers: Vec<Address>,
    ) -> Result<(), OptionsError> {
        self.run(|engine, caller| engine.update_allowed_buyers(caller, id, &buyers))
    }

    /// # Errors
    /// Never fails; the result only carries the shared error type.
    pub fn set_approval_for_all(
        &mut self,
        operator: Address,
        approved: bool,
    ) -> Result<(), OptionsError> {
        self.run(|engine, caller| {
            engine.set_approval_for_all(caller, operator, approved);
            Ok(())
        })
    }

    /// # Errors
    /// Any error of [`VanillaOption::safe_transfer_from`].
    pub fn safe_transfer_from(
        &mut self,
        from: Address,
        to: Address,
        id: U256,
        amount: U256,
    ) -> Result<(), OptionsError> {
        self.run(|engine, caller| engine.safe_transfer_from(caller, from, to, id, amount))
    }

    /// # Errors
    /// Any error of [`VanillaOption::safe_batch_transfer_from`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn safe_batch_transfer_from(
        &mut self,
        from: Address,
        to: Address,
        ids: Vec<U256>,
        amounts: Vec<U256>,
    ) -> Result<(), OptionsError> {
        self.run(|engine, caller| engine.safe_batch_transfer_from(caller, from, to, &ids, &amounts))
    }

    #[must_use]
    pub fn balance_of(&self, holder: Address, id: U256) -> U256 {
        self.positions.balance_of(id, holder)
    }

    /// # Errors
    /// - `LengthMismatch`: If `holders` and `ids` differ in length
    #[allow(clippy::needless_pass_by_value)]
    pub fn balance_of_batch(
        &self,
        holders: Vec<Address>,
        ids: Vec<U256>,
    ) -> Result<Vec<U256>, OptionsError> {
        if holders.len() != ids.len() {
            return Err(crate::engine::length_mismatch(holders.len(), ids.len()));
        }
        Ok(holders
            .iter()
            .zip(&ids)
            .map(|(&holder, &id)| self.positions.balance_of(id, holder))
            .collect())
    }

    #[must_use]
    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.positions.is_approved_for_all(owner, operator)
    }

    #[must_use]
    pub fn issuance_counter(&self) -> U256 {
        self.issuances.counter()
    }

    /// # Errors
    /// - `UnknownIssuance`
    pub fn remaining_sellable(&self, id: U256) -> Result<U256, OptionsError> {
        Ok(self.issuances.get(id)?.remaining_sellable())
    }

    /// # Errors
    /// - `UnknownIssuance`
    pub fn allowed_buyers(&self, id: U256) -> Result<Vec<Address>, OptionsError> {
        Ok(self
            .issuances
            .get(id)?
            .allowed_buyers()
            .iter()
            .copied()
            .collect())
    }

    /// Progress of an issuance.
    ///
    /// # Returns
    /// `(writer, sold, exercised, settled strike, state)` where state is
    /// 0 active, 1 canceled and 2 expired.
    ///
    /// # Errors
    /// - `UnknownIssuance`
    pub fn issuance(&self, id: U256) -> Result<(Address, U256, U256, U256, u8), OptionsError> {
        let issuance = self.issuances.get(id)?;
        Ok((
            issuance.writer,
            issuance.sold_amount,
            issuance.exercised_amount,
            issuance.settled_exercise_cost,
            state_code(issuance.state),
        ))
    }
}
