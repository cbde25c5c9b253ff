
use alloy_primitives::{Address, U256};
use fixture::*;
use proptest::prelude::*;
use vanilla_options::{math, Issuance, IssuanceTerms, OptionType, OptionsError, PositionLedger};

const HOLDERS: [Address; 3] = [ALICE, BOB, CAROL];
const ACCOUNTS: [Address; 5] = [WRITER, ALICE, BOB, CAROL, CUSTODY];
const LOT: u64 = 1_000;

#[derive(Debug, Clone)]
enum Op {
    Buy { holder: usize, units: u64, exact: bool },
    Exercise { holder: usize, units: u64 },
    Transfer { from: usize, to: usize, units: u64 },
    Advance(u64),
    UpdatePremium(u64),
    Cancel,
    Reclaim,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..3usize, 1..400_000u64, any::<bool>())
            .prop_map(|(holder, units, exact)| Op::Buy { holder, units, exact }),
        4 => (0..3usize, 1..200_000u64)
            .prop_map(|(holder, units)| Op::Exercise { holder, units }),
        2 => (0..3usize, 0..3usize, 1..100_000u64)
            .prop_map(|(from, to, units)| Op::Transfer { from, to, units }),
        1 => (0..1_500u64).prop_map(Op::Advance),
        1 => (0..100_000u64).prop_map(Op::UpdatePremium),
        1 => Just(Op::Cancel),
        1 => Just(Op::Reclaim),
    ]
}

/// Everything an operation could touch.
#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    assets: Vec<U256>,
    positions: Vec<U256>,
    issuance: Issuance,
}

fn snapshot(f: &Fixture, id: U256) -> Snapshot {
    let assets = [UNDERLYING, STABLE]
        .into_iter()
        .flat_map(|asset| ACCOUNTS.map(|account| f.balance(asset, account)))
        .collect();
    let positions = HOLDERS
        .iter()
        .map(|holder| f.engine.balance_of(*holder, id))
        .collect();
    Snapshot {
        assets,
        positions,
        issuance: f.engine.issuance(id).unwrap(),
    }
}

fn apply(f: &mut Fixture, id: U256, op: &Op) -> Result<(), OptionsError> {
    match *op {
        Op::Buy {
            holder,
            units: requested,
            exact,
        } => {
            let purchase = f.engine.buy(HOLDERS[holder], id, units(requested), exact)?;
            assert!(!purchase.units.is_zero());
            assert!(!purchase.premium_paid.is_zero());
            assert!((purchase.units % units(LOT)).is_zero());
            assert!(purchase.units <= units(requested));
        }
        Op::Exercise { holder, units: n } => {
            let receipt = f.engine.exercise(HOLDERS[holder], id, units(n))?;
            assert!(!receipt.strike_transferred.is_zero());
        }
        Op::Transfer { from, to, units: n } => {
            f.engine
                .safe_transfer_from(HOLDERS[from], HOLDERS[from], HOLDERS[to], id, units(n))?;
        }
        Op::Advance(seconds) => f.clock.advance(seconds),
        Op::UpdatePremium(premium) => f.engine.update_premium(WRITER, id, units(premium))?,
        Op::Cancel => {
            f.engine.cancel(WRITER, id)?;
        }
        Op::Reclaim => {
            f.engine.retrieve_expired_tokens(WRITER, id)?;
        }
    }
    Ok(())
}

fn check_invariants(f: &Fixture, id: U256, previous: &Issuance) -> Result<(), TestCaseError> {
    let issuance = f.engine.issuance(id).unwrap();
    let terms = &issuance.terms;

    for asset in [UNDERLYING, STABLE] {
        let supply = ACCOUNTS
            .iter()
            .fold(U256::ZERO, |sum, account| sum + f.balance(asset, *account));
        prop_assert_eq!(supply, funding() * U256::from(4));
    }

    let other_asset = if terms.escrow_asset() == UNDERLYING {
        STABLE
    } else {
        UNDERLYING
    };
    prop_assert_eq!(f.balance(terms.escrow_asset(), CUSTODY), issuance.remaining_escrow());
    prop_assert_eq!(f.balance(other_asset, CUSTODY), U256::ZERO);

    prop_assert!(issuance.sold_amount <= terms.amount);
    prop_assert!(issuance.exercised_amount <= issuance.sold_amount);
    prop_assert!(issuance.sold_amount >= previous.sold_amount);
    prop_assert!(issuance.exercised_amount >= previous.exercised_amount);
    prop_assert!(issuance.settled_exercise_cost <= terms.strike);
    let owed = match terms.option_type {
        OptionType::Call => {
            math::proportional_share_ceil(issuance.exercised_amount, terms.strike, terms.amount)
        }
        OptionType::Put => {
            math::proportional_share(issuance.exercised_amount, terms.strike, terms.amount)
        }
    };
    prop_assert_eq!(issuance.settled_exercise_cost, owed.unwrap());

    let held = HOLDERS
        .iter()
        .fold(U256::ZERO, |sum, holder| sum + f.engine.balance_of(*holder, id));
    prop_assert_eq!(held, f.engine.ledger().outstanding(id));
    prop_assert_eq!(held, issuance.sold_amount - issuance.exercised_amount);

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: any operation sequence keeps escrow, positions and asset
    /// supplies consistent, and failed operations change nothing
    #[test]
    fn prop_random_sequences_conserve_value(
        put in any::<bool>(),
        strike in 1u64..2_000_000u64,
        premium in 1u64..100_000u64,
        ops in proptest::collection::vec(op(), 1..40),
    ) {
        let mut f = Fixture::new();
        let id = f.create(IssuanceTerms {
            option_type: if put { OptionType::Put } else { OptionType::Call },
            strike: units(strike),
            premium: units(premium),
            min_buying_lot: units(LOT),
            ..call_terms()
        });

        for op in &ops {
            let before = snapshot(&f, id);
            let events_before = f.engine.events().len();

            if let Err(err) = apply(&mut f, id, op) {
                prop_assert_eq!(&snapshot(&f, id), &before, "{:?} failed with {}", op, err);
                prop_assert_eq!(f.engine.events().len(), events_before);
            }

            check_invariants(&f, id, &before.issuance)?;
        }

        if f.engine.issuance(id).unwrap().is_active() {
            return Ok(());
        }
        prop_assert!(matches!(
            f.engine.cancel(WRITER, id),
            Err(OptionsError::IssuanceClosed(_))
        ));
        prop_assert!(matches!(
            f.engine.retrieve_expired_tokens(WRITER, id),
            Err(OptionsError::IssuanceClosed(_))
        ));
    }

    /// Property: however an exercise is split, the writer receives the same
    /// strike as one exercise of the whole
    #[test]
    fn prop_split_exercise_matches_whole(
        strike in 1u64..2_000_000u64,
        splits in proptest::collection::vec(100u64..50_000u64, 1..10),
    ) {
        let total: u64 = splits.iter().sum();
        let mut f = Fixture::new();
        let id = f.create(IssuanceTerms {
            strike: units(strike),
            ..call_terms()
        });
        f.engine.buy(ALICE, id, units(total), true).unwrap();

        let mut moved = U256::ZERO;
        let mut exercised = 0u64;
        for n in splits {
            match f.engine.exercise(ALICE, id, units(n)) {
                Ok(receipt) => {
                    moved += receipt.strike_transferred;
                    exercised += n;
                }
                Err(err) => {
                    prop_assert!(matches!(err, OptionsError::ZeroStrikeIncrement(_)));
                }
            }
        }

        let whole =
            math::proportional_share_ceil(units(exercised), units(strike), units(OPTION_COUNT))
                .unwrap();
        prop_assert_eq!(moved, whole);
    }
}
