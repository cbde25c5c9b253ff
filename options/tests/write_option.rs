
use alloy_primitives::U256;
use deployment::*;
use fixture::*;
use motsu::prelude::*;
use test_erc20::TestERC20;
use vanilla_options::{
    IssuanceState, IssuanceTerms, OptionType, Options, OptionsError, OptionsEvent,
};

#[test]
fn create_call_escrows_underlying() {
    let mut f = Fixture::new();

    let id = f.create(call_terms());

    assert_eq!(id, U256::ZERO);
    assert_eq!(f.balance(UNDERLYING, CUSTODY), units(OPTION_COUNT));
    assert_eq!(
        f.balance(UNDERLYING, WRITER),
        funding() - units(OPTION_COUNT)
    );
    assert_eq!(f.balance(STABLE, CUSTODY), U256::ZERO);

    let issuance = f.engine.issuance(id).unwrap();
    assert_eq!(issuance.writer, WRITER);
    assert_eq!(issuance.state, IssuanceState::Active);
    assert_eq!(issuance.sold_amount, U256::ZERO);
    assert_eq!(issuance.remaining_escrow(), units(OPTION_COUNT));
}

#[test]
fn create_put_escrows_strike_notional() {
    let mut f = Fixture::new();

    let id = f.create(put_terms());

    assert_eq!(f.balance(STABLE, CUSTODY), units(STRIKE));
    assert_eq!(f.balance(UNDERLYING, CUSTODY), U256::ZERO);
    assert_eq!(f.engine.issuance(id).unwrap().remaining_escrow(), units(STRIKE));
}

#[test]
fn ids_increase_from_zero() {
    let mut f = Fixture::new();

    let first = f.create(call_terms());
    let second = f.create(put_terms());

    assert_eq!(first, U256::ZERO);
    assert_eq!(second, U256::from(1));
    assert_eq!(f.engine.issuance_counter(), U256::from(2));
}

#[test]
fn create_emits_created() {
    let mut f = Fixture::new();

    let id = f.create(call_terms());

    let events = f.engine.take_events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        OptionsEvent::Created(created) => {
            assert_eq!(created.issuance_id, id);
            assert_eq!(created.writer, WRITER);
            assert_eq!(created.escrowed, units(OPTION_COUNT));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn invalid_terms_move_nothing() {
    let mut f = Fixture::new();
    let cases = [
        IssuanceTerms {
            amount: U256::ZERO,
            ..call_terms()
        },
        IssuanceTerms {
            exercise_window_end: START,
            ..call_terms()
        },
        IssuanceTerms {
            buying_window_end: Some(END + 1),
            ..call_terms()
        },
        IssuanceTerms {
            min_buying_lot: units(OPTION_COUNT + 1),
            ..call_terms()
        },
        IssuanceTerms {
            premium: U256::MAX,
            ..call_terms()
        },
    ];

    for terms in cases {
        let err = f.engine.create(WRITER, terms, &[]).unwrap_err();
        assert!(
            matches!(
                err,
                OptionsError::ZeroAmount(_)
                    | OptionsError::InvalidExerciseWindow(_)
                    | OptionsError::InvalidBuyingWindow(_)
                    | OptionsError::InvalidMinBuyingLot(_)
                    | OptionsError::ArithmeticOverflow(_)
            ),
            "unexpected {err:?}"
        );
    }

    assert_eq!(f.engine.issuance_counter(), U256::ZERO);
    assert_eq!(f.balance(UNDERLYING, WRITER), funding());
    assert!(f.engine.events().is_empty());
}

#[test]
fn unfunded_writer_is_rejected() {
    let mut f = Fixture::new();
    let terms = IssuanceTerms {
        amount: funding() + U256::from(1),
        min_buying_lot: U256::from(1),
        ..call_terms()
    };

    let err = f.engine.create(WRITER, terms, &[]).unwrap_err();

    assert!(matches!(err, OptionsError::TransferRejected(_)));
    assert_eq!(f.engine.issuance_counter(), U256::ZERO);
}

#[test]
fn allow_list_is_recorded() {
    let mut f = Fixture::new();

    let id = f
        .engine
        .create(WRITER, call_terms(), &[BOB, ALICE, BOB])
        .unwrap();

    assert_eq!(f.engine.allowed_buyers(id).unwrap(), vec![ALICE, BOB]);
}

#[motsu::test]
fn contract_create_call_pulls_underlying(
    contract: Contract<Options>,
    underlying: Contract<TestERC20>,
    stable: Contract<TestERC20>,
) {
    fund(&underlying, &contract);

    let id = contract
        .sender(WRITER)
        .create(open_params(OptionType::Call, &underlying, &stable), vec![])
        .unwrap();

    assert_eq!(id, U256::ZERO);
    assert_eq!(contract.sender(WRITER).issuance_counter(), U256::from(1));
    assert_eq!(
        token_balance(&underlying, contract.address()),
        units(OPTION_COUNT)
    );
    assert_eq!(
        token_balance(&underlying, WRITER),
        funding() - units(OPTION_COUNT)
    );
    assert_eq!(
        contract.sender(WRITER).issuance(id).unwrap(),
        (WRITER, U256::ZERO, U256::ZERO, U256::ZERO, 0)
    );
}

#[motsu::test]
fn contract_create_put_pulls_strike(
    contract: Contract<Options>,
    underlying: Contract<TestERC20>,
    stable: Contract<TestERC20>,
) {
    fund(&stable, &contract);

    contract
        .sender(WRITER)
        .create(open_params(OptionType::Put, &underlying, &stable), vec![])
        .unwrap();

    assert_eq!(token_balance(&stable, contract.address()), units(STRIKE));
    assert_eq!(token_balance(&underlying, contract.address()), U256::ZERO);
}

#[motsu::test]
fn contract_create_without_allowance_is_rejected(
    contract: Contract<Options>,
    underlying: Contract<TestERC20>,
    stable: Contract<TestERC20>,
) {
    underlying.sender(WRITER).mint(WRITER, units(OPTION_COUNT));

    let result = contract
        .sender(WRITER)
        .create(open_params(OptionType::Call, &underlying, &stable), vec![]);

    assert!(matches!(result, Err(OptionsError::TransferRejected(_))));
    assert_eq!(token_balance(&underlying, WRITER), units(OPTION_COUNT));
}
