//! Property-based tests for the dilution ledger.

use proptest::prelude::*;
use rust_decimal::Decimal;
use venture_finance_core::venture::dilution::{
    run_dilution, DilutionInput, LegacyRound, RoundEntry, RoundSpec,
};
use venture_finance_core::venture::resolver::{LockSet, RoundField, RoundValues};
use venture_finance_core::VentureFinanceError;

// =============================================================================
// Generators
// =============================================================================

/// Whole-unit amounts keep Decimal arithmetic well inside its precision.
fn arb_rounds(max: usize) -> impl Strategy<Value = Vec<RoundEntry>> {
    proptest::collection::vec(1u32..50_000, 0..=max).prop_map(|amounts| {
        amounts
            .into_iter()
            .enumerate()
            .map(|(i, a)| {
                RoundEntry::Legacy(LegacyRound {
                    amount: Decimal::from(a),
                    round: Some(format!("R{i}")),
                })
            })
            .collect()
    })
}

/// A flexible round: any subset of the four fields, any subset of locks.
/// Locking an absent field and contradictory combinations are both allowed;
/// the engine has to reject those rather than produce a bad ledger.
fn arb_flexible_round(idx: usize) -> impl Strategy<Value = RoundEntry> {
    (
        proptest::option::of(1u32..100_000),
        proptest::option::of(1u32..100_000),
        proptest::option::of(1u32..50_000),
        proptest::option::of(0u32..=100),
        proptest::collection::vec(any::<bool>(), 4),
    )
        .prop_map(move |(pre, post, inv, pct, lock_flags)| {
            let fields = [
                RoundField::PreMoney,
                RoundField::PostMoney,
                RoundField::Investment,
                RoundField::InvestorPct,
            ];
            let locked: LockSet = fields
                .into_iter()
                .zip(lock_flags)
                .filter_map(|(field, on)| on.then_some(field))
                .collect();
            RoundEntry::Spec(RoundSpec {
                name: format!("F{idx}"),
                values: RoundValues {
                    pre_money: pre.map(Decimal::from),
                    post_money: post.map(Decimal::from),
                    investment: inv.map(Decimal::from),
                    investor_pct: pct.map(Decimal::from),
                },
                locked,
            })
        })
}

fn arb_mixed_rounds(max: usize) -> impl Strategy<Value = Vec<RoundEntry>> {
    proptest::collection::vec(any::<bool>(), 0..=max).prop_flat_map(|kinds| {
        kinds
            .into_iter()
            .enumerate()
            .map(|(i, flexible)| {
                if flexible {
                    arb_flexible_round(i).boxed()
                } else {
                    (1u32..50_000)
                        .prop_map(move |a| {
                            RoundEntry::Legacy(LegacyRound {
                                amount: Decimal::from(a),
                                round: Some(format!("L{i}")),
                            })
                        })
                        .boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Founder ownership strictly decreases with every funded round.
    #[test]
    fn prop_founders_strictly_decrease(
        initial in 1u32..100_000,
        rounds in arb_rounds(8),
    ) {
        let out = run_dilution(&DilutionInput {
            initial_pre_money: Some(Decimal::from(initial)),
            rounds,
            founders: None,
        })
        .unwrap()
        .result;

        let mut previous = Decimal::from(100);
        for row in &out.ledger {
            prop_assert!(row.founders_pct < previous, "{} !< {}", row.founders_pct, previous);
            previous = row.founders_pct;
        }
    }

    /// Every ownership snapshot sums to one.
    #[test]
    fn prop_ownership_sums_to_one(
        initial in 1u32..100_000,
        rounds in arb_rounds(8),
    ) {
        let out = run_dilution(&DilutionInput {
            initial_pre_money: Some(Decimal::from(initial)),
            rounds,
            founders: None,
        })
        .unwrap();

        for row in &out.result.ledger {
            let drift = (row.ownership.total() - Decimal::ONE).abs();
            prop_assert!(drift < Decimal::new(1, 12), "drift {}", drift);
        }
        prop_assert!(out.warnings.is_empty());
    }

    /// Each round's pre-money is the previous round's post-money.
    #[test]
    fn prop_post_money_chains(
        initial in 1u32..100_000,
        rounds in arb_rounds(8),
    ) {
        let out = run_dilution(&DilutionInput {
            initial_pre_money: Some(Decimal::from(initial)),
            rounds,
            founders: None,
        })
        .unwrap()
        .result;

        let mut expected_pre = Decimal::from(initial);
        for row in &out.ledger {
            prop_assert_eq!(row.pre_money, expected_pre);
            prop_assert_eq!(row.post_money, row.pre_money + row.investment);
            expected_pre = row.post_money;
        }
    }

    /// Flexible rounds either resolve to a sane ledger or are rejected as
    /// invalid input; never negative or over-allocated fractions.
    #[test]
    fn prop_flexible_rounds_keep_fractions_in_range(
        initial in proptest::option::of(1u32..100_000),
        rounds in arb_mixed_rounds(6),
    ) {
        let result = run_dilution(&DilutionInput {
            initial_pre_money: initial.map(Decimal::from),
            rounds,
            founders: None,
        });

        match result {
            Err(VentureFinanceError::InvalidInput { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
            Ok(out) => {
                let mut previous = Decimal::from(100);
                for row in &out.result.ledger {
                    prop_assert!(row.founders_pct <= previous, "{} > {}", row.founders_pct, previous);
                    prop_assert!(row.founders_pct >= Decimal::ZERO);
                    prop_assert!(row.pre_money >= Decimal::ZERO);
                    prop_assert!(row.investment >= Decimal::ZERO);
                    for (holder, fraction) in row.ownership.iter() {
                        prop_assert!(
                            fraction >= Decimal::ZERO && fraction <= Decimal::ONE,
                            "{} holds {}", holder, fraction
                        );
                    }
                    previous = row.founders_pct;
                }
            }
        }
    }
}
