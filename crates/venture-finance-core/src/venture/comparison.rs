use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::VentureFinanceError;
use crate::types::{with_metadata, ComputationOutput, Money, OwnershipMap, Percent};
use crate::VentureFinanceResult;

use super::dilution::LegacyRound;

const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationComparisonInput {
    pub pre_money: Money,
    pub post_money: Money,
    #[serde(default)]
    pub rounds: Vec<LegacyRound>,
    /// Partner → equity fraction in [0, 1].
    #[serde(default)]
    pub partner_splits: OwnershipMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerValue {
    pub equity_pct: Percent,
    pub equity_value: Money,
    /// Share of post-money value, 0–100.
    pub value_share_pct: Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorPosition {
    pub equity_pct: Percent,
    pub equity_value: Money,
    pub total_return: Money,
    pub roi_pct: Option<Percent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationComparison {
    pub pre_money: Money,
    pub post_money: Money,
    pub total_investment: Money,
    pub valuation_multiple: Decimal,
    /// `(post − total_investment) / total_investment`.
    pub investor_roi_multiple: Option<Decimal>,
    pub partners: BTreeMap<String, PartnerValue>,
    pub investor: InvestorPosition,
    pub investor_equity_value: Money,
}

/// Compare a starting pre-money valuation with a later post-money one and
/// split the post-money value between partners and outside investors.
///
/// Outside investors hold whatever the partner splits leave over. When the
/// partners hold everything, the investor block falls back to the residual
/// value and the whole-company return.
pub fn compare_valuations(
    input: &ValuationComparisonInput,
) -> VentureFinanceResult<ComputationOutput<ValuationComparison>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.pre_money <= Decimal::ZERO || input.post_money <= Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "pre_money",
            "Valuations must be positive",
        ));
    }
    if input.post_money < input.pre_money {
        return Err(VentureFinanceError::invalid(
            "post_money",
            "Post-money valuation cannot be below pre-money",
        ));
    }
    for (name, fraction) in input.partner_splits.iter() {
        if fraction < Decimal::ZERO || fraction > Decimal::ONE {
            return Err(VentureFinanceError::invalid(
                format!("partner_splits.{name}"),
                "Partner equity must be between 0 and 1",
            ));
        }
    }

    let post = input.post_money;
    let total_investment: Money = input.rounds.iter().map(|r| r.amount).sum();
    let per_investment = |amount: Decimal| {
        if total_investment > Decimal::ZERO {
            Some(amount / total_investment)
        } else {
            None
        }
    };

    let partners: BTreeMap<String, PartnerValue> = input
        .partner_splits
        .iter()
        .map(|(name, fraction)| {
            let value = post * fraction;
            (
                name.to_string(),
                PartnerValue {
                    equity_pct: fraction * HUNDRED,
                    equity_value: value,
                    value_share_pct: value / post * HUNDRED,
                },
            )
        })
        .collect();

    let allocated = input.partner_splits.total();
    let investor = if allocated < Decimal::ONE {
        let fraction = Decimal::ONE - allocated;
        let value = post * fraction;
        let total_return = value - total_investment;
        InvestorPosition {
            equity_pct: fraction * HUNDRED,
            equity_value: value,
            total_return,
            roi_pct: per_investment(total_return).map(|r| r * HUNDRED),
        }
    } else {
        if allocated > Decimal::ONE {
            warnings.push(format!(
                "Partner splits sum to {allocated}; investor value is the residual after partners"
            ));
        }
        let partner_value: Money = partners.values().map(|p| p.equity_value).sum();
        let total_return = post - total_investment;
        InvestorPosition {
            equity_pct: Decimal::ZERO,
            equity_value: post - partner_value,
            total_return,
            roi_pct: per_investment(total_return).map(|r| r * HUNDRED),
        }
    };

    let output = ValuationComparison {
        pre_money: input.pre_money,
        post_money: post,
        total_investment,
        valuation_multiple: post / input.pre_money,
        investor_roi_multiple: per_investment(post - total_investment),
        partners,
        investor_equity_value: investor.equity_value,
        investor,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Pre/Post Valuation Comparison",
        input,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input() -> ValuationComparisonInput {
        ValuationComparisonInput {
            pre_money: dec!(1000),
            post_money: dec!(4000),
            rounds: vec![
                LegacyRound {
                    amount: dec!(500),
                    round: Some("Seed".into()),
                },
                LegacyRound {
                    amount: dec!(1500),
                    round: Some("A".into()),
                },
            ],
            partner_splits: OwnershipMap::new()
                .with("alice", dec!(0.4))
                .with("bob", dec!(0.2)),
        }
    }

    #[test]
    fn test_multiples() {
        let out = compare_valuations(&input()).unwrap().result;
        assert_eq!(out.total_investment, dec!(2000));
        assert_eq!(out.valuation_multiple, dec!(4));
        assert_eq!(out.investor_roi_multiple, Some(dec!(1)));
    }

    #[test]
    fn test_partner_values() {
        let out = compare_valuations(&input()).unwrap().result;
        let alice = &out.partners["alice"];
        assert_eq!(alice.equity_value, dec!(1600));
        assert_eq!(alice.equity_pct, dec!(40));
        assert_eq!(alice.value_share_pct, dec!(40));
    }

    #[test]
    fn test_investor_holds_residual() {
        let out = compare_valuations(&input()).unwrap().result;
        assert_eq!(out.investor.equity_pct, dec!(40));
        assert_eq!(out.investor.equity_value, dec!(1600));
        assert_eq!(out.investor.total_return, dec!(-400));
        assert_eq!(out.investor.roi_pct, Some(dec!(-20)));
        assert_eq!(out.investor_equity_value, out.investor.equity_value);
    }

    #[test]
    fn test_fully_allocated_falls_back_to_company_return() {
        let mut inp = input();
        inp.partner_splits = OwnershipMap::new()
            .with("alice", dec!(0.6))
            .with("bob", dec!(0.4));
        let out = compare_valuations(&inp).unwrap().result;
        assert_eq!(out.investor.equity_pct, Decimal::ZERO);
        assert_eq!(out.investor.equity_value, Decimal::ZERO);
        assert_eq!(out.investor.total_return, dec!(2000));
        assert_eq!(out.investor.roi_pct, Some(dec!(100)));
    }

    #[test]
    fn test_no_rounds_means_no_roi() {
        let mut inp = input();
        inp.rounds.clear();
        let out = compare_valuations(&inp).unwrap().result;
        assert!(out.investor_roi_multiple.is_none());
        assert!(out.investor.roi_pct.is_none());
    }

    #[test]
    fn test_post_below_pre_rejected() {
        let mut inp = input();
        inp.post_money = dec!(500);
        assert!(compare_valuations(&inp).is_err());
    }

    #[test]
    fn test_split_out_of_range_rejected() {
        let mut inp = input();
        inp.partner_splits = OwnershipMap::new().with("alice", dec!(1.5));
        assert!(compare_valuations(&inp).is_err());
    }
}
