use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::VentureFinanceError;
use crate::types::{with_metadata, ComputationOutput, Money, OwnershipMap, Percent};
use crate::VentureFinanceResult;

use super::dilution::{
    drift_warning, duplicate_round_warning, investor_holder, run_dilution, DilutionInput,
    LegacyRound, RoundEntry,
};

const HUNDRED: Decimal = dec!(100);
/// Overrides closer than this to the implied fraction are ignored.
const OVERRIDE_TOLERANCE: Decimal = dec!(0.001);

// ─── Multi-round equity returns ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityReturnsInput {
    pub initial_valuation: Money,
    pub rounds: Vec<LegacyRound>,
    /// Initial partner fractions; the remainder up to 1 is unallocated.
    pub partners: OwnershipMap,
    /// Round name → new-investor fraction to impose on that round.
    #[serde(default)]
    pub investor_overrides: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityRoundRecord {
    pub round: String,
    pub investment: Money,
    pub pre_money: Money,
    pub post_money: Money,
    pub new_investor_pct: Percent,
    pub cumulative_investment: Money,
    pub ownership: OwnershipMap,
    pub unallocated: Decimal,
    /// True when an override replaced the implied fraction.
    pub overridden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderReturn {
    pub final_fraction: Decimal,
    pub return_amount: Money,
    /// `return_amount / total_investment`; None without any investment.
    pub roi: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityReturnsOutput {
    pub rounds: Vec<EquityRoundRecord>,
    pub final_distribution: OwnershipMap,
    pub unallocated: Decimal,
    pub holder_returns: BTreeMap<String, HolderReturn>,
    pub total_investment: Money,
    pub exit_valuation: Money,
    pub total_return: Money,
    pub overall_roi: Option<Decimal>,
}

/// Dilute an arbitrary partner map through a sequence of rounds and split
/// the exit proceeds by final ownership.
///
/// The exit valuation is the last post-money. Per-round overrides win when
/// they differ from the implied fraction by more than 0.001; the investment
/// is then re-derived from the pre-money and post-money becomes
/// `pre + re-derived investment`, not `pre + stated amount`.
pub fn run_equity_returns(
    input: &EquityReturnsInput,
) -> VentureFinanceResult<ComputationOutput<EquityReturnsOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_equity_input(input)?;

    let mut current_valuation = input.initial_valuation;
    let mut ownership = input.partners.clone();
    let mut unallocated = Decimal::ONE - input.partners.total();
    let mut total_investment = Decimal::ZERO;
    let mut records: Vec<EquityRoundRecord> = Vec::with_capacity(input.rounds.len());

    for (idx, round) in input.rounds.iter().enumerate() {
        let name = round.label(idx);
        let pre = current_valuation;
        let mut investment = round.amount;
        let mut fraction = investment / (pre + investment);
        let mut overridden = false;

        if let Some(&target) = input.investor_overrides.get(&name) {
            if (fraction - target).abs() > OVERRIDE_TOLERANCE {
                fraction = target;
                investment = pre * target / (Decimal::ONE - target);
                overridden = true;
                warnings.push(format!(
                    "Round '{name}': investor fraction overridden to {target}, investment recomputed as {}",
                    investment.round_dp(2)
                ));
            }
        }

        let post = pre + investment;
        let factor = Decimal::ONE - fraction;

        let holder = investor_holder(&name);
        let (next, replaced) = ownership.diluted(factor, Some((holder.as_str(), fraction)));
        if replaced {
            warnings.push(duplicate_round_warning(&name));
        }
        unallocated *= factor;

        if let Some(w) = drift_warning(&name, next.total() + unallocated) {
            warnings.push(w);
        }
        ownership = next;

        total_investment += investment;
        current_valuation = post;

        tracing::debug!(round = %name, pre = %pre, post = %post, fraction = %fraction, "equity round applied");

        records.push(EquityRoundRecord {
            round: name,
            investment,
            pre_money: pre,
            post_money: post,
            new_investor_pct: fraction * HUNDRED,
            cumulative_investment: total_investment,
            ownership: ownership.clone(),
            unallocated,
            overridden,
        });
    }

    let exit_valuation = current_valuation;
    let total_return = exit_valuation - total_investment;
    let roi_of = |amount: Decimal| {
        if total_investment.is_zero() {
            None
        } else {
            Some(amount / total_investment)
        }
    };

    let holder_returns: BTreeMap<String, HolderReturn> = ownership
        .iter()
        .map(|(holder, fraction)| {
            let return_amount = total_return * fraction;
            (
                holder.to_string(),
                HolderReturn {
                    final_fraction: fraction,
                    return_amount,
                    roi: roi_of(return_amount),
                },
            )
        })
        .collect();

    let output = EquityReturnsOutput {
        rounds: records,
        final_distribution: ownership,
        unallocated,
        holder_returns,
        total_investment,
        exit_valuation,
        total_return,
        overall_roi: roi_of(total_return),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Multi-Round Equity Returns (exit at final post-money)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

fn validate_equity_input(input: &EquityReturnsInput) -> VentureFinanceResult<()> {
    if input.initial_valuation <= Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "initial_valuation",
            "Initial valuation must be positive",
        ));
    }
    for (name, fraction) in input.partners.iter() {
        if fraction < Decimal::ZERO {
            return Err(VentureFinanceError::invalid(
                format!("partners.{name}"),
                "Partner fraction must not be negative",
            ));
        }
    }
    if input.partners.total() > Decimal::ONE {
        return Err(VentureFinanceError::invalid(
            "partners",
            "Partner fractions must not exceed 1 in total",
        ));
    }
    for (idx, round) in input.rounds.iter().enumerate() {
        if round.amount <= Decimal::ZERO {
            return Err(VentureFinanceError::invalid(
                format!("rounds[{idx}].amount"),
                "Investment amount must be positive",
            ));
        }
    }
    for (name, target) in &input.investor_overrides {
        if *target <= Decimal::ZERO || *target >= Decimal::ONE {
            return Err(VentureFinanceError::invalid(
                format!("investor_overrides.{name}"),
                "Override fraction must be strictly between 0 and 1",
            ));
        }
    }
    Ok(())
}

// ─── Partner contribution analysis ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerContributionInput {
    /// Partner → initial cash contribution.
    pub initial_investments: BTreeMap<String, Money>,
    #[serde(default)]
    pub rounds: Vec<LegacyRound>,
    pub exit_valuation: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerContribution {
    pub initial_investment: Money,
    /// Share of the initial pool, 0–100.
    pub investment_pct: Percent,
    /// Diluted ownership after all rounds, 0–100.
    pub diluted_equity_pct: Percent,
    pub theoretical_return: Money,
    pub actual_return: Money,
    pub difference: Money,
    /// `actual_return / initial_investment`; None for a zero contribution.
    pub return_multiple: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerContributionOutput {
    pub partners: BTreeMap<String, PartnerContribution>,
    pub total_initial_investment: Money,
    pub total_investment: Money,
    pub exit_valuation: Money,
    pub total_return: Money,
}

/// Compare what each partner would earn by contribution share against what
/// their diluted equity actually entitles them to at exit.
pub fn analyze_partner_contribution(
    input: &PartnerContributionInput,
) -> VentureFinanceResult<ComputationOutput<PartnerContributionOutput>> {
    let start = Instant::now();

    if input.initial_investments.is_empty() {
        return Err(VentureFinanceError::InsufficientData(
            "At least one partner contribution is required".into(),
        ));
    }
    for (name, amount) in &input.initial_investments {
        if *amount < Decimal::ZERO {
            return Err(VentureFinanceError::invalid(
                format!("initial_investments.{name}"),
                "Contribution must not be negative",
            ));
        }
    }
    if input.exit_valuation < Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "exit_valuation",
            "Exit valuation must not be negative",
        ));
    }

    let total_initial: Money = input.initial_investments.values().copied().sum();
    if total_initial <= Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "initial_investments",
            "Total initial investment must be positive",
        ));
    }
    let round_total: Money = input.rounds.iter().map(|r| r.amount).sum();
    let total_investment = total_initial + round_total;
    let total_return = input.exit_valuation - total_investment;

    let split: OwnershipMap = input
        .initial_investments
        .iter()
        .map(|(name, amount)| (name.clone(), *amount / total_initial))
        .collect();

    let diluted = run_dilution(&DilutionInput {
        initial_pre_money: Some(total_initial),
        rounds: input.rounds.iter().cloned().map(RoundEntry::Legacy).collect(),
        founders: Some(split.clone()),
    })?;

    let partners = split
        .iter()
        .map(|(name, ratio)| {
            let initial = input.initial_investments.get(name).copied().unwrap_or_default();
            let equity = diluted.result.final_ownership.get(name).unwrap_or(ratio);
            let theoretical = total_return * ratio;
            let actual = total_return * equity;
            let multiple = if initial.is_zero() {
                None
            } else {
                Some(actual / initial)
            };
            (
                name.to_string(),
                PartnerContribution {
                    initial_investment: initial,
                    investment_pct: ratio * HUNDRED,
                    diluted_equity_pct: equity * HUNDRED,
                    theoretical_return: theoretical,
                    actual_return: actual,
                    difference: actual - theoretical,
                    return_multiple: multiple,
                },
            )
        })
        .collect();

    let output = PartnerContributionOutput {
        partners,
        total_initial_investment: total_initial,
        total_investment,
        exit_valuation: input.exit_valuation,
        total_return,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Partner Contribution Analysis (contribution share vs diluted equity)",
        input,
        diluted.warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn close(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.0001)
    }

    fn round(name: &str, amount: Decimal) -> LegacyRound {
        LegacyRound {
            amount,
            round: Some(name.into()),
        }
    }

    fn base_input() -> EquityReturnsInput {
        EquityReturnsInput {
            initial_valuation: dec!(1000),
            rounds: vec![round("Seed", dec!(250)), round("A", dec!(750))],
            partners: OwnershipMap::new()
                .with("alice", dec!(0.5))
                .with("bob", dec!(0.3)),
            investor_overrides: BTreeMap::new(),
        }
    }

    #[test]
    fn test_implied_fractions_and_exit() {
        let out = run_equity_returns(&base_input()).unwrap().result;

        assert_eq!(out.rounds[0].post_money, dec!(1250));
        assert_eq!(out.rounds[1].pre_money, dec!(1250));
        assert_eq!(out.rounds[1].post_money, dec!(2000));
        assert_eq!(out.exit_valuation, dec!(2000));
        assert_eq!(out.total_investment, dec!(1000));
        assert_eq!(out.total_return, dec!(1000));
        assert!(close(out.rounds[0].new_investor_pct, dec!(20)));
        assert!(close(out.rounds[1].new_investor_pct, dec!(37.5)));
    }

    #[test]
    fn test_unallocated_diluted_alongside() {
        let out = run_equity_returns(&base_input()).unwrap().result;
        // 0.2 * 0.8 * 0.625
        assert!(close(out.unallocated, dec!(0.1)));
        assert!(close(out.final_distribution.total() + out.unallocated, Decimal::ONE));
    }

    #[test]
    fn test_holder_returns_split_by_fraction() {
        let out = run_equity_returns(&base_input()).unwrap().result;
        let alice = &out.holder_returns["alice"];
        // 0.5 * 0.8 * 0.625 = 0.25
        assert!(close(alice.final_fraction, dec!(0.25)));
        assert!(close(alice.return_amount, dec!(250)));
        assert!(close(alice.roi.unwrap(), dec!(0.25)));
        assert!(close(out.overall_roi.unwrap(), Decimal::ONE));
    }

    #[test]
    fn test_override_recomputes_investment() {
        let mut input = base_input();
        input.investor_overrides.insert("Seed".into(), dec!(0.5));
        let out = run_equity_returns(&input).unwrap();
        let seed = &out.result.rounds[0];

        assert!(seed.overridden);
        assert_eq!(seed.investment, dec!(1000));
        assert_eq!(seed.post_money, dec!(2000));
        assert_eq!(seed.post_money, seed.pre_money + seed.investment);
        assert!(close(seed.new_investor_pct, dec!(50)));
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_override_within_tolerance_ignored() {
        let mut input = base_input();
        input.investor_overrides.insert("Seed".into(), dec!(0.2005));
        let out = run_equity_returns(&input).unwrap().result;
        assert!(!out.rounds[0].overridden);
        assert_eq!(out.rounds[0].investment, dec!(250));
    }

    #[test]
    fn test_partners_over_one_rejected() {
        let mut input = base_input();
        input.partners = OwnershipMap::new().with("alice", dec!(0.7)).with("bob", dec!(0.4));
        assert!(run_equity_returns(&input).is_err());
    }

    #[test]
    fn test_no_rounds_means_no_roi() {
        let mut input = base_input();
        input.rounds.clear();
        let out = run_equity_returns(&input).unwrap().result;
        assert_eq!(out.total_investment, Decimal::ZERO);
        assert!(out.overall_roi.is_none());
        assert!(out.holder_returns["alice"].roi.is_none());
    }

    // ── Partner contribution ─────────────────────────────────────────

    fn contribution_input() -> PartnerContributionInput {
        let mut initial = BTreeMap::new();
        initial.insert("alice".to_string(), dec!(600));
        initial.insert("bob".to_string(), dec!(400));
        initial.insert("carol".to_string(), dec!(0));
        PartnerContributionInput {
            initial_investments: initial,
            rounds: vec![round("A", dec!(1000))],
            exit_valuation: dec!(5000),
        }
    }

    #[test]
    fn test_contribution_ratios_and_dilution() {
        let out = analyze_partner_contribution(&contribution_input()).unwrap().result;
        assert_eq!(out.total_initial_investment, dec!(1000));
        assert_eq!(out.total_investment, dec!(2000));
        assert_eq!(out.total_return, dec!(3000));

        let alice = &out.partners["alice"];
        assert!(close(alice.investment_pct, dec!(60)));
        // 0.6 * (1 - 1000/2000)
        assert!(close(alice.diluted_equity_pct, dec!(30)));
        assert!(close(alice.theoretical_return, dec!(1800)));
        assert!(close(alice.actual_return, dec!(900)));
        assert!(close(alice.difference, dec!(-900)));
        assert!(close(alice.return_multiple.unwrap(), dec!(1.5)));
    }

    #[test]
    fn test_zero_contribution_has_no_multiple() {
        let out = analyze_partner_contribution(&contribution_input()).unwrap().result;
        assert!(out.partners["carol"].return_multiple.is_none());
    }

    #[test]
    fn test_without_rounds_actual_equals_theoretical() {
        let mut input = contribution_input();
        input.rounds.clear();
        let out = analyze_partner_contribution(&input).unwrap().result;
        let bob = &out.partners["bob"];
        assert!(close(bob.actual_return, bob.theoretical_return));
    }

    #[test]
    fn test_zero_total_contribution_rejected() {
        let mut input = contribution_input();
        for v in input.initial_investments.values_mut() {
            *v = Decimal::ZERO;
        }
        assert!(analyze_partner_contribution(&input).is_err());
    }
}
