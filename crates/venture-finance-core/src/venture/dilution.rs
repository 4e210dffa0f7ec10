use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::VentureFinanceError;
use crate::types::{with_metadata, ComputationOutput, Money, OwnershipMap, Percent};
use crate::VentureFinanceResult;

use super::resolver::{inconsistency_warning, resolve_round, LockSet, RoundValues};

const HUNDRED: Decimal = dec!(100);
pub(crate) const OWNERSHIP_DRIFT_TOLERANCE: Decimal = dec!(0.000000001);
pub const DEFAULT_FOUNDER_HOLDER: &str = "founders";

// ─── Round inputs ────────────────────────────────────────────────────────────

/// A fully-fielded round: any subset of the four quantities plus locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSpec {
    pub name: String,
    #[serde(flatten)]
    pub values: RoundValues,
    #[serde(default)]
    pub locked: LockSet,
}

/// Legacy round shape: an amount and an optional label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyRound {
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<String>,
}

impl LegacyRound {
    pub fn label(&self, idx: usize) -> String {
        self.round
            .clone()
            .unwrap_or_else(|| format!("Round_{}", idx + 1))
    }
}

/// Either round shape, as accepted from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoundEntry {
    Legacy(LegacyRound),
    Spec(RoundSpec),
}

/// Parse a raw JSON round list, rejecting anything that is not a list of objects.
pub fn parse_rounds(value: &serde_json::Value) -> VentureFinanceResult<Vec<RoundEntry>> {
    let items = value
        .as_array()
        .ok_or_else(|| VentureFinanceError::invalid("rounds", "Rounds must be a list"))?;

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            if !item.is_object() {
                return Err(VentureFinanceError::invalid(
                    format!("rounds[{idx}]"),
                    "Investment round must be an object",
                ));
            }
            serde_json::from_value(item.clone())
                .map_err(|e| VentureFinanceError::invalid(format!("rounds[{idx}]"), e.to_string()))
        })
        .collect()
}

/// Convert every entry into a `RoundSpec`. Legacy rounds inherit their
/// pre-money from the running post-money and carry no locks.
pub fn normalize_rounds(rounds: &[RoundEntry]) -> VentureFinanceResult<Vec<RoundSpec>> {
    rounds
        .iter()
        .enumerate()
        .map(|(idx, entry)| match entry {
            RoundEntry::Legacy(legacy) => {
                if legacy.amount <= Decimal::ZERO {
                    return Err(VentureFinanceError::invalid(
                        format!("rounds[{idx}].amount"),
                        "Investment amount must be positive",
                    ));
                }
                Ok(RoundSpec {
                    name: legacy.label(idx),
                    values: RoundValues {
                        investment: Some(legacy.amount),
                        ..Default::default()
                    },
                    locked: LockSet::new(),
                })
            }
            RoundEntry::Spec(spec) => {
                validate_spec(idx, spec)?;
                Ok(spec.clone())
            }
        })
        .collect()
}

fn validate_spec(idx: usize, spec: &RoundSpec) -> VentureFinanceResult<()> {
    let checks = [
        ("pre_money", spec.values.pre_money),
        ("post_money", spec.values.post_money),
        ("investment", spec.values.investment),
    ];
    for (field, value) in checks {
        if let Some(v) = value {
            if v <= Decimal::ZERO {
                return Err(VentureFinanceError::invalid(
                    format!("rounds[{idx}].{field}"),
                    "Must be positive",
                ));
            }
        }
    }
    Ok(())
}

// ─── Main dilution ledger ────────────────────────────────────────────────────

/// Input for a multi-round dilution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilutionInput {
    /// Seeds round 0's pre-money when the round leaves it unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_pre_money: Option<Money>,
    pub rounds: Vec<RoundEntry>,
    /// Founder split (fractions summing to 1). Defaults to a single
    /// `founders` holder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founders: Option<OwnershipMap>,
}

/// One row of the dilution ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilutionLedgerEntry {
    pub round: String,
    pub pre_money: Money,
    pub investment: Money,
    pub post_money: Money,
    /// Cumulative founder ownership after this round, 0–100.
    pub founders_pct: Percent,
    /// This round's new-investor ownership, 0–100.
    pub new_investor_pct: Percent,
    /// Every holder's fraction after this round.
    pub ownership: OwnershipMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilutionOutput {
    pub ledger: Vec<DilutionLedgerEntry>,
    pub final_founders_pct: Percent,
    pub final_ownership: OwnershipMap,
}

/// Chain rounds through the resolver and accumulate founder dilution.
///
/// Each round's post-money becomes the next round's pre-money unless the
/// round supplies its own. Founders are diluted by `1 - investor_pct / 100`
/// every round and a holder `investor-<round>` is added at that fraction.
pub fn run_dilution(input: &DilutionInput) -> VentureFinanceResult<ComputationOutput<DilutionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if let Some(initial) = input.initial_pre_money {
        if initial <= Decimal::ZERO {
            return Err(VentureFinanceError::invalid(
                "initial_pre_money",
                "Initial valuation must be positive",
            ));
        }
    }

    let initial_ownership = match &input.founders {
        Some(split) => validate_founder_split(split)?,
        None => OwnershipMap::new().with(DEFAULT_FOUNDER_HOLDER, Decimal::ONE),
    };

    let rounds = normalize_rounds(&input.rounds)?;

    let mut previous_post = input.initial_pre_money;
    let mut founders_fraction = Decimal::ONE;
    let mut ownership = initial_ownership;
    let mut ledger: Vec<DilutionLedgerEntry> = Vec::with_capacity(rounds.len());

    for (idx, round) in rounds.iter().enumerate() {
        let mut values = round.values.clone();
        if values.pre_money.is_none() {
            values.pre_money = previous_post;
        }

        let resolved = resolve_round(&values, &round.locked).map_err(|e| prefix_field(idx, e))?;
        if resolved.post_money <= Decimal::ZERO {
            return Err(VentureFinanceError::invalid(
                format!("rounds[{idx}]"),
                format!(
                    "Round '{}' cannot be resolved to a positive post-money valuation",
                    round.name
                ),
            ));
        }
        if !resolved.consistent {
            warnings.push(inconsistency_warning(&round.name, &round.locked));
        }

        let fraction = resolved.investor_fraction();
        let factor = Decimal::ONE - fraction;
        founders_fraction *= factor;

        let holder = investor_holder(&round.name);
        let (next, replaced) = ownership.diluted(factor, Some((holder.as_str(), fraction)));
        if replaced {
            warnings.push(duplicate_round_warning(&round.name));
        }
        if let Some(w) = drift_warning(&round.name, next.total()) {
            warnings.push(w);
        }
        ownership = next;

        ledger.push(DilutionLedgerEntry {
            round: round.name.clone(),
            pre_money: resolved.pre_money,
            investment: resolved.investment,
            post_money: resolved.post_money,
            founders_pct: founders_fraction * HUNDRED,
            new_investor_pct: resolved.investor_pct,
            ownership: ownership.clone(),
        });

        previous_post = Some(resolved.post_money);
    }

    tracing::debug!(
        rounds = ledger.len(),
        founders_pct = %(founders_fraction * HUNDRED),
        "dilution run complete"
    );

    let output = DilutionOutput {
        ledger,
        final_founders_pct: founders_fraction * HUNDRED,
        final_ownership: ownership,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Multi-Round Dilution (flexible-field round resolution)",
        &serde_json::json!({
            "initial_pre_money": input.initial_pre_money.map(|v| v.to_string()),
            "num_rounds": rounds.len(),
            "round_names": rounds.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

pub(crate) fn investor_holder(round_name: &str) -> String {
    format!("investor-{round_name}")
}

pub(crate) fn duplicate_round_warning(round_name: &str) -> String {
    tracing::warn!(round = round_name, "duplicate round name overwrites earlier investor entry");
    format!("Round name '{round_name}' repeats; its investor entry overwrites the earlier one")
}

pub(crate) fn drift_warning(round_name: &str, total: Decimal) -> Option<String> {
    if (total - Decimal::ONE).abs() <= OWNERSHIP_DRIFT_TOLERANCE {
        return None;
    }
    tracing::warn!(round = round_name, total = %total, "ownership fractions drift from 1");
    Some(format!(
        "Ownership fractions after '{round_name}' sum to {total}, not 1"
    ))
}

fn validate_founder_split(split: &OwnershipMap) -> VentureFinanceResult<OwnershipMap> {
    if split.is_empty() {
        return Err(VentureFinanceError::invalid(
            "founders",
            "At least one founder is required",
        ));
    }
    for (name, fraction) in split.iter() {
        if fraction < Decimal::ZERO || fraction > Decimal::ONE {
            return Err(VentureFinanceError::invalid(
                format!("founders.{name}"),
                "Founder fraction must be between 0 and 1",
            ));
        }
    }
    if (split.total() - Decimal::ONE).abs() > OWNERSHIP_DRIFT_TOLERANCE {
        return Err(VentureFinanceError::invalid(
            "founders",
            format!("Founder fractions must sum to 1, got {}", split.total()),
        ));
    }
    Ok(split.clone())
}

fn prefix_field(idx: usize, e: VentureFinanceError) -> VentureFinanceError {
    match e {
        VentureFinanceError::InvalidInput { field, reason } => VentureFinanceError::InvalidInput {
            field: format!("rounds[{idx}].{field}"),
            reason,
        },
        other => other,
    }
}

// ─── Joint-venture dilution ──────────────────────────────────────────────────

/// Initial contributions of the three joint-venture parties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JvInitialInvestments {
    #[serde(default, alias = "ag_inno")]
    pub sponsor: Money,
    #[serde(default)]
    pub partner: Money,
    #[serde(default)]
    pub grant: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JvDilutionInput {
    pub initial_investments: JvInitialInvestments,
    pub rounds: Vec<LegacyRound>,
}

/// One row of the joint-venture ledger. Ownership columns are fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JvLedgerEntry {
    pub round: String,
    pub pre_money: Money,
    pub investment: Money,
    pub post_money: Money,
    pub sponsor_fraction: Decimal,
    pub partner_fraction: Decimal,
    pub grant_fraction: Decimal,
    /// Complement of the three named parties; never diluted directly.
    pub external_fraction: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JvDilutionOutput {
    pub ledger: Vec<JvLedgerEntry>,
    pub final_ownership: OwnershipMap,
}

/// Dilute three named joint-venture parties through successive rounds.
///
/// Initial fractions are each party's share of the total initial
/// contribution; that total is round 0's pre-money.
pub fn run_jv_dilution(
    input: &JvDilutionInput,
) -> VentureFinanceResult<ComputationOutput<JvDilutionOutput>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

    let inv = &input.initial_investments;
    for (field, amount) in [
        ("sponsor", inv.sponsor),
        ("partner", inv.partner),
        ("grant", inv.grant),
    ] {
        if amount < Decimal::ZERO {
            return Err(VentureFinanceError::invalid(
                format!("initial_investments.{field}"),
                "Initial investment must not be negative",
            ));
        }
    }

    let total_initial = inv.sponsor + inv.partner + inv.grant;
    if total_initial <= Decimal::ZERO {
        return Err(VentureFinanceError::invalid(
            "initial_investments",
            "Total initial investment must be positive",
        ));
    }

    let mut sponsor = inv.sponsor / total_initial;
    let mut partner = inv.partner / total_initial;
    let mut grant = inv.grant / total_initial;

    let mut current_total = total_initial;
    let mut ledger: Vec<JvLedgerEntry> = Vec::with_capacity(input.rounds.len());

    for (idx, round) in input.rounds.iter().enumerate() {
        if round.amount <= Decimal::ZERO {
            return Err(VentureFinanceError::invalid(
                format!("rounds[{idx}].amount"),
                "Investment amount must be positive",
            ));
        }

        let post = current_total + round.amount;
        let factor = Decimal::ONE - round.amount / post;

        sponsor *= factor;
        partner *= factor;
        grant *= factor;

        ledger.push(JvLedgerEntry {
            round: round.label(idx),
            pre_money: current_total,
            investment: round.amount,
            post_money: post,
            sponsor_fraction: sponsor,
            partner_fraction: partner,
            grant_fraction: grant,
            external_fraction: Decimal::ONE - (sponsor + partner + grant),
        });

        current_total = post;
    }

    let final_ownership = OwnershipMap::new()
        .with("sponsor", sponsor)
        .with("partner", partner)
        .with("grant", grant)
        .with("external", Decimal::ONE - (sponsor + partner + grant));

    let output = JvDilutionOutput {
        ledger,
        final_ownership,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Joint-Venture Dilution (proportional, external residual)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
