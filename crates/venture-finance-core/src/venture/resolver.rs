use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

use crate::error::VentureFinanceError;
use crate::types::{with_metadata, ComputationOutput, Money, Percent};
use crate::VentureFinanceResult;

const HUNDRED: Decimal = dec!(100);
const CONSISTENCY_TOLERANCE: Decimal = dec!(0.000001);

// ─── Types ───────────────────────────────────────────────────────────────────

/// One of the four quantities describing a priced round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundField {
    PreMoney,
    PostMoney,
    Investment,
    InvestorPct,
}

impl RoundField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundField::PreMoney => "pre_money",
            RoundField::PostMoney => "post_money",
            RoundField::Investment => "investment",
            RoundField::InvestorPct => "investor_pct",
        }
    }
}

/// Fields the caller asserts as ground truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockSet(BTreeSet<RoundField>);

impl LockSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn with(mut self, field: RoundField) -> Self {
        self.0.insert(field);
        self
    }

    pub fn contains(&self, field: RoundField) -> bool {
        self.0.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RoundField> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<RoundField> for LockSet {
    fn from_iter<I: IntoIterator<Item = RoundField>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Partially specified round. `investor_pct` is on the 0–100 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_money: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_money: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investor_pct: Option<Percent>,
}

impl RoundValues {
    pub fn get(&self, field: RoundField) -> Option<Decimal> {
        match field {
            RoundField::PreMoney => self.pre_money,
            RoundField::PostMoney => self.post_money,
            RoundField::Investment => self.investment,
            RoundField::InvestorPct => self.investor_pct,
        }
    }

    /// Copy with every locked field blanked out.
    fn without(&self, locks: &LockSet) -> Self {
        let keep = |field: RoundField| {
            if locks.contains(field) {
                None
            } else {
                self.get(field)
            }
        };
        Self {
            pre_money: keep(RoundField::PreMoney),
            post_money: keep(RoundField::PostMoney),
            investment: keep(RoundField::Investment),
            investor_pct: keep(RoundField::InvestorPct),
        }
    }
}

/// Fully resolved round. `investor_pct` is on the 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRound {
    pub pre_money: Money,
    pub post_money: Money,
    pub investment: Money,
    pub investor_pct: Percent,
    /// False when the locked fields over-determine the round and
    /// `post = pre + investment`, `pct = investment / post` cannot both hold.
    pub consistent: bool,
}

impl ResolvedRound {
    /// New-investor ownership as a fraction in [0, 1].
    pub fn investor_fraction(&self) -> Decimal {
        self.investor_pct / HUNDRED
    }
}

/// Standalone resolver request (values plus locks).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveRoundInput {
    #[serde(flatten)]
    pub values: RoundValues,
    #[serde(default)]
    pub locked: LockSet,
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Resolve a round with no locked fields.
pub fn resolve(
    pre_money: Option<Money>,
    post_money: Option<Money>,
    investment: Option<Money>,
    investor_pct: Option<Percent>,
) -> VentureFinanceResult<ResolvedRound> {
    let values = RoundValues {
        pre_money,
        post_money,
        investment,
        investor_pct,
    };
    resolve_round(&values, &LockSet::new())
}

/// Derive the missing quantities of a round.
///
/// Locked fields are hidden from the derivation, restored verbatim
/// afterwards, and the unlocked fields are then re-solved against them.
/// Undeterminable fields come back as zero.
pub fn resolve_round(values: &RoundValues, locks: &LockSet) -> VentureFinanceResult<ResolvedRound> {
    validate_values(values, locks)?;

    let derived = derive(&values.without(locks));
    let resolved = if locks.is_empty() {
        derived
    } else {
        reconcile(derived, values, locks)
    };
    check_derived_range(&resolved)?;

    let consistent = is_consistent(&resolved);
    tracing::debug!(
        pre_money = %resolved.pre_money,
        post_money = %resolved.post_money,
        investment = %resolved.investment,
        investor_pct = %resolved.investor_pct,
        consistent,
        "resolved round"
    );

    Ok(ResolvedRound {
        consistent,
        ..resolved
    })
}

/// Resolve a single round and wrap it in the standard output envelope.
pub fn resolve_round_output(
    input: &ResolveRoundInput,
) -> VentureFinanceResult<ComputationOutput<ResolvedRound>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let resolved = resolve_round(&input.values, &input.locked)?;
    if !resolved.consistent {
        warnings.push(inconsistency_warning("round", &input.locked));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Round Resolution (rule-ordered derivation, locked-field reconciliation)",
        input,
        warnings,
        elapsed,
        resolved,
    ))
}

pub(crate) fn inconsistency_warning(round_name: &str, locks: &LockSet) -> String {
    let names: Vec<&str> = locks.iter().map(|f| f.as_str()).collect();
    tracing::warn!(round = round_name, locked = ?names, "locked fields over-determine round");
    format!(
        "{round_name}: locked fields [{}] over-determine the round; post = pre + investment \
         and investor_pct = investment / post cannot both hold",
        names.join(", ")
    )
}

// ─── Internal helpers ────────────────────────────────────────────────────────

fn validate_values(values: &RoundValues, locks: &LockSet) -> VentureFinanceResult<()> {
    for field in [
        RoundField::PreMoney,
        RoundField::PostMoney,
        RoundField::Investment,
    ] {
        if let Some(v) = values.get(field) {
            if v < Decimal::ZERO {
                return Err(VentureFinanceError::invalid(
                    field.as_str(),
                    "Must not be negative",
                ));
            }
        }
    }
    if let Some(p) = values.investor_pct {
        if p < Decimal::ZERO || p > HUNDRED {
            return Err(VentureFinanceError::invalid(
                "investor_pct",
                "Investor percentage must be between 0 and 100",
            ));
        }
    }
    for field in locks.iter() {
        if values.get(field).is_none() {
            return Err(VentureFinanceError::invalid(
                field.as_str(),
                "Field is locked but has no value",
            ));
        }
    }
    Ok(())
}

/// Phase one: rule-ordered derivation, first matching rule wins.
fn derive(v: &RoundValues) -> ResolvedRound {
    let mut pre = v.pre_money;
    let mut post = v.post_money;
    let mut inv = v.investment;
    let mut pct = v.investor_pct;

    match (pre, post, inv, pct) {
        (_, _, Some(i), Some(p)) if p > Decimal::ZERO => {
            let po = i / (p / HUNDRED);
            post = Some(po);
            pre = Some(po - i);
        }
        (_, Some(po), None, Some(p)) => {
            let i = po * p / HUNDRED;
            inv = Some(i);
            pre = Some(po - i);
        }
        (Some(pr), _, Some(i), _) => {
            post = Some(pr + i);
        }
        (None, Some(po), Some(i), _) => {
            pre = Some(po - i);
        }
        (Some(pr), Some(po), None, _) => {
            inv = Some(po - pr);
        }
        _ => {}
    }

    if pct.is_none() {
        if let Some(po) = post.filter(|po| *po > Decimal::ZERO) {
            pct = Some(inv.unwrap_or(Decimal::ZERO) / po * HUNDRED);
        }
    }

    ResolvedRound {
        pre_money: pre.unwrap_or(Decimal::ZERO),
        post_money: post.unwrap_or(Decimal::ZERO),
        investment: inv.unwrap_or(Decimal::ZERO),
        investor_pct: pct.unwrap_or(Decimal::ZERO),
        consistent: true,
    }
}

/// Phase two: restore locked values and re-solve the unlocked ones.
fn reconcile(derived: ResolvedRound, values: &RoundValues, locks: &LockSet) -> ResolvedRound {
    let locked = |f: RoundField| locks.contains(f);
    let pick = |f: RoundField, d: Decimal| {
        if locked(f) {
            values.get(f).unwrap_or(d)
        } else {
            d
        }
    };

    let mut pre = pick(RoundField::PreMoney, derived.pre_money);
    let mut post = pick(RoundField::PostMoney, derived.post_money);
    let mut inv = pick(RoundField::Investment, derived.investment);
    let mut pct = pick(RoundField::InvestorPct, derived.investor_pct);

    // post = pre + investment
    if !locked(RoundField::PostMoney) {
        post = pre + inv;
    } else if !locked(RoundField::Investment) {
        inv = post - pre;
    } else if !locked(RoundField::PreMoney) {
        pre = post - inv;
    }

    // pct = investment / post
    if !locked(RoundField::InvestorPct) {
        pct = if post > Decimal::ZERO {
            inv / post * HUNDRED
        } else {
            Decimal::ZERO
        };
    } else if !locked(RoundField::Investment) {
        let p = pct / HUNDRED;
        if locked(RoundField::PostMoney) {
            inv = post * p;
            if !locked(RoundField::PreMoney) {
                pre = post - inv;
            }
        } else if p < Decimal::ONE {
            inv = pre * p / (Decimal::ONE - p);
            post = pre + inv;
        }
    }

    ResolvedRound {
        pre_money: pre,
        post_money: post,
        investment: inv,
        investor_pct: pct,
        consistent: true,
    }
}

/// Contradictory inputs (post below investment, post below a locked pre)
/// derive negative amounts or a share above 100.
fn check_derived_range(r: &ResolvedRound) -> VentureFinanceResult<()> {
    for (field, value) in [
        (RoundField::PreMoney, r.pre_money),
        (RoundField::PostMoney, r.post_money),
        (RoundField::Investment, r.investment),
    ] {
        if value < Decimal::ZERO {
            return Err(VentureFinanceError::invalid(
                field.as_str(),
                format!("Resolves to a negative amount ({value}); the given fields contradict each other"),
            ));
        }
    }
    if r.investor_pct < Decimal::ZERO || r.investor_pct > HUNDRED {
        return Err(VentureFinanceError::invalid(
            "investor_pct",
            format!("Resolves to {}, outside 0-100", r.investor_pct),
        ));
    }
    Ok(())
}

fn is_consistent(r: &ResolvedRound) -> bool {
    let sum_ok = (r.post_money - (r.pre_money + r.investment)).abs() <= CONSISTENCY_TOLERANCE;
    let pct_ok = if r.post_money > Decimal::ZERO {
        (r.investor_pct - r.investment / r.post_money * HUNDRED).abs() <= CONSISTENCY_TOLERANCE
    } else {
        r.investment.is_zero()
    };
    sum_ok && pct_ok
}

// ─── Tests ───────────────────────────────────────────────────────────────────
