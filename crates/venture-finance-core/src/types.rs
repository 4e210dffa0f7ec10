use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Percentages on the 0–100 scale (12.5 = 12.5%).
pub type Percent = Decimal;

/// Ordered per-period cash flows; index 0 is period 1.
pub type CashFlowSeries = Vec<Money>;

/// Holder name → ownership fraction in [0, 1].
///
/// Every round produces a fresh map; snapshots already handed out are never
/// touched again, so a ledger can keep one per round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnershipMap(BTreeMap<String, Decimal>);

impl OwnershipMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, holder: &str) -> Option<Decimal> {
        self.0.get(holder).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Sum of all fractions; ≈ 1 for a fully allocated cap table.
    pub fn total(&self) -> Decimal {
        self.0.values().copied().sum()
    }

    /// Returns a new snapshot with every existing holder scaled by `factor`
    /// and, if given, `new_holder` inserted at `new_fraction`.
    ///
    /// Returns `true` alongside the map when `new_holder` replaced an entry.
    pub fn diluted(&self, factor: Decimal, new_holder: Option<(&str, Decimal)>) -> (Self, bool) {
        let mut next: BTreeMap<String, Decimal> =
            self.0.iter().map(|(k, v)| (k.clone(), v * factor)).collect();
        let replaced = match new_holder {
            Some((name, fraction)) => next.insert(name.to_string(), fraction).is_some(),
            None => false,
        };
        (Self(next), replaced)
    }

    /// Insert or overwrite a holder, returning the updated snapshot.
    pub fn with(mut self, holder: impl Into<String>, fraction: Decimal) -> Self {
        self.0.insert(holder.into(), fraction);
        self
    }
}

impl FromIterator<(String, Decimal)> for OwnershipMap {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    wrap(methodology, assumptions, warnings, elapsed_us, result, "rust_decimal_128bit")
}

/// Same envelope for results computed in floating point (simulation statistics).
pub fn with_metadata_f64<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    wrap(methodology, assumptions, warnings, elapsed_us, result, "ieee754_f64")
}

fn wrap<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
    precision: &str,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: precision.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_diluted_leaves_source_snapshot_untouched() {
        let before = OwnershipMap::new().with("founders", dec!(1));
        let (after, replaced) = before.diluted(dec!(0.8), Some(("investor-Seed", dec!(0.2))));

        assert!(!replaced);
        assert_eq!(before.get("founders"), Some(dec!(1)));
        assert_eq!(after.get("founders"), Some(dec!(0.8)));
        assert_eq!(after.get("investor-Seed"), Some(dec!(0.2)));
        assert_eq!(after.total(), dec!(1.0));
    }

    #[test]
    fn test_diluted_reports_overwrite() {
        let map = OwnershipMap::new()
            .with("founders", dec!(0.8))
            .with("investor-A", dec!(0.2));
        let (next, replaced) = map.diluted(dec!(0.5), Some(("investor-A", dec!(0.5))));
        assert!(replaced);
        assert_eq!(next.get("investor-A"), Some(dec!(0.5)));
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn test_ownership_map_serializes_as_plain_object() {
        let map = OwnershipMap::new().with("founders", dec!(0.75));
        let json = serde_json::to_value(&map).unwrap();
        assert!(json.is_object());
        assert!(json.get("founders").is_some());
    }
}
