use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Rate;

/// Analysis-wide defaults, usually loaded from an assumptions file.
///
/// Every field has a default so a partial file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    /// Display label only; no conversion is performed.
    pub currency: String,
    pub unit: String,
    pub discount_rate: Rate,
    pub growth_rate: Rate,
    pub montecarlo_trials: u32,
    pub cf_volatility: Decimal,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            currency: "CNY".into(),
            unit: "thousand".into(),
            discount_rate: dec!(0.12),
            growth_rate: dec!(0.03),
            montecarlo_trials: 10_000,
            cf_volatility: dec!(0.2),
        }
    }
}

impl Assumptions {
    /// Fill keys the caller left out of an exit / exit-risk JSON input.
    ///
    /// Keys already present are never overwritten.
    pub fn fill_exit_defaults(&self, input: &mut serde_json::Value) {
        let Some(map) = input.as_object_mut() else {
            return;
        };
        let defaults = [
            ("discount_rate", serde_json::json!(self.discount_rate.to_string())),
            ("growth_rate", serde_json::json!(self.growth_rate.to_string())),
            ("trials", serde_json::json!(self.montecarlo_trials)),
            ("cf_volatility", serde_json::json!(self.cf_volatility.to_string())),
        ];
        for (key, value) in defaults {
            map.entry(key).or_insert(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_configuration() {
        let a = Assumptions::default();
        assert_eq!(a.discount_rate, dec!(0.12));
        assert_eq!(a.growth_rate, dec!(0.03));
        assert_eq!(a.montecarlo_trials, 10_000);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let a: Assumptions =
            serde_json::from_value(serde_json::json!({ "discount_rate": "0.15" })).unwrap();
        assert_eq!(a.discount_rate, dec!(0.15));
        assert_eq!(a.growth_rate, dec!(0.03));
        assert_eq!(a.currency, "CNY");
    }

    #[test]
    fn test_fill_exit_defaults_does_not_override() {
        let a = Assumptions::default();
        let mut input = serde_json::json!({ "discount_rate": "0.2", "cash_flows": ["1"] });
        a.fill_exit_defaults(&mut input);
        assert_eq!(input["discount_rate"], "0.2");
        assert_eq!(input["growth_rate"], "0.03");
        assert_eq!(input["trials"], 10_000);
    }
}
