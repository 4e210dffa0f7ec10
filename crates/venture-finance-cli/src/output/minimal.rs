use serde_json::Value;

/// The headline number per command, tried in order. Dotted entries walk
/// into nested summaries.
const PRIORITY_PATHS: [&str; 9] = [
    "final_founders_pct",
    "overall_roi",
    "investor_roi_multiple",
    "investor_roi",
    "summary.exit_valuation.mean",
    "exit_valuation",
    "post_money",
    "mean",
    "final_ownership",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", minimal_answer(value));
}

fn minimal_answer(value: &Value) -> String {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(found) = PRIORITY_PATHS
        .iter()
        .filter_map(|path| lookup(result, path))
        .find(|v| !v.is_null())
    {
        return format_minimal(found);
    }

    if let Value::Object(map) = result {
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, format_minimal(val));
        }
    }
    format_minimal(result)
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dilution_prints_founder_share() {
        let v = json!({ "result": { "ledger": [], "final_founders_pct": "64" } });
        assert_eq!(minimal_answer(&v), "64");
    }

    #[test]
    fn test_exit_risk_walks_into_summary() {
        let v = json!({
            "result": {
                "trials_requested": 100,
                "summary": { "exit_valuation": { "mean": 1234.5 } }
            }
        });
        assert_eq!(minimal_answer(&v), "1234.5");
    }

    #[test]
    fn test_null_roi_falls_through_to_exit_valuation() {
        let v = json!({ "result": { "investor_roi": null, "exit_valuation": "900" } });
        assert_eq!(minimal_answer(&v), "900");
    }

    #[test]
    fn test_unknown_shape_prints_first_field() {
        let v = json!({ "result": { "alpha": 1 } });
        assert_eq!(minimal_answer(&v), "alpha: 1");
    }
}
