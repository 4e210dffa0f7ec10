use serde_json::{Map, Value};
use std::io;

/// Array results that read naturally as one CSV row per entry.
const ROW_KEYS: [&str; 3] = ["ledger", "rounds", "histogram"];

/// Write output as CSV to stdout.
///
/// Ledger-style results emit one row per round; everything else falls back
/// to a two-column field/value listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            let body = match map.get("result") {
                Some(Value::Object(result)) => result,
                _ => map,
            };
            match ledger_rows(body) {
                Some(rows) => write_rows(&mut wtr, rows),
                None => write_fields(&mut wtr, body),
            }
        }
        Value::Array(rows) => write_rows(&mut wtr, rows),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn ledger_rows(body: &Map<String, Value>) -> Option<&[Value]> {
    ROW_KEYS.iter().find_map(|key| match body.get(*key) {
        Some(Value::Array(rows)) if rows.first().is_some_and(Value::is_object) => {
            Some(rows.as_slice())
        }
        _ => None,
    })
}

fn write_fields<W: io::Write>(wtr: &mut csv::Writer<W>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
    }
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
        return;
    };

    // Nested ownership maps are flattened to one column per holder.
    let mut headers: Vec<String> = Vec::new();
    for (key, val) in first {
        match val {
            Value::Object(inner) => {
                headers.extend(inner.keys().map(|h| format!("{key}.{h}")));
            }
            _ => headers.push(key.clone()),
        }
    }
    for row in rows.iter().filter_map(Value::as_object) {
        for (key, val) in row {
            if let Value::Object(inner) = val {
                for h in inner.keys() {
                    let col = format!("{key}.{h}");
                    if !headers.contains(&col) {
                        headers.push(col);
                    }
                }
            }
        }
    }
    let _ = wtr.write_record(&headers);

    for row in rows.iter().filter_map(Value::as_object) {
        let record: Vec<String> = headers.iter().map(|h| cell(row, h)).collect();
        let _ = wtr.write_record(&record);
    }
}

fn cell(row: &Map<String, Value>, header: &str) -> String {
    if let Some(val) = row.get(header) {
        return format_csv_value(val);
    }
    header
        .split_once('.')
        .and_then(|(outer, inner)| row.get(outer)?.get(inner))
        .map(format_csv_value)
        .unwrap_or_default()
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
