use serde_json::Value;

/// Headline fields, most specific first.
const PRIORITY_KEYS: [&str; 8] = [
    "solved_value",
    "irr_pct",
    "base_irr_pct",
    "mean_value",
    "value_at_risk_95",
    "npv",
    "moic",
    "name",
];

/// Nested sections searched after the top level of the result.
const SECTIONS: [&str; 4] = ["returns", "base_case", "summary", "risk_metrics"];

/// Print just the key answer value from the output.
///
/// Looks for a headline field in the result, then inside its well-known
/// sections, then falls back to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(found) = find_headline(result_obj) {
        println!("{}", format_minimal(found));
        return;
    }

    if let Value::Object(map) = result_obj {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn find_headline(result: &Value) -> Option<&Value> {
    let map = result.as_object()?;
    fn lookup(m: &serde_json::Map<String, Value>) -> Option<&Value> {
        PRIORITY_KEYS
            .iter()
            .filter_map(|k| m.get(*k))
            .find(|v| !v.is_null())
    }

    lookup(map).or_else(|| {
        SECTIONS
            .iter()
            .filter_map(|s| map.get(*s).and_then(Value::as_object))
            .find_map(lookup)
    })
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
