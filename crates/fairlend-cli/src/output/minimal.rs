use serde_json::Value;

/// Print just the headline figure.
///
/// Reports print their record count (and adverse count when present);
/// summaries print the first well-known result field, falling back to the
/// first field of the result object.
pub fn print_minimal(value: &Value) {
    if let Some(metadata) = value.get("metadata").filter(|_| value.get("records").is_some()) {
        let total = metadata
            .get("totalRecords")
            .cloned()
            .or_else(|| value.get("records").and_then(Value::as_array).map(|r| r.len().into()))
            .unwrap_or(Value::Null);
        match metadata.get("adverseRecords") {
            Some(adverse) => println!(
                "{} records ({} adverse)",
                format_minimal(&total),
                format_minimal(adverse)
            ),
            None => println!("{} records", format_minimal(&total)),
        }
        return;
    }

    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "total_damages",
        "avg_gap",
        "avg_ratio",
        "total_loans",
        "valid",
    ];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}: {}", key, format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
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
