use serde_json::Value;

use fairlend_core::disparity::records::MetricRecord;

/// A computed report as written by `fairlend compute`.
#[derive(Debug)]
pub struct Report {
    pub metadata: Value,
    pub records: Vec<MetricRecord>,
}

/// Accept either a `{ "metadata": ..., "records": [...] }` report or a bare
/// array of metric records.
pub fn parse_report(value: Value) -> Result<Report, Box<dyn std::error::Error>> {
    let (metadata, raw) = match value {
        Value::Array(items) => (Value::Null, items),
        Value::Object(mut map) => {
            let raw = match map.remove("records") {
                Some(Value::Array(items)) => items,
                _ => return Err("report has no `records` array".into()),
            };
            (map.remove("metadata").unwrap_or(Value::Null), raw)
        }
        _ => return Err("report must be a JSON object or array".into()),
    };

    let records = raw
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            serde_json::from_value::<MetricRecord>(v)
                .map_err(|e| format!("Invalid metric record at index {}: {}", i, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Report { metadata, records })
}
