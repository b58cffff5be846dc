//! Aggregate (input) and metric (output) record types.
//!
//! Aggregate records are produced by the warehouse query stage: one row per
//! geography × year × kind × loan purpose × metric × bank type. Metric
//! records are the reshaped rows handed to reporting, one per subject row.
//!
//! Categorical labels (`kind`, `loanPurpose`, `metric`) are permissive: any
//! label outside the known set is carried through verbatim.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::FairLendError;
use crate::types::{Count, Money, Multiple, Percent};
use crate::FairLendResult;

// ---------------------------------------------------------------------------
// Categorical labels
// ---------------------------------------------------------------------------

/// Which side of the comparison an aggregate row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankType {
    Subject,
    Peer,
}

/// Application vs origination counts. Every origination is also an
/// application in the source population.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoanKind {
    Applications,
    Originations,
    Unrecognized(String),
}

impl LoanKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Applications => "Applications",
            Self::Originations => "Originations",
            Self::Unrecognized(s) => s,
        }
    }
}

impl From<String> for LoanKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Applications" => Self::Applications,
            "Originations" => Self::Originations,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<&str> for LoanKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<LoanKind> for String {
    fn from(k: LoanKind) -> Self {
        match k {
            LoanKind::Unrecognized(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for LoanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan purpose category used by the query stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoanPurpose {
    HomePurchase,
    AllLoans,
    /// The literal "Other" purpose category.
    Other,
    Unrecognized(String),
}

impl LoanPurpose {
    pub fn as_str(&self) -> &str {
        match self {
            Self::HomePurchase => "Home Purchase",
            Self::AllLoans => "All Loans",
            Self::Other => "Other",
            Self::Unrecognized(s) => s,
        }
    }
}

impl From<String> for LoanPurpose {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Home Purchase" => Self::HomePurchase,
            "All Loans" => Self::AllLoans,
            "Other" => Self::Other,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<&str> for LoanPurpose {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<LoanPurpose> for String {
    fn from(p: LoanPurpose) -> Self {
        match p {
            LoanPurpose::Unrecognized(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for LoanPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Census-tract demographic concentration flag, or `Total` for the
/// unfiltered population.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Metric {
    BlackHispanic50,
    Mmct50,
    Black50,
    Hispanic50,
    BlackHispanic80,
    Mmct80,
    Black80,
    Hispanic80,
    Total,
    Unrecognized(String),
}

impl Metric {
    /// The nine metrics emitted by the query stage, in query order.
    pub const KNOWN: [Metric; 9] = [
        Metric::BlackHispanic50,
        Metric::Mmct50,
        Metric::Black50,
        Metric::Hispanic50,
        Metric::BlackHispanic80,
        Metric::Mmct80,
        Metric::Black80,
        Metric::Hispanic80,
        Metric::Total,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::BlackHispanic50 => "Black+Hispanic Tract 50%",
            Self::Mmct50 => "MMCT 50%",
            Self::Black50 => "Black Tract 50%",
            Self::Hispanic50 => "Hispanic Tract 50%",
            Self::BlackHispanic80 => "Black+Hispanic Tract 80%",
            Self::Mmct80 => "MMCT 80%",
            Self::Black80 => "Black Tract 80%",
            Self::Hispanic80 => "Hispanic Tract 80%",
            Self::Total => "Total",
            Self::Unrecognized(s) => s,
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(self, Self::Total)
    }
}

impl From<String> for Metric {
    fn from(s: String) -> Self {
        Metric::KNOWN
            .iter()
            .find(|m| m.as_str() == s)
            .cloned()
            .unwrap_or(Metric::Unrecognized(s))
    }
}

impl From<&str> for Metric {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Metric> for String {
    fn from(m: Metric) -> Self {
        match m {
            Metric::Unrecognized(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Aggregate records (input)
// ---------------------------------------------------------------------------

/// Geography labels must be present as keys, but may be null (rural areas
/// carry no CBSA).
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

/// One aggregate row from the query stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    #[serde(rename = "bank_type")]
    pub bank_type: BankType,
    #[serde(deserialize_with = "required_nullable")]
    pub state: Option<String>,
    #[serde(deserialize_with = "required_nullable")]
    pub cbsa: Option<String>,
    #[serde(deserialize_with = "required_nullable")]
    pub county: Option<String>,
    pub year: i32,
    pub kind: LoanKind,
    pub loan_purpose: LoanPurpose,
    pub metric: Metric,
    #[serde(default)]
    pub bank_count: Option<Count>,
    #[serde(default)]
    pub peer_count: Option<Count>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub avg_loan_amount: Option<Money>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub dollar_volume: Option<Money>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub peer_dollar_volume: Option<Money>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub peer_avg_loan_amount: Option<Money>,
}

/// Geography × year × kind × purpose. Share denominators are keyed on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SliceKey {
    pub state: Option<String>,
    pub cbsa: Option<String>,
    pub county: Option<String>,
    pub year: i32,
    pub kind: LoanKind,
    pub loan_purpose: LoanPurpose,
}

/// A slice plus its metric: the identity of one subject/peer pairing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub slice: SliceKey,
    pub metric: Metric,
}

impl AggregateRecord {
    pub fn is_subject(&self) -> bool {
        self.bank_type == BankType::Subject
    }

    pub fn is_peer(&self) -> bool {
        self.bank_type == BankType::Peer
    }

    /// The count belonging to this row's side; null counts read as zero.
    pub fn side_count(&self) -> Count {
        match self.bank_type {
            BankType::Subject => self.bank_count.unwrap_or(0),
            BankType::Peer => self.peer_count.unwrap_or(0),
        }
    }

    pub fn slice_key(&self) -> SliceKey {
        SliceKey {
            state: self.state.clone(),
            cbsa: self.cbsa.clone(),
            county: self.county.clone(),
            year: self.year,
            kind: self.kind.clone(),
            loan_purpose: self.loan_purpose.clone(),
        }
    }

    pub fn cell_key(&self) -> CellKey {
        CellKey {
            slice: self.slice_key(),
            metric: self.metric.clone(),
        }
    }
}

/// The query stage's output document: a `records` array plus a free-form
/// `metadata` object that is carried along uninterpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateDocument {
    pub records: Vec<AggregateRecord>,
    #[serde(default)]
    pub metadata: Value,
}

impl AggregateDocument {
    /// Parse a query-stage document, reporting the index of the first
    /// malformed record.
    pub fn from_value(value: Value) -> FairLendResult<Self> {
        let Value::Object(mut map) = value else {
            return Err(FairLendError::InvalidInput {
                field: "document".into(),
                reason: "Expected a JSON object with a `records` array.".into(),
            });
        };

        let raw_records = match map.remove("records") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(FairLendError::InvalidInput {
                    field: "records".into(),
                    reason: "`records` must be an array.".into(),
                })
            }
            None => {
                return Err(FairLendError::InvalidInput {
                    field: "records".into(),
                    reason: "Document has no `records` array.".into(),
                })
            }
        };

        let records = parse_aggregate_records(raw_records)?;
        let metadata = map.remove("metadata").unwrap_or(Value::Null);

        Ok(Self { records, metadata })
    }

    pub fn from_json(json: &str) -> FairLendResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }
}

/// Deserialize raw rows one by one so a contract break names its row.
pub fn parse_aggregate_records(raw: Vec<Value>) -> FairLendResult<Vec<AggregateRecord>> {
    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<AggregateRecord>(value).map_err(|e| {
                FairLendError::InvalidRecord {
                    index,
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Lender identity
// ---------------------------------------------------------------------------

/// The subject lender. `id` and `name` are stamped on every metric record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LenderIdentity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lei: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssd: Option<String>,
}

impl LenderIdentity {
    /// Build an identity whose id is the kebab-case slug of the display
    /// name ("Webster Bank" -> "webster-bank").
    pub fn from_name(name: &str) -> Self {
        Self {
            id: slugify(name),
            name: name.trim().to_string(),
            lei: None,
            rssd: None,
        }
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

// ---------------------------------------------------------------------------
// Metric records (output)
// ---------------------------------------------------------------------------

/// Which adverse-condition rule produced the stored shortfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdverseTrigger {
    /// Peer share / subject share above 1.
    RatioAboveParity,
    /// Subject share minus peer share below 0.
    NegativeGap,
}

/// One reshaped subject row with its peer comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub lender: String,
    pub lender_name: String,
    pub state: Option<String>,
    pub cbsa: Option<String>,
    pub county: Option<String>,
    pub year: i32,
    pub metric: Metric,
    pub loan_purpose: LoanPurpose,
    pub kind: LoanKind,
    pub bank_count: Count,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub bank_share: Option<Percent>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub peer_share: Option<Percent>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub gap: Option<Percent>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub ratio: Option<Multiple>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub avg_loan_amount: Option<Money>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub shortfall: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub damages: Option<Money>,
    #[serde(default)]
    pub adverse: bool,
    #[serde(default)]
    pub adverse_trigger: Option<AdverseTrigger>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subject_row() -> Value {
        json!({
            "bank_type": "subject",
            "state": "Connecticut",
            "cbsa": "New Haven-Milford, CT",
            "county": "New Haven County",
            "year": 2023,
            "kind": "Applications",
            "loanPurpose": "Home Purchase",
            "metric": "MMCT 50%",
            "bankCount": 20,
            "dollarVolume": 6000000.0,
            "avgLoanAmount": 300000.5,
            "peerCount": null,
            "peerDollarVolume": null,
            "peerAvgLoanAmount": null
        })
    }

    #[test]
    fn test_parse_subject_row() {
        let rec: AggregateRecord = serde_json::from_value(subject_row()).unwrap();
        assert_eq!(rec.bank_type, BankType::Subject);
        assert_eq!(rec.metric, Metric::Mmct50);
        assert_eq!(rec.loan_purpose, LoanPurpose::HomePurchase);
        assert_eq!(rec.bank_count, Some(20));
        assert_eq!(rec.peer_count, None);
        assert_eq!(rec.avg_loan_amount, Some(rust_decimal_macros::dec!(300000.5)));
        assert_eq!(rec.side_count(), 20);
    }

    #[test]
    fn test_unrecognized_labels_pass_through() {
        let mut row = subject_row();
        row["metric"] = json!("Asian Tract 50%");
        row["kind"] = json!("Purchases");
        row["loanPurpose"] = json!("Refinance");
        let rec: AggregateRecord = serde_json::from_value(row).unwrap();
        assert_eq!(rec.metric, Metric::Unrecognized("Asian Tract 50%".into()));
        assert_eq!(rec.kind.as_str(), "Purchases");
        assert_eq!(rec.loan_purpose.as_str(), "Refinance");

        let back = serde_json::to_value(&rec).unwrap();
        assert_eq!(back["metric"], json!("Asian Tract 50%"));
    }

    #[test]
    fn test_other_purpose_is_known_category() {
        assert_eq!(LoanPurpose::from("Other"), LoanPurpose::Other);
    }

    #[test]
    fn test_null_geography_accepted() {
        let mut row = subject_row();
        row["cbsa"] = Value::Null;
        let rec: AggregateRecord = serde_json::from_value(row).unwrap();
        assert!(rec.cbsa.is_none());
    }

    #[test]
    fn test_missing_geography_key_rejected() {
        let mut row = subject_row();
        row.as_object_mut().unwrap().remove("county");
        assert!(serde_json::from_value::<AggregateRecord>(row).is_err());
    }

    #[test]
    fn test_missing_counts_default_to_none() {
        let mut row = subject_row();
        let obj = row.as_object_mut().unwrap();
        obj.remove("bankCount");
        obj.remove("avgLoanAmount");
        let rec: AggregateRecord = serde_json::from_value(row).unwrap();
        assert_eq!(rec.bank_count, None);
        assert_eq!(rec.side_count(), 0);
        assert_eq!(rec.avg_loan_amount, None);
    }

    #[test]
    fn test_document_reports_bad_record_index() {
        let mut bad = subject_row();
        bad.as_object_mut().unwrap().remove("year");
        let doc = json!({ "records": [subject_row(), bad], "metadata": {} });
        match AggregateDocument::from_value(doc) {
            Err(FairLendError::InvalidRecord { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("year"), "got {reason}");
            }
            other => panic!("expected InvalidRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_document_requires_records() {
        let err = AggregateDocument::from_value(json!({ "metadata": {} })).unwrap_err();
        assert!(matches!(err, FairLendError::InvalidInput { .. }));
    }

    #[test]
    fn test_document_keeps_metadata() {
        let doc = json!({
            "records": [subject_row()],
            "metadata": { "bank": "Webster Bank", "rssd": "761806" }
        });
        let parsed = AggregateDocument::from_value(doc).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.metadata["rssd"], json!("761806"));
    }

    #[test]
    fn test_unknown_bank_type_rejected() {
        let mut row = subject_row();
        row["bank_type"] = json!("affiliate");
        assert!(serde_json::from_value::<AggregateRecord>(row).is_err());
    }

    #[test]
    fn test_lender_slug() {
        let lender = LenderIdentity::from_name("  Webster Bank, N.A. ");
        assert_eq!(lender.id, "webster-bank-n-a");
        assert_eq!(lender.name, "Webster Bank, N.A.");
    }

    #[test]
    fn test_cell_key_includes_metric() {
        let a: AggregateRecord = serde_json::from_value(subject_row()).unwrap();
        let mut b = a.clone();
        b.metric = Metric::Total;
        assert_eq!(a.slice_key(), b.slice_key());
        assert_ne!(a.cell_key(), b.cell_key());
    }
}
