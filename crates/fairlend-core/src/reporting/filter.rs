//! Record filtering for drill-down views.

use serde::{Deserialize, Serialize};

use crate::disparity::records::{LoanKind, LoanPurpose, Metric, MetricRecord};

/// Filter criteria. `None` / empty criteria match every record; `years`
/// and `metrics` match any listed value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub lender: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub cbsa: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub years: Vec<i32>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub loan_purpose: Option<LoanPurpose>,
    #[serde(default)]
    pub kind: Option<LoanKind>,
}

fn label_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual.as_deref() == Some(w.as_str()),
    }
}

impl RecordFilter {
    pub fn matches(&self, record: &MetricRecord) -> bool {
        if let Some(lender) = &self.lender {
            if &record.lender != lender && &record.lender_name != lender {
                return false;
            }
        }
        if !label_matches(&self.state, &record.state)
            || !label_matches(&self.cbsa, &record.cbsa)
            || !label_matches(&self.county, &record.county)
        {
            return false;
        }
        if !self.years.is_empty() && !self.years.contains(&record.year) {
            return false;
        }
        if !self.metrics.is_empty() && !self.metrics.contains(&record.metric) {
            return false;
        }
        if let Some(purpose) = &self.loan_purpose {
            if &record.loan_purpose != purpose {
                return false;
            }
        }
        if let Some(kind) = &self.kind {
            if &record.kind != kind {
                return false;
            }
        }
        true
    }
}

/// Records matching `filter`, in input order.
pub fn filter_records(records: &[MetricRecord], filter: &RecordFilter) -> Vec<MetricRecord> {
    records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect()
}
