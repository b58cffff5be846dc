//! Share denominators per slice (geography × year × kind × purpose).
//!
//! Two denominator sources are supported. `SummedAcrossMetrics` adds every
//! row of a slice together regardless of metric; since the nine metrics
//! overlap (every tract-flagged loan is also in `Total`), this counts loans
//! more than once, but it reproduces previously published output.
//! `TotalMetric` uses only the `Total` rows, i.e. the unfiltered population.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::disparity::records::{AggregateRecord, BankType, SliceKey};
use crate::types::Count;

/// Where share denominators come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominatorMode {
    /// Sum counts across every metric row of the slice.
    #[default]
    SummedAcrossMetrics,
    /// Use the `Total`-metric row's count.
    TotalMetric,
}

impl DenominatorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SummedAcrossMetrics => "summed_across_metrics",
            Self::TotalMetric => "total_metric",
        }
    }

    fn counts(&self, record: &AggregateRecord) -> bool {
        match self {
            Self::SummedAcrossMetrics => true,
            Self::TotalMetric => record.metric.is_total(),
        }
    }
}

/// Subject and peer denominators of one slice. Zero means "no total".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTotals {
    pub bank_total: Count,
    pub peer_total: Count,
}

/// Build the slice → totals table. Every slice seen in the input gets an
/// entry, even if nothing contributed to it under the chosen mode.
pub fn build_group_totals(
    records: &[AggregateRecord],
    mode: DenominatorMode,
) -> HashMap<SliceKey, GroupTotals> {
    let mut totals: HashMap<SliceKey, GroupTotals> = HashMap::new();

    for record in records {
        let entry = totals.entry(record.slice_key()).or_default();
        if !mode.counts(record) {
            continue;
        }
        match record.bank_type {
            BankType::Subject => {
                entry.bank_total = entry.bank_total.saturating_add(record.side_count());
            }
            BankType::Peer => {
                entry.peer_total = entry.peer_total.saturating_add(record.side_count());
            }
        }
    }

    log::debug!(
        "totals: {} slices ({} denominators)",
        totals.len(),
        mode.as_str()
    );
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disparity::records::{LoanKind, LoanPurpose, Metric};

    fn row(bank_type: BankType, metric: Metric, count: Option<Count>) -> AggregateRecord {
        AggregateRecord {
            bank_type,
            state: Some("Connecticut".into()),
            cbsa: Some("New Haven, CT".into()),
            county: Some("New Haven County".into()),
            year: 2024,
            kind: LoanKind::Originations,
            loan_purpose: LoanPurpose::AllLoans,
            metric,
            bank_count: if bank_type == BankType::Subject { count } else { None },
            peer_count: if bank_type == BankType::Peer { count } else { None },
            avg_loan_amount: None,
            dollar_volume: None,
            peer_dollar_volume: None,
            peer_avg_loan_amount: None,
        }
    }

    fn sample() -> Vec<AggregateRecord> {
        vec![
            row(BankType::Subject, Metric::Mmct50, Some(20)),
            row(BankType::Subject, Metric::Black50, Some(5)),
            row(BankType::Subject, Metric::Total, Some(175)),
            row(BankType::Peer, Metric::Mmct50, Some(60)),
            row(BankType::Peer, Metric::Black50, None),
            row(BankType::Peer, Metric::Total, Some(140)),
        ]
    }

    #[test]
    fn test_summed_across_metrics() {
        let records = sample();
        let totals = build_group_totals(&records, DenominatorMode::SummedAcrossMetrics);
        assert_eq!(totals.len(), 1);
        let t = totals[&records[0].slice_key()];
        assert_eq!(t.bank_total, 200);
        assert_eq!(t.peer_total, 200);
    }

    #[test]
    fn test_total_metric_only() {
        let records = sample();
        let totals = build_group_totals(&records, DenominatorMode::TotalMetric);
        let t = totals[&records[0].slice_key()];
        assert_eq!(t.bank_total, 175);
        assert_eq!(t.peer_total, 140);
    }

    #[test]
    fn test_slice_without_total_row_is_zero() {
        let records = vec![row(BankType::Subject, Metric::Mmct50, Some(20))];
        let totals = build_group_totals(&records, DenominatorMode::TotalMetric);
        assert_eq!(totals[&records[0].slice_key()], GroupTotals::default());
    }

    #[test]
    fn test_kind_separates_slices() {
        let mut records = sample();
        let mut apps = row(BankType::Subject, Metric::Total, Some(300));
        apps.kind = LoanKind::Applications;
        records.push(apps.clone());
        let totals = build_group_totals(&records, DenominatorMode::SummedAcrossMetrics);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&apps.slice_key()].bank_total, 300);
        assert_eq!(totals[&apps.slice_key()].peer_total, 0);
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&DenominatorMode::TotalMetric).unwrap();
        assert_eq!(json, "\"total_metric\"");
        assert_eq!(DenominatorMode::default(), DenominatorMode::SummedAcrossMetrics);
    }
}
