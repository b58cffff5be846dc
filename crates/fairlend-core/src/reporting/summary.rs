//! Summary statistics over metric records.
//!
//! Averages skip null values; a set with no non-null values has no average
//! (`None`) rather than a zero average.

use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::disparity::records::MetricRecord;
use crate::reporting::grouping::{group_by_geography, GeographyLevel};
use crate::types::{Count, Money, Multiple, Percent};

/// Gap (percentage points) below which an area counts as under-performing.
pub const UNDERPERFORMING_GAP: Decimal = dec!(-5);

const AVERAGE_DP: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_loans: Count,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub avg_ratio: Option<Multiple>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub avg_gap: Option<Percent>,
    pub underperforming_areas: usize,
    pub total_records: usize,
    pub adverse_records: usize,
    pub records_with_damages: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_damages: Money,
}

fn mean(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let (sum, n) = values.fold((Decimal::ZERO, 0u64), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some((sum / Decimal::from(n)).round_dp(AVERAGE_DP))
    }
}

/// Summarize a set of records.
pub fn summarize(records: &[MetricRecord]) -> SummaryStats {
    SummaryStats {
        total_loans: records.iter().map(|r| r.bank_count).sum(),
        avg_ratio: mean(records.iter().filter_map(|r| r.ratio)),
        avg_gap: mean(records.iter().filter_map(|r| r.gap)),
        underperforming_areas: records
            .iter()
            .filter(|r| r.gap.is_some_and(|g| g < UNDERPERFORMING_GAP))
            .count(),
        total_records: records.len(),
        adverse_records: records.iter().filter(|r| r.adverse).count(),
        records_with_damages: records.iter().filter(|r| r.damages.is_some()).count(),
        total_damages: records.iter().filter_map(|r| r.damages).sum(),
    }
}

/// Summary of one geographic group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographySummary {
    pub key: String,
    pub state: Option<String>,
    pub cbsa: Option<String>,
    pub county: Option<String>,
    pub cbsa_count: usize,
    pub county_count: usize,
    #[serde(flatten)]
    pub stats: SummaryStats,
}

/// One summary per geographic group, in first-seen order.
pub fn summarize_by_geography(
    records: &[MetricRecord],
    level: GeographyLevel,
) -> Vec<GeographySummary> {
    group_by_geography(records, level)
        .into_iter()
        .map(|group| {
            let cbsa_count = group
                .records
                .iter()
                .filter_map(|r| r.cbsa.as_deref())
                .collect::<HashSet<_>>()
                .len();
            let county_count = group
                .records
                .iter()
                .filter_map(|r| r.county.as_deref())
                .collect::<HashSet<_>>()
                .len();
            GeographySummary {
                stats: summarize(&group.records),
                key: group.key,
                state: group.state,
                cbsa: group.cbsa,
                county: group.county,
                cbsa_count,
                county_count,
            }
        })
        .collect()
}

/// Record count and loan total for one year or one loan kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub label: String,
    pub records: usize,
    pub total_loans: Count,
}

fn accumulate(rows: &mut Vec<Breakdown>, label: String, loans: Count) {
    match rows.iter_mut().find(|b| b.label == label) {
        Some(b) => {
            b.records += 1;
            b.total_loans += loans;
        }
        None => rows.push(Breakdown {
            label,
            records: 1,
            total_loans: loans,
        }),
    }
}

/// Per-year breakdown, ascending by year.
pub fn breakdown_by_year(records: &[MetricRecord]) -> Vec<Breakdown> {
    let mut years: Vec<i32> = records.iter().map(|r| r.year).collect();
    years.sort_unstable();
    years.dedup();
    years
        .into_iter()
        .map(|year| {
            let in_year = records.iter().filter(|r| r.year == year);
            let (count, loans) = in_year.fold((0usize, 0u64), |(c, l), r| {
                (c + 1, l + r.bank_count)
            });
            Breakdown {
                label: year.to_string(),
                records: count,
                total_loans: loans,
            }
        })
        .collect()
}

/// Per-kind breakdown, first-seen order.
pub fn breakdown_by_kind(records: &[MetricRecord]) -> Vec<Breakdown> {
    let mut rows = Vec::new();
    for r in records {
        accumulate(&mut rows, r.kind.to_string(), r.bank_count);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disparity::records::{LoanKind, Metric};
    use crate::reporting::fixtures::record;

    fn sample() -> Vec<MetricRecord> {
        let mut records = vec![
            record(
                "Connecticut",
                "New Haven, CT",
                "New Haven County",
                2024,
                Metric::Mmct50,
                10,
                Some(dec!(-6)),
                Some(dec!(2)),
            ),
            record(
                "Connecticut",
                "New Haven, CT",
                "Middlesex County",
                2023,
                Metric::Mmct50,
                20,
                Some(dec!(2)),
                Some(dec!(0.5)),
            ),
            record(
                "Connecticut",
                "Hartford-West Hartford-East Hartford, CT",
                "Hartford County",
                2024,
                Metric::Black50,
                30,
                None,
                None,
            ),
            record(
                "Rhode Island",
                "Providence-Warwick, RI-MA",
                "Providence County",
                2022,
                Metric::Black50,
                40,
                Some(dec!(-1)),
                Some(dec!(1.1)),
            ),
        ];
        records[0].damages = Some(dec!(150000));
        records[3].damages = Some(dec!(25000));
        records[3].kind = LoanKind::Originations;
        records
    }

    #[test]
    fn test_summarize() {
        let s = summarize(&sample());
        assert_eq!(s.total_loans, 100);
        assert_eq!(s.total_records, 4);
        // (2 + 0.5 + 1.1) / 3 = 1.2
        assert_eq!(s.avg_ratio, Some(dec!(1.2)));
        // (-6 + 2 - 1) / 3 = -1.666.. → -1.67
        assert_eq!(s.avg_gap, Some(dec!(-1.67)));
        assert_eq!(s.underperforming_areas, 1);
        assert_eq!(s.adverse_records, 2);
        assert_eq!(s.records_with_damages, 2);
        assert_eq!(s.total_damages, dec!(175000));
    }

    #[test]
    fn test_summarize_empty() {
        let s = summarize(&[]);
        assert_eq!(s.total_loans, 0);
        assert_eq!(s.avg_ratio, None);
        assert_eq!(s.avg_gap, None);
        assert_eq!(s.total_damages, Decimal::ZERO);
    }

    #[test]
    fn test_gap_exactly_threshold_not_underperforming() {
        let records = vec![record(
            "Connecticut",
            "New Haven, CT",
            "New Haven County",
            2024,
            Metric::Total,
            1,
            Some(dec!(-5)),
            None,
        )];
        assert_eq!(summarize(&records).underperforming_areas, 0);
    }

    #[test]
    fn test_summarize_by_state() {
        let out = summarize_by_geography(&sample(), GeographyLevel::State);
        assert_eq!(out.len(), 2);
        let ct = &out[0];
        assert_eq!(ct.key, "Connecticut");
        assert_eq!(ct.cbsa_count, 2);
        assert_eq!(ct.county_count, 3);
        assert_eq!(ct.stats.total_loans, 60);
        assert_eq!(out[1].stats.total_loans, 40);
    }

    #[test]
    fn test_summary_serializes_flat() {
        let out = summarize_by_geography(&sample(), GeographyLevel::State);
        let v = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(v["total_loans"], serde_json::json!(60));
        assert!(v.get("stats").is_none());
    }

    #[test]
    fn test_breakdown_by_year() {
        let out = breakdown_by_year(&sample());
        let labels: Vec<&str> = out.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2022", "2023", "2024"]);
        assert_eq!(out[2].records, 2);
        assert_eq!(out[2].total_loans, 40);
    }

    #[test]
    fn test_breakdown_by_kind() {
        let out = breakdown_by_kind(&sample());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].label, "Applications");
        assert_eq!(out[0].total_loans, 60);
        assert_eq!(out[1].label, "Originations");
        assert_eq!(out[1].records, 1);
    }
}
