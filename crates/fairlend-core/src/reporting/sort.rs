//! Null-aware record sorting for report tables.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::disparity::records::MetricRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    County,
    State,
    Metric,
    Year,
    Ratio,
    Gap,
    BankShare,
    PeerShare,
    Damages,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

enum SortKey<'a> {
    Text(Option<&'a str>),
    Number(Option<Decimal>),
}

fn sort_key(record: &MetricRecord, field: SortField) -> SortKey<'_> {
    match field {
        SortField::County => SortKey::Text(record.county.as_deref()),
        SortField::State => SortKey::Text(record.state.as_deref()),
        SortField::Metric => SortKey::Text(Some(record.metric.as_str())),
        SortField::Year => SortKey::Number(Some(Decimal::from(record.year))),
        SortField::Ratio => SortKey::Number(record.ratio),
        SortField::Gap => SortKey::Number(record.gap),
        SortField::BankShare => SortKey::Number(record.bank_share),
        SortField::PeerShare => SortKey::Number(record.peer_share),
        SortField::Damages => SortKey::Number(record.damages),
    }
}

/// Nulls sort after every value in both directions.
fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => match direction {
            SortDirection::Asc => x.cmp(&y),
            SortDirection::Desc => y.cmp(&x),
        },
    }
}

fn compare(
    a: &MetricRecord,
    b: &MetricRecord,
    field: SortField,
    direction: SortDirection,
) -> Ordering {
    match (sort_key(a, field), sort_key(b, field)) {
        (SortKey::Text(x), SortKey::Text(y)) => nulls_last(x, y, direction),
        (SortKey::Number(x), SortKey::Number(y)) => nulls_last(x, y, direction),
        _ => Ordering::Equal,
    }
}

/// Stable in-place sort by one field.
pub fn sort_records(records: &mut [MetricRecord], field: SortField, direction: SortDirection) {
    records.sort_by(|a, b| compare(a, b, field, direction));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disparity::records::Metric;
    use crate::reporting::fixtures::record;
    use rust_decimal_macros::dec;

    fn sample() -> Vec<MetricRecord> {
        vec![
            record(
                "Connecticut",
                "New Haven, CT",
                "New Haven County",
                2024,
                Metric::Total,
                1,
                Some(dec!(-3)),
                None,
            ),
            record(
                "Connecticut",
                "New Haven, CT",
                "Middlesex County",
                2022,
                Metric::Total,
                2,
                None,
                None,
            ),
            record(
                "Connecticut",
                "New Haven, CT",
                "Fairfield County",
                2023,
                Metric::Total,
                3,
                Some(dec!(4)),
                None,
            ),
            record(
                "Connecticut",
                "New Haven, CT",
                "Hartford County",
                2023,
                Metric::Total,
                4,
                Some(dec!(-8)),
                None,
            ),
        ]
    }

    fn counts(records: &[MetricRecord]) -> Vec<u64> {
        records.iter().map(|r| r.bank_count).collect()
    }

    #[test]
    fn test_sort_gap_asc_nulls_last() {
        let mut records = sample();
        sort_records(&mut records, SortField::Gap, SortDirection::Asc);
        assert_eq!(counts(&records), vec![4, 1, 3, 2]);
    }

    #[test]
    fn test_sort_gap_desc_nulls_last() {
        let mut records = sample();
        sort_records(&mut records, SortField::Gap, SortDirection::Desc);
        assert_eq!(counts(&records), vec![3, 1, 4, 2]);
    }

    #[test]
    fn test_sort_county_text() {
        let mut records = sample();
        sort_records(&mut records, SortField::County, SortDirection::Asc);
        assert_eq!(records[0].county.as_deref(), Some("Fairfield County"));
        assert_eq!(records[3].county.as_deref(), Some("New Haven County"));
    }

    #[test]
    fn test_sort_year_is_stable() {
        let mut records = sample();
        sort_records(&mut records, SortField::Year, SortDirection::Asc);
        // 2023 ties keep input order (3 before 4)
        assert_eq!(counts(&records), vec![2, 3, 4, 1]);
    }
}
