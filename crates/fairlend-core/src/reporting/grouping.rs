//! Grouping by geographic level and distinct-value listings.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::disparity::records::MetricRecord;

/// Geographic roll-up level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeographyLevel {
    State,
    Cbsa,
    County,
}

impl GeographyLevel {
    /// Group key: `state`, `state-cbsa` or `state-cbsa-county`. Null labels
    /// render as empty strings.
    pub fn key_for(&self, record: &MetricRecord) -> String {
        let state = record.state.as_deref().unwrap_or_default();
        let cbsa = record.cbsa.as_deref().unwrap_or_default();
        let county = record.county.as_deref().unwrap_or_default();
        match self {
            Self::State => state.to_string(),
            Self::Cbsa => format!("{state}-{cbsa}"),
            Self::County => format!("{state}-{cbsa}-{county}"),
        }
    }
}

/// One geographic group, in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographyGroup {
    pub key: String,
    pub state: Option<String>,
    pub cbsa: Option<String>,
    pub county: Option<String>,
    pub records: Vec<MetricRecord>,
}

/// Partition records by geographic level. Groups appear in the order their
/// first record appears; records keep input order within a group.
pub fn group_by_geography(records: &[MetricRecord], level: GeographyLevel) -> Vec<GeographyGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<GeographyGroup> = Vec::new();

    for record in records {
        let key = level.key_for(record);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(GeographyGroup {
                key,
                state: record.state.clone(),
                cbsa: match level {
                    GeographyLevel::State => None,
                    _ => record.cbsa.clone(),
                },
                county: match level {
                    GeographyLevel::County => record.county.clone(),
                    _ => None,
                },
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push(record.clone());
    }

    groups
}

fn distinct_labels<'a, F>(records: &'a [MetricRecord], label: F) -> Vec<String>
where
    F: Fn(&'a MetricRecord) -> Option<&'a str>,
{
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(label)
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// Distinct non-null states, first-seen order.
pub fn distinct_states(records: &[MetricRecord]) -> Vec<String> {
    distinct_labels(records, |r| r.state.as_deref())
}

/// Distinct non-null CBSAs, first-seen order.
pub fn distinct_cbsas(records: &[MetricRecord]) -> Vec<String> {
    distinct_labels(records, |r| r.cbsa.as_deref())
}

/// Distinct non-null counties, first-seen order.
pub fn distinct_counties(records: &[MetricRecord]) -> Vec<String> {
    distinct_labels(records, |r| r.county.as_deref())
}

/// Distinct years, ascending.
pub fn distinct_years(records: &[MetricRecord]) -> Vec<i32> {
    let mut years: Vec<i32> = records.iter().map(|r| r.year).collect();
    years.sort_unstable();
    years.dedup();
    years
}
