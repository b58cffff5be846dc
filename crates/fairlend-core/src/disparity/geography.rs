//! Geography label normalization.
//!
//! Source geography taxonomies change between reporting years (Connecticut
//! replaced its counties with planning regions in 2024 and several CBSAs
//! were renamed with it). Without normalization the same place shows up as
//! two geography keys and its aggregates fragment across years.
//!
//! Normalization is a pure transform: the input slice is never touched and a
//! rewritten copy is returned together with rewrite counts.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::disparity::records::AggregateRecord;
use crate::error::FairLendError;
use crate::FairLendResult;

const BUILTIN_MAPPINGS_YAML: &str = include_str!("../../data/geography_mappings.yaml");

// ---------------------------------------------------------------------------
// Mapping tables
// ---------------------------------------------------------------------------

/// Label rewrites that apply to records of one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionMapping {
    pub state: String,
    #[serde(default)]
    pub cbsa_renames: BTreeMap<String, String>,
    #[serde(default)]
    pub county_renames: BTreeMap<String, String>,
}

/// All jurisdiction tables. Exact-match lookup only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographyMappings {
    #[serde(default)]
    pub jurisdictions: Vec<JurisdictionMapping>,
}

impl GeographyMappings {
    /// The tables shipped with the crate (Connecticut 2022-2024).
    pub fn builtin() -> FairLendResult<Self> {
        Self::from_yaml(BUILTIN_MAPPINGS_YAML)
    }

    /// Parse and validate tables from YAML. JSON is valid YAML, so this
    /// also accepts JSON documents.
    pub fn from_yaml(source: &str) -> FairLendResult<Self> {
        let mappings: GeographyMappings = serde_yaml::from_str(source)?;
        mappings.validate()?;
        Ok(mappings)
    }

    pub fn is_empty(&self) -> bool {
        self.jurisdictions
            .iter()
            .all(|j| j.cbsa_renames.is_empty() && j.county_renames.is_empty())
    }

    pub fn jurisdiction(&self, state: &str) -> Option<&JurisdictionMapping> {
        self.jurisdictions.iter().find(|j| j.state == state)
    }

    /// Reject tables that would make normalization order-dependent or
    /// non-idempotent: duplicate states, blank states, and rename targets
    /// that are themselves rename sources.
    pub fn validate(&self) -> FairLendResult<()> {
        let mut seen = HashSet::new();
        for j in &self.jurisdictions {
            if j.state.trim().is_empty() {
                return Err(FairLendError::InvalidMapping {
                    state: j.state.clone(),
                    reason: "State name must not be blank.".into(),
                });
            }
            if !seen.insert(j.state.as_str()) {
                return Err(FairLendError::InvalidMapping {
                    state: j.state.clone(),
                    reason: "State appears in more than one jurisdiction table.".into(),
                });
            }
            check_not_chained(&j.state, "cbsa_renames", &j.cbsa_renames)?;
            check_not_chained(&j.state, "county_renames", &j.county_renames)?;
        }
        Ok(())
    }
}

fn check_not_chained(
    state: &str,
    table: &str,
    renames: &BTreeMap<String, String>,
) -> FairLendResult<()> {
    for (from, to) in renames {
        if renames.contains_key(to) {
            return Err(FairLendError::InvalidMapping {
                state: state.to_string(),
                reason: format!(
                    "{table}: '{from}' maps to '{to}', which is itself renamed."
                ),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalized records plus how many labels were rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationOutcome {
    pub records: Vec<AggregateRecord>,
    pub cbsa_rewrites: usize,
    pub county_rewrites: usize,
}

/// Rewrite CBSA and county labels for every record whose state has a
/// jurisdiction table. Unmapped labels and other states pass through.
pub fn normalize_geography(
    records: &[AggregateRecord],
    mappings: &GeographyMappings,
) -> NormalizationOutcome {
    let mut cbsa_rewrites = 0usize;
    let mut county_rewrites = 0usize;

    let normalized = records
        .iter()
        .map(|record| {
            let mut out = record.clone();
            let Some(table) = record
                .state
                .as_deref()
                .and_then(|state| mappings.jurisdiction(state))
            else {
                return out;
            };

            if let Some(renamed) = out.cbsa.as_ref().and_then(|c| table.cbsa_renames.get(c)) {
                out.cbsa = Some(renamed.clone());
                cbsa_rewrites += 1;
            }
            if let Some(renamed) = out
                .county
                .as_ref()
                .and_then(|c| table.county_renames.get(c))
            {
                out.county = Some(renamed.clone());
                county_rewrites += 1;
            }
            out
        })
        .collect();

    if cbsa_rewrites > 0 || county_rewrites > 0 {
        log::info!(
            "geography: normalized {cbsa_rewrites} CBSA and {county_rewrites} county labels"
        );
    }

    NormalizationOutcome {
        records: normalized,
        cbsa_rewrites,
        county_rewrites,
    }
}
