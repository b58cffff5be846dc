use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use fairlend_core::disparity::geography::{self, GeographyMappings};
use fairlend_core::disparity::metrics::{self, DisparityInput};
use fairlend_core::disparity::records::{AggregateRecord, MetricRecord};
use fairlend_core::reporting::{bands, filter, grouping, sort, summary};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Disparity
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_disparity_metrics(input_json: String) -> NapiResult<String> {
    let input: DisparityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = metrics::calculate_disparity_metrics(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct NormalizeInput {
    records: Vec<AggregateRecord>,
    #[serde(default)]
    mappings: Option<GeographyMappings>,
}

#[napi]
pub fn normalize_geography(input_json: String) -> NapiResult<String> {
    let input: NormalizeInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mappings = match input.mappings {
        Some(m) => {
            m.validate().map_err(to_napi_error)?;
            m
        }
        None => GeographyMappings::builtin().map_err(to_napi_error)?,
    };
    let outcome = geography::normalize_geography(&input.records, &mappings);
    serde_json::to_string(&outcome).map_err(to_napi_error)
}

#[napi]
pub fn builtin_geography_mappings() -> NapiResult<String> {
    let mappings = GeographyMappings::builtin().map_err(to_napi_error)?;
    serde_json::to_string(&mappings).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SummaryInput {
    records: Vec<MetricRecord>,
    #[serde(default)]
    level: Option<grouping::GeographyLevel>,
}

#[napi]
pub fn summarize_records(input_json: String) -> NapiResult<String> {
    let input: SummaryInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mut output = serde_json::json!({
        "result": summary::summarize(&input.records),
        "byYear": summary::breakdown_by_year(&input.records),
        "byKind": summary::breakdown_by_kind(&input.records),
    });
    if let Some(level) = input.level {
        output["geography"] =
            serde_json::to_value(summary::summarize_by_geography(&input.records, level))
                .map_err(to_napi_error)?;
    }
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct FilterInput {
    records: Vec<MetricRecord>,
    #[serde(default)]
    filter: filter::RecordFilter,
    #[serde(default)]
    sort: Option<sort::SortField>,
    #[serde(default)]
    direction: sort::SortDirection,
    #[serde(default)]
    bands: bool,
}

#[napi]
pub fn filter_records(input_json: String) -> NapiResult<String> {
    let input: FilterInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mut records = filter::filter_records(&input.records, &input.filter);
    if let Some(field) = input.sort {
        sort::sort_records(&mut records, field, input.direction);
    }
    if input.bands {
        serde_json::to_string(&bands::band_records(&records)).map_err(to_napi_error)
    } else {
        serde_json::to_string(&records).map_err(to_napi_error)
    }
}

#[derive(Deserialize)]
struct DistinctInput {
    records: Vec<MetricRecord>,
}

/// Filter-option lists for drill-down selectors.
#[napi]
pub fn distinct_values(input_json: String) -> NapiResult<String> {
    let input: DistinctInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = serde_json::json!({
        "states": grouping::distinct_states(&input.records),
        "cbsas": grouping::distinct_cbsas(&input.records),
        "counties": grouping::distinct_counties(&input.records),
        "years": grouping::distinct_years(&input.records),
    });
    serde_json::to_string(&output).map_err(to_napi_error)
}
