use clap::Args;
use serde_json::{json, Value};

use fairlend_core::disparity::geography::{normalize_geography, GeographyMappings};
use fairlend_core::disparity::records::AggregateDocument;

use crate::input;

/// Arguments for geography mapping tables
#[derive(Args)]
pub struct MappingsArgs {
    /// Mapping tables to validate (YAML or JSON); built-in tables when omitted
    #[arg(long)]
    pub mappings: Option<String>,

    /// Normalize an aggregate document instead of printing the tables
    #[arg(long)]
    pub normalize: bool,

    /// Aggregate document to normalize (reads stdin when omitted)
    #[arg(long, requires = "normalize")]
    pub input: Option<String>,
}

pub fn run_mappings(args: MappingsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (mappings, origin) = match &args.mappings {
        Some(path) => (
            GeographyMappings::from_yaml(&input::file::read_text(path)?)?,
            path.clone(),
        ),
        None => (GeographyMappings::builtin()?, "builtin".to_string()),
    };

    if !args.normalize {
        let summary: Vec<Value> = mappings
            .jurisdictions
            .iter()
            .map(|j| {
                json!({
                    "state": j.state,
                    "cbsaRenames": j.cbsa_renames.len(),
                    "countyRenames": j.county_renames.len(),
                })
            })
            .collect();
        return Ok(json!({
            "result": {
                "source": origin,
                "jurisdictions": mappings.jurisdictions.len(),
                "valid": true,
            },
            "jurisdictions": summary,
            "tables": mappings,
        }));
    }

    let document = AggregateDocument::from_value(input::read_document(args.input.as_deref())?)?;
    let outcome = normalize_geography(&document.records, &mappings);

    Ok(json!({
        "metadata": {
            "mappings": origin,
            "totalRecords": outcome.records.len(),
            "cbsaRewrites": outcome.cbsa_rewrites,
            "countyRewrites": outcome.county_rewrites,
            "sourceMetadata": document.metadata,
        },
        "records": outcome.records,
    }))
}
