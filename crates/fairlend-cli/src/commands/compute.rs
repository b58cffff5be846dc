use chrono::{SecondsFormat, Utc};
use clap::{Args, ValueEnum};
use serde_json::{json, Value};

use fairlend_core::disparity::geography::GeographyMappings;
use fairlend_core::disparity::metrics::{calculate_disparity_metrics, DisparityInput};
use fairlend_core::disparity::records::{AggregateDocument, LenderIdentity};
use fairlend_core::disparity::totals::DenominatorMode;

use crate::input;

const DEFAULT_SOURCE: &str = "aggregate query export";
const DESCRIPTION: &str =
    "Subject vs peer loan shares with calculated gaps, ratios, shortfall and damages";

/// Share denominator source
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Denominator {
    /// Sum of every metric row in the slice
    #[default]
    SummedAcrossMetrics,
    /// The slice's Total-metric row only
    TotalMetric,
}

impl From<Denominator> for DenominatorMode {
    fn from(d: Denominator) -> Self {
        match d {
            Denominator::SummedAcrossMetrics => DenominatorMode::SummedAcrossMetrics,
            Denominator::TotalMetric => DenominatorMode::TotalMetric,
        }
    }
}

/// Arguments for disparity computation
#[derive(Args)]
pub struct ComputeArgs {
    /// Path to the aggregate JSON document (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Geography mapping tables (YAML or JSON); built-in tables when omitted
    #[arg(long)]
    pub mappings: Option<String>,

    /// Share denominator source
    #[arg(long, value_enum, default_value_t = Denominator::SummedAcrossMetrics)]
    pub denominator: Denominator,

    /// Lender id stamped on every record (defaults to a slug of the name)
    #[arg(long)]
    pub lender_id: Option<String>,

    /// Lender display name (defaults to the document's metadata.bank)
    #[arg(long)]
    pub lender_name: Option<String>,

    /// Legal entity identifier
    #[arg(long)]
    pub lei: Option<String>,

    /// Federal Reserve RSSD id
    #[arg(long)]
    pub rssd: Option<String>,
}

pub fn run_compute(args: ComputeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let document = AggregateDocument::from_value(input::read_document(args.input.as_deref())?)?;

    let mappings = match &args.mappings {
        Some(path) => Some(GeographyMappings::from_yaml(&input::file::read_text(path)?)?),
        None => None,
    };

    let lender = resolve_lender(&args, &document.metadata)?;
    let denominator: DenominatorMode = args.denominator.into();
    let source = metadata_text(&document.metadata, "source")
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let output = calculate_disparity_metrics(&DisparityInput {
        lender: lender.clone(),
        records: document.records,
        mappings,
        denominator,
    })?;

    let records = serde_json::to_value(&output.result.records)?;
    Ok(json!({
        "metadata": {
            "generated": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "totalRecords": output.result.records.len(),
            "lender": lender.id,
            "lenderName": lender.name,
            "lei": lender.lei,
            "rssd": lender.rssd,
            "source": source,
            "description": DESCRIPTION,
            "denominator": denominator.as_str(),
            "adverseRecords": output.result.adverse_records,
            "cbsaRewrites": output.result.cbsa_rewrites,
            "countyRewrites": output.result.county_rewrites,
            "warnings": output.warnings,
            "computationTimeUs": output.metadata.computation_time_us,
            "sourceMetadata": document.metadata,
        },
        "records": records,
    }))
}

/// Flags win; otherwise fall back to the document's `bank`, `lei` and
/// `rssd` metadata.
fn resolve_lender(
    args: &ComputeArgs,
    metadata: &Value,
) -> Result<LenderIdentity, Box<dyn std::error::Error>> {
    let name = args
        .lender_name
        .clone()
        .or_else(|| metadata_text(metadata, "bank"))
        .ok_or("--lender-name is required (or provide metadata.bank in the input)")?;

    let mut lender = LenderIdentity::from_name(&name);
    if let Some(id) = &args.lender_id {
        lender.id = id.clone();
    }
    lender.lei = args.lei.clone().or_else(|| metadata_text(metadata, "lei"));
    lender.rssd = args.rssd.clone().or_else(|| metadata_text(metadata, "rssd"));
    Ok(lender)
}

/// String or numeric metadata field as text.
fn metadata_text(metadata: &Value, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
