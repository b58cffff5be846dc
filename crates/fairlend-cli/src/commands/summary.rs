use clap::{Args, ValueEnum};
use serde_json::{json, Value};

use fairlend_core::reporting::filter::filter_records;
use fairlend_core::reporting::grouping::GeographyLevel;
use fairlend_core::reporting::summary::{
    breakdown_by_kind, breakdown_by_year, summarize, summarize_by_geography,
};

use crate::commands::filter::CriteriaArgs;
use crate::input;
use crate::input::report::parse_report;

/// Geographic roll-up level
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Level {
    State,
    Cbsa,
    County,
}

impl From<Level> for GeographyLevel {
    fn from(l: Level) -> Self {
        match l {
            Level::State => GeographyLevel::State,
            Level::Cbsa => GeographyLevel::Cbsa,
            Level::County => GeographyLevel::County,
        }
    }
}

/// Arguments for report summaries
#[derive(Args)]
pub struct SummaryArgs {
    /// Path to a computed report (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Also summarize per geographic group at this level
    #[arg(long, value_enum)]
    pub by: Option<Level>,

    #[command(flatten)]
    pub criteria: CriteriaArgs,
}

pub fn run_summary(args: SummaryArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let report = parse_report(input::read_document(args.input.as_deref())?)?;
    let records = filter_records(&report.records, &args.criteria.to_filter());
    log::info!(
        "summary: {} of {} records selected",
        records.len(),
        report.records.len()
    );

    let mut out = json!({
        "result": summarize(&records),
        "byYear": breakdown_by_year(&records),
        "byKind": breakdown_by_kind(&records),
    });
    if let Some(level) = args.by {
        out["geography"] = serde_json::to_value(summarize_by_geography(&records, level.into()))?;
    }
    Ok(out)
}
