use clap::{Args, ValueEnum};
use serde_json::{json, Value};

use fairlend_core::disparity::records::{LoanKind, LoanPurpose, Metric};
use fairlend_core::reporting::bands::band_records;
use fairlend_core::reporting::filter::{filter_records, RecordFilter};
use fairlend_core::reporting::sort::{sort_records, SortDirection, SortField};

use crate::input;
use crate::input::report::parse_report;

/// Column to sort by
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortBy {
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

impl From<SortBy> for SortField {
    fn from(s: SortBy) -> Self {
        match s {
            SortBy::County => SortField::County,
            SortBy::State => SortField::State,
            SortBy::Metric => SortField::Metric,
            SortBy::Year => SortField::Year,
            SortBy::Ratio => SortField::Ratio,
            SortBy::Gap => SortField::Gap,
            SortBy::BankShare => SortField::BankShare,
            SortBy::PeerShare => SortField::PeerShare,
            SortBy::Damages => SortField::Damages,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl From<Direction> for SortDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Asc => SortDirection::Asc,
            Direction::Desc => SortDirection::Desc,
        }
    }
}

/// Record selection flags shared by `filter` and `summary`.
#[derive(Args)]
pub struct CriteriaArgs {
    /// Lender id or display name
    #[arg(long)]
    pub lender: Option<String>,

    #[arg(long)]
    pub state: Option<String>,

    #[arg(long)]
    pub cbsa: Option<String>,

    #[arg(long)]
    pub county: Option<String>,

    /// Year to keep (repeatable)
    #[arg(long = "year")]
    pub years: Vec<i32>,

    /// Metric label to keep, e.g. "MMCT 50%" (repeatable)
    #[arg(long = "metric")]
    pub metrics: Vec<String>,

    /// Loan purpose label, e.g. "Home Purchase"
    #[arg(long)]
    pub loan_purpose: Option<String>,

    /// Applications or Originations
    #[arg(long)]
    pub kind: Option<String>,
}

impl CriteriaArgs {
    pub fn to_filter(&self) -> RecordFilter {
        RecordFilter {
            lender: self.lender.clone(),
            state: self.state.clone(),
            cbsa: self.cbsa.clone(),
            county: self.county.clone(),
            years: self.years.clone(),
            metrics: self.metrics.iter().map(|m| Metric::from(m.as_str())).collect(),
            loan_purpose: self.loan_purpose.as_deref().map(LoanPurpose::from),
            kind: self.kind.as_deref().map(LoanKind::from),
        }
    }
}

/// Arguments for report filtering
#[derive(Args)]
pub struct FilterArgs {
    /// Path to a computed report (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub criteria: CriteriaArgs,

    /// Sort column; nulls always sort last
    #[arg(long, value_enum)]
    pub sort: Option<SortBy>,

    /// Sort direction
    #[arg(long, value_enum, default_value_t = Direction::Asc)]
    pub direction: Direction,

    /// Attach gap and ratio severity bands
    #[arg(long)]
    pub bands: bool,
}

pub fn run_filter(args: FilterArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let report = parse_report(input::read_document(args.input.as_deref())?)?;
    let mut records = filter_records(&report.records, &args.criteria.to_filter());

    if let Some(field) = args.sort {
        sort_records(&mut records, field.into(), args.direction.into());
    }

    let mut metadata = match report.metadata {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    metadata.insert("totalRecords".into(), json!(records.len()));
    metadata.insert("unfilteredRecords".into(), json!(report.records.len()));

    let records = if args.bands {
        serde_json::to_value(band_records(&records))?
    } else {
        serde_json::to_value(&records)?
    };

    Ok(json!({
        "metadata": metadata,
        "records": records,
    }))
}
