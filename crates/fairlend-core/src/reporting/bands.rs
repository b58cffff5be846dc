//! Severity bands for gaps and ratios, as used to shade report tables.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::disparity::records::MetricRecord;

/// Gap band in percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapBand {
    /// gap > 0
    Outperforms,
    /// 0 to -2
    Minor,
    /// -2 to -5
    Moderate,
    /// -5 to -10
    Large,
    /// below -10
    Severe,
}

impl GapBand {
    pub fn classify(gap: Option<Decimal>) -> Option<Self> {
        let g = gap?;
        Some(if g > Decimal::ZERO {
            Self::Outperforms
        } else if g >= dec!(-2) {
            Self::Minor
        } else if g >= dec!(-5) {
            Self::Moderate
        } else if g >= dec!(-10) {
            Self::Large
        } else {
            Self::Severe
        })
    }
}

impl fmt::Display for GapBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Outperforms => "Outperforms peers",
            Self::Minor => "Minor gap",
            Self::Moderate => "Moderate gap",
            Self::Large => "Large gap",
            Self::Severe => "Severe gap",
        };
        write!(f, "{}", s)
    }
}

/// Ratio band (peer share / subject share).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioBand {
    /// < 1.0, subject outperforms peers
    Excellent,
    /// 1.0 - 1.5
    Good,
    /// 1.5 - 2.0
    Warning,
    /// 2.0 - 3.0
    Poor,
    /// >= 3.0
    Severe,
}

impl RatioBand {
    pub fn classify(ratio: Option<Decimal>) -> Option<Self> {
        let r = ratio?;
        Some(if r < Decimal::ONE {
            Self::Excellent
        } else if r < dec!(1.5) {
            Self::Good
        } else if r < dec!(2) {
            Self::Warning
        } else if r < dec!(3) {
            Self::Poor
        } else {
            Self::Severe
        })
    }
}

impl fmt::Display for RatioBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Warning => "Warning",
            Self::Poor => "Poor",
            Self::Severe => "Severe",
        };
        write!(f, "{}", s)
    }
}

/// A metric record with its bands attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandedRecord {
    #[serde(flatten)]
    pub record: MetricRecord,
    pub gap_band: Option<GapBand>,
    pub ratio_band: Option<RatioBand>,
}

pub fn band_records(records: &[MetricRecord]) -> Vec<BandedRecord> {
    records
        .iter()
        .map(|r| BandedRecord {
            gap_band: GapBand::classify(r.gap),
            ratio_band: RatioBand::classify(r.ratio),
            record: r.clone(),
        })
        .collect()
}
