//! Subject-vs-peer disparity metrics.
//!
//! For every subject aggregate row: share of its slice, peer share of the
//! same slice, gap (percentage points), ratio (peer / subject), and, when the
//! subject under-performs, a loan shortfall and its dollar damages.
//!
//! Everything is computed on full-precision shares: the adverse rules,
//! shortfall and damages never see a rounded value. Rounding happens once,
//! when a cell is reported. The reported gap is the difference of the
//! reported shares, so `gap == bankShare - peerShare` holds exactly on the
//! output.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use std::collections::HashMap;
use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::disparity::geography::{normalize_geography, GeographyMappings};
use crate::disparity::records::{
    AdverseTrigger, AggregateRecord, CellKey, LenderIdentity, MetricRecord,
};
use crate::disparity::totals::{build_group_totals, DenominatorMode, GroupTotals};
use crate::error::FairLendError;
use crate::types::*;
use crate::FairLendResult;

const SHARE_DP: u32 = 2;
const DAMAGES_DP: u32 = 0;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Input for the disparity calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisparityInput {
    pub lender: LenderIdentity,
    pub records: Vec<AggregateRecord>,
    /// Geography tables; `None` uses the built-in tables.
    #[serde(default)]
    pub mappings: Option<GeographyMappings>,
    #[serde(default)]
    pub denominator: DenominatorMode,
}

/// Output of the disparity calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisparityOutput {
    pub records: Vec<MetricRecord>,
    pub subject_rows: usize,
    pub peer_rows: usize,
    pub slices: usize,
    pub adverse_records: usize,
    pub cbsa_rewrites: usize,
    pub county_rewrites: usize,
}

// ---------------------------------------------------------------------------
// Single-cell computation
// ---------------------------------------------------------------------------

/// Everything needed to score one subject cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellCounts {
    pub bank_count: Count,
    pub peer_count: Count,
    pub totals: GroupTotals,
}

/// Metrics for one cell. Values from [`compute_cell`] are at full
/// precision; [`CellMetrics::reported`] gives the output precision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellMetrics {
    pub bank_share: Option<Percent>,
    pub peer_share: Option<Percent>,
    pub gap: Option<Percent>,
    pub ratio: Option<Multiple>,
    pub shortfall: Option<Decimal>,
    pub damages: Option<Money>,
    pub adverse_trigger: Option<AdverseTrigger>,
}

impl CellMetrics {
    pub fn is_adverse(&self) -> bool {
        self.adverse_trigger.is_some()
    }

    /// Round to output precision. Shares, ratio and shortfall go to 2
    /// decimals; the gap is recomputed from the rounded shares. Damages are
    /// already whole units.
    pub fn reported(&self) -> CellMetrics {
        let bank_share = self.bank_share.map(|v| v.round_dp(SHARE_DP));
        let peer_share = self.peer_share.map(|v| v.round_dp(SHARE_DP));
        CellMetrics {
            bank_share,
            peer_share,
            gap: match (bank_share, peer_share) {
                (Some(b), Some(p)) => Some(b - p),
                _ => None,
            },
            ratio: self.ratio.map(|v| v.round_dp(SHARE_DP)),
            shortfall: self.shortfall.map(|v| v.round_dp(SHARE_DP)),
            damages: self.damages,
            adverse_trigger: self.adverse_trigger,
        }
    }
}

/// Result of one adverse-condition rule that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AdverseFinding {
    trigger: AdverseTrigger,
    shortfall: Decimal,
}

type AdverseRule = fn(&CellMetrics, Count) -> Option<AdverseFinding>;

/// Evaluated in this order; a later rule that fires replaces the finding of
/// an earlier one.
const ADVERSE_RULES: [AdverseRule; 2] = [ratio_above_parity, negative_gap];

/// Rule A: peers more concentrated than the subject. Shortfall is positive.
fn ratio_above_parity(cell: &CellMetrics, bank_total: Count) -> Option<AdverseFinding> {
    let ratio = cell.ratio?;
    if ratio <= Decimal::ONE || bank_total == 0 {
        return None;
    }
    let (bank_share, peer_share) = (cell.bank_share?, cell.peer_share?);
    Some(AdverseFinding {
        trigger: AdverseTrigger::RatioAboveParity,
        shortfall: (peer_share - bank_share) / dec!(100) * Decimal::from(bank_total),
    })
}

/// Rule B: subject share below peer share. Shortfall is negative.
fn negative_gap(cell: &CellMetrics, bank_total: Count) -> Option<AdverseFinding> {
    let gap = cell.gap?;
    if gap >= Decimal::ZERO || bank_total == 0 {
        return None;
    }
    Some(AdverseFinding {
        trigger: AdverseTrigger::NegativeGap,
        shortfall: gap / dec!(100) * Decimal::from(bank_total),
    })
}

/// `count / total × 100` at full precision, or `None` for a zero total.
pub fn share_of(count: Count, total: Count) -> Option<Percent> {
    if total == 0 {
        return None;
    }
    Some(Decimal::from(count) * dec!(100) / Decimal::from(total))
}

/// Score one cell at full precision. Never fails: missing data degrades to
/// `None` fields.
pub fn compute_cell(counts: CellCounts, avg_loan_amount: Option<Money>) -> CellMetrics {
    let bank_share = share_of(counts.bank_count, counts.totals.bank_total);
    let peer_share = share_of(counts.peer_count, counts.totals.peer_total);

    let gap = match (bank_share, peer_share) {
        (Some(b), Some(p)) => Some(b - p),
        _ => None,
    };

    let ratio = match (bank_share, peer_share) {
        (Some(b), Some(p)) if b > Decimal::ZERO => Some(p / b),
        _ => None,
    };

    let mut cell = CellMetrics {
        bank_share,
        peer_share,
        gap,
        ratio,
        ..CellMetrics::default()
    };

    let mut finding: Option<AdverseFinding> = None;
    for rule in ADVERSE_RULES {
        if let Some(f) = rule(&cell, counts.totals.bank_total) {
            finding = Some(f);
        }
    }

    if let Some(f) = finding {
        cell.adverse_trigger = Some(f.trigger);
        cell.shortfall = Some(f.shortfall);
        cell.damages =
            avg_loan_amount.map(|avg| (f.shortfall.abs() * avg).round_dp(DAMAGES_DP));
    }

    cell
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Normalize geography, build denominators, and score every subject row.
///
/// Output records follow the input order of subject rows.
pub fn calculate_disparity_metrics(
    input: &DisparityInput,
) -> FairLendResult<ComputationOutput<DisparityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    // -- Geography ------------------------------------------------------------
    let mappings = match &input.mappings {
        Some(m) => {
            m.validate()?;
            m.clone()
        }
        None => GeographyMappings::builtin()?,
    };
    let normalized = normalize_geography(&input.records, &mappings);
    let records = &normalized.records;

    // -- Denominators -----------------------------------------------------------
    let totals = build_group_totals(records, input.denominator);

    // -- Peer lookup ------------------------------------------------------------
    let mut peer_lookup: HashMap<CellKey, &AggregateRecord> = HashMap::new();
    let mut duplicate_peer_cells = 0usize;
    for peer in records.iter().filter(|r| r.is_peer()) {
        if peer_lookup.insert(peer.cell_key(), peer).is_some() {
            duplicate_peer_cells += 1;
        }
    }

    // -- Subject rows -----------------------------------------------------------
    let mut output_records = Vec::new();
    let mut seen_subject_cells = std::collections::HashSet::new();
    let mut duplicate_subject_cells = 0usize;
    let mut unmatched_subject_rows = 0usize;
    let mut zero_total_rows = 0usize;

    for subject in records.iter().filter(|r| r.is_subject()) {
        let cell_key = subject.cell_key();
        let peer = peer_lookup.get(&cell_key);
        if peer.is_none() {
            unmatched_subject_rows += 1;
        }
        let group = totals
            .get(&cell_key.slice)
            .copied()
            .unwrap_or_default();
        if group.bank_total == 0 {
            zero_total_rows += 1;
        }
        if !seen_subject_cells.insert(cell_key) {
            duplicate_subject_cells += 1;
        }

        let counts = CellCounts {
            bank_count: subject.bank_count.unwrap_or(0),
            peer_count: peer.and_then(|p| p.peer_count).unwrap_or(0),
            totals: group,
        };
        let cell = compute_cell(counts, subject.avg_loan_amount);
        output_records.push(to_metric_record(&input.lender, subject, counts, cell));
    }

    // -- Warnings ---------------------------------------------------------------
    if duplicate_peer_cells > 0 {
        warnings.push(format!(
            "{duplicate_peer_cells} duplicate peer cells; the last row in input order was used."
        ));
    }
    if duplicate_subject_cells > 0 {
        warnings.push(format!(
            "{duplicate_subject_cells} duplicate subject cells; each row was scored separately."
        ));
    }
    if unmatched_subject_rows > 0 {
        warnings.push(format!(
            "{unmatched_subject_rows} subject rows have no peer counterpart; peer count is zero."
        ));
    }
    if zero_total_rows > 0 {
        warnings.push(format!(
            "{zero_total_rows} subject rows are in slices with a zero subject total."
        ));
    }
    for w in &warnings {
        log::warn!("disparity: {w}");
    }

    let subject_rows = output_records.len();
    let adverse_records = output_records.iter().filter(|r| r.adverse).count();
    log::info!(
        "disparity: {} metric records ({} adverse) from {} aggregate rows",
        subject_rows,
        adverse_records,
        records.len()
    );

    let output = DisparityOutput {
        peer_rows: records.iter().filter(|r| r.is_peer()).count(),
        subject_rows,
        slices: totals.len(),
        adverse_records,
        cbsa_rewrites: normalized.cbsa_rewrites,
        county_rewrites: normalized.county_rewrites,
        records: output_records,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "denominator": input.denominator.as_str(),
        "share_rounding": "2 decimals, half-even, at output; gap = bankShare - peerShare",
        "adverse_precision": "rules, shortfall and damages use unrounded shares",
        "damages_rounding": "0 decimals, half-even",
        "adverse_rules": ["ratio_above_parity", "negative_gap"],
        "adverse_rule_precedence": "last rule that fires sets the shortfall",
    });

    Ok(with_metadata(
        "Subject vs peer share disparity (gap, ratio, shortfall, damages)",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_input(input: &DisparityInput) -> FairLendResult<()> {
    if input.lender.id.trim().is_empty() {
        return Err(FairLendError::InvalidInput {
            field: "lender.id".into(),
            reason: "Lender id must not be blank.".into(),
        });
    }
    if input.lender.name.trim().is_empty() {
        return Err(FairLendError::InvalidInput {
            field: "lender.name".into(),
            reason: "Lender name must not be blank.".into(),
        });
    }
    Ok(())
}

fn to_metric_record(
    lender: &LenderIdentity,
    subject: &AggregateRecord,
    counts: CellCounts,
    cell: CellMetrics,
) -> MetricRecord {
    let cell = cell.reported();
    MetricRecord {
        lender: lender.id.clone(),
        lender_name: lender.name.clone(),
        state: subject.state.clone(),
        cbsa: subject.cbsa.clone(),
        county: subject.county.clone(),
        year: subject.year,
        metric: subject.metric.clone(),
        loan_purpose: subject.loan_purpose.clone(),
        kind: subject.kind.clone(),
        bank_count: counts.bank_count,
        bank_share: cell.bank_share,
        peer_share: cell.peer_share,
        gap: cell.gap,
        ratio: cell.ratio,
        avg_loan_amount: subject.avg_loan_amount.map(|a| a.round_dp(SHARE_DP)),
        shortfall: cell.shortfall,
        damages: cell.damages,
        adverse: cell.is_adverse(),
        adverse_trigger: cell.adverse_trigger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(bank: Count, bank_total: Count, peer: Count, peer_total: Count) -> CellCounts {
        CellCounts {
            bank_count: bank,
            peer_count: peer,
            totals: GroupTotals {
                bank_total,
                peer_total,
            },
        }
    }

    #[test]
    fn test_underperforming_cell() {
        let cell = compute_cell(counts(20, 200, 60, 200), Some(dec!(250000)));
        assert_eq!(cell.bank_share, Some(dec!(10)));
        assert_eq!(cell.peer_share, Some(dec!(30)));
        assert_eq!(cell.gap, Some(dec!(-20)));
        assert_eq!(cell.ratio, Some(dec!(3)));
        assert_eq!(cell.adverse_trigger, Some(AdverseTrigger::NegativeGap));
        assert_eq!(cell.shortfall, Some(dec!(-40)));
        assert_eq!(cell.damages, Some(dec!(10000000)));
    }

    #[test]
    fn test_outperforming_cell_not_adverse() {
        let cell = compute_cell(counts(60, 200, 20, 200), Some(dec!(250000)));
        assert_eq!(cell.gap, Some(dec!(20)));
        assert_eq!(cell.ratio.map(|r| r.round_dp(2)), Some(dec!(0.33)));
        assert!(!cell.is_adverse());
        assert_eq!(cell.shortfall, None);
        assert_eq!(cell.damages, None);
    }

    #[test]
    fn test_parity_not_adverse() {
        let cell = compute_cell(counts(30, 100, 60, 200), Some(dec!(100)));
        assert_eq!(cell.gap, Some(Decimal::ZERO));
        assert_eq!(cell.ratio, Some(Decimal::ONE));
        assert!(!cell.is_adverse());
    }

    #[test]
    fn test_zero_bank_total() {
        let cell = compute_cell(counts(0, 0, 60, 200), Some(dec!(100)));
        assert_eq!(cell.bank_share, None);
        assert_eq!(cell.peer_share, Some(dec!(30)));
        assert_eq!(cell.gap, None);
        assert_eq!(cell.ratio, None);
        assert_eq!(cell.shortfall, None);
        assert_eq!(cell.damages, None);
    }

    #[test]
    fn test_zero_bank_share_only_gap_rule_fires() {
        // bank share 0 → ratio undefined, gap negative
        let cell = compute_cell(counts(0, 50, 10, 100), Some(dec!(1000)));
        assert_eq!(cell.bank_share, Some(Decimal::ZERO));
        assert_eq!(cell.ratio, None);
        assert_eq!(cell.gap, Some(dec!(-10)));
        assert_eq!(cell.adverse_trigger, Some(AdverseTrigger::NegativeGap));
        assert_eq!(cell.shortfall, Some(dec!(-5)));
        assert_eq!(cell.damages, Some(dec!(5000)));
    }

    #[test]
    fn test_ratio_rule_alone() {
        let cell = CellMetrics {
            bank_share: Some(dec!(10)),
            peer_share: Some(dec!(15)),
            gap: None,
            ratio: Some(dec!(1.5)),
            ..CellMetrics::default()
        };
        let f = ratio_above_parity(&cell, 400).unwrap();
        assert_eq!(f.trigger, AdverseTrigger::RatioAboveParity);
        assert_eq!(f.shortfall, dec!(20));
        assert!(negative_gap(&cell, 400).is_none());
    }

    #[test]
    fn test_rules_need_positive_bank_total() {
        let cell = CellMetrics {
            bank_share: Some(dec!(10)),
            peer_share: Some(dec!(15)),
            gap: Some(dec!(-5)),
            ratio: Some(dec!(1.5)),
            ..CellMetrics::default()
        };
        assert!(ratio_above_parity(&cell, 0).is_none());
        assert!(negative_gap(&cell, 0).is_none());
    }

    #[test]
    fn test_missing_avg_loan_amount() {
        let cell = compute_cell(counts(20, 200, 60, 200), None);
        assert!(cell.is_adverse());
        assert_eq!(cell.shortfall, Some(dec!(-40)));
        assert_eq!(cell.damages, None);
    }

    #[test]
    fn test_no_peer_cell() {
        let cell = compute_cell(counts(20, 200, 0, 0), Some(dec!(100)));
        assert_eq!(cell.bank_share, Some(dec!(10)));
        assert_eq!(cell.peer_share, None);
        assert_eq!(cell.gap, None);
        assert_eq!(cell.ratio, None);
        assert!(!cell.is_adverse());
    }

    #[test]
    fn test_share_full_precision() {
        assert_eq!(share_of(18183, 100000), Some(dec!(18.183)));
        assert_eq!(share_of(1, 3).map(|s| s.round_dp(2)), Some(dec!(33.33)));
        assert_eq!(share_of(5, 0), None);
    }

    #[test]
    fn test_small_gap_still_adverse() {
        // 10.001% vs 10.004%: both report as 10.00 but peers are ahead
        let cell = compute_cell(counts(10001, 100000, 10004, 100000), Some(dec!(250000)));
        assert_eq!(cell.gap, Some(dec!(-0.003)));
        assert!(cell.ratio.unwrap() > Decimal::ONE);
        assert_eq!(cell.adverse_trigger, Some(AdverseTrigger::NegativeGap));
        assert_eq!(cell.shortfall, Some(dec!(-3)));
        assert_eq!(cell.damages, Some(dec!(750000)));

        let reported = cell.reported();
        assert_eq!(reported.bank_share, Some(dec!(10.00)));
        assert_eq!(reported.peer_share, Some(dec!(10.00)));
        assert_eq!(reported.gap, Some(Decimal::ZERO));
        assert_eq!(reported.ratio, Some(dec!(1.00)));
        assert_eq!(reported.shortfall, Some(dec!(-3.00)));
        assert!(reported.is_adverse());
    }

    #[test]
    fn test_damages_from_unrounded_shortfall() {
        let cell = compute_cell(counts(18183, 100000, 30004, 100000), Some(dec!(250000)));
        assert_eq!(cell.shortfall, Some(dec!(-11821)));
        assert_eq!(cell.damages, Some(dec!(2955250000)));

        let reported = cell.reported();
        assert_eq!(reported.bank_share, Some(dec!(18.18)));
        assert_eq!(reported.peer_share, Some(dec!(30.00)));
        assert_eq!(reported.gap, Some(dec!(-11.82)));
        assert_eq!(reported.shortfall, Some(dec!(-11821.00)));
    }

    #[test]
    fn test_repeating_shares_reported_at_two_decimals() {
        let cell = compute_cell(counts(1, 3, 2, 3), Some(dec!(1000.55)));
        let reported = cell.reported();
        assert_eq!(reported.bank_share, Some(dec!(33.33)));
        assert_eq!(reported.peer_share, Some(dec!(66.67)));
        assert_eq!(reported.gap, Some(dec!(-33.34)));
        assert_eq!(reported.ratio, Some(dec!(2.00)));
        // one loan short, not 1.0002
        assert_eq!(reported.shortfall, Some(dec!(-1.00)));
        assert_eq!(cell.damages, Some(dec!(1001)));
    }
}
