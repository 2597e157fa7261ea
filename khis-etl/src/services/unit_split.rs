//! "2 Rod" unit split
//!
//! Service rows reported as "2 Rod" are redistributed into Jadelle and
//! Levoplant by a fixed ratio. Applies to FP only.

use khis_common::{Error, Result};
use tracing::info;

use crate::models::{Method, SummaryRow};

pub const DEFAULT_JADELLE_RATIO: f64 = 0.8;

const COMPOSITE_ANALYTIC: &str = "2 Rod";
const JADELLE: &str = "Jadelle";
const LEVOPLANT: &str = "Levoplant";

/// Reject ratios outside [0, 1] (NaN included)
pub fn validate_ratio(ratio: f64) -> Result<()> {
    if (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Jadelle ratio must be between 0.0 and 1.0, got {}",
            ratio
        )))
    }
}

fn is_target(row: &SummaryRow) -> bool {
    row.method == Method::Service.label() && row.analytic == COMPOSITE_ANALYTIC
}

/// Replace every "2 Rod" service row with a Jadelle row (`value * ratio`)
/// and a Levoplant row (`value * (1 - ratio)`).
///
/// Output order: untouched rows, then Jadelle rows, then Levoplant rows.
/// Input without target rows comes back unchanged.
pub fn split_two_rod(rows: Vec<SummaryRow>, ratio: f64) -> Result<Vec<SummaryRow>> {
    validate_ratio(ratio)?;

    if !rows.iter().any(is_target) {
        info!("No '2 Rod' service rows found, skipping split");
        return Ok(rows);
    }

    let (targets, mut output): (Vec<SummaryRow>, Vec<SummaryRow>) =
        rows.into_iter().partition(is_target);

    let jadelle = targets.iter().map(|row| SummaryRow {
        analytic: JADELLE.to_string(),
        value: row.value * ratio,
        ..row.clone()
    });
    let levoplant = targets.iter().map(|row| SummaryRow {
        analytic: LEVOPLANT.to_string(),
        value: row.value * (1.0 - ratio),
        ..row.clone()
    });

    output.extend(jadelle);
    output.extend(levoplant);

    info!(
        rows = targets.len(),
        jadelle_ratio = ratio,
        "Split '2 Rod' service rows into Jadelle and Levoplant"
    );
    Ok(output)
}
