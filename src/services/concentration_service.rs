use tracing::{info, warn};

use crate::errors::AnalysisError;
use crate::models::{AllocationRow, AnalysisOutcome, AnalysisResult, PortfolioTable, Recommendation};

/// A holding above this share of the portfolio is considered a concentration risk.
pub const DEFAULT_CONCENTRATION_THRESHOLD: f64 = 30.0;

pub fn validate_threshold(threshold_percent: f64) -> Result<(), AnalysisError> {
    if !threshold_percent.is_finite() || threshold_percent < 0.0 {
        return Err(AnalysisError::InvalidThreshold(threshold_percent));
    }
    Ok(())
}

/// Share of the total held by each row, in percent.
///
/// Amounts are individually finite but their sum can overflow to infinity; in
/// that case shares are computed relative to the largest amount.
fn allocation_percents(table: &PortfolioTable, total_invested: f64) -> Vec<f64> {
    if total_invested.is_finite() {
        return table.rows().iter().map(|row| row.amount / total_invested * 100.0).collect();
    }

    let largest = table.rows().iter().map(|row| row.amount).fold(0.0, f64::max);
    let scaled_total: f64 = table.rows().iter().map(|row| row.amount / largest).sum();
    warn!("Total invested overflowed; computing allocations relative to the largest holding");

    table
        .rows()
        .iter()
        .map(|row| row.amount / largest / scaled_total * 100.0)
        .collect()
}

/// Compute allocation percentages and flag holdings above `threshold_percent`.
///
/// A row is flagged only when its allocation is strictly greater than the
/// threshold. Tables whose total is zero yield [`AnalysisOutcome::NoSignal`].
pub fn analyze(table: &PortfolioTable, threshold_percent: f64) -> Result<AnalysisOutcome, AnalysisError> {
    validate_threshold(threshold_percent)?;

    let total_invested = table.total_invested();
    if total_invested <= 0.0 {
        info!("No concentration signal: {} rows with zero total invested", table.len());
        return Ok(AnalysisOutcome::NoSignal { row_count: table.len() });
    }

    let rows: Vec<AllocationRow> = table
        .rows()
        .iter()
        .zip(allocation_percents(table, total_invested))
        .map(|(row, allocation_percent)| AllocationRow {
            label: row.label.clone(),
            amount: row.amount,
            allocation_percent,
        })
        .collect();

    let flagged: Vec<AllocationRow> = rows
        .iter()
        .filter(|row| row.allocation_percent > threshold_percent)
        .cloned()
        .collect();

    let recommendation = if flagged.is_empty() {
        Recommendation::Diversified
    } else {
        Recommendation::Concentrated
    };

    info!(
        "Analyzed {} holdings: total invested {:.2}, {} above {:.1}% threshold",
        rows.len(),
        total_invested,
        flagged.len(),
        threshold_percent
    );

    Ok(AnalysisOutcome::Analyzed(AnalysisResult {
        total_invested,
        threshold_percent,
        rows,
        flagged,
        recommendation,
    }))
}
