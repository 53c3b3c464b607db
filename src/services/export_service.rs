use anyhow::{Context, Result};
use chrono::Utc;
use csv::WriterBuilder;

use crate::models::AnalysisResult;

pub const CSV_HEADER: [&str; 3] = ["label", "amount", "allocation_percent"];

/// Serialize the allocation table as CSV (label, amount, allocation_percent).
pub fn to_csv(result: &AnalysisResult) -> Result<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer
        .write_record(CSV_HEADER)
        .context("Failed to write CSV header")?;

    for row in &result.rows {
        let amount = format_amount(row.amount);
        let allocation = format!("{:.2}", row.allocation_percent);
        writer
            .write_record([row.label.as_str(), amount.as_str(), allocation.as_str()])
            .with_context(|| format!("Failed to write CSV row for {}", row.label))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;

    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{:.2}", amount)
    }
}

/// Render a plain-text risk report.
///
/// The narrative, when present, is appended verbatim under its own heading.
pub fn to_report(result: &AnalysisResult, narrative: Option<&str>) -> String {
    let mut out = format!(
        "Portfolio Risk Report\n\
         Generated: {}\n\n\
         Total invested: {}\n\
         Concentration threshold: {:.1}%\n\n\
         Holdings:\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
        format_amount(result.total_invested),
        result.threshold_percent
    );

    for row in &result.rows {
        let marker = if row.allocation_percent > result.threshold_percent {
            "  [OVERWEIGHT]"
        } else {
            ""
        };
        out.push_str(&format!(
            "- {}: {} ({:.2}%){}\n",
            row.label,
            format_amount(row.amount),
            row.allocation_percent,
            marker
        ));
    }

    out.push_str("\nRecommendation:\n");
    out.push_str(result.recommendation.message());
    out.push('\n');

    if let Some(text) = narrative.map(str::trim).filter(|t| !t.is_empty()) {
        out.push_str("\nAI summary:\n");
        out.push_str(text);
        out.push('\n');
    }

    out
}
