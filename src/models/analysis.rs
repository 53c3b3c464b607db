use serde::{Deserialize, Serialize};

use crate::models::NormalizeStats;

/// A holding together with its share of the total invested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub label: String,
    pub amount: f64,
    pub allocation_percent: f64,
}

/// Overall verdict derived from the flagged holdings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Concentrated,
    Diversified,
}

impl Recommendation {
    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::Concentrated => {
                "Your portfolio is concentrated: one or more holdings exceed the concentration \
                 threshold. Consider reducing these overweight positions and spreading the \
                 proceeds across other assets to lower single-holding risk."
            }
            Recommendation::Diversified => {
                "Your portfolio is diversified: no single holding exceeds the concentration \
                 threshold. Keep monitoring your allocations periodically as prices move."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub total_invested: f64,
    pub threshold_percent: f64,
    pub rows: Vec<AllocationRow>,
    pub flagged: Vec<AllocationRow>,
    pub recommendation: Recommendation,
}

impl AnalysisResult {
    pub fn is_concentrated(&self) -> bool {
        self.recommendation == Recommendation::Concentrated
    }
}

/// Outcome of running the concentration analyzer on a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Analyzed(AnalysisResult),
    /// Total invested is zero, so there is nothing to allocate.
    NoSignal { row_count: usize },
}

/// End-to-end outcome of one raw response going through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// No parseable rows were found in the model output.
    Empty,
    /// Rows were extracted but all amounts are zero.
    NoSignal { row_count: usize },
    Analyzed(AnalysisResult),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub stats: NormalizeStats,
    pub outcome: PipelineOutcome,
}

impl PipelineReport {
    pub fn analysis(&self) -> Option<&AnalysisResult> {
        match &self.outcome {
            PipelineOutcome::Analyzed(result) => Some(result),
            _ => None,
        }
    }
}
