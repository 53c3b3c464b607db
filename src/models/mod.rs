mod portfolio;
mod analysis;
mod narrative;

pub use portfolio::{TableRow, PortfolioTable, Extraction, NormalizeStats, Normalized};
pub use analysis::{AllocationRow, Recommendation, AnalysisResult, AnalysisOutcome, PipelineOutcome, PipelineReport};
pub use narrative::RiskNarrative;
