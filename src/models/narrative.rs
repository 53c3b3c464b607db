use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-text summary written by the upstream model.
///
/// Stored next to the computed analysis, never merged into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskNarrative {
    pub summary: String,
    pub model: Option<String>,
    pub generated_at: DateTime<Utc>,
}
