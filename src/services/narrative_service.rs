use chrono::Utc;
use tracing::{info, warn};

use crate::errors::{AppError, LlmError};
use crate::models::{AnalysisResult, RiskNarrative};
use crate::services::llm_service::LlmService;

/// Ask the model for a short narrative about the analyzed portfolio.
///
/// The returned text is stored as-is; it never changes the computed numbers.
pub async fn fetch_model_summary(
    llm_service: &LlmService,
    result: &AnalysisResult,
) -> Result<RiskNarrative, AppError> {
    info!("Generating narrative for {} holdings", result.rows.len());

    if !llm_service.is_enabled() {
        return Err(AppError::Llm(LlmError::Disabled));
    }

    let prompt = build_summary_prompt(result);
    let completion = llm_service.generate_completion(prompt).await?;

    let summary = completion.content.trim().to_string();
    if summary.is_empty() {
        warn!("Model {} returned an empty narrative", completion.model);
        return Err(AppError::Llm(LlmError::InvalidResponse("empty narrative".to_string())));
    }

    Ok(RiskNarrative {
        summary,
        model: Some(completion.model),
        generated_at: Utc::now(),
    })
}

/// Like [`fetch_model_summary`] but degrades to `None` on any failure.
pub async fn try_fetch_model_summary(
    llm_service: &LlmService,
    result: &AnalysisResult,
) -> Option<RiskNarrative> {
    match fetch_model_summary(llm_service, result).await {
        Ok(narrative) => Some(narrative),
        Err(AppError::Llm(LlmError::Disabled)) => None,
        Err(e) => {
            warn!("Narrative unavailable, returning numeric analysis only: {}", e);
            None
        }
    }
}

/// Render the allocation table as text for the model.
pub fn table_as_text(result: &AnalysisResult) -> String {
    result
        .rows
        .iter()
        .map(|r| format!("{}, {:.2}, {:.1}%", r.label, r.amount, r.allocation_percent))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_summary_prompt(result: &AnalysisResult) -> String {
    let flagged = if result.flagged.is_empty() {
        "None".to_string()
    } else {
        result
            .flagged
            .iter()
            .map(|r| format!("- {} ({:.1}%)", r.label, r.allocation_percent))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Review this investment portfolio extracted from a screenshot and write a short risk summary.

PORTFOLIO OVERVIEW:
- Total Invested: {:.2}
- Number of Holdings: {}
- Concentration Threshold: {:.1}%

HOLDINGS (name, amount, allocation):
{}

HOLDINGS ABOVE THRESHOLD:
{}

COMPUTED RECOMMENDATION:
{}

INSTRUCTIONS:
- Write one paragraph of 3-5 sentences in plain language for a retail investor
- Explain what the concentration level means for risk
- Use educational language, NOT investment advice
- Do NOT recommend buying or selling specific securities
- Do NOT change or recompute the figures above"#,
        result.total_invested,
        result.rows.len(),
        result.threshold_percent,
        table_as_text(result),
        flagged,
        result.recommendation.message()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AllocationRow, Recommendation};

    fn sample() -> AnalysisResult {
        let rows = vec![
            AllocationRow { label: "Infosys".to_string(), amount: 50000.0, allocation_percent: 25.0 },
            AllocationRow { label: "TCS".to_string(), amount: 150000.0, allocation_percent: 75.0 },
        ];
        AnalysisResult {
            total_invested: 200000.0,
            threshold_percent: 30.0,
            flagged: vec![rows[1].clone()],
            rows,
            recommendation: Recommendation::Concentrated,
        }
    }

    #[test]
    fn test_build_summary_prompt() {
        let prompt = build_summary_prompt(&sample());

        assert!(prompt.contains("Total Invested: 200000.00"));
        assert!(prompt.contains("Number of Holdings: 2"));
        assert!(prompt.contains("Infosys, 50000.00, 25.0%"));
        assert!(prompt.contains("- TCS (75.0%)"));
        assert!(prompt.contains("NOT investment advice"));
    }

    #[test]
    fn test_table_as_text() {
        assert_eq!(
            table_as_text(&sample()),
            "Infosys, 50000.00, 25.0%\nTCS, 150000.00, 75.0%"
        );
    }

    #[tokio::test]
    async fn test_disabled_service_yields_no_narrative() {
        let service = LlmService::disabled();

        assert!(matches!(
            fetch_model_summary(&service, &sample()).await,
            Err(AppError::Llm(LlmError::Disabled))
        ));
        assert!(try_fetch_model_summary(&service, &sample()).await.is_none());
    }
}
