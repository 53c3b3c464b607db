use tracing::{info, warn};

use crate::errors::{AnalysisError, AppError, LlmError};
use crate::external::image_host::ImageHost;
use crate::models::{AnalysisOutcome, Extraction, PipelineOutcome, PipelineReport};
use crate::services::concentration_service::{analyze, validate_threshold};
use crate::services::extraction_service::normalize;
use crate::services::llm_service::{Completion, ImageInput, LlmService};

/// Run a raw model response through normalization and concentration analysis.
///
/// Only an invalid threshold is an error; empty or degenerate extractions are
/// reported through [`PipelineOutcome`].
pub fn run(raw_text: &str, threshold_percent: f64) -> Result<PipelineReport, AnalysisError> {
    validate_threshold(threshold_percent)?;

    let normalized = normalize(raw_text);

    let outcome = match &normalized.outcome {
        Extraction::Empty => {
            info!("No holdings could be extracted from {} lines", normalized.stats.lines_seen);
            PipelineOutcome::Empty
        }
        Extraction::Table { table } => match analyze(table, threshold_percent)? {
            AnalysisOutcome::Analyzed(result) => PipelineOutcome::Analyzed(result),
            AnalysisOutcome::NoSignal { row_count } => PipelineOutcome::NoSignal { row_count },
        },
    };

    Ok(PipelineReport {
        stats: normalized.stats,
        outcome,
    })
}

/// Send a screenshot to the vision model and return its raw text.
///
/// The image goes through the host when one is configured; if the upload
/// fails it is sent inline instead.
pub async fn extract_from_image(
    llm_service: &LlmService,
    image_host: Option<&dyn ImageHost>,
    image_bytes: Vec<u8>,
    mime_type: &str,
) -> Result<Completion, AppError> {
    if !llm_service.is_enabled() {
        return Err(AppError::Llm(LlmError::Disabled));
    }

    let image = match image_host {
        Some(host) => match host.upload(&image_bytes).await {
            Ok(url) => ImageInput::Url(url),
            Err(e) => {
                warn!("Image upload failed, sending screenshot inline: {}", e);
                ImageInput::Inline { bytes: image_bytes, mime_type: mime_type.to_string() }
            }
        },
        None => ImageInput::Inline { bytes: image_bytes, mime_type: mime_type.to_string() },
    };

    let completion = llm_service.extract_table(image).await?;
    info!(
        "Vision model {} returned {} characters",
        completion.model,
        completion.content.len()
    );

    Ok(completion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::external::image_host::ImageHostError;
    use crate::models::Recommendation;
    use crate::services::llm_service::LlmProvider;

    #[test]
    fn test_end_to_end_example() {
        let raw = "Stock, Amount Invested\nInfosys, 50000\nTCS, 150000\n";
        let report = run(raw, 30.0).unwrap();

        let result = report.analysis().expect("analysis");
        assert_eq!(result.total_invested, 200000.0);
        let allocations: Vec<f64> = result.rows.iter().map(|r| r.allocation_percent).collect();
        assert_eq!(allocations, vec![25.0, 75.0]);
        assert_eq!(result.flagged.len(), 1);
        assert_eq!(result.flagged[0].label, "TCS");
        assert_eq!(result.flagged[0].allocation_percent, 75.0);
        assert_eq!(result.recommendation, Recommendation::Concentrated);
    }

    #[test]
    fn test_prose_is_empty_not_error() {
        let report = run("Sorry, I cannot read this image", 30.0).unwrap();
        assert_eq!(report.outcome, PipelineOutcome::Empty);
    }

    #[test]
    fn test_all_zero_amounts_is_no_signal() {
        let report = run("Stock, Amount\nA, 0\nB, 0", 30.0).unwrap();
        assert_eq!(report.outcome, PipelineOutcome::NoSignal { row_count: 2 });
    }

    #[test]
    fn test_invalid_threshold_fails_even_when_empty() {
        assert!(run("", -5.0).is_err());
    }

    #[test]
    fn test_huge_amounts_keep_allocations_whole() {
        let report = run("Stock, Amount\nA, 1e308\nB, 1e308\n", 30.0).unwrap();

        let result = report.analysis().expect("analysis");
        let allocations: Vec<f64> = result.rows.iter().map(|r| r.allocation_percent).collect();
        assert_eq!(allocations, vec![50.0, 50.0]);
        assert_eq!(result.flagged.len(), 2);
        assert_eq!(result.recommendation, Recommendation::Concentrated);
    }

    struct FailingHost;

    #[async_trait]
    impl ImageHost for FailingHost {
        async fn upload(&self, _image_bytes: &[u8]) -> Result<String, ImageHostError> {
            Err(ImageHostError::Network("connection refused".to_string()))
        }
    }

    struct RecordingProvider {
        seen_urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        async fn generate_completion(&self, _prompt: String) -> Result<Completion, LlmError> {
            Err(LlmError::ApiError("not used".to_string()))
        }

        async fn extract_table(&self, image: ImageInput) -> Result<Completion, LlmError> {
            self.seen_urls.lock().unwrap().push(image.to_url());
            Ok(Completion {
                content: "Stock,Amount\nA,10".to_string(),
                model: "stub-vision".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_failed_upload_sends_screenshot_inline() {
        let provider = Arc::new(RecordingProvider { seen_urls: Mutex::new(Vec::new()) });
        let service = LlmService::with_provider(provider.clone());

        let host: &dyn ImageHost = &FailingHost;
        let completion = extract_from_image(&service, Some(host), b"png".to_vec(), "image/png")
            .await
            .unwrap();

        assert_eq!(completion.content, "Stock,Amount\nA,10");
        let urls = provider.seen_urls.lock().unwrap();
        assert_eq!(urls.as_slice(), ["data:image/png;base64,cG5n"]);
    }

    #[tokio::test]
    async fn test_extract_from_image_requires_llm() {
        let service = LlmService::disabled();
        let result = extract_from_image(&service, None, vec![1, 2, 3], "image/png").await;
        assert!(matches!(result, Err(AppError::Llm(LlmError::Disabled))));
    }
}
