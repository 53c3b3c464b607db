use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::access::AccessContext;
use crate::errors::AppError;
use crate::models::{AnalysisResult, PipelineOutcome, PipelineReport, RiskNarrative};
use crate::services::{export_service, narrative_service, pipeline_service};
use crate::state::AppState;

const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/jpg"];

const MAX_SCREENSHOT_BYTES: usize = 10 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/text", post(analyze_text))
        .route(
            "/screenshot",
            post(analyze_screenshot).layer(DefaultBodyLimit::max(MAX_SCREENSHOT_BYTES)),
        )
        .route("/export/csv", post(export_csv))
        .route("/export/report", post(export_report))
}

/// Body for the text based endpoints
#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    pub raw_text: String,
    /// Overrides the configured concentration threshold
    pub threshold_percent: Option<f64>,
    #[serde(default)]
    pub include_summary: bool,
}

/// Query parameters for screenshot analysis
#[derive(Debug, Deserialize)]
pub struct ScreenshotParams {
    pub threshold_percent: Option<f64>,
    #[serde(default)]
    pub include_summary: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub request_id: Uuid,
    pub principal: String,
    #[serde(flatten)]
    pub report: PipelineReport,
    pub recommendation_message: Option<String>,
    pub narrative: Option<RiskNarrative>,
    /// Text returned by the vision model, for screenshot requests
    pub raw_response: Option<String>,
}

async fn build_response(
    state: &AppState,
    access: AccessContext,
    report: PipelineReport,
    include_summary: bool,
    raw_response: Option<String>,
) -> AnalysisResponse {
    let narrative = match (&report.outcome, include_summary) {
        (PipelineOutcome::Analyzed(result), true) => {
            narrative_service::try_fetch_model_summary(&state.llm_service, result).await
        }
        _ => None,
    };

    let recommendation_message = report
        .analysis()
        .map(|r| r.recommendation.message().to_string());

    AnalysisResponse {
        request_id: access.request_id,
        principal: access.principal,
        report,
        recommendation_message,
        narrative,
        raw_response,
    }
}

/// POST /api/analysis/text
///
/// Normalize a raw model response and analyze the holdings it contains.
#[axum::debug_handler]
pub async fn analyze_text(
    access: AccessContext,
    State(state): State<AppState>,
    Json(data): Json<AnalyzeTextRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let threshold = data.threshold_percent.unwrap_or(state.config.concentration_threshold);
    info!(
        "POST /api/analysis/text [{}] - {} chars, threshold {:.1}%",
        access.request_id,
        data.raw_text.len(),
        threshold
    );

    let report = pipeline_service::run(&data.raw_text, threshold)?;
    let response = build_response(&state, access, report, data.include_summary, None).await;

    Ok(Json(response))
}

/// POST /api/analysis/screenshot
///
/// Body is the raw image (`Content-Type: image/png` or `image/jpeg`).
/// Example: POST /api/analysis/screenshot?threshold_percent=25&include_summary=true
#[axum::debug_handler]
pub async fn analyze_screenshot(
    access: AccessContext,
    State(state): State<AppState>,
    Query(params): Query<ScreenshotParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AnalysisResponse>, AppError> {
    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
        .unwrap_or_default();

    info!(
        "POST /api/analysis/screenshot [{}] - {} bytes ({})",
        access.request_id,
        body.len(),
        mime_type
    );

    if !ACCEPTED_IMAGE_TYPES.contains(&mime_type.as_str()) {
        return Err(AppError::Validation(format!(
            "Unsupported image type '{}'; upload a PNG or JPEG screenshot",
            mime_type
        )));
    }

    if body.is_empty() {
        return Err(AppError::Validation("Screenshot body is empty".to_string()));
    }

    let threshold = params.threshold_percent.unwrap_or(state.config.concentration_threshold);
    crate::services::concentration_service::validate_threshold(threshold)?;

    let completion = pipeline_service::extract_from_image(
        &state.llm_service,
        state.image_host.as_deref(),
        body.to_vec(),
        &mime_type,
    )
    .await
    .map_err(|e| {
        error!("Screenshot extraction failed [{}]: {}", access.request_id, e);
        e
    })?;

    let report = pipeline_service::run(&completion.content, threshold)?;
    let response = build_response(&state, access, report, params.include_summary, Some(completion.content)).await;

    Ok(Json(response))
}

fn require_analysis(report: PipelineReport) -> Result<AnalysisResult, AppError> {
    match report.outcome {
        PipelineOutcome::Analyzed(result) => Ok(result),
        PipelineOutcome::Empty => Err(AppError::Unprocessable(
            "No holdings could be extracted from the response".to_string(),
        )),
        PipelineOutcome::NoSignal { .. } => Err(AppError::Unprocessable(
            "Total invested is zero; nothing to export".to_string(),
        )),
    }
}

/// POST /api/analysis/export/csv
#[axum::debug_handler]
pub async fn export_csv(
    access: AccessContext,
    State(state): State<AppState>,
    Json(data): Json<AnalyzeTextRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("POST /api/analysis/export/csv [{}]", access.request_id);

    let threshold = data.threshold_percent.unwrap_or(state.config.concentration_threshold);
    let result = require_analysis(pipeline_service::run(&data.raw_text, threshold)?)?;

    let body = export_service::to_csv(&result).map_err(|e| {
        error!("CSV export failed [{}]: {:#}", access.request_id, e);
        AppError::External(format!("Failed to export CSV: {}", e))
    })?;

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=\"portfolio_analysis.csv\""),
        ],
        body,
    ))
}

/// POST /api/analysis/export/report
#[axum::debug_handler]
pub async fn export_report(
    access: AccessContext,
    State(state): State<AppState>,
    Json(data): Json<AnalyzeTextRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("POST /api/analysis/export/report [{}]", access.request_id);

    let threshold = data.threshold_percent.unwrap_or(state.config.concentration_threshold);
    let result = require_analysis(pipeline_service::run(&data.raw_text, threshold)?)?;

    let narrative = if data.include_summary {
        narrative_service::try_fetch_model_summary(&state.llm_service, &result).await
    } else {
        None
    };

    let body = export_service::to_report(&result, narrative.as_ref().map(|n| n.summary.as_str()));

    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=\"portfolio_risk_report.txt\""),
        ],
        body,
    ))
}
