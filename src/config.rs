use std::net::SocketAddr;
use std::str::FromStr;
use tracing::warn;

use crate::errors::AnalysisError;
use crate::services::concentration_service::{validate_threshold, DEFAULT_CONCENTRATION_THRESHOLD};
use crate::services::llm_service::LlmConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub concentration_threshold: f64,
    /// When set, every API request must carry `Authorization: Bearer <token>`.
    pub access_token: Option<String>,
    pub llm: LlmConfig,
    pub imgbb_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            concentration_threshold: DEFAULT_CONCENTRATION_THRESHOLD,
            access_token: None,
            llm: LlmConfig::default(),
            imgbb_api_key: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match non_empty_var(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid value for {}: {:?}, using default", name, raw);
            default
        }),
        None => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AnalysisError> {
        let defaults = Self::default();
        let llm_defaults = LlmConfig::default();

        let concentration_threshold = parse_var("CONCENTRATION_THRESHOLD", defaults.concentration_threshold);
        validate_threshold(concentration_threshold)?;

        let llm = LlmConfig {
            enabled: parse_var("LLM_ENABLED", llm_defaults.enabled),
            provider: non_empty_var("LLM_PROVIDER").unwrap_or(llm_defaults.provider),
            api_key: non_empty_var("OPENAI_API_KEY"),
            base_url: non_empty_var("LLM_BASE_URL").unwrap_or(llm_defaults.base_url),
            model: non_empty_var("LLM_MODEL").unwrap_or(llm_defaults.model),
            fallback_model: non_empty_var("LLM_FALLBACK_MODEL").unwrap_or(llm_defaults.fallback_model),
            vision_fallback_model: non_empty_var("LLM_VISION_FALLBACK_MODEL")
                .unwrap_or(llm_defaults.vision_fallback_model),
            max_tokens: parse_var("LLM_MAX_TOKENS", llm_defaults.max_tokens),
            temperature: parse_var("LLM_TEMPERATURE", llm_defaults.temperature),
        };

        Ok(Self {
            bind_addr: parse_var("BIND_ADDR", defaults.bind_addr),
            concentration_threshold,
            access_token: non_empty_var("ACCESS_TOKEN"),
            llm,
            imgbb_api_key: non_empty_var("IMGBB_API_KEY"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.concentration_threshold, 30.0);
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.access_token.is_none());
        assert!(!config.llm.enabled);
    }

    #[test]
    fn test_parse_var_falls_back_on_garbage() {
        std::env::set_var("RISKFOLIO_TEST_MAX_TOKENS", "lots");
        assert_eq!(parse_var("RISKFOLIO_TEST_MAX_TOKENS", 500usize), 500);
        std::env::set_var("RISKFOLIO_TEST_MAX_TOKENS", " 800 ");
        assert_eq!(parse_var("RISKFOLIO_TEST_MAX_TOKENS", 500usize), 800);
        std::env::remove_var("RISKFOLIO_TEST_MAX_TOKENS");
        assert_eq!(parse_var("RISKFOLIO_TEST_MAX_TOKENS", 500usize), 500);
    }
}
