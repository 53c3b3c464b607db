use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, error};

use crate::errors::LlmError;

/// Instruction sent alongside the screenshot
pub const EXTRACTION_PROMPT: &str = "You are a financial assistant. Extract the investment table from this screenshot. \
Output it in valid CSV format with two columns: 'Stock' and 'Amount Invested'. \
Return only the CSV table and nothing else.";

const SYSTEM_PROMPT: &str = "You are a helpful portfolio analysis assistant. Provide educational insights about \
portfolio concentration and risk. Do NOT give buy/sell recommendations for specific securities.";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for LLM service
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub fallback_model: String,
    pub vision_fallback_model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            api_key: None,
            base_url: OPENAI_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
            fallback_model: "gpt-3.5-turbo".to_string(),
            vision_fallback_model: "gpt-4o-mini".to_string(),
            max_tokens: 500,
            temperature: 0.2,
        }
    }
}

/// Screenshot handed to the vision model, either already hosted or inline.
#[derive(Debug, Clone)]
pub enum ImageInput {
    Url(String),
    Inline { bytes: Vec<u8>, mime_type: String },
}

impl ImageInput {
    /// URL form accepted by the chat-completions `image_url` part.
    pub fn to_url(&self) -> String {
        match self {
            ImageInput::Url(url) => url.clone(),
            ImageInput::Inline { bytes, mime_type } => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                format!("data:{};base64,{}", mime_type, encoded)
            }
        }
    }
}

/// Text returned by the model, with the model that actually produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub model: String,
}

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate_completion(&self, prompt: String) -> Result<Completion, LlmError>;

    /// Ask a vision model to transcribe the holdings table in a screenshot
    async fn extract_table(&self, image: ImageInput) -> Result<Completion, LlmError>;
}

#[derive(Debug, Serialize, Clone)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize, Clone)]
struct OpenAiMessage {
    role: String,
    content: OpenAiContent,
}

#[derive(Debug, Serialize, Clone)]
#[serde(untagged)]
enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiContentPart>),
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type")]
enum OpenAiContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: OpenAiImageUrl },
}

#[derive(Debug, Serialize, Clone)]
struct OpenAiImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Map a failed HTTP response onto an [`LlmError`].
fn classify_http_error(status: StatusCode, body: &str) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        if body.contains("insufficient_quota") {
            return LlmError::QuotaExceeded(body.to_string());
        }
        return LlmError::RateLimited;
    }
    LlmError::ApiError(format!("HTTP {}: {}", status, body))
}

/// Run `call` with the primary model. On a quota, rate-limit or API error the
/// fallback model is substituted once; the model that answered is returned
/// alongside the value.
async fn call_with_fallback<T, F, Fut>(
    primary_model: &str,
    fallback_model: &str,
    mut call: F,
) -> Result<(T, String), LlmError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    match call(primary_model.to_string()).await {
        Ok(value) => Ok((value, primary_model.to_string())),
        Err(e) if e.allows_fallback() && primary_model != fallback_model => {
            warn!("OpenAI call with {} failed: {}. Falling back to {}", primary_model, e, fallback_model);
            match call(fallback_model.to_string()).await {
                Ok(value) => Ok((value, fallback_model.to_string())),
                Err(e) => {
                    error!("Fallback model {} also failed: {}", fallback_model, e);
                    Err(e)
                }
            }
        }
        Err(e) => {
            error!("OpenAI call with {} failed: {}", primary_model, e);
            Err(e)
        }
    }
}

/// OpenAI provider implementation
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    model: String,
    fallback_model: String,
    vision_fallback_model: String,
    max_tokens: usize,
    temperature: f32,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
            vision_fallback_model: config.vision_fallback_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    /// Send `request`, substituting `fallback_model` once if the primary fails
    async fn complete(&self, request: OpenAiRequest, fallback_model: &str) -> Result<Completion, LlmError> {
        let primary_model = request.model.clone();
        let (response, model) = call_with_fallback(&primary_model, fallback_model, |model| {
            let request = OpenAiRequest { model, ..request.clone() };
            async move { self.call_openai(&request).await }
        })
        .await?;

        if let Some(usage) = &response.usage {
            info!("LLM completion generated by {}. Tokens: {} prompt + {} completion = {} total",
                  model, usage.prompt_tokens, usage.completion_tokens, usage.total_tokens);
        }

        let content = response.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        Ok(Completion { content, model })
    }

    async fn call_openai(&self, request: &OpenAiRequest) -> Result<OpenAiResponse, LlmError> {
        let response = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_http_error(status, &error_text));
        }

        response.json::<OpenAiResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_completion(&self, prompt: String) -> Result<Completion, LlmError> {
        info!("Generating LLM completion (model: {}, max_tokens: {})", self.model, self.max_tokens);

        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: OpenAiContent::Text(SYSTEM_PROMPT.to_string()),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: OpenAiContent::Text(prompt),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        self.complete(request, &self.fallback_model).await
    }

    async fn extract_table(&self, image: ImageInput) -> Result<Completion, LlmError> {
        info!("Sending screenshot to vision model {}", self.model);

        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: OpenAiContent::Parts(vec![
                    OpenAiContentPart::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    OpenAiContentPart::ImageUrl {
                        image_url: OpenAiImageUrl { url: image.to_url() },
                    },
                ]),
            }],
            // Tables can be long; do not cap extraction at the narrative budget
            max_tokens: self.max_tokens.max(2000),
            temperature: 0.0,
        };

        self.complete(request, &self.vision_fallback_model).await
    }
}

/// LLM service with provider abstraction
pub struct LlmService {
    provider: Option<Arc<dyn LlmProvider>>,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Self {
        let provider = if config.enabled {
            if let Some(api_key) = &config.api_key {
                if !api_key.is_empty() {
                    info!("Initializing LLM service with provider: {}", config.provider);
                    match config.provider.as_str() {
                        "openai" => match OpenAiProvider::new(&config, api_key.clone()) {
                            Ok(provider) => Some(Arc::new(provider) as Arc<dyn LlmProvider>),
                            Err(e) => {
                                error!("Failed to initialize OpenAI provider: {}. LLM features disabled.", e);
                                None
                            }
                        },
                        _ => {
                            warn!("Unknown LLM provider: {}. LLM features disabled.", config.provider);
                            None
                        }
                    }
                } else {
                    warn!("LLM API key is empty. LLM features disabled.");
                    None
                }
            } else {
                warn!("LLM API key not configured. LLM features disabled.");
                None
            }
        } else {
            info!("LLM features are disabled in configuration");
            None
        };

        Self { provider }
    }

    /// Build a service around an existing provider
    pub fn with_provider(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn disabled() -> Self {
        Self { provider: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn generate_completion(&self, prompt: String) -> Result<Completion, LlmError> {
        let provider = self.provider.as_ref()
            .ok_or(LlmError::Disabled)?;

        provider.generate_completion(prompt).await
    }

    pub async fn extract_table(&self, image: ImageInput) -> Result<Completion, LlmError> {
        let provider = self.provider.as_ref()
            .ok_or(LlmError::Disabled)?;

        provider.extract_table(image).await
    }
}
