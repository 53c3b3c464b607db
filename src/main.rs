use std::sync::Arc;
use tokio::net::TcpListener;

use riskfolio_backend::app;
use riskfolio_backend::config::AppConfig;
use riskfolio_backend::external::image_host::{ImageHost, ImgBbHost};
use riskfolio_backend::logging::{init_logging, LoggingConfig};
use riskfolio_backend::services::llm_service::LlmService;
use riskfolio_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env()?)?;

    let config = AppConfig::from_env()?;

    if config.access_token.is_none() {
        tracing::warn!("ACCESS_TOKEN not set; all requests are served as the debug user");
    }

    let llm_service = Arc::new(LlmService::new(config.llm.clone()));

    let image_host: Option<Arc<dyn ImageHost>> = match &config.imgbb_api_key {
        Some(key) => {
            tracing::info!("🖼️ Using ImgBB for screenshot hosting");
            Some(Arc::new(ImgBbHost::new(key.clone())))
        }
        None => {
            tracing::info!("🖼️ No image host configured; screenshots are sent inline");
            None
        }
    };

    let addr = config.bind_addr;
    tracing::info!(
        "📐 Concentration threshold: {:.1}% (LLM enabled: {})",
        config.concentration_threshold,
        llm_service.is_enabled()
    );

    let state = AppState {
        config: Arc::new(config),
        llm_service,
        image_host,
    };
    let app = app::create_app(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Riskfolio backend running at http://{}/", addr);
    axum::serve(listener, app)
        .await?;

    Ok(())
}
