use std::sync::Arc;

use crate::config::AppConfig;
use crate::external::image_host::ImageHost;
use crate::services::llm_service::LlmService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub llm_service: Arc<LlmService>,
    pub image_host: Option<Arc<dyn ImageHost>>,
}
