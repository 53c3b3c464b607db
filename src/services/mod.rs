pub mod extraction_service;
pub mod concentration_service;
pub mod export_service;
pub mod llm_service;
pub mod narrative_service;
pub mod pipeline_service;
