use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

const IMGBB_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Public image hosting used to hand screenshots to the vision model by URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image_bytes: &[u8]) -> Result<String, ImageHostError>;
}

pub struct ImgBbHost {
    client: reqwest::Client,
    api_key: String,
}

impl ImgBbHost {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImgBbResponse {
    data: Option<ImgBbData>,
    success: Option<bool>,
    error: Option<ImgBbError>,
}

#[derive(Debug, Deserialize)]
struct ImgBbData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ImgBbError {
    message: String,
}

fn hosted_url(body: ImgBbResponse) -> Result<String, ImageHostError> {
    if let Some(err) = body.error {
        return Err(ImageHostError::BadResponse(err.message));
    }

    if body.success == Some(false) {
        return Err(ImageHostError::BadResponse("upload was not successful".into()));
    }

    body.data
        .map(|d| d.url)
        .ok_or_else(|| ImageHostError::BadResponse("missing image url".into()))
}

#[async_trait]
impl ImageHost for ImgBbHost {
    async fn upload(&self, image_bytes: &[u8]) -> Result<String, ImageHostError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);

        let resp = self
            .client
            .post(IMGBB_UPLOAD_URL)
            .form(&[("key", self.api_key.as_str()), ("image", encoded.as_str())])
            .send()
            .await
            .map_err(|e| ImageHostError::Network(e.to_string()))?;

        let body = resp
            .json::<ImgBbResponse>()
            .await
            .map_err(|e| ImageHostError::Parse(e.to_string()))?;

        let url = hosted_url(body)?;
        info!("Uploaded screenshot to ImgBB: {}", url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosted_url_success() {
        let body: ImgBbResponse = serde_json::from_str(
            r#"{"data":{"url":"https://i.ibb.co/abc/shot.png"},"success":true,"status":200}"#,
        )
        .unwrap();
        assert_eq!(hosted_url(body).unwrap(), "https://i.ibb.co/abc/shot.png");
    }

    #[test]
    fn test_hosted_url_error_message() {
        let body: ImgBbResponse = serde_json::from_str(
            r#"{"status_code":400,"error":{"message":"Invalid API v1 key.","code":100}}"#,
        )
        .unwrap();
        let err = hosted_url(body).unwrap_err();
        assert!(err.to_string().contains("Invalid API v1 key."));
    }
}
