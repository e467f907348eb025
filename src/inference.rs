use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use image::{ImageFormat, ImageReader};
use reqwest::{header::CONTENT_TYPE, Client};
use serde_json::json;
use thiserror::Error;
use tracing::{info, error};

use crate::{config::Config, models::GeneratedImage};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("network error: {0}")] Network(String),
    #[error("inference host returned status={status} body={body}")] Status { status: u16, body: String },
    #[error("unexpected payload: {0}")] Payload(String),
}

/// Anything that can turn a prompt into an image. The session only talks to this.
#[async_trait]
pub trait ImageGenerator: Send + Sync + 'static {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, GenerationError>;
}

pub struct InferenceClient {
    client: Client,
    api_token: String,
    endpoint: String,
}

impl InferenceClient {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            api_token: config.api_token.clone().unwrap_or_default(),
            endpoint: config.endpoint(),
        })
    }

    async fn perform_api_call(&self, prompt: &str) -> Result<(Bytes, Option<String>), GenerationError> {
        info!("🔗 Making request to: {}", self.endpoint);

        let response = self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&json!({ "inputs": prompt }))
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", truncate(&body, 500));
            return Err(GenerationError::Status { status: status.as_u16(), body: truncate(&body, 500) });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let payload = response.bytes().await.map_err(|e| GenerationError::Network(e.to_string()))?;
        info!("📦 Received {} bytes ({})", payload.len(), content_type.as_deref().unwrap_or("no content type"));
        Ok((payload, content_type))
    }
}

#[async_trait]
impl ImageGenerator for InferenceClient {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let (payload, content_type) = self.perform_api_call(prompt).await?;
        if content_type.as_deref().is_some_and(|ct| ct.starts_with("application/json")) {
            return Err(GenerationError::Payload(format!(
                "expected image bytes, got JSON: {}",
                truncate(&String::from_utf8_lossy(&payload), 500)
            )));
        }
        decode_image_payload(payload)
    }
}

/// Sniffs the format from magic bytes and reads the header dimensions.
/// A body that is not a complete image header is treated as a malformed payload.
pub fn decode_image_payload(payload: Bytes) -> Result<GeneratedImage, GenerationError> {
    if payload.is_empty() {
        return Err(GenerationError::Payload("empty body".into()));
    }
    let format = image::guess_format(&payload)
        .map_err(|e| GenerationError::Payload(format!("unrecognized image data: {}", e)))?;
    let content_type = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        other => return Err(GenerationError::Payload(format!("unsupported image format {:?}", other))),
    };
    let (width, height) = ImageReader::with_format(Cursor::new(&payload[..]), format)
        .into_dimensions()
        .map_err(|e| GenerationError::Payload(format!("corrupt {} image: {}", content_type, e)))?;

    info!("🖼️ Extracted {} image {}x{}", content_type, width, height);
    Ok(GeneratedImage { bytes: payload, content_type, width, height, generated_at: Utc::now() })
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
