//! Text-to-image generation.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AiConfig;
use crate::error::{AiError, AiResult};

const SERVICE: &str = "imagen";

/// Produces encoded image bytes (PNG or JPEG) for a prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, width: u32, height: u32) -> AiResult<Vec<u8>>;
}

/// Imagen `:predict` request.
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Instance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    sample_count: u32,
    aspect_ratio: &'static str,
}

/// Imagen `:predict` response.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

/// Aspect ratios Imagen accepts, as (label, width / height).
const ASPECT_RATIOS: [(&str, f64); 5] = [
    ("1:1", 1.0),
    ("3:4", 3.0 / 4.0),
    ("4:3", 4.0 / 3.0),
    ("9:16", 9.0 / 16.0),
    ("16:9", 16.0 / 9.0),
];

/// Closest supported aspect ratio label for a requested size.
pub fn aspect_ratio_for(width: u32, height: u32) -> &'static str {
    if width == 0 || height == 0 {
        return "1:1";
    }
    let target = width as f64 / height as f64;
    ASPECT_RATIOS
        .iter()
        .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
        .map(|(label, _)| *label)
        .unwrap_or("1:1")
}

/// Gemini API (Imagen) image generation client.
pub struct GeminiImageClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl GeminiImageClient {
    pub fn new(config: &AiConfig) -> AiResult<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| AiError::config("GEMINI_API_KEY not set"))?;

        Ok(Self {
            api_key,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.image_model.clone(),
            client: Client::new(),
        })
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn generate(&self, prompt: &str, width: u32, height: u32) -> AiResult<Vec<u8>> {
        let url = format!("{}/models/{}:predict", self.base_url, self.model);
        let request = PredictRequest {
            instances: vec![Instance { prompt }],
            parameters: Parameters {
                sample_count: 1,
                aspect_ratio: aspect_ratio_for(width, height),
            },
        };

        debug!(model = %self.model, aspect_ratio = request.parameters.aspect_ratio, "Requesting image");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::api(SERVICE, status.as_u16(), error_text));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| AiError::invalid_response(SERVICE, e.to_string()))?;

        let encoded = body
            .predictions
            .into_iter()
            .find_map(|p| p.bytes_base64_encoded)
            .ok_or_else(|| AiError::invalid_response(SERVICE, "no image in response"))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| AiError::invalid_response(SERVICE, format!("bad base64 payload: {}", e)))?;

        info!(bytes = bytes.len(), "Generated image");
        Ok(bytes)
    }
}
