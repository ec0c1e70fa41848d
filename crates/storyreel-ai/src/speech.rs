//! Narration synthesis and speech transcription.
//!
//! Both capabilities go through an OpenAI-compatible HTTP API
//! (`/audio/speech` and `/audio/transcriptions`).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::AiConfig;
use crate::error::{AiError, AiResult};

const TTS_SERVICE: &str = "speech";
const STT_SERVICE: &str = "transcription";

/// Turns narration text into an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Write narration for `text` to `output` (MP3) and return its path.
    async fn synthesize(&self, text: &str, output: &Path) -> AiResult<PathBuf>;
}

/// Turns a speech recording into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> AiResult<String>;
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// OpenAI-compatible speech client.
pub struct SpeechClient {
    api_base: String,
    api_key: Option<String>,
    tts_model: String,
    voice: String,
    transcribe_model: String,
    language: String,
    client: Client,
}

impl SpeechClient {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            api_base: config.speech_api_base.trim_end_matches('/').to_string(),
            api_key: config.speech_api_key.clone(),
            tts_model: config.tts_model.clone(),
            voice: config.tts_voice.clone(),
            transcribe_model: config.transcribe_model.clone(),
            language: config.narration_language.clone(),
            client: Client::new(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn check(service: &'static str, response: reqwest::Response) -> AiResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        Err(AiError::api(service, status.as_u16(), error_text))
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, text: &str, output: &Path) -> AiResult<PathBuf> {
        debug!(chars = text.chars().count(), voice = %self.voice, "Requesting narration");

        let request = SpeechRequest {
            model: &self.tts_model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };
        let response = self
            .authorized(self.client.post(format!("{}/audio/speech", self.api_base)))
            .json(&request)
            .send()
            .await?;
        let audio = Self::check(TTS_SERVICE, response).await?.bytes().await?;

        if audio.is_empty() {
            return Err(AiError::invalid_response(TTS_SERVICE, "empty audio body"));
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, &audio).await?;

        info!(bytes = audio.len(), path = %output.display(), "Narration synthesized");
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl Transcriber for SpeechClient {
    async fn transcribe(&self, audio: &Path) -> AiResult<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        debug!(bytes = bytes.len(), file = %file_name, "Requesting transcription");

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("model", self.transcribe_model.clone())
            .text("language", self.language.clone())
            .text("response_format", "json");

        let response = self
            .authorized(self.client.post(format!("{}/audio/transcriptions", self.api_base)))
            .multipart(form)
            .send()
            .await?;
        let body: TranscriptionResponse = Self::check(STT_SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| AiError::invalid_response(STT_SERVICE, e.to_string()))?;

        let text = body.text.trim().to_string();
        info!(chars = text.chars().count(), "Transcription complete");
        Ok(text)
    }
}
