//! External service configuration.

/// Default Gemini API endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default Imagen model.
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";
/// Default OpenAI-compatible speech endpoint.
pub const DEFAULT_SPEECH_API_BASE: &str = "https://api.openai.com/v1";

/// Credentials and model choices for the image and speech services.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub image_model: String,
    pub speech_api_base: String,
    pub speech_api_key: Option<String>,
    pub tts_model: String,
    pub tts_voice: String,
    pub transcribe_model: String,
    /// Language for narration and transcription (ISO 639-1)
    pub narration_language: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            speech_api_base: DEFAULT_SPEECH_API_BASE.to_string(),
            speech_api_key: None,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            transcribe_model: "whisper-1".to_string(),
            narration_language: "en".to_string(),
        }
    }
}

impl AiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_base_url: non_empty_var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            image_model: non_empty_var("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            speech_api_base: non_empty_var("SPEECH_API_BASE").unwrap_or(defaults.speech_api_base),
            speech_api_key: non_empty_var("SPEECH_API_KEY"),
            tts_model: non_empty_var("TTS_MODEL").unwrap_or(defaults.tts_model),
            tts_voice: non_empty_var("TTS_VOICE").unwrap_or(defaults.tts_voice),
            transcribe_model: non_empty_var("TRANSCRIBE_MODEL").unwrap_or(defaults.transcribe_model),
            narration_language: non_empty_var("NARRATION_LANGUAGE")
                .unwrap_or(defaults.narration_language),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
