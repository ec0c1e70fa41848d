//! External AI service clients for StoryReel.
//!
//! The pipeline only depends on the [`ImageGenerator`], [`SpeechSynthesizer`]
//! and [`Transcriber`] traits; the HTTP clients here are the production
//! implementations.

pub mod config;
pub mod error;
pub mod image;
pub mod speech;

pub use config::AiConfig;
pub use error::{AiError, AiResult};
pub use image::{aspect_ratio_for, GeminiImageClient, ImageGenerator};
pub use speech::{SpeechClient, SpeechSynthesizer, Transcriber};
