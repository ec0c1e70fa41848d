//! Shared data models for StoryReel.
//!
//! This crate provides Serde-serializable types for:
//! - Scenes and motion effects
//! - Jobs and their lifecycle state machine
//! - Encoding and render configuration

pub mod effect;
pub mod encoding;
pub mod job;
pub mod scene;

// Re-export common types
pub use effect::{EffectParseError, MotionEffect, PanDirection, PAN_TRAVEL_PX};
pub use encoding::{EncodingConfig, RenderSettings};
pub use job::{Job, JobId, JobKind, JobState, TransitionError};
pub use scene::Scene;
