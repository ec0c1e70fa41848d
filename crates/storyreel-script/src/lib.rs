//! Script processing for StoryReel.
//!
//! This crate provides:
//! - Scene segmentation of free text into image prompts
//! - Reading-pace duration allocation, optionally fitted to narration length
//! - Prompt-list parsing for image-only jobs

pub mod allocate;
pub mod prompts;
pub mod segment;

use storyreel_models::Scene;
use tracing::debug;

pub use allocate::{allocate, base_duration, MIN_SCENE_SECS, WORDS_PER_MINUTE};
pub use prompts::parse_prompt_csv;
pub use segment::{segment, Heuristic, MAX_SCENES, MAX_SCENE_CHARS, MIN_SCENE_CHARS};

/// Segment `text` and time every scene, fitting to `target_total` when known.
///
/// Effects are assigned cyclically by scene index.
pub fn storyboard(text: &str, target_total: Option<f64>) -> Vec<Scene> {
    let fragments = segment(text);
    let durations = allocate(&fragments, target_total);

    debug!(
        scenes = fragments.len(),
        total_secs = durations.iter().sum::<f64>(),
        "Planned storyboard"
    );

    fragments
        .into_iter()
        .zip(durations)
        .enumerate()
        .map(|(index, (text, duration))| Scene::new(index, text, duration))
        .collect()
}
