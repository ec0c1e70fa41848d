//! Scene definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::effect::MotionEffect;

/// One narrated/visual beat: a prompt fragment mapped to one image and one
/// timeline segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Position in the source text (0-based)
    pub index: usize,
    /// Prompt / narration fragment
    pub text: String,
    /// Display duration in seconds
    pub duration: f64,
    /// Motion effect applied to the scene's image
    pub effect: MotionEffect,
}

impl Scene {
    /// Create a scene with the effect assigned by index.
    pub fn new(index: usize, text: impl Into<String>, duration: f64) -> Self {
        Self {
            index,
            text: text.into(),
            duration,
            effect: MotionEffect::for_index(index),
        }
    }

    pub fn with_effect(mut self, effect: MotionEffect) -> Self {
        self.effect = effect;
        self
    }

    /// Number of whitespace-separated words.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_effect_follows_index() {
        let scenes: Vec<Scene> = (0..5)
            .map(|i| Scene::new(i, format!("scene number {}", i), 3.0))
            .collect();

        assert_eq!(scenes[0].effect, MotionEffect::ZoomIn);
        assert_eq!(scenes[2].effect, MotionEffect::PanRight);
        assert_eq!(scenes[4].effect, MotionEffect::ZoomIn);
        assert_eq!(scenes[1].word_count(), 3);
    }

    #[test]
    fn test_with_effect_overrides() {
        let scene = Scene::new(0, "a quiet harbor at dawn", 4.0).with_effect(MotionEffect::Static);
        assert_eq!(scene.effect, MotionEffect::Static);
    }
}
