//! Clip ordering and length reconciliation against narration.

use crate::clip::RenderedClip;

/// Differences below one frame are not worth a hold clip.
const RECONCILE_EPSILON_FRAMES: f64 = 1.0;

/// Ordered clips of one compilation.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    clips: Vec<RenderedClip>,
}

impl Timeline {
    /// Interleave `scenes` with `transition`, one bridge between each pair of
    /// consecutive scene clips.
    pub fn assemble(scenes: Vec<RenderedClip>, transition: Option<&RenderedClip>) -> Self {
        let mut clips = Vec::with_capacity(scenes.len() * 2);
        for (i, scene) in scenes.into_iter().enumerate() {
            if i > 0 {
                if let Some(bridge) = transition {
                    clips.push(bridge.clone());
                }
            }
            clips.push(scene);
        }
        Self { clips }
    }

    pub fn clips(&self) -> &[RenderedClip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn scene_count(&self) -> usize {
        self.clips.iter().filter(|c| c.is_scene()).count()
    }

    /// Sum of rendered clip durations, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.duration).sum()
    }

    /// Last clip that shows a scene image.
    pub fn last_scene(&self) -> Option<&RenderedClip> {
        self.clips.iter().rev().find(|c| c.is_scene())
    }

    pub fn push(&mut self, clip: RenderedClip) {
        self.clips.push(clip);
    }
}

/// How the timeline is brought to the narration length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    /// No narration, or lengths already agree: encode the timeline as is.
    Keep { duration: f64 },
    /// Narration is longer: append a hold of `hold` seconds, then cut at
    /// `duration`.
    Extend { hold: f64, duration: f64 },
    /// Narration is shorter: cut the timeline at `duration`.
    Trim { duration: f64 },
}

impl Reconciliation {
    pub fn plan(timeline_total: f64, audio_duration: Option<f64>, fps: u32) -> Self {
        let Some(audio) = audio_duration else {
            return Reconciliation::Keep {
                duration: timeline_total,
            };
        };

        let epsilon = RECONCILE_EPSILON_FRAMES / fps.max(1) as f64;
        let deficit = audio - timeline_total;

        if deficit > epsilon {
            Reconciliation::Extend {
                hold: deficit,
                duration: audio,
            }
        } else if deficit < 0.0 {
            Reconciliation::Trim { duration: audio }
        } else {
            Reconciliation::Keep { duration: audio }
        }
    }

    /// Final output length in seconds.
    pub fn duration(&self) -> f64 {
        match *self {
            Reconciliation::Keep { duration }
            | Reconciliation::Extend { duration, .. }
            | Reconciliation::Trim { duration } => duration,
        }
    }
}
