//! Per-scene clip rendering.
//!
//! Every scene is rendered in two tiers:
//!
//! 1. the animated clip for the scene's [`MotionEffect`];
//! 2. if that fails, an un-animated clip that stretches the image over the
//!    whole frame.
//!
//! A scene for which both tiers fail yields no clip; [`with_fallback`] turns
//! the two attempts into a [`SceneOutcome`] so the caller decides what a lost
//! scene means for the compilation.

use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;

use storyreel_models::{MotionEffect, RenderSettings};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{fill_filter, motion_filter};
use crate::motion::{FramePlan, FrameSize, Motion};

/// What a rendered clip holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    /// Animated scene image
    Scene,
    /// Frame-filling static image substituted for a failed animation
    Fallback,
    /// Fade-to-black bridge
    Transition,
    /// Static image extending the timeline to the narration length
    Hold,
}

/// An on-disk, time-bounded visual unit.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedClip {
    pub path: PathBuf,
    /// Rendered duration in seconds, a whole number of output frames
    pub duration: f64,
    pub kind: ClipKind,
}

impl RenderedClip {
    pub fn new(path: impl Into<PathBuf>, duration: f64, kind: ClipKind) -> Self {
        Self {
            path: path.into(),
            duration,
            kind,
        }
    }

    /// Clip rendered for a `requested` length. FFmpeg emits whole frames, so
    /// the recorded duration is the frame-rounded length, not the request.
    pub fn rendered(path: impl Into<PathBuf>, requested: f64, kind: ClipKind, settings: &RenderSettings) -> Self {
        Self::new(path, settings.rendered_duration(requested), kind)
    }

    /// Whether this clip carries a scene image (animated or fallback).
    pub fn is_scene(&self) -> bool {
        matches!(self.kind, ClipKind::Scene | ClipKind::Fallback)
    }
}

/// Result of rendering one scene through both tiers.
#[derive(Debug)]
pub enum SceneOutcome {
    Animated(RenderedClip),
    Fallback { clip: RenderedClip, cause: MediaError },
    Skipped { cause: MediaError, fallback_cause: MediaError },
}

impl SceneOutcome {
    pub fn clip(&self) -> Option<&RenderedClip> {
        match self {
            SceneOutcome::Animated(clip) | SceneOutcome::Fallback { clip, .. } => Some(clip),
            SceneOutcome::Skipped { .. } => None,
        }
    }

    pub fn into_clip(self) -> Option<RenderedClip> {
        match self {
            SceneOutcome::Animated(clip) | SceneOutcome::Fallback { clip, .. } => Some(clip),
            SceneOutcome::Skipped { .. } => None,
        }
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SceneOutcome::Animated(_) => "animated",
            SceneOutcome::Fallback { .. } => "fallback",
            SceneOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// Run `primary`; only if it fails, run `fallback`.
///
/// Both arguments are lazy futures, so the fallback does no work unless it
/// is needed.
pub async fn with_fallback<P, F>(primary: P, fallback: F) -> SceneOutcome
where
    P: Future<Output = MediaResult<RenderedClip>>,
    F: Future<Output = MediaResult<RenderedClip>>,
{
    match primary.await {
        Ok(clip) => SceneOutcome::Animated(clip),
        Err(cause) => match fallback.await {
            Ok(clip) => SceneOutcome::Fallback { clip, cause },
            Err(fallback_cause) => SceneOutcome::Skipped {
                cause,
                fallback_cause,
            },
        },
    }
}

/// Turns one scene image into a clip.
#[async_trait]
pub trait SceneRenderer: Send + Sync {
    async fn render_scene(
        &self,
        image: &Path,
        duration: f64,
        effect: MotionEffect,
        output: &Path,
    ) -> SceneOutcome;
}

/// Renders still images into clips at the configured output format.
#[derive(Debug, Clone)]
pub struct ClipBuilder {
    settings: RenderSettings,
    runner: FfmpegRunner,
}

impl ClipBuilder {
    pub fn new(settings: RenderSettings, runner: FfmpegRunner) -> Self {
        Self { settings, runner }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    fn output_size(&self) -> FrameSize {
        FrameSize::new(self.settings.width, self.settings.height)
    }

    /// Plan the motion of `image` for `effect`, reading only the image header.
    pub fn plan(&self, image: &Path, effect: MotionEffect) -> MediaResult<FramePlan> {
        let (width, height) =
            image::image_dimensions(image).map_err(|e| MediaError::image_decode(image, e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(MediaError::image_decode(image, "image has zero size"));
        }
        Ok(FramePlan::new(effect, FrameSize::new(width, height), self.output_size()))
    }

    /// Render `image` with `effect` for exactly `duration` seconds.
    pub async fn build(
        &self,
        image: &Path,
        duration: f64,
        effect: MotionEffect,
        output: &Path,
    ) -> MediaResult<RenderedClip> {
        let plan = self.plan(image, effect)?;
        let frames = self.settings.frame_count(duration);
        let filter = motion_filter(&plan, duration, frames, &self.settings);

        debug!(
            image = %image.display(),
            effect = %effect,
            forced_fill = plan.forced_fill,
            frames,
            "Rendering scene clip"
        );

        let cmd = match plan.motion {
            // zoompan generates every frame from a single decoded image
            Motion::Zoom { .. } => FfmpegCommand::new(output).input(image),
            _ => FfmpegCommand::new(output).looped_image(image, self.settings.fps, duration),
        };
        let cmd = cmd
            .video_filter(filter)
            .frames(frames)
            .frame_rate(self.settings.fps)
            .video_encoding(&self.settings.encoding)
            .no_audio();

        self.runner.run(&cmd).await?;
        Ok(RenderedClip::rendered(output, duration, ClipKind::Scene, &self.settings))
    }

    /// Render `image` stretched over the whole frame with no motion.
    ///
    /// FFmpeg decodes the image itself, so this succeeds for files the header
    /// probe in [`ClipBuilder::build`] rejects but FFmpeg still reads.
    pub async fn build_fill(&self, image: &Path, duration: f64, output: &Path) -> MediaResult<RenderedClip> {
        let frames = self.settings.frame_count(duration);
        let cmd = FfmpegCommand::new(output)
            .looped_image(image, self.settings.fps, duration)
            .video_filter(fill_filter(&self.settings))
            .frames(frames)
            .frame_rate(self.settings.fps)
            .video_encoding(&self.settings.encoding)
            .no_audio();

        self.runner.run(&cmd).await?;
        Ok(RenderedClip::rendered(output, duration, ClipKind::Fallback, &self.settings))
    }

    /// Render a static hold of `image` lasting at least `duration` seconds.
    pub async fn build_hold(&self, image: &Path, duration: f64, output: &Path) -> MediaResult<RenderedClip> {
        match self.render_scene(image, duration, MotionEffect::Static, output).await {
            SceneOutcome::Skipped { fallback_cause, .. } => Err(fallback_cause),
            outcome => outcome
                .into_clip()
                .map(|clip| RenderedClip { kind: ClipKind::Hold, ..clip })
                .ok_or_else(|| MediaError::internal("hold clip missing")),
        }
    }
}

#[async_trait]
impl SceneRenderer for ClipBuilder {
    /// Render one scene through both tiers.
    async fn render_scene(
        &self,
        image: &Path,
        duration: f64,
        effect: MotionEffect,
        output: &Path,
    ) -> SceneOutcome {
        with_fallback(
            self.build(image, duration, effect, output),
            self.build_fill(image, duration, output),
        )
        .await
    }
}
