//! Scene-to-video compilation.
//!
//! The compiler renders one clip per image, bridges consecutive scenes with a
//! fade-to-black clip, reconciles the timeline with the narration length and
//! encodes the final H.264/AAC MP4. All intermediates live in a scratch
//! directory that is removed on every exit path; the output file is only
//! kept once the final encode succeeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use storyreel_models::{MotionEffect, RenderSettings};

use crate::clip::{ClipBuilder, RenderedClip, SceneOutcome, SceneRenderer};
use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::concat_filter;
use crate::fs_utils::work_prefix;
use crate::metrics;
use crate::probe::get_duration;
use crate::timeline::{Reconciliation, Timeline};
use crate::transition::build_transition;

/// Progress notifications emitted while compiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompileEvent {
    /// Scene `index` finished (rendered, substituted or skipped).
    SceneRendered { index: usize, total: usize },
    /// Final encode progress, `0.0..=1.0`.
    Encoding { fraction: f64 },
}

/// Shared callback receiving [`CompileEvent`]s.
pub type CompileProgress = Arc<dyn Fn(CompileEvent) + Send + Sync + 'static>;

/// Inputs of one compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileRequest {
    /// Scene images in display order
    pub images: Vec<PathBuf>,
    /// Narration track; its length becomes the output length
    pub audio: Option<PathBuf>,
    /// Seconds per image; defaults to the configured scene duration
    pub durations: Option<Vec<f64>>,
    /// Effect per image; defaults to the cyclic assignment
    pub effects: Option<Vec<MotionEffect>>,
    /// Directory that receives the output file
    pub output_dir: PathBuf,
}

/// One validated scene of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePlan {
    pub index: usize,
    pub image: PathBuf,
    pub duration: f64,
    pub effect: MotionEffect,
}

impl CompileRequest {
    pub fn new(images: Vec<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            images,
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_audio(mut self, audio: impl Into<PathBuf>) -> Self {
        self.audio = Some(audio.into());
        self
    }

    pub fn with_durations(mut self, durations: Vec<f64>) -> Self {
        self.durations = Some(durations);
        self
    }

    pub fn with_effects(mut self, effects: Vec<MotionEffect>) -> Self {
        self.effects = Some(effects);
        self
    }

    /// Check the request shape and fill in defaults.
    pub fn validate(&self, default_duration: f64) -> MediaResult<Vec<ScenePlan>> {
        let count = self.images.len();
        if count == 0 {
            return Err(MediaError::invalid_input("no images provided"));
        }

        let durations = match &self.durations {
            Some(d) if d.len() != count => {
                return Err(MediaError::invalid_input(format!(
                    "{} durations supplied for {} images",
                    d.len(),
                    count
                )))
            }
            Some(d) => d.clone(),
            None => vec![default_duration; count],
        };
        if let Some((i, d)) = durations
            .iter()
            .enumerate()
            .find(|(_, d)| !d.is_finite() || **d <= 0.0)
        {
            return Err(MediaError::invalid_input(format!(
                "duration of scene {} must be positive, got {}",
                i, d
            )));
        }

        let effects = match &self.effects {
            Some(e) if e.len() != count => {
                return Err(MediaError::invalid_input(format!(
                    "{} effects supplied for {} images",
                    e.len(),
                    count
                )))
            }
            Some(e) => e.clone(),
            None => MotionEffect::cycle(count),
        };

        Ok(self
            .images
            .iter()
            .zip(durations)
            .zip(effects)
            .enumerate()
            .map(|(index, ((image, duration), effect))| ScenePlan {
                index,
                image: image.clone(),
                duration,
                effect,
            })
            .collect())
    }
}

/// A finished, muxed video.
#[derive(Debug, Clone)]
pub struct CompiledVideo {
    pub path: PathBuf,
    /// Output length in seconds
    pub duration: f64,
    /// Scenes present in the video
    pub scene_count: usize,
    /// Scenes rendered with the static fallback
    pub fallback_count: usize,
    /// Scenes lost entirely
    pub skipped_count: usize,
}

/// Compiles scene images (and optional narration) into one MP4.
#[derive(Debug, Clone)]
pub struct VideoCompiler {
    settings: RenderSettings,
    runner: FfmpegRunner,
    work_root: PathBuf,
}

impl VideoCompiler {
    /// Create a compiler whose scratch directories live under `work_root`.
    pub fn new(settings: RenderSettings, work_root: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            runner: FfmpegRunner::new(),
            work_root: work_root.into(),
        }
    }

    /// Limit every FFmpeg invocation to `secs` seconds.
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.runner = self.runner.with_optional_timeout(secs);
        self
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Compile `request` into a video in `request.output_dir`.
    pub async fn compile(
        &self,
        request: &CompileRequest,
        progress: Option<CompileProgress>,
    ) -> MediaResult<CompiledVideo> {
        let started = Instant::now();
        let result = self.compile_inner(request, progress).await;
        metrics::record_compile(started.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn compile_inner(
        &self,
        request: &CompileRequest,
        progress: Option<CompileProgress>,
    ) -> MediaResult<CompiledVideo> {
        let scenes = request.validate(self.settings.default_scene_duration)?;
        if let Some(audio) = &request.audio {
            if !tokio::fs::try_exists(audio).await.unwrap_or(false) {
                return Err(MediaError::invalid_input(format!(
                    "audio file not found: {}",
                    audio.display()
                )));
            }
        }
        check_ffmpeg()?;

        tokio::fs::create_dir_all(&self.work_root).await?;
        let work_dir = tempfile::Builder::new()
            .prefix(&work_prefix())
            .tempdir_in(&self.work_root)?;

        info!(
            scenes = scenes.len(),
            audio = request.audio.is_some(),
            work_dir = %work_dir.path().display(),
            "Compiling video"
        );

        let builder = ClipBuilder::new(self.settings.clone(), self.runner.clone());
        let RenderedScenes {
            clips: rendered,
            fallbacks: fallback_count,
            skipped: skipped_count,
        } = render_scenes(&builder, &scenes, work_dir.path(), progress.as_ref()).await?;

        let transition = if rendered.len() > 1 {
            let path = work_dir.path().join("transition.mp4");
            Some(
                build_transition(&self.runner, &self.settings, self.settings.transition_duration, &path)
                    .await?,
            )
        } else {
            None
        };

        let last_image = rendered
            .last()
            .map(|(plan, _)| plan.image.clone())
            .ok_or_else(|| MediaError::internal("rendered scene list empty"))?;
        let scene_count = rendered.len();
        let mut timeline = Timeline::assemble(
            rendered.into_iter().map(|(_, clip)| clip).collect(),
            transition.as_ref(),
        );

        let audio_duration = match &request.audio {
            Some(audio) => Some(get_duration(audio).await.map_err(|e| match e {
                MediaError::InvalidMedia(msg) => MediaError::invalid_input(msg),
                other => other,
            })?),
            None => None,
        };

        let reconciliation =
            Reconciliation::plan(timeline.total_duration(), audio_duration, self.settings.fps);
        match reconciliation {
            Reconciliation::Extend { hold, .. } => {
                // Whole frames covering the deficit; the final cut trims any excess
                let hold = (hold * self.settings.fps as f64).ceil() / self.settings.fps as f64;
                let path = work_dir.path().join("hold.mp4");
                info!(hold_secs = hold, "Extending video to narration length");
                timeline.push(builder.build_hold(&last_image, hold, &path).await?);
            }
            Reconciliation::Trim { duration } => {
                info!(
                    timeline_secs = timeline.total_duration(),
                    audio_secs = duration,
                    "Trimming video to narration length"
                );
            }
            Reconciliation::Keep { .. } => {}
        }

        let output = self
            .encode(&timeline, request, reconciliation.duration(), progress)
            .await?;

        info!(
            output = %output.display(),
            duration = reconciliation.duration(),
            scenes = scene_count,
            "Video compiled"
        );

        Ok(CompiledVideo {
            path: output,
            duration: reconciliation.duration(),
            scene_count,
            fallback_count,
            skipped_count,
        })
    }

    /// Concatenate the timeline, attach narration and encode to a fresh file
    /// in the output directory.
    async fn encode(
        &self,
        timeline: &Timeline,
        request: &CompileRequest,
        duration: f64,
        progress: Option<CompileProgress>,
    ) -> MediaResult<PathBuf> {
        tokio::fs::create_dir_all(&request.output_dir).await?;
        let output = tempfile::Builder::new()
            .prefix(&format!("compiled_video_{}_", std::process::id()))
            .suffix(".mp4")
            .tempfile_in(&request.output_dir)?
            .into_temp_path();

        let mut cmd = FfmpegCommand::new(&output);
        for clip in timeline.clips() {
            cmd = cmd.input(&clip.path);
        }
        cmd = cmd
            .filter_complex(concat_filter(timeline.len(), &self.settings))
            .map("[outv]");
        if let Some(audio) = &request.audio {
            cmd = cmd.input(audio).map(format!("{}:a:0", timeline.len()));
        }
        let cmd = cmd
            .duration(duration)
            .frame_rate(self.settings.fps)
            .encoding(&self.settings.encoding)
            .output_args(["-movflags", "+faststart"]);

        let runner = self.runner.clone();
        match progress {
            Some(progress) => {
                runner
                    .run_with_progress(&cmd, move |p| {
                        progress(CompileEvent::Encoding {
                            fraction: p.fraction(duration),
                        })
                    })
                    .await?
            }
            None => runner.run(&cmd).await?,
        }

        output.keep().map_err(|e| MediaError::Io(e.error))
    }
}

/// Scene clips that survived rendering, in scene order.
#[derive(Debug)]
struct RenderedScenes<'a> {
    clips: Vec<(&'a ScenePlan, RenderedClip)>,
    fallbacks: usize,
    skipped: usize,
}

/// Render every scene in order. Lost scenes are logged and dropped; losing
/// all of them is [`MediaError::NoRenderableContent`].
async fn render_scenes<'a>(
    renderer: &dyn SceneRenderer,
    scenes: &'a [ScenePlan],
    work_dir: &Path,
    progress: Option<&CompileProgress>,
) -> MediaResult<RenderedScenes<'a>> {
    let mut rendered = RenderedScenes {
        clips: Vec::with_capacity(scenes.len()),
        fallbacks: 0,
        skipped: 0,
    };

    for plan in scenes {
        let out = work_dir.join(format!("scene_{:03}.mp4", plan.index));
        let outcome = renderer
            .render_scene(&plan.image, plan.duration, plan.effect, &out)
            .await;
        metrics::record_scene_outcome(outcome.label());

        match outcome {
            SceneOutcome::Animated(clip) => rendered.clips.push((plan, clip)),
            SceneOutcome::Fallback { clip, cause } => {
                warn!(
                    scene = plan.index,
                    effect = %plan.effect,
                    error = %cause,
                    "Animated render failed, using static fallback"
                );
                rendered.fallbacks += 1;
                rendered.clips.push((plan, clip));
            }
            SceneOutcome::Skipped {
                cause,
                fallback_cause,
            } => {
                warn!(
                    scene = plan.index,
                    image = %plan.image.display(),
                    error = %cause,
                    fallback_error = %fallback_cause,
                    "Scene could not be rendered, skipping"
                );
                rendered.skipped += 1;
            }
        }

        if let Some(progress) = progress {
            progress(CompileEvent::SceneRendered {
                index: plan.index,
                total: scenes.len(),
            });
        }
    }

    if rendered.clips.is_empty() {
        return Err(MediaError::no_renderable_content(format!(
            "none of the {} scenes could be rendered",
            scenes.len()
        )));
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipKind;
    use crate::probe::probe_media;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Renders instantly without FFmpeg; images named "bad*" are lost.
    struct FakeRenderer;

    #[async_trait]
    impl SceneRenderer for FakeRenderer {
        async fn render_scene(
            &self,
            image: &Path,
            duration: f64,
            _effect: MotionEffect,
            output: &Path,
        ) -> SceneOutcome {
            let name = image.file_name().unwrap().to_string_lossy();
            if name.starts_with("bad") {
                return SceneOutcome::Skipped {
                    cause: MediaError::image_decode(image, "truncated"),
                    fallback_cause: MediaError::ffmpeg_failed("decode", None, Some(1)),
                };
            }
            SceneOutcome::Animated(RenderedClip::rendered(
                output,
                duration,
                ClipKind::Scene,
                &RenderSettings::default(),
            ))
        }
    }

    fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
        .save(&path)
        .unwrap();
        path
    }

    async fn write_tone(dir: &Path, seconds: f64) -> PathBuf {
        let path = dir.join("narration.m4a");
        let cmd = FfmpegCommand::new(&path)
            .lavfi(format!("sine=frequency=440:duration={seconds}"))
            .output_args(["-c:a", "aac"]);
        FfmpegRunner::new().run(&cmd).await.unwrap();
        path
    }

    fn compiler(dir: &Path) -> VideoCompiler {
        VideoCompiler::new(RenderSettings::default(), dir.join("work"))
    }

    #[test]
    fn test_validate_fills_defaults() {
        let request = CompileRequest::new(vec!["a.png".into(), "b.png".into(), "c.png".into()], "/out");
        let plans = request.validate(4.0).unwrap();

        assert_eq!(plans.len(), 3);
        assert!(plans.iter().all(|p| p.duration == 4.0));
        assert_eq!(
            plans.iter().map(|p| p.effect).collect::<Vec<_>>(),
            vec![MotionEffect::ZoomIn, MotionEffect::ZoomOut, MotionEffect::PanRight]
        );
    }

    #[test]
    fn test_validate_rejects_bad_requests() {
        let empty = CompileRequest::new(vec![], "/out");
        assert!(matches!(empty.validate(4.0), Err(MediaError::InvalidInput(_))));

        let mismatched = CompileRequest::new(vec!["a.png".into()], "/out").with_durations(vec![1.0, 2.0]);
        assert!(matches!(mismatched.validate(4.0), Err(MediaError::InvalidInput(_))));

        let effects = CompileRequest::new(vec!["a.png".into()], "/out")
            .with_effects(vec![MotionEffect::Static, MotionEffect::ZoomIn]);
        assert!(matches!(effects.validate(4.0), Err(MediaError::InvalidInput(_))));

        let zero = CompileRequest::new(vec!["a.png".into()], "/out").with_durations(vec![0.0]);
        assert!(matches!(zero.validate(4.0), Err(MediaError::InvalidInput(_))));

        let nan = CompileRequest::new(vec!["a.png".into()], "/out").with_durations(vec![f64::NAN]);
        assert!(matches!(nan.validate(4.0), Err(MediaError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_missing_audio_is_input_error() {
        let dir = TempDir::new().unwrap();
        let request = CompileRequest::new(vec![dir.path().join("a.png")], dir.path())
            .with_audio(dir.path().join("missing.mp3"));

        let err = compiler(dir.path()).compile(&request, None).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_losing_every_scene_is_no_renderable_content() {
        let dir = TempDir::new().unwrap();
        let scenes = CompileRequest::new(vec!["bad_a.png".into(), "bad_b.png".into()], "/out")
            .validate(4.0)
            .unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let progress: CompileProgress = Arc::new(move |e| sink.lock().unwrap().push(e));

        let err = render_scenes(&FakeRenderer, &scenes, dir.path(), Some(&progress))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::NoRenderableContent(_)));
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                CompileEvent::SceneRendered { index: 0, total: 2 },
                CompileEvent::SceneRendered { index: 1, total: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_lost_scene_is_dropped_from_timeline() {
        let dir = TempDir::new().unwrap();
        let scenes = CompileRequest::new(
            vec!["a.png".into(), "bad.png".into(), "c.png".into()],
            "/out",
        )
        .with_durations(vec![3.02, 2.0, 3.02])
        .validate(4.0)
        .unwrap();

        let rendered = render_scenes(&FakeRenderer, &scenes, dir.path(), None)
            .await
            .unwrap();

        assert_eq!(rendered.skipped, 1);
        assert_eq!(rendered.fallbacks, 0);
        let indices: Vec<usize> = rendered.clips.iter().map(|(plan, _)| plan.index).collect();
        assert_eq!(indices, vec![0, 2]);

        let settings = RenderSettings::default();
        let bridge = RenderedClip::rendered("t.mp4", settings.transition_duration, ClipKind::Transition, &settings);
        let timeline = Timeline::assemble(
            rendered.clips.into_iter().map(|(_, clip)| clip).collect(),
            Some(&bridge),
        );
        assert!((timeline.total_duration() - 6.5).abs() < 1e-9);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_single_static_scene() {
        let dir = TempDir::new().unwrap();
        let image = write_image(dir.path(), "only.png", 1920, 1080);
        let request = CompileRequest::new(vec![image], dir.path().join("out"))
            .with_durations(vec![4.0])
            .with_effects(vec![MotionEffect::Static]);

        let video = compiler(dir.path()).compile(&request, None).await.unwrap();

        assert_eq!(video.scene_count, 1);
        let info = probe_media(&video.path).await.unwrap();
        assert!((info.duration - 4.0).abs() < 0.15, "got {}", info.duration);
        let stream = info.video.unwrap();
        assert_eq!((stream.width, stream.height), (1920, 1080));
        assert!(video
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(&format!("compiled_video_{}_", std::process::id())));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_longer_audio_extends_video() {
        let dir = TempDir::new().unwrap();
        let images = vec![
            write_image(dir.path(), "a.png", 1408, 768),
            write_image(dir.path(), "b.png", 2400, 1080),
        ];
        let audio = write_tone(dir.path(), 5.0).await;
        let request = CompileRequest::new(images, dir.path().join("out"))
            .with_durations(vec![1.0, 1.0])
            .with_audio(&audio);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let progress: CompileProgress = Arc::new(move |e| sink.lock().unwrap().push(e));

        let video = compiler(dir.path())
            .compile(&request, Some(progress))
            .await
            .unwrap();

        let info = probe_media(&video.path).await.unwrap();
        assert!((info.duration - 5.0).abs() < 0.2, "got {}", info.duration);
        assert!(info.audio_codec.is_some());

        let events = events.lock().unwrap();
        assert!(events.contains(&CompileEvent::SceneRendered { index: 1, total: 2 }));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_shorter_audio_trims_video() {
        let dir = TempDir::new().unwrap();
        let images = vec![
            write_image(dir.path(), "a.png", 1920, 1080),
            write_image(dir.path(), "b.png", 1920, 1080),
        ];
        let audio = write_tone(dir.path(), 2.0).await;
        let request = CompileRequest::new(images, dir.path().join("out"))
            .with_durations(vec![2.0, 2.0])
            .with_audio(&audio);

        let video = compiler(dir.path()).compile(&request, None).await.unwrap();

        let info = probe_media(&video.path).await.unwrap();
        assert!((info.duration - 2.0).abs() < 0.2, "got {}", info.duration);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_unreadable_images_yield_no_output() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"definitely not a png").unwrap();
        let out_dir = dir.path().join("out");
        let request = CompileRequest::new(vec![broken], &out_dir);

        let err = compiler(dir.path()).compile(&request, None).await.unwrap_err();

        assert!(matches!(err, MediaError::NoRenderableContent(_)));
        let leftovers = std::fs::read_dir(&out_dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
        // Scratch directory is gone as well
        let work = std::fs::read_dir(dir.path().join("work")).unwrap().count();
        assert_eq!(work, 0);
    }
}
