//! Job orchestration.
//!
//! A [`StoryProcessor`] accepts a [`JobRequest`], registers it with the
//! [`JobTracker`] and runs it on its own task:
//!
//! - **Images**: prompt list -> one image per prompt -> zip archive
//! - **TextToVideo**: script -> scenes + narration -> images -> video
//! - **VoiceToVideo**: recording -> transcript -> scenes -> images -> video
//!
//! Progress and the terminal state are published through the tracker.
//! A failed scene image is skipped; the job only fails when nothing usable
//! is left, with a `"<Stage> failed: <cause>"` message.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use storyreel_ai::{AiError, AiResult, ImageGenerator, SpeechSynthesizer, Transcriber};
use storyreel_media::{get_duration, work_prefix, CompileEvent, CompileProgress, CompileRequest, VideoCompiler};
use storyreel_models::{JobId, JobKind, MotionEffect, Scene};
use storyreel_queue::{JobEventStream, JobHandle, JobTracker};
use storyreel_script::{allocate, segment, storyboard};

use crate::archive::write_zip;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

/// Square images for image-only jobs.
const IMAGE_JOB_SIZE: u32 = 1024;

/// Progress checkpoints for video jobs, in percent.
const NARRATION_READY: u8 = 15;
const IMAGES_DONE: u8 = 65;
const SCENES_RENDERED: u8 = 70;
const ENCODE_SPAN: f64 = 29.0;

/// A unit of work accepted by the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobRequest {
    /// Generate one image per prompt and archive them.
    Images {
        prompts: Vec<String>,
        /// Overrides the configured image style
        #[serde(default)]
        style: Option<String>,
    },
    /// Narrate and illustrate a script.
    TextToVideo { text: String },
    /// Transcribe a recording, then illustrate it over the original audio.
    VoiceToVideo { audio: PathBuf },
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Images { .. } => JobKind::Images,
            JobRequest::TextToVideo { .. } => JobKind::TextToVideo,
            JobRequest::VoiceToVideo { .. } => JobKind::VoiceToVideo,
        }
    }

    fn total_items(&self) -> u32 {
        match self {
            JobRequest::Images { prompts, .. } => prompts.len() as u32,
            _ => 0,
        }
    }

    /// Reject requests that cannot produce anything.
    async fn validate(&self) -> WorkerResult<()> {
        match self {
            JobRequest::Images { prompts, .. } => {
                if prompts.iter().all(|p| p.trim().is_empty()) {
                    return Err(WorkerError::invalid_input("no prompts provided"));
                }
            }
            JobRequest::TextToVideo { text } => {
                if text.trim().is_empty() {
                    return Err(WorkerError::invalid_input("text is empty"));
                }
            }
            JobRequest::VoiceToVideo { audio } => {
                if !tokio::fs::try_exists(audio).await.unwrap_or(false) {
                    return Err(WorkerError::invalid_input(format!(
                        "audio file not found: {}",
                        audio.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// An accepted job.
pub struct JobSubmission {
    pub id: JobId,
    /// Events for this job, ending with its terminal event
    pub events: JobEventStream,
    /// The task running the job
    pub task: JoinHandle<()>,
}

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Setup,
    Transcription,
    SceneExtraction,
    Narration,
    ImageGeneration,
    VideoGeneration,
    Archive,
}

impl Stage {
    fn label(self) -> &'static str {
        match self {
            Stage::Setup => "Setup",
            Stage::Transcription => "Transcription",
            Stage::SceneExtraction => "Scene extraction",
            Stage::Narration => "Narration",
            Stage::ImageGeneration => "Image generation",
            Stage::VideoGeneration => "Video generation",
            Stage::Archive => "Archive",
        }
    }
}

#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    error: WorkerError,
}

impl StageFailure {
    fn new(stage: Stage, error: impl Into<WorkerError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    fn message(&self) -> String {
        format!("{} failed: {}", self.stage.label(), self.error.user_message())
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageFailure>;
}

impl<T, E: Into<WorkerError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageFailure> {
        self.map_err(|e| StageFailure::new(stage, e))
    }
}

type StageResult<T> = Result<T, StageFailure>;

/// Runs jobs end to end.
#[derive(Clone)]
pub struct StoryProcessor {
    config: Arc<WorkerConfig>,
    tracker: JobTracker,
    images: Arc<dyn ImageGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    transcriber: Arc<dyn Transcriber>,
    compiler: VideoCompiler,
}

impl StoryProcessor {
    pub fn new(
        config: WorkerConfig,
        tracker: JobTracker,
        images: Arc<dyn ImageGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        let compiler = VideoCompiler::new(config.render.clone(), config.work_dir.clone())
            .with_timeout(config.ffmpeg_timeout_secs);
        Self {
            config: Arc::new(config),
            tracker,
            images,
            speech,
            transcriber,
            compiler,
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Validate `request`, register a job for it and start it.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn submit(&self, request: JobRequest) -> WorkerResult<JobSubmission> {
        request.validate().await?;

        let job = self.tracker.create(request.kind(), request.total_items()).await?;
        let events = self.tracker.subscribe_job(&job.id);
        let handle = self.tracker.handle(job.id.clone());

        let processor = self.clone();
        let task = tokio::spawn(async move { processor.run_job(handle, request).await });

        Ok(JobSubmission {
            id: job.id,
            events,
            task,
        })
    }

    async fn run_job(self, handle: JobHandle, request: JobRequest) {
        let kind = request.kind();
        let logger = JobLogger::new(handle.id(), kind);
        let span = logger.create_span();

        async move {
            let started = Instant::now();
            logger.log_start(kind.as_str());

            let result = self.dispatch(&handle, &logger, request).await;
            let elapsed = started.elapsed().as_secs_f64();
            metrics::record_job(kind, result.is_ok(), elapsed);

            match result {
                Ok(artifact) => {
                    info!(duration_secs = elapsed, "Job finished in {:.1}s", elapsed);
                    logger.log_completion(&artifact.display().to_string());
                }
                Err(failure) => {
                    let message = failure.message();
                    logger.log_failure(&message);
                    if let Err(e) = handle.fail(message).await {
                        warn!("Could not record job failure: {}", e);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, handle: &JobHandle, logger: &JobLogger, request: JobRequest) -> StageResult<PathBuf> {
        let first_task = match &request {
            JobRequest::Images { prompts, .. } => format!("Generating {} images", prompts.len()),
            JobRequest::TextToVideo { .. } => "Extracting scenes".to_string(),
            JobRequest::VoiceToVideo { .. } => "Transcribing audio".to_string(),
        };
        handle.start(first_task).await.at(Stage::Setup)?;

        // Scratch space is removed when this guard drops, whatever the outcome
        let work = self.job_workdir().await.at(Stage::Setup)?;

        match request {
            JobRequest::Images { prompts, style } => {
                self.images_job(handle, logger, prompts, style, work.path()).await
            }
            JobRequest::TextToVideo { text } => self.text_job(handle, logger, text, work.path()).await,
            JobRequest::VoiceToVideo { audio } => self.voice_job(handle, logger, audio, work.path()).await,
        }
    }

    async fn job_workdir(&self) -> WorkerResult<tempfile::TempDir> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix(&work_prefix())
            .tempdir_in(&self.config.work_dir)?;
        debug!(path = %dir.path().display(), "Created job work directory");
        Ok(dir)
    }

    async fn images_job(
        &self,
        handle: &JobHandle,
        logger: &JobLogger,
        prompts: Vec<String>,
        style: Option<String>,
        work: &Path,
    ) -> StageResult<PathBuf> {
        let style = style
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.config.image_style.clone());
        let prompts: Vec<String> = prompts
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let total = prompts.len();

        let mut saved = Vec::with_capacity(total);
        for (i, prompt) in prompts.iter().enumerate() {
            let enhanced = format!("{}, {} style", prompt, style);

            match self.generate_image(&enhanced, IMAGE_JOB_SIZE, IMAGE_JOB_SIZE).await {
                Ok(bytes) => {
                    let path = work.join(format!("image_{:03}.{}", i + 1, image_extension(&bytes)));
                    tokio::fs::write(&path, &bytes).await.at(Stage::ImageGeneration)?;
                    saved.push(path);
                }
                Err(e) => logger.log_skipped(&format!("prompt {}", i + 1), &e.to_string()),
            }

            let percent = ((i + 1) * 100 / total) as u8;
            let task = format!("Generated {} of {} images", i + 1, total);
            logger.log_progress(percent, &task);
            handle.progress(percent, task).await.at(Stage::ImageGeneration)?;

            self.pace(i + 1 < total).await;
        }

        if saved.is_empty() {
            return Err(StageFailure::new(
                Stage::ImageGeneration,
                WorkerError::processing_failed("no images could be generated"),
            ));
        }

        let archive = self
            .config
            .output_dir
            .join(format!("generated_images_{}.zip", handle.id()));
        let archive = write_zip(saved, archive).await.at(Stage::Archive)?;

        handle.complete_images(archive.clone()).await.at(Stage::Archive)?;
        Ok(archive)
    }

    async fn text_job(&self, handle: &JobHandle, logger: &JobLogger, text: String, work: &Path) -> StageResult<PathBuf> {
        let scene_count = segment(&text).len();
        if scene_count == 0 {
            return Err(StageFailure::new(
                Stage::SceneExtraction,
                WorkerError::invalid_input("no scenes could be extracted from the text"),
            ));
        }

        handle
            .progress(5, format!("Synthesizing narration for {} scenes", scene_count))
            .await
            .at(Stage::Narration)?;

        let narration = self
            .speech
            .synthesize(&text, &work.join("narration.mp3"))
            .await
            .at(Stage::Narration)?;
        let audio_secs = get_duration(&narration).await.at(Stage::Narration)?;

        let scenes = storyboard(&text, Some(audio_secs));
        self.illustrate(handle, logger, scenes, narration, audio_secs, work).await
    }

    async fn voice_job(&self, handle: &JobHandle, logger: &JobLogger, audio: PathBuf, work: &Path) -> StageResult<PathBuf> {
        let transcript = self.transcriber.transcribe(&audio).await.at(Stage::Transcription)?;
        info!(chars = transcript.chars().count(), "Transcribed recording");

        handle
            .progress(10, "Extracting scenes from transcript")
            .await
            .at(Stage::SceneExtraction)?;

        if segment(&transcript).is_empty() {
            return Err(StageFailure::new(
                Stage::SceneExtraction,
                WorkerError::invalid_input("no scenes could be extracted from the transcript"),
            ));
        }

        let audio_secs = get_duration(&audio).await.at(Stage::Transcription)?;
        let scenes = storyboard(&transcript, Some(audio_secs));
        self.illustrate(handle, logger, scenes, audio, audio_secs, work).await
    }

    /// Generate scene images and compile them over `audio`.
    async fn illustrate(
        &self,
        handle: &JobHandle,
        logger: &JobLogger,
        scenes: Vec<Scene>,
        audio: PathBuf,
        audio_secs: f64,
        work: &Path,
    ) -> StageResult<PathBuf> {
        let total = scenes.len();
        handle
            .set_scenes(scenes.clone())
            .await
            .at(Stage::ImageGeneration)?;
        handle
            .progress(NARRATION_READY, format!("Generating images for {} scenes", total))
            .await
            .at(Stage::ImageGeneration)?;

        let render = &self.config.render;
        let mut kept: Vec<(Scene, PathBuf)> = Vec::with_capacity(total);
        for (i, scene) in scenes.into_iter().enumerate() {
            match self.generate_image(&scene.text, render.width, render.height).await {
                Ok(bytes) => {
                    let path = work.join(format!("scene_{:03}.{}", scene.index, image_extension(&bytes)));
                    tokio::fs::write(&path, &bytes).await.at(Stage::ImageGeneration)?;
                    kept.push((scene, path));
                }
                Err(e) => logger.log_skipped(&format!("scene {}", scene.index), &e.to_string()),
            }

            let span = (IMAGES_DONE - NARRATION_READY) as usize;
            let percent = NARRATION_READY + ((i + 1) * span / total) as u8;
            let task = format!("Generated image {} of {}", i + 1, total);
            logger.log_progress(percent, &task);
            handle.progress(percent, task).await.at(Stage::ImageGeneration)?;

            self.pace(i + 1 < total).await;
        }

        if kept.is_empty() {
            return Err(StageFailure::new(
                Stage::ImageGeneration,
                WorkerError::processing_failed("no scene images could be generated"),
            ));
        }
        if kept.len() < total {
            warn!(kept = kept.len(), total, "Continuing with a partial set of scene images");
        }

        // Spread the narration over the scenes that survived
        let texts: Vec<&str> = kept.iter().map(|(s, _)| s.text.as_str()).collect();
        let durations = allocate(&texts, Some(audio_secs));
        let effects: Vec<MotionEffect> = kept.iter().map(|(s, _)| s.effect).collect();
        let images: Vec<PathBuf> = kept.into_iter().map(|(_, path)| path).collect();

        let request = CompileRequest::new(images, self.config.output_dir.clone())
            .with_audio(audio)
            .with_durations(durations)
            .with_effects(effects);

        let video = self.compile(handle, &request).await.at(Stage::VideoGeneration)?;
        if video.fallback_count > 0 || video.skipped_count > 0 {
            warn!(
                fallback = video.fallback_count,
                skipped = video.skipped_count,
                "Some scenes were not animated"
            );
        }

        handle
            .complete_video(video.path.clone())
            .await
            .at(Stage::VideoGeneration)?;
        Ok(video.path)
    }

    /// Compile while forwarding compiler events as job progress.
    async fn compile(&self, handle: &JobHandle, request: &CompileRequest) -> WorkerResult<storyreel_media::CompiledVideo> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u8, String)>();
        let progress: CompileProgress = Arc::new(move |event| {
            let _ = tx.send(compile_progress(event));
        });

        let forward_handle = handle.clone();
        let forwarder = tokio::spawn(async move {
            let mut last = None;
            while let Some((percent, task)) = rx.recv().await {
                if last == Some(percent) {
                    continue;
                }
                last = Some(percent);
                if let Err(e) = forward_handle.progress(percent, task).await {
                    debug!("Stopped forwarding compile progress: {}", e);
                    break;
                }
            }
        });

        let result = self.compiler.compile(request, Some(progress)).await;
        // The callback (and its sender) is dropped with the compile future
        let _ = forwarder.await;
        Ok(result?)
    }

    async fn generate_image(&self, prompt: &str, width: u32, height: u32) -> AiResult<Vec<u8>> {
        let retry = RetryConfig::new("image generation").with_max_retries(self.config.image_retries);
        let result = retry_async(&retry, AiError::is_retryable, || self.images.generate(prompt, width, height)).await;
        metrics::record_image(result.is_ok());
        result
    }

    /// Space out consecutive image requests.
    async fn pace(&self, more: bool) {
        if more && !self.config.image_pacing.is_zero() {
            tokio::time::sleep(self.config.image_pacing).await;
        }
    }
}

/// Map a compiler event onto the last part of a video job's progress.
fn compile_progress(event: CompileEvent) -> (u8, String) {
    match event {
        CompileEvent::SceneRendered { index, total } => {
            let span = (SCENES_RENDERED - IMAGES_DONE) as usize;
            let percent = IMAGES_DONE + ((index + 1) * span / total.max(1)) as u8;
            (percent, format!("Rendered scene {} of {}", index + 1, total))
        }
        CompileEvent::Encoding { fraction } => {
            let percent = SCENES_RENDERED + (fraction.clamp(0.0, 1.0) * ENCODE_SPAN).round() as u8;
            (percent, "Encoding video".to_string())
        }
    }
}

/// File extension for encoded image bytes, PNG when unrecognized.
fn image_extension(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("png")
}
