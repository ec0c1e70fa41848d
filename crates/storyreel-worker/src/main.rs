//! StoryReel command-line runner.
//!
//! Runs one job to completion and reports its progress.

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser};
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storyreel_ai::{AiConfig, GeminiImageClient, SpeechClient};
use storyreel_media::{move_file, reap_stale_workdirs};
use storyreel_models::JobState;
use storyreel_queue::JobTracker;
use storyreel_script::parse_prompt_csv;
use storyreel_worker::{JobRequest, StoryProcessor, WorkerConfig};

/// Turn text or voice into a narrated slideshow video.
#[derive(Debug, Parser)]
#[command(name = "storyreel", version, about)]
#[command(group(ArgGroup::new("input").required(true).args(["text", "file", "audio", "prompts"])))]
struct Cli {
    /// Script text to narrate and illustrate
    #[arg(long)]
    text: Option<String>,

    /// Read the script from a file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Voice recording to transcribe and illustrate
    #[arg(long)]
    audio: Option<PathBuf>,

    /// CSV of image prompts; produces a zip of images instead of a video
    #[arg(long)]
    prompts: Option<PathBuf>,

    /// Image style for prompt lists (default from STORYREEL_IMAGE_STYLE)
    #[arg(long, requires = "prompts")]
    style: Option<String>,

    /// Move the finished artifact here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the final job record as JSON instead of the artifact path
    #[arg(long)]
    json: bool,
}

impl Cli {
    async fn into_request(self) -> anyhow::Result<JobRequest> {
        if let Some(text) = self.text {
            return Ok(JobRequest::TextToVideo { text });
        }
        if let Some(file) = self.file {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading script {}", file.display()))?;
            return Ok(JobRequest::TextToVideo { text });
        }
        if let Some(audio) = self.audio {
            return Ok(JobRequest::VoiceToVideo { audio });
        }
        if let Some(csv) = self.prompts {
            let content = tokio::fs::read_to_string(&csv)
                .await
                .with_context(|| format!("reading prompts {}", csv.display()))?;
            let prompts = parse_prompt_csv(&content);
            if prompts.is_empty() {
                bail!("no prompts found in {}", csv.display());
            }
            return Ok(JobRequest::Images {
                prompts,
                style: self.style,
            });
        }
        bail!("one of --text, --file, --audio or --prompts is required")
    }
}

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("storyreel=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Required for TLS/HTTPS
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        bail!("failed to install rustls crypto provider");
    }

    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let output = cli.output.clone();
    let print_json = cli.json;

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    match reap_stale_workdirs(&config.work_dir, config.stale_workdir_age).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Removed stale work directories"),
        Err(e) => warn!("Could not scan work directory: {}", e),
    }

    let ai = AiConfig::from_env();
    let images = Arc::new(GeminiImageClient::new(&ai)?);
    let speech = Arc::new(SpeechClient::new(&ai));
    let processor = StoryProcessor::new(config, JobTracker::default(), images, speech.clone(), speech);

    let request = cli.into_request().await?;
    let mut submission = processor.submit(request).await?;
    info!(job_id = %submission.id, "Job submitted");

    while let Some(event) = submission.events.next().await {
        info!(
            state = %event.state,
            progress = event.progress,
            "{}",
            event.current_task
        );
    }
    submission.task.await.context("job task panicked")?;

    let mut job = processor.tracker().status(&submission.id).await?;
    if job.state != JobState::Completed {
        if print_json {
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        bail!(job.error_message.unwrap_or(job.current_task));
    }

    let artifact = job
        .video_path
        .clone()
        .or_else(|| job.archive_path.clone())
        .context("completed job has no artifact")?;

    let artifact = match output {
        Some(dest) => {
            move_file(&artifact, &dest).await?;
            if job.video_path.is_some() {
                job.video_path = Some(dest.clone());
            } else {
                job.archive_path = Some(dest.clone());
            }
            dest
        }
        None => artifact,
    };

    if print_json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        println!("{}", artifact.display());
    }
    Ok(())
}
