//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use storyreel_models::RenderSettings;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for per-job scratch directories
    pub work_dir: PathBuf,
    /// Where finished videos and image archives are written
    pub output_dir: PathBuf,
    /// Delay between consecutive image-generation requests
    pub image_pacing: Duration,
    /// Style appended to image-only prompts
    pub image_style: String,
    /// Retries for image requests that failed with a transient error
    pub image_retries: u32,
    /// Scratch directories older than this are removed at start-up
    pub stale_workdir_age: Duration,
    /// Per-invocation FFmpeg limit; `None` waits indefinitely
    pub ffmpeg_timeout_secs: Option<u64>,
    /// Output frame, timing and encoding
    pub render: RenderSettings,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let work_dir = PathBuf::from("/tmp/storyreel");
        Self {
            output_dir: work_dir.join("output"),
            work_dir,
            image_pacing: Duration::from_millis(1000),
            image_style: "photorealistic".to_string(),
            image_retries: 2,
            stale_workdir_age: Duration::from_secs(86_400), // 1 day
            ffmpeg_timeout_secs: None,
            render: RenderSettings::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let work_dir = std::env::var("STORYREEL_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);

        Self {
            output_dir: std::env::var("STORYREEL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| work_dir.join("output")),
            work_dir,
            image_pacing: Duration::from_millis(
                std::env::var("STORYREEL_IMAGE_PACING_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            image_style: std::env::var("STORYREEL_IMAGE_STYLE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.image_style),
            image_retries: std::env::var("STORYREEL_IMAGE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.image_retries),
            stale_workdir_age: Duration::from_secs(
                std::env::var("STORYREEL_STALE_WORKDIR_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(86_400),
            ),
            ffmpeg_timeout_secs: std::env::var("STORYREEL_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0),
            render: defaults.render,
        }
    }

    /// Configuration rooted at `work_dir`, with no pacing. Used by tests and
    /// one-off runs.
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            output_dir: work_dir.join("output"),
            work_dir,
            image_pacing: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.work_dir, PathBuf::from("/tmp/storyreel"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/storyreel/output"));
        assert_eq!(config.image_pacing, Duration::from_secs(1));
        assert_eq!(config.image_style, "photorealistic");
        assert!(config.ffmpeg_timeout_secs.is_none());
        assert_eq!(config.render.fps, 24);
    }

    #[test]
    fn test_with_work_dir() {
        let config = WorkerConfig::with_work_dir("/data/jobs");
        assert_eq!(config.output_dir, PathBuf::from("/data/jobs/output"));
        assert_eq!(config.image_pacing, Duration::ZERO);
    }
}
