#![deny(unreachable_patterns)]
//! FFmpeg-based rendering for StoryReel.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Motion planning for still images (zoom, pan, static)
//! - Per-scene clip rendering with a static fallback
//! - Fade-to-black transitions
//! - Timeline assembly, narration reconciliation and final encode

pub mod clip;
pub mod command;
pub mod compiler;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod metrics;
pub mod motion;
pub mod probe;
pub mod progress;
pub mod timeline;
pub mod transition;

pub use clip::{with_fallback, ClipBuilder, ClipKind, RenderedClip, SceneOutcome, SceneRenderer};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compiler::{
    CompileEvent, CompileProgress, CompileRequest, CompiledVideo, ScenePlan, VideoCompiler,
};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, reap_stale_workdirs, work_prefix, WORKDIR_PREFIX};
pub use motion::{FramePlan, FrameSize, Motion, Window};
pub use probe::{get_duration, probe_media, MediaInfo, VideoStreamInfo};
pub use progress::FfmpegProgress;
pub use timeline::{Reconciliation, Timeline};
pub use transition::build_transition;
