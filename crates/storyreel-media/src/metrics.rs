//! Rendering metrics.
//!
//! Recorded through the `metrics` facade; they are no-ops until the host
//! process installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FFMPEG_RUNS_TOTAL: &str = "storyreel_ffmpeg_runs_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "storyreel_ffmpeg_duration_seconds";
    pub const SCENE_CLIPS_TOTAL: &str = "storyreel_scene_clips_total";
    pub const COMPILE_DURATION_SECONDS: &str = "storyreel_compile_duration_seconds";
}

/// Record one FFmpeg invocation.
pub fn record_ffmpeg_run(duration_secs: f64, success: bool) {
    let labels = [("status", if success { "success" } else { "error" }.to_string())];
    counter!(names::FFMPEG_RUNS_TOTAL, &labels).increment(1);
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record how a scene clip was produced (`animated`, `fallback`, `skipped`).
pub fn record_scene_outcome(outcome: &'static str) {
    counter!(names::SCENE_CLIPS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a finished compilation.
pub fn record_compile(duration_secs: f64, success: bool) {
    let labels = [("status", if success { "success" } else { "error" }.to_string())];
    histogram!(names::COMPILE_DURATION_SECONDS, &labels).record(duration_secs);
}
