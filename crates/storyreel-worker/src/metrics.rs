//! Job metrics.

use metrics::{counter, histogram};

use storyreel_models::JobKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "storyreel_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "storyreel_job_duration_seconds";
    pub const IMAGES_TOTAL: &str = "storyreel_images_total";
}

/// Record a finished job.
pub fn record_job(kind: JobKind, success: bool, duration_secs: f64) {
    let labels = [
        ("kind", kind.as_str().to_string()),
        ("status", if success { "completed" } else { "failed" }.to_string()),
    ];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record one image-generation attempt after retries.
pub fn record_image(success: bool) {
    counter!(names::IMAGES_TOTAL, "status" => if success { "generated" } else { "skipped" }).increment(1);
}
