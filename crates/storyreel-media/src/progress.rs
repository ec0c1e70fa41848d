//! `-progress pipe:2` parsing.
//!
//! FFmpeg writes one `key=value` pair per line and closes every report with
//! `progress=continue`, or `progress=end` for the last one.

/// Running state of an encode, as far as the compiler cares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Output timestamp reached, in seconds
    pub out_time_secs: f64,
    /// Encoding speed relative to realtime, when FFmpeg knows it
    pub speed: Option<f64>,
    /// Set by the final report
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fold one stderr line into the running report.
    ///
    /// Returns a snapshot when the line closes a report, `None` otherwise.
    pub fn feed(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();

        match key {
            // FFmpeg reports both in microseconds
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_secs = us.max(0) as f64 / 1_000_000.0;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                // "1.5x", or "N/A" before the first frame
                self.speed = value
                    .strip_suffix('x')
                    .and_then(|s| s.trim().parse().ok())
                    .or(self.speed);
            }
            "progress" => {
                self.is_complete = value == "end";
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }

    /// Whether `line` belongs to the progress protocol rather than FFmpeg's
    /// own log output.
    pub fn is_report_line(line: &str) -> bool {
        match line.trim().split_once('=') {
            Some((key, _)) => !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            None => false,
        }
    }

    /// Fraction of `total_secs` already written, clamped to `0.0..=1.0`.
    pub fn fraction(&self, total_secs: f64) -> f64 {
        if total_secs <= 0.0 || !total_secs.is_finite() {
            return 0.0;
        }
        (self.out_time_secs / total_secs).clamp(0.0, 1.0)
    }
}
