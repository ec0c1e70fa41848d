//! Per-scene duration allocation.

/// Narration pace used to estimate reading time.
pub const WORDS_PER_MINUTE: f64 = 150.0;
/// Floor for the estimated (unscaled) duration of a scene.
pub const MIN_SCENE_SECS: f64 = 3.0;

/// Reading-pace duration of one scene, in seconds.
pub fn base_duration(text: &str) -> f64 {
    let words = text.split_whitespace().count() as f64;
    (words / WORDS_PER_MINUTE * 60.0).max(MIN_SCENE_SECS)
}

/// Compute a display duration for every scene, in input order.
///
/// When `target_total` is a positive, finite length (typically the narration
/// duration), the base durations are rescaled proportionally so they sum to
/// it. Scaled durations are not floored: a short narration can push a scene
/// below `MIN_SCENE_SECS`.
pub fn allocate<S: AsRef<str>>(scenes: &[S], target_total: Option<f64>) -> Vec<f64> {
    let base: Vec<f64> = scenes.iter().map(|s| base_duration(s.as_ref())).collect();

    let Some(target) = target_total.filter(|t| t.is_finite() && *t > 0.0) else {
        return base;
    };

    let total: f64 = base.iter().sum();
    if total <= 0.0 {
        return base;
    }

    let scale = target / total;
    base.into_iter().map(|d| d * scale).collect()
}
