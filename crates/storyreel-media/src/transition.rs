//! Fade-to-black bridge between scenes.

use std::path::Path;
use tracing::debug;

use storyreel_models::RenderSettings;

use crate::clip::{ClipKind, RenderedClip};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::{black_source, transition_filter};

/// Render a black clip that fades out over its first half and back in over
/// its second half. The result is reusable for every bridge of a timeline.
pub async fn build_transition(
    runner: &FfmpegRunner,
    settings: &RenderSettings,
    duration: f64,
    output: &Path,
) -> MediaResult<RenderedClip> {
    debug!(duration, output = %output.display(), "Rendering transition clip");

    let cmd = FfmpegCommand::new(output)
        .lavfi(black_source(settings, duration))
        .video_filter(transition_filter(settings, duration))
        .frames(settings.frame_count(duration))
        .video_encoding(&settings.encoding)
        .no_audio();

    runner.run(&cmd).await?;
    Ok(RenderedClip::rendered(output, duration, ClipKind::Transition, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::probe_media;
    use tempfile::TempDir;

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_transition_renders_whole_frames() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("transition.mp4");
        let settings = RenderSettings::default();

        let clip = build_transition(&FfmpegRunner::new(), &settings, 0.5, &out)
            .await
            .unwrap();

        assert_eq!(clip.kind, ClipKind::Transition);
        assert_eq!(clip.duration, 0.5);
        let info = probe_media(&out).await.unwrap();
        let video = info.video.unwrap();
        assert_eq!((video.width, video.height), (1920, 1080));
        assert!((info.duration - 0.5).abs() < 0.1);
    }
}
