//! Video encoding and render configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
pub const DEFAULT_PRESET: &str = "fast";
pub const DEFAULT_CRF: u8 = 18;
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Widest player support for H.264
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

pub const OUTPUT_WIDTH: u32 = 1920;
pub const OUTPUT_HEIGHT: u32 = 1080;
pub const OUTPUT_FPS: u32 = 24;
/// Length of the fade-to-black bridge between scenes
pub const TRANSITION_DURATION_SECS: f64 = 0.5;
/// Scene duration used when the caller supplies none
pub const DEFAULT_SCENE_DURATION_SECS: f64 = 4.0;

/// Codec settings for the compiled story video.
///
/// Missing fields in serialized settings fall back to the defaults above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    pub codec: String,
    pub preset: String,
    /// Constant Rate Factor, 0-51, lower is better
    pub crf: u8,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.into(),
            preset: DEFAULT_PRESET.into(),
            crf: DEFAULT_CRF,
            pixel_format: DEFAULT_PIXEL_FORMAT.into(),
            audio_codec: DEFAULT_AUDIO_CODEC.into(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.into(),
        }
    }
}

impl EncodingConfig {
    /// Output arguments for the video stream.
    pub fn video_args(&self) -> Vec<String> {
        [
            ("-c:v", self.codec.clone()),
            ("-preset", self.preset.clone()),
            ("-crf", self.crf.to_string()),
            ("-pix_fmt", self.pixel_format.clone()),
        ]
        .into_iter()
        .flat_map(|(flag, value)| [flag.to_string(), value])
        .collect()
    }

    /// Output arguments for the narration stream.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".into(),
            self.audio_codec.clone(),
            "-b:a".into(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Video followed by audio arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args
    }
}

/// Output frame and timing settings for a compilation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Length of each scene-to-scene bridge, seconds
    pub transition_duration: f64,
    /// Duration used when none is supplied, seconds
    pub default_scene_duration: f64,
    #[serde(default)]
    pub encoding: EncodingConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: OUTPUT_WIDTH,
            height: OUTPUT_HEIGHT,
            fps: OUTPUT_FPS,
            transition_duration: TRANSITION_DURATION_SECS,
            default_scene_duration: DEFAULT_SCENE_DURATION_SECS,
            encoding: EncodingConfig::default(),
        }
    }
}

impl RenderSettings {
    /// Frame size as an FFmpeg `WxH` string.
    pub fn frame_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Number of frames needed to cover `duration` seconds (at least one).
    pub fn frame_count(&self, duration: f64) -> u64 {
        ((duration * self.fps as f64).round() as u64).max(1)
    }

    /// Length of the clip FFmpeg actually emits for `duration` seconds.
    pub fn rendered_duration(&self, duration: f64) -> f64 {
        self.frame_count(duration) as f64 / self.fps.max(1) as f64
    }
}
