//! FFmpeg filter graphs for scene, transition and final concat renders.

use storyreel_models::{PanDirection, RenderSettings};

use crate::motion::{FramePlan, Motion};

/// Final per-frame normalization shared by every rendered clip.
fn finish(pixel_format: &str) -> String {
    format!("setsar=1,format={}", pixel_format)
}

/// Filter for an animated still described by `plan`.
///
/// Zoom plans expect a single (non-looped) image input and emit `frames`
/// frames through `zoompan`. Pan and still plans expect the image looped at
/// the output frame rate for the clip duration.
pub fn motion_filter(plan: &FramePlan, duration: f64, frames: u64, settings: &RenderSettings) -> String {
    let base = format!("scale={}:{}", plan.base.width, plan.base.height);
    let (ow, oh) = (plan.output.width, plan.output.height);
    let tail = finish(&settings.encoding.pixel_format);

    match plan.motion {
        Motion::Zoom { from, to } => {
            let crop = plan.zoom_crop();
            let min = from.min(to);
            // zoompan's zoom is relative to the cropped window at the smallest scale
            let start = from / min;
            let step = (to - from) / min / frames.max(1) as f64;
            format!(
                "{base},crop={cw}:{ch},zoompan=z='{start:.6}+{step:.9}*on':\
                 x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={ow}x{oh}:fps={fps},{tail}",
                cw = crop.width,
                ch = crop.height,
                fps = settings.fps,
            )
        }
        Motion::Pan { direction, travel } => {
            let progress = format!("min(t/{:.3}\\,1)", duration.max(f64::EPSILON));
            let x = match direction {
                PanDirection::Right => format!("{travel:.3}*{progress}"),
                PanDirection::Left => format!("{travel:.3}-{travel:.3}*{progress}"),
            };
            format!("{base},crop={ow}:{oh}:x={x}:y=(in_h-out_h)/2,{tail}")
        }
        Motion::Still => format!("{base},crop={ow}:{oh},{tail}"),
    }
}

/// Un-animated filter that stretches any image to exactly fill the frame.
pub fn fill_filter(settings: &RenderSettings) -> String {
    format!(
        "scale={}:{},{}",
        settings.width,
        settings.height,
        finish(&settings.encoding.pixel_format)
    )
}

/// Solid black lavfi source for a transition of `duration` seconds.
pub fn black_source(settings: &RenderSettings, duration: f64) -> String {
    format!(
        "color=c=black:s={}:r={}:d={:.3}",
        settings.frame_size(),
        settings.fps,
        duration
    )
}

/// Fade out over the first half and back in over the second half.
pub fn transition_filter(settings: &RenderSettings, duration: f64) -> String {
    let half = duration / 2.0;
    format!(
        "fade=t=out:st=0:d={half:.3},fade=t=in:st={half:.3}:d={half:.3},{}",
        finish(&settings.encoding.pixel_format)
    )
}

/// `filter_complex` that normalizes `inputs` video streams to the output
/// frame and concatenates them into `[outv]`.
pub fn concat_filter(inputs: usize, settings: &RenderSettings) -> String {
    let (w, h) = (settings.width, settings.height);
    let mut graph = String::new();

    for i in 0..inputs {
        graph.push_str(&format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format={pix}[v{i}];",
            fps = settings.fps,
            pix = settings.encoding.pixel_format,
        ));
    }
    for i in 0..inputs {
        graph.push_str(&format!("[v{i}]"));
    }
    graph.push_str(&format!("concat=n={inputs}:v=1:a=0[outv]"));

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::FrameSize;
    use storyreel_models::MotionEffect;

    const HD: FrameSize = FrameSize::new(1920, 1080);

    #[test]
    fn test_zoom_filter() {
        let settings = RenderSettings::default();
        let plan = FramePlan::new(MotionEffect::ZoomIn, FrameSize::new(1408, 768), HD);
        let filter = motion_filter(&plan, 4.0, 96, &settings);

        assert!(filter.starts_with("scale=1920:1080,crop=1920:1080,zoompan="));
        assert!(filter.contains("z='1.000000+"));
        assert!(filter.contains(":d=96:s=1920x1080:fps=24"));
        assert!(filter.ends_with("setsar=1,format=yuv420p"));
    }

    #[test]
    fn test_zoom_out_starts_above_one() {
        let settings = RenderSettings::default();
        let plan = FramePlan::new(MotionEffect::ZoomOut, HD, HD);
        let filter = motion_filter(&plan, 4.0, 96, &settings);

        assert!(filter.contains("crop=1745:982"));
        // 1.2 / 1.1
        assert!(filter.contains("z='1.090909+-"));
    }

    #[test]
    fn test_pan_filters() {
        let settings = RenderSettings::default();
        let wide = FrameSize::new(3840, 1080);

        let right = motion_filter(&FramePlan::new(MotionEffect::PanRight, wide, HD), 5.0, 120, &settings);
        assert_eq!(
            right,
            "scale=3840:1080,crop=1920:1080:x=100.000*min(t/5.000\\,1):y=(in_h-out_h)/2,setsar=1,format=yuv420p"
        );

        let left = motion_filter(&FramePlan::new(MotionEffect::PanLeft, wide, HD), 5.0, 120, &settings);
        assert!(left.contains("x=100.000-100.000*min(t/5.000\\,1)"));
    }

    #[test]
    fn test_still_filter_centers() {
        let settings = RenderSettings::default();
        let plan = FramePlan::new(MotionEffect::Static, FrameSize::new(2880, 1080), HD);
        assert_eq!(
            motion_filter(&plan, 4.0, 96, &settings),
            "scale=2880:1080,crop=1920:1080,setsar=1,format=yuv420p"
        );
    }

    #[test]
    fn test_transition_filters() {
        let settings = RenderSettings::default();
        assert_eq!(black_source(&settings, 0.5), "color=c=black:s=1920x1080:r=24:d=0.500");
        assert_eq!(
            transition_filter(&settings, 0.5),
            "fade=t=out:st=0:d=0.250,fade=t=in:st=0.250:d=0.250,setsar=1,format=yuv420p"
        );
    }

    #[test]
    fn test_concat_filter() {
        let settings = RenderSettings::default();
        let graph = concat_filter(3, &settings);

        assert!(graph.starts_with("[0:v]scale=1920:1080:force_original_aspect_ratio=decrease"));
        assert!(graph.contains("[2:v]"));
        assert!(!graph.contains("[3:v]"));
        assert!(graph.ends_with("[v0][v1][v2]concat=n=3:v=1:a=0[outv]"));
    }
}
