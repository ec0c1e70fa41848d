//! Frame geometry for animated stills.
//!
//! A [`FramePlan`] resolves a [`MotionEffect`] against a concrete image size:
//! which intermediate size the image is scaled to (the "base"), and which
//! window of that base is visible at any instant. Rendering turns the plan
//! into FFmpeg filters; the geometry itself is pure so it can be checked
//! without running FFmpeg.

use storyreel_models::{MotionEffect, PanDirection, PAN_TRAVEL_PX};

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size after scaling to `height`, keeping the aspect ratio.
    pub fn fit_height(&self, height: u32) -> Self {
        if self.height == 0 {
            return Self::new(0, height);
        }
        let width = (self.width as f64 * height as f64 / self.height as f64).round() as u32;
        Self::new(width, height)
    }

    /// Whether this size covers `other` in both dimensions.
    pub fn covers(&self, other: FrameSize) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

/// Visible rectangle of the base image, in base pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// How the visible window moves over the base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Centered window shrinking or growing as the scale goes `from -> to`.
    Zoom { from: f64, to: f64 },
    /// Full-height window sliding horizontally across `travel` pixels.
    Pan { direction: PanDirection, travel: f64 },
    /// Centered window, no movement.
    Still,
}

/// Resolved geometry for one animated clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub effect: MotionEffect,
    /// Size the source image is scaled to before windowing.
    pub base: FrameSize,
    /// Output frame size.
    pub output: FrameSize,
    /// The base was stretched to the output size because the effect's
    /// natural scaling left it smaller than the frame.
    pub forced_fill: bool,
    pub motion: Motion,
}

impl FramePlan {
    pub fn new(effect: MotionEffect, image: FrameSize, output: FrameSize) -> Self {
        match effect.scale_range() {
            Some((from, to)) => Self::zoom(effect, image, output, from, to),
            None => Self::fitted(effect, image, output),
        }
    }

    /// Zooms scale the image at native size; the smallest scale must still
    /// cover the frame.
    fn zoom(effect: MotionEffect, image: FrameSize, output: FrameSize, from: f64, to: f64) -> Self {
        let min = from.min(to);
        let smallest = FrameSize::new(
            (image.width as f64 * min).floor() as u32,
            (image.height as f64 * min).floor() as u32,
        );
        let forced_fill = !smallest.covers(output);

        Self {
            effect,
            base: if forced_fill { output } else { image },
            output,
            forced_fill,
            motion: Motion::Zoom { from, to },
        }
    }

    /// Pans and stills scale to the output height first.
    fn fitted(effect: MotionEffect, image: FrameSize, output: FrameSize) -> Self {
        let scaled = image.fit_height(output.height);
        let forced_fill = !scaled.covers(output);
        let base = if forced_fill { output } else { scaled };

        let motion = match effect.pan_direction() {
            Some(direction) if base.width > output.width => Motion::Pan {
                direction,
                travel: PAN_TRAVEL_PX.min((base.width - output.width) as f64),
            },
            _ => Motion::Still,
        };

        Self {
            effect,
            base,
            output,
            forced_fill,
            motion,
        }
    }

    /// Visible window of the base at time `t` of a clip lasting `duration`.
    pub fn window_at(&self, t: f64, duration: f64) -> Window {
        let (bw, bh) = (self.base.width as f64, self.base.height as f64);
        let (ow, oh) = (self.output.width as f64, self.output.height as f64);

        match self.motion {
            Motion::Zoom { .. } => {
                let scale = self.scale_at(t, duration);
                let (width, height) = (ow / scale, oh / scale);
                Window {
                    x: (bw - width) / 2.0,
                    y: (bh - height) / 2.0,
                    width,
                    height,
                }
            }
            Motion::Pan { travel, .. } => Window {
                x: self.effect.pan_offset_at(t, duration, travel),
                y: (bh - oh) / 2.0,
                width: ow,
                height: oh,
            },
            Motion::Still => Window {
                x: (bw - ow) / 2.0,
                y: (bh - oh) / 2.0,
                width: ow,
                height: oh,
            },
        }
    }

    /// Magnification of the base at time `t`.
    pub fn scale_at(&self, t: f64, duration: f64) -> f64 {
        self.effect.scale_at(t, duration)
    }

    /// Largest window the zoom ever shows, rounded to whole pixels and kept
    /// inside the base.
    pub fn zoom_crop(&self) -> FrameSize {
        let min = self.effect.min_scale();
        FrameSize::new(
            ((self.output.width as f64 / min).round() as u32).min(self.base.width),
            ((self.output.height as f64 / min).round() as u32).min(self.base.height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: FrameSize = FrameSize::new(1920, 1080);

    fn assert_inside(plan: &FramePlan, duration: f64) {
        for step in 0..=10 {
            let t = duration * step as f64 / 10.0;
            let w = plan.window_at(t, duration);
            assert!(w.x >= -1e-9 && w.y >= -1e-9, "{:?} at t={t}: {w:?}", plan.effect);
            assert!(w.x + w.width <= plan.base.width as f64 + 1e-9);
            assert!(w.y + w.height <= plan.base.height as f64 + 1e-9);
            // Window keeps the output aspect ratio, so no letterboxing
            assert!((w.width / w.height - 1920.0 / 1080.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_every_effect_fills_the_frame() {
        let sizes = [
            FrameSize::new(1920, 1080),
            FrameSize::new(1408, 768),
            FrameSize::new(4000, 3000),
            FrameSize::new(640, 1280),
            FrameSize::new(3840, 1080),
        ];
        for image in sizes {
            for effect in MotionEffect::ALL {
                let plan = FramePlan::new(*effect, image, HD);
                assert!(plan.base.covers(HD), "{effect} on {image:?}");
                assert_inside(&plan, 4.0);
            }
        }
    }

    #[test]
    fn test_small_image_is_force_filled() {
        let plan = FramePlan::new(MotionEffect::ZoomIn, FrameSize::new(1408, 768), HD);
        assert!(plan.forced_fill);
        assert_eq!(plan.base, HD);
        // The zoom still animates on the filled frame
        assert_eq!(plan.motion, Motion::Zoom { from: 1.0, to: 1.1 });
    }

    #[test]
    fn test_zoom_out_on_exact_frame_is_not_forced() {
        // 1920 * 1.1 covers the frame at the smallest zoom-out scale
        let plan = FramePlan::new(MotionEffect::ZoomOut, HD, HD);
        assert!(!plan.forced_fill);
        assert_eq!(plan.zoom_crop(), FrameSize::new(1745, 982));
    }

    #[test]
    fn test_zoom_window_shrinks_over_time() {
        let plan = FramePlan::new(MotionEffect::ZoomIn, HD, HD);
        let start = plan.window_at(0.0, 4.0);
        let end = plan.window_at(4.0, 4.0);
        assert!((start.width - 1920.0).abs() < 1e-9);
        assert!((end.width - 1920.0 / 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_pan_travel_is_capped() {
        let wide = FramePlan::new(MotionEffect::PanRight, FrameSize::new(3840, 1080), HD);
        assert_eq!(
            wide.motion,
            Motion::Pan {
                direction: PanDirection::Right,
                travel: 100.0
            }
        );
        assert_eq!(wide.window_at(0.0, 5.0).x, 0.0);
        assert!((wide.window_at(5.0, 5.0).x - 100.0).abs() < 1e-9);

        let left = FramePlan::new(MotionEffect::PanLeft, FrameSize::new(3840, 1080), HD);
        assert!((left.window_at(0.0, 5.0).x - 100.0).abs() < 1e-9);
        assert_eq!(left.window_at(5.0, 5.0).x, 0.0);

        let slightly_wide = FramePlan::new(MotionEffect::PanLeft, FrameSize::new(1960, 1080), HD);
        assert!(matches!(slightly_wide.motion, Motion::Pan { travel, .. } if (travel - 40.0).abs() < 1e-9));
    }

    #[test]
    fn test_pan_on_narrow_image_stays_still() {
        let plan = FramePlan::new(MotionEffect::PanRight, FrameSize::new(1920, 1080), HD);
        assert_eq!(plan.motion, Motion::Still);

        let portrait = FramePlan::new(MotionEffect::PanRight, FrameSize::new(640, 1280), HD);
        assert!(portrait.forced_fill);
        assert_eq!(portrait.motion, Motion::Still);
    }

    #[test]
    fn test_static_is_centered() {
        let plan = FramePlan::new(MotionEffect::Static, FrameSize::new(2880, 1080), HD);
        let w = plan.window_at(2.0, 4.0);
        assert_eq!(plan.base, FrameSize::new(2880, 1080));
        assert!((w.x - 480.0).abs() < 1e-9);
    }
}
