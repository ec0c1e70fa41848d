//! Motion effect definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Horizontal travel of a pan, in output pixels.
pub const PAN_TRAVEL_PX: f64 = 100.0;

/// Time-parameterized transformation applied to a still image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MotionEffect {
    /// Scale 1.0 -> 1.1, centered
    ZoomIn,
    /// Scale 1.2 -> 1.1, centered
    ZoomOut,
    /// Window travels rightward across the image
    PanRight,
    /// Window travels leftward across the image
    PanLeft,
    /// Fitted to output height, centered, no motion
    Static,
}

/// Direction of horizontal travel for pan effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    Right,
    Left,
}

impl MotionEffect {
    /// Effects assigned to scenes by index when none are given.
    pub const CYCLE: [MotionEffect; 4] = [
        MotionEffect::ZoomIn,
        MotionEffect::ZoomOut,
        MotionEffect::PanRight,
        MotionEffect::PanLeft,
    ];

    pub const ALL: &'static [MotionEffect] = &[
        MotionEffect::ZoomIn,
        MotionEffect::ZoomOut,
        MotionEffect::PanRight,
        MotionEffect::PanLeft,
        MotionEffect::Static,
    ];

    /// Deterministic effect for the scene at `index`.
    pub fn for_index(index: usize) -> Self {
        Self::CYCLE[index % Self::CYCLE.len()]
    }

    /// Default effect sequence for `count` scenes.
    pub fn cycle(count: usize) -> Vec<MotionEffect> {
        (0..count).map(Self::for_index).collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MotionEffect::ZoomIn => "zoom_in",
            MotionEffect::ZoomOut => "zoom_out",
            MotionEffect::PanRight => "pan_right",
            MotionEffect::PanLeft => "pan_left",
            MotionEffect::Static => "static",
        }
    }

    /// Start and end scale factors for zoom effects.
    pub fn scale_range(&self) -> Option<(f64, f64)> {
        match self {
            MotionEffect::ZoomIn => Some((1.0, 1.1)),
            MotionEffect::ZoomOut => Some((1.2, 1.1)),
            _ => None,
        }
    }

    /// Scale factor at time `t` of a clip lasting `duration` seconds.
    pub fn scale_at(&self, t: f64, duration: f64) -> f64 {
        match self.scale_range() {
            Some((from, to)) => from + (to - from) * progress(t, duration),
            None => 1.0,
        }
    }

    /// Smallest scale reached over the clip.
    pub fn min_scale(&self) -> f64 {
        match self.scale_range() {
            Some((from, to)) => from.min(to),
            None => 1.0,
        }
    }

    pub fn pan_direction(&self) -> Option<PanDirection> {
        match self {
            MotionEffect::PanRight => Some(PanDirection::Right),
            MotionEffect::PanLeft => Some(PanDirection::Left),
            _ => None,
        }
    }

    /// Left edge of the visible window, relative to the image's left edge,
    /// at time `t`. `travel` is the usable horizontal room in pixels.
    pub fn pan_offset_at(&self, t: f64, duration: f64, travel: f64) -> f64 {
        let p = progress(t, duration);
        match self.pan_direction() {
            Some(PanDirection::Right) => travel * p,
            Some(PanDirection::Left) => travel * (1.0 - p),
            None => 0.0,
        }
    }

    pub fn is_zoom(&self) -> bool {
        self.scale_range().is_some()
    }
}

/// Linear progress through a clip, clamped to `0.0..=1.0`.
fn progress(t: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 1.0;
    }
    (t / duration).clamp(0.0, 1.0)
}

impl fmt::Display for MotionEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MotionEffect {
    type Err = EffectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zoom_in" => Ok(MotionEffect::ZoomIn),
            "zoom_out" => Ok(MotionEffect::ZoomOut),
            "pan_right" => Ok(MotionEffect::PanRight),
            "pan_left" => Ok(MotionEffect::PanLeft),
            "static" => Ok(MotionEffect::Static),
            _ => Err(EffectParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown motion effect: {0}")]
pub struct EffectParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_is_deterministic() {
        assert_eq!(MotionEffect::for_index(0), MotionEffect::ZoomIn);
        assert_eq!(MotionEffect::for_index(3), MotionEffect::PanLeft);
        assert_eq!(MotionEffect::for_index(4), MotionEffect::ZoomIn);
        assert_eq!(MotionEffect::for_index(9), MotionEffect::ZoomOut);

        let effects = MotionEffect::cycle(6);
        assert_eq!(effects.len(), 6);
        assert!(!effects.contains(&MotionEffect::Static));
    }

    #[test]
    fn test_zoom_scales() {
        let zoom_in = MotionEffect::ZoomIn;
        assert!((zoom_in.scale_at(0.0, 4.0) - 1.0).abs() < 1e-9);
        assert!((zoom_in.scale_at(2.0, 4.0) - 1.05).abs() < 1e-9);
        assert!((zoom_in.scale_at(4.0, 4.0) - 1.1).abs() < 1e-9);

        let zoom_out = MotionEffect::ZoomOut;
        assert!((zoom_out.scale_at(0.0, 4.0) - 1.2).abs() < 1e-9);
        assert!((zoom_out.scale_at(4.0, 4.0) - 1.1).abs() < 1e-9);
        assert!((zoom_out.min_scale() - 1.1).abs() < 1e-9);

        assert!((MotionEffect::PanLeft.scale_at(1.0, 4.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pan_offsets() {
        let right = MotionEffect::PanRight;
        assert!((right.pan_offset_at(0.0, 5.0, PAN_TRAVEL_PX)).abs() < 1e-9);
        assert!((right.pan_offset_at(5.0, 5.0, PAN_TRAVEL_PX) - 100.0).abs() < 1e-9);

        let left = MotionEffect::PanLeft;
        assert!((left.pan_offset_at(0.0, 5.0, PAN_TRAVEL_PX) - 100.0).abs() < 1e-9);
        assert!((left.pan_offset_at(2.5, 5.0, PAN_TRAVEL_PX) - 50.0).abs() < 1e-9);

        assert_eq!(MotionEffect::Static.pan_offset_at(2.0, 5.0, 100.0), 0.0);
    }

    #[test]
    fn test_parse_effect() {
        assert_eq!("zoom_in".parse::<MotionEffect>().unwrap(), MotionEffect::ZoomIn);
        assert_eq!("STATIC".parse::<MotionEffect>().unwrap(), MotionEffect::Static);
        assert!("spin".parse::<MotionEffect>().is_err());

        for effect in MotionEffect::ALL {
            assert_eq!(effect.as_str().parse::<MotionEffect>().unwrap(), *effect);
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&MotionEffect::PanRight).unwrap();
        assert_eq!(json, "\"pan_right\"");
    }
}
