use crate::compositor::ScreenTexture;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Uniform state of the camouflage program.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CamouflageParams {
    /// Accumulated seconds. Only moves forward.
    pub time: f32,
    pub base_color: Vec3,
    /// Overlay opacity driver, nominally [0, 1].
    pub strength: f32,
    /// Fresnel exponent, > 0.
    pub edge_falloff: f32,
    pub distortion: f32,
    /// Spatial frequency of the noise.
    pub scale: f32,
    pub speed: f32,
    pub direction: Vec2,
    /// Screen-space refraction offset along the view normal.
    pub ior: f32,
    /// Viewport size in pixels.
    pub screen_size: Vec2,
    /// Most recent completed offscreen capture.
    #[serde(skip)]
    pub screen_texture: Option<ScreenTexture>,
}

impl Default for CamouflageParams {
    fn default() -> Self {
        Self {
            time: 0.0,
            base_color: Vec3::ONE,
            strength: 0.6,
            edge_falloff: 2.5,
            distortion: 0.1,
            scale: 1.0,
            speed: 0.5,
            direction: Vec2::new(1.0, 0.0),
            ior: 0.05,
            screen_size: Vec2::ONE,
            screen_texture: None,
        }
    }
}

impl CamouflageParams {
    /// Accumulate frame time. Negative deltas are ignored.
    pub fn advance(&mut self, delta: f32) {
        if delta > 0.0 {
            self.time += delta;
        }
    }

    /// Noise-space offset after `time` seconds of scrolling.
    pub fn scroll_offset(&self) -> Vec2 {
        self.direction * self.time * self.speed
    }

    /// Base color as the RGB triple a color picker edits.
    pub fn base_color_rgb(&self) -> [f32; 3] {
        self.base_color.to_array()
    }

    /// Set the base color from a picker, clamped to [0, 1] per channel.
    /// Returns whether the color changed.
    pub fn set_base_color_rgb(&mut self, rgb: [f32; 3]) -> bool {
        let next = Vec3::from_array(rgb).clamp(Vec3::ZERO, Vec3::ONE);
        if next == self.base_color {
            return false;
        }
        self.base_color = next;
        true
    }
}

/// Panel label of the base color picker.
pub const BASE_COLOR_LABEL: &str = "Color";

/// A live-tunable value exposed to a control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tunable {
    CamouflageStrength,
    EdgeFalloff,
    Distortion,
    Scale,
    Speed,
    DirectionX,
    DirectionY,
    Ior,
}

/// Panel order.
pub const TUNABLES: [Tunable; 8] = [
    Tunable::CamouflageStrength,
    Tunable::EdgeFalloff,
    Tunable::Distortion,
    Tunable::Scale,
    Tunable::Speed,
    Tunable::DirectionX,
    Tunable::DirectionY,
    Tunable::Ior,
];

impl Tunable {
    pub fn label(self) -> &'static str {
        match self {
            Self::CamouflageStrength => "Strength",
            Self::EdgeFalloff => "Edge Falloff",
            Self::Distortion => "Distortion",
            Self::Scale => "Scale",
            Self::Speed => "Speed",
            Self::DirectionX => "Direction X",
            Self::DirectionY => "Direction Y",
            Self::Ior => "Index of Refraction",
        }
    }

    /// Slider range, inclusive.
    pub fn range(self) -> (f32, f32) {
        match self {
            Self::CamouflageStrength | Self::Distortion => (0.0, 1.0),
            Self::EdgeFalloff => (0.1, 5.0),
            Self::Scale => (0.1, 10.0),
            Self::Speed => (0.0, 3.0),
            Self::DirectionX | Self::DirectionY | Self::Ior => (-1.0, 1.0),
        }
    }

    pub fn step(self) -> f32 {
        0.01
    }

    /// Read from the shader state. `CamouflageStrength` lives on the
    /// dual-material object and is read through it instead.
    pub fn get(self, params: &CamouflageParams) -> Option<f32> {
        Some(match self {
            Self::CamouflageStrength => return None,
            Self::EdgeFalloff => params.edge_falloff,
            Self::Distortion => params.distortion,
            Self::Scale => params.scale,
            Self::Speed => params.speed,
            Self::DirectionX => params.direction.x,
            Self::DirectionY => params.direction.y,
            Self::Ior => params.ior,
        })
    }

    /// Write into the shader state. Returns `false` for values that do not
    /// live there.
    pub fn set(self, params: &mut CamouflageParams, value: f32) -> bool {
        match self {
            Self::CamouflageStrength => return false,
            Self::EdgeFalloff => params.edge_falloff = value,
            Self::Distortion => params.distortion = value,
            Self::Scale => params.scale = value,
            Self::Speed => params.speed = value,
            Self::DirectionX => params.direction.x = value,
            Self::DirectionY => params.direction.y = value,
            Self::Ior => params.ior = value,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_color_picker_clamps_and_reports_changes() {
        let mut p = CamouflageParams::default();
        assert_eq!(p.base_color_rgb(), [1.0, 1.0, 1.0]);
        assert!(!p.set_base_color_rgb([1.0, 1.0, 1.0]));
        assert!(p.set_base_color_rgb([0.2, 1.5, -0.3]));
        assert_eq!(p.base_color, Vec3::new(0.2, 1.0, 0.0));
        assert_eq!(p.base_color_rgb(), [0.2, 1.0, 0.0]);
    }

    #[test]
    fn defaults_match_demo() {
        let p = CamouflageParams::default();
        assert_eq!(p.strength, 0.6);
        assert_eq!(p.edge_falloff, 2.5);
        assert_eq!(p.direction, Vec2::X);
        assert_eq!(p.ior, 0.05);
        assert!(p.screen_texture.is_none());
    }

    #[test]
    fn time_is_monotonic() {
        let mut p = CamouflageParams::default();
        p.advance(0.5);
        p.advance(-10.0);
        p.advance(0.25);
        assert_eq!(p.time, 0.75);
    }

    #[test]
    fn scroll_offset_follows_direction() {
        let p = CamouflageParams {
            time: 2.0,
            speed: 0.5,
            direction: Vec2::new(0.0, -1.0),
            ..CamouflageParams::default()
        };
        assert_eq!(p.scroll_offset(), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn tunables_round_trip_within_range() {
        let mut p = CamouflageParams::default();
        for t in TUNABLES {
            let (min, max) = t.range();
            assert!(min < max, "{} has an empty range", t.label());
            if t.set(&mut p, max) {
                assert_eq!(t.get(&p), Some(max));
            } else {
                assert_eq!(t, Tunable::CamouflageStrength);
            }
        }
    }
}
