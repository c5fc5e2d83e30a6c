use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SceneError;

/// Startup configuration for a scene and its camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub gravity: Vec3,
    /// Physics step in seconds.
    pub fixed_timestep: f64,
    /// Catch-up steps allowed per tick before time is dropped.
    pub max_substeps: u32,
    pub camera: CameraSettings,
    pub texture_set: String,
    pub environment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub damping: f32,
    pub max_distance: f32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 10,
            camera: CameraSettings::default(),
            texture_set: "sapphire".into(),
            environment: Some("sky".into()),
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::ZERO,
            fov_degrees: 70.0,
            near: 0.1,
            far: 100.0,
            damping: 0.1,
            max_distance: 5.0,
        }
    }
}

impl SceneSettings {
    /// Read from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SceneError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn render_view(&self) -> camoscene_render::RenderView {
        camoscene_render::RenderView {
            eye: self.camera.eye,
            target: self.camera.target,
            fov_degrees: self.camera.fov_degrees,
            near: self.camera.near,
            far: self.camera.far,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo() {
        let s = SceneSettings::default();
        assert_eq!(s.gravity.y, -9.81);
        assert_eq!(s.camera.eye, Vec3::new(0.0, 1.0, 5.0));
        assert_eq!(s.render_view().fov_degrees, 70.0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: SceneSettings = serde_json::from_str(r#"{ "max_substeps": 3 }"#).unwrap();
        assert_eq!(s.max_substeps, 3);
        assert_eq!(s.texture_set, "sapphire");
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let mut s = SceneSettings::default();
        s.environment = None;
        s.save(&path).unwrap();
        assert_eq!(SceneSettings::load(&path).unwrap(), s);
    }
}
