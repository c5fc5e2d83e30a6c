use crate::material::{MaterialRef, Mesh};
use crate::params::CamouflageParams;
use camoscene_assets::AssetError;
use camoscene_common::EntityId;
use glam::{Mat4, Vec3};
use std::fmt::Write as _;

/// Camera/view configuration for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::ZERO,
            fov_degrees: 70.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl RenderView {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), aspect.max(1e-4), self.near, self.far)
    }
}

/// Ambient plus one directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    pub sun_color: Vec3,
    pub sun_intensity: f32,
    /// The sun shines from here towards the origin.
    pub sun_position: Vec3,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.5,
            sun_color: Vec3::ONE,
            sun_intensity: 1.0,
            sun_position: Vec3::new(5.0, 10.0, 5.0),
        }
    }
}

impl Lighting {
    /// Unit vector from the surface towards the sun.
    pub fn sun_direction(&self) -> Vec3 {
        self.sun_position.normalize_or_zero()
    }
}

/// One mesh placed in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub entity: EntityId,
    pub mesh: Mesh,
    pub model: Mat4,
}

/// Snapshot of everything a renderer needs for one frame.
#[derive(Debug, Clone, Default)]
pub struct RenderScene {
    pub items: Vec<DrawItem>,
    pub lighting: Lighting,
    /// Environment drawn behind everything.
    pub environment: Option<String>,
    pub camouflage: CamouflageParams,
}

impl RenderScene {
    /// Items in draw order. Ties keep insertion order.
    pub fn ordered(&self) -> Vec<&DrawItem> {
        let mut items: Vec<&DrawItem> = self.items.iter().collect();
        items.sort_by_key(|item| item.mesh.render_order);
        items
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("shader `{label}` failed validation: {message}")]
    Shader { label: String, message: String },
    #[error("surface error: {0}")]
    Surface(String),
    #[error("offscreen capture failed: {0}")]
    Capture(String),
    #[error("geometry {0} is not registered")]
    UnknownGeometry(usize),
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer reads a frame snapshot and a view configuration, then
/// produces output. It never mutates the scene.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame.
    fn render(&self, scene: &RenderScene, view: &RenderView) -> Self::Output;
}

/// Human-readable dump of a frame, for the CLI and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, scene: &RenderScene, view: &RenderView) -> String {
        let mut out = String::new();
        let p = &scene.camouflage;
        let _ = writeln!(
            out,
            "=== Frame (time={:.2}, draws={}) ===",
            p.time,
            scene.items.len()
        );
        let _ = writeln!(
            out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}",
            view.eye.x, view.eye.y, view.eye.z, view.target.x, view.target.y, view.target.z,
            view.fov_degrees
        );
        let _ = writeln!(
            out,
            "Camouflage: strength={:.2} edge={:.2} distortion={:.2} screen={}x{} capture={}",
            p.strength,
            p.edge_falloff,
            p.distortion,
            p.screen_size.x,
            p.screen_size.y,
            p.screen_texture
                .map(|t| format!("#{}", t.generation))
                .unwrap_or_else(|| "none".into())
        );
        if let Some(env) = &scene.environment {
            let _ = writeln!(out, "Environment: {env}");
        }

        for item in scene.ordered() {
            let pos = item.model.w_axis;
            let material = match &item.mesh.material {
                MaterialRef::Standard(m) => {
                    format!("standard[{}] opacity={:.2}", m.texture_set, m.opacity)
                }
                MaterialRef::Camouflage => "camouflage".to_string(),
            };
            let _ = writeln!(
                out,
                "  [{}] order={} pos=({:.2}, {:.2}, {:.2}) {}",
                item.entity.short(),
                item.mesh.render_order,
                pos.x,
                pos.y,
                pos.z,
                material
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{GeometryRegistry, Geometry, StandardMaterial};

    #[test]
    fn debug_renderer_empty_scene() {
        let output = DebugTextRenderer::new().render(&RenderScene::default(), &RenderView::default());
        assert!(output.contains("draws=0"));
        assert!(output.contains("capture=none"));
    }

    #[test]
    fn debug_renderer_lists_items_in_draw_order() {
        let mut reg = GeometryRegistry::new();
        let g = reg.register(Geometry::unit_box());
        let entity = EntityId::new();
        let scene = RenderScene {
            items: vec![
                DrawItem {
                    entity,
                    mesh: Mesh {
                        geometry: g,
                        material: MaterialRef::Camouflage,
                        render_order: 1,
                    },
                    model: Mat4::IDENTITY,
                },
                DrawItem {
                    entity,
                    mesh: Mesh {
                        geometry: g,
                        material: MaterialRef::Standard(StandardMaterial::new("sapphire")),
                        render_order: 0,
                    },
                    model: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
                },
            ],
            ..RenderScene::default()
        };
        let output = DebugTextRenderer::new().render(&scene, &RenderView::default());
        let standard = output.find("standard[sapphire]").unwrap();
        let camo = output.find("camouflage\n").unwrap();
        assert!(standard < camo);
        assert!(output.contains("pos=(1.00, 2.00, 3.00)"));
    }

    #[test]
    fn render_view_default() {
        let view = RenderView::default();
        assert_eq!(view.fov_degrees, 70.0);
        assert_eq!(view.eye, Vec3::new(0.0, 1.0, 5.0));
    }

    #[test]
    fn sun_points_up_and_out() {
        let dir = Lighting::default().sun_direction();
        assert!(dir.y > 0.0);
        assert!((dir.length() - 1.0).abs() < 1e-6);
    }
}
