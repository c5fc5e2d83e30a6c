use crate::material::{GeometryHandle, MaterialRef, Mesh, StandardMaterial};
use crate::params::CamouflageParams;
use crate::renderer::{DrawItem, RenderError};
use camoscene_assets::ResourceCache;
use camoscene_common::{EntityId, Transform};

/// One entity drawn twice from the same geometry: a lit textured pass, then
/// the camouflage overlay on top.
///
/// `camouflage_strength` blends between the two. It is pushed into the
/// shader state and the standard material's opacity on every [`update`].
///
/// [`update`]: DualMaterialObject::update
#[derive(Debug, Clone)]
pub struct DualMaterialObject {
    entity: EntityId,
    geometry: GeometryHandle,
    standard: StandardMaterial,
    camouflage: CamouflageParams,
    /// Intended range [0, 1]. Not clamped.
    pub camouflage_strength: f32,
    pub transform: Transform,
}

impl DualMaterialObject {
    pub const STANDARD_ORDER: i32 = 0;
    pub const CAMOUFLAGE_ORDER: i32 = 1;
    pub const DEFAULT_STRENGTH: f32 = 0.5;

    /// Resolve `texture_set` and build both materials. A missing texture set
    /// is an error.
    pub fn new(
        entity: EntityId,
        geometry: GeometryHandle,
        camouflage: CamouflageParams,
        texture_set: &str,
        resources: &ResourceCache,
    ) -> Result<Self, RenderError> {
        resources.texture_set(texture_set)?;

        let standard = StandardMaterial {
            transparent: true,
            depth_test: false,
            ..StandardMaterial::new(texture_set)
        };
        tracing::debug!(entity = %entity.short(), texture_set, "dual-material object created");
        Ok(Self {
            entity,
            geometry,
            standard,
            camouflage,
            camouflage_strength: Self::DEFAULT_STRENGTH,
            transform: Transform::default(),
        })
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn geometry(&self) -> GeometryHandle {
        self.geometry
    }

    pub fn standard(&self) -> &StandardMaterial {
        &self.standard
    }

    pub fn standard_opacity(&self) -> f32 {
        self.standard.opacity
    }

    pub fn camouflage(&self) -> &CamouflageParams {
        &self.camouflage
    }

    pub fn camouflage_mut(&mut self) -> &mut CamouflageParams {
        &mut self.camouflage
    }

    /// Per-tick hook: advance shader time and push the blend.
    pub fn update(&mut self, delta: f32) {
        self.camouflage.advance(delta);
        self.camouflage.strength = self.camouflage_strength;
        self.standard.opacity = 1.0 - self.camouflage_strength;
    }

    /// Standard mesh first, camouflage mesh second.
    pub fn meshes(&self) -> [Mesh; 2] {
        [
            Mesh {
                geometry: self.geometry,
                material: MaterialRef::Standard(self.standard.clone()),
                render_order: Self::STANDARD_ORDER,
            },
            Mesh {
                geometry: self.geometry,
                material: MaterialRef::Camouflage,
                render_order: Self::CAMOUFLAGE_ORDER,
            },
        ]
    }

    pub fn draw_items(&self) -> [DrawItem; 2] {
        let model = self.transform.matrix();
        self.meshes().map(|mesh| DrawItem {
            entity: self.entity,
            mesh,
            model,
        })
    }
}
