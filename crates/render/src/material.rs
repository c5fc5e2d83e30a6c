use camoscene_common::Aabb;
use glam::{Vec2, Vec3};

/// Procedural mesh description. Backends tessellate it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    /// Unit-centred box with the given edge lengths.
    Box { size: Vec3 },
    /// XY plane facing +Z.
    Plane { width: f32, height: f32 },
}

impl Geometry {
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere {
            radius,
            width_segments: 32,
            height_segments: 32,
        }
    }

    pub fn unit_box() -> Self {
        Self::Box { size: Vec3::ONE }
    }

    pub fn unit_plane() -> Self {
        Self::Plane {
            width: 1.0,
            height: 1.0,
        }
    }

    /// Object-space bounds.
    pub fn local_bounds(&self) -> Aabb {
        match *self {
            Self::Sphere { radius, .. } => Aabb::from_half_extents(Vec3::splat(radius)),
            Self::Box { size } => Aabb::from_half_extents(size / 2.0),
            Self::Plane { width, height } => {
                Aabb::from_half_extents(Vec3::new(width / 2.0, height / 2.0, 0.0))
            }
        }
    }
}

/// Index into a [`GeometryRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle(u32);

impl GeometryHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Shared geometry storage. Handles stay valid for the registry's lifetime.
#[derive(Debug, Clone, Default)]
pub struct GeometryRegistry {
    entries: Vec<Geometry>,
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, geometry: Geometry) -> GeometryHandle {
        let handle = GeometryHandle(self.entries.len() as u32);
        self.entries.push(geometry);
        handle
    }

    pub fn get(&self, handle: GeometryHandle) -> Option<&Geometry> {
        self.entries.get(handle.index())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeometryHandle, &Geometry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, g)| (GeometryHandle(i as u32), g))
    }
}

/// Lit, textured surface: albedo, normal and roughness maps from a texture set.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterial {
    /// Name of the texture set in the resource cache.
    pub texture_set: String,
    pub base_color: Vec3,
    pub opacity: f32,
    pub transparent: bool,
    pub depth_test: bool,
    /// Texture repeat count per axis.
    pub uv_repeat: Vec2,
}

impl StandardMaterial {
    pub fn new(texture_set: impl Into<String>) -> Self {
        Self {
            texture_set: texture_set.into(),
            base_color: Vec3::ONE,
            opacity: 1.0,
            transparent: false,
            depth_test: true,
            uv_repeat: Vec2::ONE,
        }
    }
}

/// Which program a mesh is drawn with.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialRef {
    Standard(StandardMaterial),
    /// The single camouflage program; uniforms come from the frame's params.
    Camouflage,
}

/// A drawable: geometry, material and draw order.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: GeometryHandle,
    pub material: MaterialRef,
    /// Lower draws first.
    pub render_order: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_hands_out_stable_handles() {
        let mut reg = GeometryRegistry::new();
        let a = reg.register(Geometry::sphere(0.5));
        let b = reg.register(Geometry::unit_box());
        assert_ne!(a, b);
        assert_eq!(reg.get(a), Some(&Geometry::sphere(0.5)));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn bounds_follow_geometry() {
        assert_eq!(Geometry::sphere(0.5).local_bounds().size(), Vec3::ONE);
        assert_eq!(
            Geometry::unit_plane().local_bounds().size(),
            Vec3::new(1.0, 1.0, 0.0)
        );
    }
}
