use camoscene_common::Aabb;
use glam::Vec3;
use rapier3d::prelude::{ColliderBuilder, HalfSpace, SharedShape, Vector};

/// Smallest extent a derived shape may have. Zero, negative and NaN scale
/// components are replaced by this before derivation.
pub const MIN_EXTENT: f32 = 1e-4;

/// Which primitive a body uses. Fixed for the body's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Plane,
    Box,
    Sphere,
}

/// A concrete collision shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionShape {
    /// Infinite plane through the body origin with local +Z normal.
    Plane,
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
}

/// Replace degenerate components with [`MIN_EXTENT`].
pub fn sanitize_scale(scale: Vec3) -> Vec3 {
    let fix = |c: f32| if c.is_finite() && c >= MIN_EXTENT { c } else { MIN_EXTENT };
    let clean = Vec3::new(fix(scale.x), fix(scale.y), fix(scale.z));
    if clean != scale {
        tracing::warn!(?scale, clamped = ?clean, "degenerate scale clamped");
    }
    clean
}

impl ShapeKind {
    /// Shape for a scale change.
    ///
    /// Planes and boxes become boxes with half extents `scale / 2`; spheres get
    /// the mean of the three half scales as radius.
    pub fn derive(self, scale: Vec3) -> CollisionShape {
        let scale = sanitize_scale(scale);
        match self {
            Self::Plane | Self::Box => CollisionShape::Box {
                half_extents: scale / 2.0,
            },
            Self::Sphere => CollisionShape::Sphere {
                radius: (scale.x / 2.0 + scale.y / 2.0 + scale.z / 2.0) / 3.0,
            },
        }
    }

    /// Shape at construction time.
    ///
    /// A plane starts as an infinite half-space whatever its scale and only
    /// becomes a box once its scale changes. Boxes and spheres use the same
    /// rule as [`ShapeKind::derive`].
    pub fn initial(self, scale: Vec3) -> CollisionShape {
        match self {
            Self::Plane => CollisionShape::Plane,
            Self::Box | Self::Sphere => self.derive(scale),
        }
    }
}

impl CollisionShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Plane => ShapeKind::Plane,
            Self::Box { .. } => ShapeKind::Box,
            Self::Sphere { .. } => ShapeKind::Sphere,
        }
    }

    /// Rapier collider for this shape, centred on the body.
    pub fn collider_builder(&self) -> ColliderBuilder {
        match *self {
            Self::Plane => ColliderBuilder::new(SharedShape::new(HalfSpace::new(Vector::z_axis()))),
            Self::Box { half_extents: h } => ColliderBuilder::cuboid(h.x, h.y, h.z),
            Self::Sphere { radius } => ColliderBuilder::ball(radius),
        }
    }

    /// Local bounds. Planes are unbounded.
    pub fn local_bounds(&self) -> Option<Aabb> {
        match *self {
            Self::Plane => None,
            Self::Box { half_extents } => Some(Aabb::from_half_extents(half_extents)),
            Self::Sphere { radius } => Some(Aabb::from_half_extents(Vec3::splat(radius))),
        }
    }
}
