use camoscene_common::{Aabb, EntityId, Transform, TrackedTransform};
use camoscene_kernel::ListenerId;
use camoscene_physics::{
    BodyDesc, BodyId, CollisionShape, PhysicsError, PhysicsWorld, Pose, ShapeKind,
};
use camoscene_render::{Geometry, GeometryHandle, StandardMaterial};
use glam::{Quat, Vec2, Vec3};
use std::cell::Cell;
use std::rc::Rc;

/// What to build for a new rigid body object.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySpawn {
    pub name: String,
    pub kind: ShapeKind,
    pub geometry: Geometry,
    pub material: StandardMaterial,
    /// Zero makes the body static.
    pub mass: f32,
    pub transform: Transform,
}

impl BodySpawn {
    /// Plane sized by `visual_scale`, which becomes scale `(x, y, 1)`.
    pub fn plane(
        material: StandardMaterial,
        position: Vec3,
        rotation: Quat,
        visual_scale: Vec2,
        mass: f32,
    ) -> Self {
        Self {
            name: "plane".into(),
            kind: ShapeKind::Plane,
            geometry: Geometry::unit_plane(),
            material,
            mass,
            transform: Transform {
                position,
                rotation,
                scale: visual_scale.extend(1.0),
            },
        }
    }

    pub fn cuboid(
        material: StandardMaterial,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
        mass: f32,
    ) -> Self {
        Self {
            name: "box".into(),
            kind: ShapeKind::Box,
            geometry: Geometry::unit_box(),
            material,
            mass,
            transform: Transform {
                position,
                rotation,
                scale,
            },
        }
    }

    /// Sphere of `radius`. The mesh has unit diameter, so the scale is the
    /// diameter on every axis and both mesh and collider end up at `radius`.
    pub fn sphere(
        material: StandardMaterial,
        position: Vec3,
        rotation: Quat,
        radius: f32,
        mass: f32,
    ) -> Self {
        Self {
            name: "sphere".into(),
            kind: ShapeKind::Sphere,
            geometry: Geometry::sphere(0.5),
            material,
            mass,
            transform: Transform {
                position,
                rotation,
                scale: Vec3::splat(radius * 2.0),
            },
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[derive(Debug, Default)]
struct Dirty {
    pose: Cell<bool>,
    scale: Cell<bool>,
}

/// Couples a visual object's tracked transform to a rigid body.
///
/// Transform callbacks only raise flags; [`RigidBodyBinding::flush`] turns
/// them into physics edits. The body exists in the physics world exactly
/// while the entity is reachable from the scene root.
pub struct RigidBodyBinding {
    entity: EntityId,
    kind: ShapeKind,
    mass: f32,
    shape: CollisionShape,
    geometry: GeometryHandle,
    local_bounds: Aabb,
    material: StandardMaterial,
    transform: TrackedTransform,
    dirty: Rc<Dirty>,
    body: Option<BodyId>,
    listener: ListenerId,
}

impl RigidBodyBinding {
    /// Build the binding at `spawn.transform`. The spawn scale is the
    /// starting point, not a change: the shape comes from
    /// [`ShapeKind::initial`] and nothing is pending afterwards.
    pub(crate) fn new(
        entity: EntityId,
        spawn: &BodySpawn,
        geometry: GeometryHandle,
        listener: ListenerId,
    ) -> Self {
        let dirty = Rc::new(Dirty::default());
        let mut transform = TrackedTransform::new(spawn.transform);
        {
            let d = dirty.clone();
            transform.position.on_change(move |_| d.pose.set(true));
            let d = dirty.clone();
            transform.rotation.on_change(move |_| d.pose.set(true));
            let d = dirty.clone();
            transform.scale.on_change(move |_| d.scale.set(true));
        }

        let mut binding = Self {
            entity,
            kind: spawn.kind,
            mass: spawn.mass,
            shape: spawn.kind.initial(spawn.transform.scale),
            geometry,
            local_bounds: spawn.geometry.local_bounds(),
            material: spawn.material.clone(),
            transform,
            dirty,
            body: None,
            listener,
        };
        binding.update_uv_repeat();
        binding
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn shape(&self) -> CollisionShape {
        self.shape
    }

    pub fn geometry(&self) -> GeometryHandle {
        self.geometry
    }

    pub fn material(&self) -> &StandardMaterial {
        &self.material
    }

    pub fn transform(&self) -> &TrackedTransform {
        &self.transform
    }

    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    pub fn is_attached(&self) -> bool {
        self.body.is_some()
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    pub(crate) fn transform_mut(&mut self) -> &mut TrackedTransform {
        &mut self.transform
    }

    /// World-space bounds of the visual geometry.
    pub fn world_bounds(&self) -> Aabb {
        self.local_bounds.transformed(&self.transform.snapshot())
    }

    fn pose(&self) -> Pose {
        Pose {
            position: self.transform.position.get(),
            rotation: self.transform.rotation.get(),
        }
    }

    /// Push pending transform changes into physics. Returns whether anything
    /// was applied.
    pub(crate) fn flush(&mut self, physics: &mut PhysicsWorld) -> Result<bool, PhysicsError> {
        let scale_changed = self.dirty.scale.replace(false);
        let pose_changed = self.dirty.pose.replace(false);
        if scale_changed {
            self.on_scale_changed(physics)?;
        }
        if pose_changed {
            if let Some(id) = self.body {
                physics.set_pose(id, self.pose())?;
            }
        }
        Ok(scale_changed || pose_changed)
    }

    /// Swap in a shape derived from the current scale, then retile textures.
    fn on_scale_changed(&mut self, physics: &mut PhysicsWorld) -> Result<(), PhysicsError> {
        let shape = self.kind.derive(self.transform.scale.get());
        if let Some(id) = self.body {
            physics.replace_shape(id, shape)?;
        }
        tracing::debug!(entity = %self.entity.short(), ?shape, "shape rebuilt");
        self.shape = shape;
        self.update_uv_repeat();
        Ok(())
    }

    /// Repeat textures by world size along x and z so density stays
    /// constant under non-uniform scale.
    fn update_uv_repeat(&mut self) {
        let size = self.world_bounds().size();
        self.material.uv_repeat = Vec2::new(size.x, size.z);
    }

    /// Entity became reachable: put the body in the world. No-op if it is
    /// already there.
    pub(crate) fn on_attach(&mut self, physics: &mut PhysicsWorld) -> bool {
        if self.body.is_some() {
            return false;
        }
        let id = physics.add_body(&BodyDesc {
            shape: self.shape,
            mass: self.mass,
            pose: self.pose(),
        });
        self.body = Some(id);
        true
    }

    /// Entity became unreachable: take the body out. No-op if it is absent.
    pub(crate) fn on_detach(&mut self, physics: &mut PhysicsWorld) -> Result<bool, PhysicsError> {
        let Some(id) = self.body.take() else {
            return Ok(false);
        };
        physics.remove_body(id)?;
        Ok(true)
    }

    /// Copy a dynamic body's simulated pose into the transform without
    /// echoing it back to the body.
    pub(crate) fn pull_from_body(&mut self, physics: &PhysicsWorld) -> Result<bool, PhysicsError> {
        let Some(id) = self.body else {
            return Ok(false);
        };
        if !physics.is_dynamic(id)? {
            return Ok(false);
        }
        let pose = physics.pose(id)?;
        self.transform.position.set(pose.position);
        self.transform.rotation.set(pose.rotation);
        self.dirty.pose.set(false);
        Ok(true)
    }
}

impl std::fmt::Debug for RigidBodyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigidBodyBinding")
            .field("entity", &self.entity)
            .field("kind", &self.kind)
            .field("shape", &self.shape)
            .field("body", &self.body)
            .finish()
    }
}
