use crate::convert::{to_isometry, to_quat, to_rotation, to_vec3, to_vector};
use crate::shape::CollisionShape;
use glam::{Quat, Vec3};
use rapier3d::prelude::*;
use std::collections::BTreeMap;

/// Stable id for a body inside [`PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(u64);

/// Position and orientation of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Everything needed to (re)insert a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub shape: CollisionShape,
    /// Zero makes the body fixed.
    pub mass: f32,
    pub pose: Pose,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhysicsError {
    #[error("body {0:?} is not in the physics world")]
    UnknownBody(BodyId),
}

struct BodyRecord {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    shape: CollisionShape,
    mass: f32,
}

/// Rigid-body world with a fixed timestep.
///
/// Owns every rapier set. Bodies are addressed by [`BodyId`] so callers never
/// hold rapier handles.
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    records: BTreeMap<BodyId, BodyRecord>,
    next_id: u64,
    steps: u64,
}

impl PhysicsWorld {
    pub const FIXED_TIMESTEP: f32 = 1.0 / 60.0;

    pub fn new(gravity: Vec3) -> Self {
        Self::with_timestep(gravity, Self::FIXED_TIMESTEP)
    }

    /// World integrating `timestep` seconds per [`PhysicsWorld::fixed_step`].
    /// Non-positive or non-finite steps fall back to [`Self::FIXED_TIMESTEP`].
    pub fn with_timestep(gravity: Vec3, timestep: f32) -> Self {
        let dt = if timestep.is_finite() && timestep > 0.0 {
            timestep
        } else {
            tracing::warn!(timestep, "invalid physics timestep, using default");
            Self::FIXED_TIMESTEP
        };
        let integration_parameters = IntegrationParameters {
            dt,
            ..IntegrationParameters::default()
        };
        Self {
            gravity: to_vector(gravity),
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            records: BTreeMap::new(),
            next_id: 0,
            steps: 0,
        }
    }

    pub fn gravity(&self) -> Vec3 {
        to_vec3(&self.gravity)
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    /// Seconds integrated per step.
    pub fn timestep(&self) -> f32 {
        self.integration_parameters.dt
    }

    pub fn body_count(&self) -> usize {
        self.records.len()
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.records.contains_key(&id)
    }

    /// Steps taken since creation.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Insert a body with its collider. Returns a fresh id.
    pub fn add_body(&mut self, desc: &BodyDesc) -> BodyId {
        let iso = to_isometry(desc.pose.position, desc.pose.rotation);
        let builder = if desc.mass > 0.0 {
            RigidBodyBuilder::dynamic()
        } else {
            RigidBodyBuilder::fixed()
        };
        let body = self.bodies.insert(builder.pose(iso).build());
        let collider = self.insert_collider(&desc.shape, desc.mass, body);

        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.records.insert(
            id,
            BodyRecord {
                body,
                collider,
                shape: desc.shape,
                mass: desc.mass,
            },
        );
        tracing::debug!(?id, shape = ?desc.shape, mass = desc.mass, "body added");
        id
    }

    /// Remove a body and its collider. Returns its final description so it
    /// can be re-added later with the same state.
    pub fn remove_body(&mut self, id: BodyId) -> Result<BodyDesc, PhysicsError> {
        let pose = self.pose(id)?;
        let record = self
            .records
            .remove(&id)
            .ok_or(PhysicsError::UnknownBody(id))?;
        self.bodies.remove(
            record.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        tracing::debug!(?id, "body removed");
        Ok(BodyDesc {
            shape: record.shape,
            mass: record.mass,
            pose,
        })
    }

    /// Detach the current collider and attach one built from `shape`.
    pub fn replace_shape(&mut self, id: BodyId, shape: CollisionShape) -> Result<(), PhysicsError> {
        let record = self
            .records
            .get(&id)
            .ok_or(PhysicsError::UnknownBody(id))?;
        let (body, old, mass) = (record.body, record.collider, record.mass);

        self.colliders
            .remove(old, &mut self.islands, &mut self.bodies, true);
        let collider = self.insert_collider(&shape, mass, body);

        if let Some(record) = self.records.get_mut(&id) {
            record.collider = collider;
            record.shape = shape;
        }
        Ok(())
    }

    pub fn shape(&self, id: BodyId) -> Result<CollisionShape, PhysicsError> {
        self.records
            .get(&id)
            .map(|r| r.shape)
            .ok_or(PhysicsError::UnknownBody(id))
    }

    pub fn pose(&self, id: BodyId) -> Result<Pose, PhysicsError> {
        let body = self.body(id)?;
        Ok(Pose {
            position: to_vec3(body.translation()),
            rotation: to_quat(body.rotation()),
        })
    }

    pub fn set_pose(&mut self, id: BodyId, pose: Pose) -> Result<(), PhysicsError> {
        let handle = self
            .records
            .get(&id)
            .map(|r| r.body)
            .ok_or(PhysicsError::UnknownBody(id))?;
        let body = self
            .bodies
            .get_mut(handle)
            .ok_or(PhysicsError::UnknownBody(id))?;
        body.set_translation(to_vector(pose.position), true);
        body.set_rotation(to_rotation(pose.rotation), true);
        Ok(())
    }

    pub fn is_dynamic(&self, id: BodyId) -> Result<bool, PhysicsError> {
        Ok(self.body(id)?.is_dynamic())
    }

    /// Advance one fixed timestep.
    pub fn fixed_step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
        self.steps += 1;
    }

    fn body(&self, id: BodyId) -> Result<&RigidBody, PhysicsError> {
        self.records
            .get(&id)
            .and_then(|r| self.bodies.get(r.body))
            .ok_or(PhysicsError::UnknownBody(id))
    }

    fn insert_collider(
        &mut self,
        shape: &CollisionShape,
        mass: f32,
        body: RigidBodyHandle,
    ) -> ColliderHandle {
        let mut builder = shape.collider_builder();
        if mass > 0.0 {
            builder = builder.mass(mass);
        }
        self.colliders
            .insert_with_parent(builder.build(), body, &mut self.bodies)
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(mass: f32, y: f32) -> BodyDesc {
        BodyDesc {
            shape: CollisionShape::Sphere { radius: 0.5 },
            mass,
            pose: Pose {
                position: Vec3::new(0.0, y, 0.0),
                rotation: Quat::IDENTITY,
            },
        }
    }

    #[test]
    fn add_and_remove_bodies() {
        let mut world = PhysicsWorld::default();
        let a = world.add_body(&ball(1.0, 5.0));
        let b = world.add_body(&ball(0.0, 0.0));
        assert_eq!(world.body_count(), 2);
        assert_ne!(a, b);

        let desc = world.remove_body(a).unwrap();
        assert_eq!(desc.mass, 1.0);
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.remove_body(a), Err(PhysicsError::UnknownBody(a)));
    }

    #[test]
    fn dynamic_body_falls() {
        let mut world = PhysicsWorld::default();
        let id = world.add_body(&ball(1.0, 10.0));
        for _ in 0..30 {
            world.fixed_step();
        }
        assert!(world.pose(id).unwrap().position.y < 10.0);
        assert_eq!(world.steps(), 30);
    }

    #[test]
    fn fall_distance_follows_the_configured_step() {
        // One simulated second either way; the drop must not depend on the rate.
        let mut drops = Vec::new();
        for (step, count) in [(1.0 / 60.0, 60), (1.0 / 120.0, 120)] {
            let mut world = PhysicsWorld::with_timestep(Vec3::new(0.0, -9.81, 0.0), step);
            assert_eq!(world.timestep(), step);
            let id = world.add_body(&ball(1.0, 100.0));
            for _ in 0..count {
                world.fixed_step();
            }
            drops.push(100.0 - world.pose(id).unwrap().position.y);
        }
        for drop in &drops {
            assert!((4.5..5.5).contains(drop), "dropped {drop}");
        }
        assert!((drops[0] - drops[1]).abs() < 0.1);
    }

    #[test]
    fn invalid_timestep_uses_default() {
        let world = PhysicsWorld::with_timestep(Vec3::ZERO, 0.0);
        assert_eq!(world.timestep(), PhysicsWorld::FIXED_TIMESTEP);
    }

    #[test]
    fn fixed_body_stays_put() {
        let mut world = PhysicsWorld::default();
        let id = world.add_body(&ball(0.0, 3.0));
        for _ in 0..10 {
            world.fixed_step();
        }
        assert_eq!(world.pose(id).unwrap().position, Vec3::new(0.0, 3.0, 0.0));
        assert!(!world.is_dynamic(id).unwrap());
    }

    #[test]
    fn set_pose_is_read_back() {
        let mut world = PhysicsWorld::default();
        let id = world.add_body(&ball(0.0, 0.0));
        let pose = Pose {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(0.5),
        };
        world.set_pose(id, pose).unwrap();
        let back = world.pose(id).unwrap();
        assert!(back.position.abs_diff_eq(pose.position, 1e-6));
        assert!(back.rotation.abs_diff_eq(pose.rotation, 1e-6));
    }

    #[test]
    fn replace_shape_keeps_body() {
        let mut world = PhysicsWorld::default();
        let id = world.add_body(&ball(2.0, 1.0));
        let new_shape = CollisionShape::Box {
            half_extents: Vec3::new(1.0, 0.5, 0.25),
        };
        world.replace_shape(id, new_shape).unwrap();
        assert_eq!(world.shape(id).unwrap(), new_shape);
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn plane_catches_falling_ball() {
        let mut world = PhysicsWorld::default();
        world.add_body(&BodyDesc {
            shape: CollisionShape::Plane,
            mass: 0.0,
            pose: Pose {
                position: Vec3::ZERO,
                // Plane normal is local +Z; rotate it to +Y.
                rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            },
        });
        let id = world.add_body(&ball(1.0, 2.0));
        for _ in 0..240 {
            world.fixed_step();
        }
        let y = world.pose(id).unwrap().position.y;
        assert!(y > 0.3 && y < 0.7, "ball should rest on the plane, y = {y}");
    }
}
