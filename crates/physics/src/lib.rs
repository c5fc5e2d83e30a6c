//! Physics adapter: primitive collision shapes and a fixed-step rigid-body world.
//!
//! Rapier owns the solver. This crate only exposes what the scene consumes:
//! insert/remove a body, swap its shape, read/write its pose, step.
//!
//! # Invariants
//! - Shapes are derived from scale, never edited in place.
//! - Degenerate scale components are clamped to [`MIN_EXTENT`].

mod convert;
pub mod shape;
pub mod world;

pub use shape::{CollisionShape, MIN_EXTENT, ShapeKind, sanitize_scale};
pub use world::{BodyDesc, BodyId, PhysicsError, PhysicsWorld, Pose};
