//! Shared types for the camoscene workspace.
//!
//! # Invariants
//! - `Tracked` values notify their callback exactly once per value change.
//! - Writes that leave the value unchanged never notify.

pub mod tracked;
pub mod types;

pub use tracked::{ChangeCallback, Component, Mutation, QuatOp, Tracked, TrackedTransform, Vec3Op};
pub use types::{Aabb, EntityId, Transform};
