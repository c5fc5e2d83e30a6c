//! Scene wiring: rigid-body objects, the dual-material camouflage object and
//! the per-frame tick.
//!
//! # Invariants
//! - A rigid body exists in the physics world exactly while its object is
//!   reachable from the scene root.
//! - Collision shapes are rebuilt from scale, never edited in place.
//! - Listeners removed during a broadcast are gone before the next tick.
//! - Disposing an object twice is a no-op.

mod binding;
mod context;
mod error;
mod inspector;
mod scene;
mod settings;

pub use binding::{BodySpawn, RigidBodyBinding};
pub use context::SceneContext;
pub use error::SceneError;
pub use inspector::{CamouflageSummary, EntityInfo, SceneInspector, SceneSummary};
pub use scene::{Scene, TickReport};
pub use settings::{CameraSettings, SceneSettings};

pub fn crate_info() -> &'static str {
    "camoscene-scene v0.1.0"
}
