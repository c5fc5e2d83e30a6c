//! Scene kernel: scene graph membership, per-frame update bus, fixed-step clock.
//!
//! # Invariants
//! - An entity is live exactly when it is reachable from the scene root.
//! - Every reachability change is reported once, as `Attached` or `Detached`.
//! - The update bus halts on the first listener error.

pub mod bus;
pub mod clock;
pub mod scene;

pub use bus::{Listener, ListenerId, UpdateBus};
pub use clock::FixedStepClock;
pub use scene::{Reachability, SceneEvent, SceneGraph, SceneGraphError};
