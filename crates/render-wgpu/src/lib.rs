//! wgpu render backend for the camouflage scene.
//!
//! Draws the environment background, lit textured meshes and the
//! camouflage overlay. The overlay samples an offscreen capture of the
//! scene; captures alternate between two targets so a capture never reads
//! the texture it is writing.
//!
//! # Invariants
//! - Renderer never mutates scene state.
//! - Camera motion is not part of the simulation.

mod camera;
mod gpu;
mod mesh;
mod offscreen;
mod shaders;

pub use camera::OrbitCamera;
pub use gpu::{GpuFrame, WgpuRenderer};
pub use mesh::{MeshData, Vertex, tessellate};
pub use offscreen::OffscreenTargets;
