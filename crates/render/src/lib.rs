//! Rendering core: everything about the camouflage effect that does not need a GPU.
//!
//! # Invariants
//! - Renderers read scene state; they never mutate it.
//! - The shader's screen texture is always a completed capture from an
//!   earlier render, never the one in progress.
//! - The camouflage mesh of a dual-material object draws after its standard mesh.
//!
//! `shading` mirrors the WGSL camouflage program line for line so its math
//! can be tested on the CPU.

mod compositor;
mod dual_material;
mod material;
mod params;
mod renderer;
pub mod shading;

pub use compositor::{CaptureRequest, Compositor, HeadlessTarget, OffscreenRenderer, ScreenTexture};
pub use dual_material::DualMaterialObject;
pub use material::{
    Geometry, GeometryHandle, GeometryRegistry, MaterialRef, Mesh, StandardMaterial,
};
pub use params::{BASE_COLOR_LABEL, CamouflageParams, TUNABLES, Tunable};
pub use renderer::{
    DebugTextRenderer, DrawItem, Lighting, RenderError, RenderScene, RenderView, Renderer,
};

pub fn crate_info() -> &'static str {
    "camoscene-render v0.1.0"
}
