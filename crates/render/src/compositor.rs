use crate::params::CamouflageParams;
use crate::renderer::{RenderError, RenderScene, RenderView};
use glam::Vec2;

/// Handle to a completed offscreen capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenTexture {
    /// Which of the two ping-pong targets holds the image.
    pub slot: usize,
    /// Monotonic capture counter.
    pub generation: u64,
    pub width: u32,
    pub height: u32,
}

/// What a backend is asked to draw for one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    /// Target to draw into.
    pub target_slot: usize,
    /// Capture the overlay samples while drawing. Never `target_slot`.
    pub previous: Option<ScreenTexture>,
}

/// A backend able to render the scene into an offscreen target.
pub trait OffscreenRenderer {
    /// Reallocate both targets at the given size.
    fn resize_targets(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    /// Draw into `request.target_slot`. Must leave the main framebuffer alone.
    fn render_offscreen(
        &mut self,
        request: &CaptureRequest,
        scene: &RenderScene,
        view: &RenderView,
    ) -> Result<(), RenderError>;
}

/// Drives the offscreen capture that feeds the camouflage shader.
///
/// Owns the viewport size and the ping-pong bookkeeping. The shader's
/// `screen_texture` is only updated after a capture completes, so a capture
/// in progress never samples itself.
#[derive(Debug, Clone)]
pub struct Compositor {
    width: u32,
    height: u32,
    generation: u64,
    latest: Option<ScreenTexture>,
    targets_stale: bool,
}

impl Compositor {
    pub const SLOTS: usize = 2;

    pub fn new() -> Self {
        Self {
            width: 1,
            height: 1,
            generation: 0,
            latest: None,
            targets_stale: true,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn latest(&self) -> Option<ScreenTexture> {
        self.latest
    }

    pub fn captures(&self) -> u64 {
        self.generation
    }

    /// Set the target size, clamped to at least 1x1. Returns whether it
    /// changed. A change drops the previous capture.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return false;
        }
        tracing::debug!(width, height, "offscreen target resized");
        self.width = width;
        self.height = height;
        self.latest = None;
        self.targets_stale = true;
        true
    }

    /// Match the viewport and publish its size to the shader. Call before
    /// each capture.
    pub fn prepare(&mut self, viewport: (u32, u32), params: &mut CamouflageParams) {
        if self.resize(viewport.0, viewport.1) {
            params.screen_texture = None;
        }
        params.screen_size = Vec2::new(self.width as f32, self.height as f32);
    }

    /// Render `scene` offscreen and publish the result as the shader's
    /// screen texture.
    pub fn capture<R: OffscreenRenderer + ?Sized>(
        &mut self,
        backend: &mut R,
        scene: &RenderScene,
        view: &RenderView,
        params: &mut CamouflageParams,
    ) -> Result<ScreenTexture, RenderError> {
        if self.targets_stale {
            backend.resize_targets(self.width, self.height)?;
            self.targets_stale = false;
        }

        let target_slot = self
            .latest
            .map(|t| (t.slot + 1) % Self::SLOTS)
            .unwrap_or(0);
        let request = CaptureRequest {
            width: self.width,
            height: self.height,
            target_slot,
            previous: self.latest,
        };
        backend.render_offscreen(&request, scene, view)?;

        self.generation += 1;
        let texture = ScreenTexture {
            slot: target_slot,
            generation: self.generation,
            width: self.width,
            height: self.height,
        };
        self.latest = Some(texture);
        params.screen_texture = Some(texture);
        Ok(texture)
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory target for tests and headless runs. Records every request.
#[derive(Debug, Default)]
pub struct HeadlessTarget {
    size: (u32, u32),
    requests: Vec<CaptureRequest>,
    draws: usize,
}

impl HeadlessTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn requests(&self) -> &[CaptureRequest] {
        &self.requests
    }

    /// Draw items submitted across all captures.
    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl OffscreenRenderer for HeadlessTarget {
    fn resize_targets(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.size = (width, height);
        Ok(())
    }

    fn render_offscreen(
        &mut self,
        request: &CaptureRequest,
        scene: &RenderScene,
        _view: &RenderView,
    ) -> Result<(), RenderError> {
        if (request.width, request.height) != self.size {
            return Err(RenderError::Capture(format!(
                "request {}x{} does not match target {}x{}",
                request.width, request.height, self.size.0, self.size.1
            )));
        }
        self.draws += scene.items.len();
        self.requests.push(*request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(
        comp: &mut Compositor,
        target: &mut HeadlessTarget,
        params: &mut CamouflageParams,
    ) -> ScreenTexture {
        comp.capture(target, &RenderScene::default(), &RenderView::default(), params)
            .unwrap()
    }

    #[test]
    fn resize_before_capture_updates_screen_size() {
        let mut comp = Compositor::new();
        let mut target = HeadlessTarget::new();
        let mut params = CamouflageParams::default();

        comp.prepare((800, 600), &mut params);
        capture(&mut comp, &mut target, &mut params);
        assert_eq!(target.size(), (800, 600));

        comp.prepare((1920, 1080), &mut params);
        assert_eq!(params.screen_size, Vec2::new(1920.0, 1080.0));
        assert!(params.screen_texture.is_none());

        let tex = capture(&mut comp, &mut target, &mut params);
        assert_eq!(target.size(), (1920, 1080));
        assert_eq!((tex.width, tex.height), (1920, 1080));
    }

    #[test]
    fn captures_ping_pong() {
        let mut comp = Compositor::new();
        let mut target = HeadlessTarget::new();
        let mut params = CamouflageParams::default();
        comp.prepare((64, 64), &mut params);

        for _ in 0..5 {
            capture(&mut comp, &mut target, &mut params);
        }
        for req in target.requests() {
            if let Some(prev) = req.previous {
                assert_ne!(prev.slot, req.target_slot);
            }
        }
        assert!(target.requests()[0].previous.is_none());
        assert_eq!(comp.captures(), 5);
    }

    #[test]
    fn shader_sees_previous_capture_during_render() {
        let mut comp = Compositor::new();
        let mut target = HeadlessTarget::new();
        let mut params = CamouflageParams::default();
        comp.prepare((32, 32), &mut params);

        let first = capture(&mut comp, &mut target, &mut params);
        assert_eq!(params.screen_texture, Some(first));
        let second = capture(&mut comp, &mut target, &mut params);
        assert_eq!(target.requests()[1].previous, Some(first));
        assert_eq!(params.screen_texture, Some(second));
        assert!(second.generation > first.generation);
    }

    #[test]
    fn zero_size_is_clamped() {
        let mut comp = Compositor::new();
        let mut params = CamouflageParams::default();
        comp.prepare((0, 0), &mut params);
        assert_eq!(comp.size(), (1, 1));
        assert_eq!(params.screen_size, Vec2::ONE);
    }

    #[test]
    fn same_size_keeps_capture() {
        let mut comp = Compositor::new();
        let mut target = HeadlessTarget::new();
        let mut params = CamouflageParams::default();
        comp.prepare((100, 50), &mut params);
        let tex = capture(&mut comp, &mut target, &mut params);
        comp.prepare((100, 50), &mut params);
        assert_eq!(params.screen_texture, Some(tex));
        assert_eq!(comp.latest(), Some(tex));
    }
}
