use camoscene_render::RenderView;
use glam::{Mat4, Vec3};

/// Orbit camera circling a target, with damped rotation and a distance cap.
/// Camera motion lives outside the simulation.
pub struct OrbitCamera {
    pub target: Vec3,
    /// Angle around +Y, radians. Zero looks down -Z.
    pub yaw: f32,
    /// Elevation, radians.
    pub pitch: f32,
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Fraction of angular velocity lost per update.
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    pending_zoom: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::from_view(&RenderView::default())
    }
}

impl OrbitCamera {
    const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 1e-3;

    /// Camera placed at `view.eye` orbiting `view.target`.
    pub fn from_view(view: &RenderView) -> Self {
        let offset = view.eye - view.target;
        let distance = offset.length().max(1e-3);
        Self {
            target: view.target,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            distance,
            min_distance: 0.0,
            max_distance: 5.0,
            damping: 0.1,
            rotate_speed: 0.005,
            zoom_speed: 0.001,
            fov_degrees: view.fov_degrees,
            aspect: 16.0 / 9.0,
            near: view.near,
            far: view.far,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            pending_zoom: 1.0,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// Mouse drag in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw_velocity -= dx * self.rotate_speed;
        self.pitch_velocity += dy * self.rotate_speed;
    }

    /// Scroll amount; positive moves closer.
    pub fn zoom(&mut self, amount: f32) {
        self.pending_zoom *= (-amount * self.zoom_speed).exp();
    }

    /// Apply pending input once per frame.
    pub fn update(&mut self) {
        self.yaw += self.yaw_velocity;
        self.pitch = (self.pitch + self.pitch_velocity).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
        self.distance = (self.distance * self.pending_zoom).clamp(self.min_distance, self.max_distance);

        let keep = 1.0 - self.damping;
        self.yaw_velocity *= keep;
        self.pitch_velocity *= keep;
        self.pending_zoom = 1.0;
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    pub fn view(&self) -> RenderView {
        RenderView {
            eye: self.eye(),
            target: self.target,
            fov_degrees: self.fov_degrees,
            near: self.near,
            far: self.far,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        let view = self.view();
        view.projection_matrix(self.aspect) * view.view_matrix()
    }
}
