use anyhow::{Context as _, Result, anyhow};
use camoscene_assets::{Manifest, ResourceCache};
use camoscene_render::{BASE_COLOR_LABEL, CamouflageParams, Geometry, TUNABLES, Tunable};
use camoscene_render_wgpu::{OrbitCamera, WgpuRenderer};
use camoscene_scene::{Scene, SceneInspector, SceneSettings};
use clap::Parser;
use egui::Context as EguiContext;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "camoscene-desktop", about = "Camouflage shader demo")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Asset manifest (JSON). Without one, procedural stand-ins are used.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Scene settings file (JSON)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Texture set for the sphere's standard material
    #[arg(long)]
    texture_set: Option<String>,

    /// Environment map drawn behind the scene
    #[arg(long)]
    environment: Option<String>,
}

fn load_resources(manifest: Option<&PathBuf>) -> Result<ResourceCache> {
    let Some(path) = manifest else {
        return Ok(ResourceCache::builtin());
    };
    let manifest = Manifest::load(path)
        .with_context(|| format!("reading asset manifest {}", path.display()))?;
    let base = path.parent().map(PathBuf::from).unwrap_or_default();
    ResourceCache::preload(&manifest, &base).context("preloading assets")
}

/// Application state that lives independent of the GPU.
struct AppState {
    scene: Scene,
    camera: OrbitCamera,
    show_panel: bool,
    dragging: bool,
    last_cursor: Option<PhysicalPosition<f64>>,
    last_frame: Instant,
}

impl AppState {
    fn new(cli: &Cli) -> Result<Self> {
        let mut settings = match &cli.settings {
            Some(path) => SceneSettings::load(path)
                .with_context(|| format!("reading settings {}", path.display()))?,
            None => SceneSettings::default(),
        };
        if let Some(name) = &cli.texture_set {
            settings.texture_set = name.clone();
        }
        if let Some(name) = &cli.environment {
            settings.environment = Some(name.clone());
        }

        let resources = load_resources(cli.assets.as_ref())?;
        if let Some(env) = &settings.environment {
            resources.environment(env)?;
        }

        let mut scene = Scene::new(&settings, resources);
        scene.spawn_camouflage(
            Geometry::sphere(1.0),
            CamouflageParams::default(),
            &settings.texture_set,
        )?;

        let mut camera = OrbitCamera::from_view(&settings.render_view());
        camera.damping = settings.camera.damping;
        camera.max_distance = settings.camera.max_distance;

        Ok(Self {
            scene,
            camera,
            show_panel: true,
            dragging: false,
            last_cursor: None,
            last_frame: Instant::now(),
        })
    }

    fn handle_key(&mut self, key: KeyCode) {
        if key == KeyCode::F1 {
            self.show_panel = !self.show_panel;
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_panel {
            return;
        }
        let summary = SceneInspector::summary(&self.scene);

        egui::Window::new("Camouflage Shader")
            .default_width(280.0)
            .show(ctx, |ui| {
                let Some(object) = self.scene.context_mut().camouflage_mut() else {
                    ui.label("No camouflage object");
                    return;
                };
                ui.horizontal(|ui| {
                    let mut rgb = object.camouflage().base_color_rgb();
                    if ui.color_edit_button_rgb(&mut rgb).changed() {
                        object.camouflage_mut().set_base_color_rgb(rgb);
                    }
                    ui.label(BASE_COLOR_LABEL);
                });
                for tunable in TUNABLES {
                    let (min, max) = tunable.range();
                    // Strength lives on the object; it is pushed into the
                    // shader on the next tick.
                    let mut value = match tunable {
                        Tunable::CamouflageStrength => object.camouflage_strength,
                        _ => tunable.get(object.camouflage()).unwrap_or_default(),
                    };
                    let slider = egui::Slider::new(&mut value, min..=max)
                        .text(tunable.label())
                        .step_by(f64::from(tunable.step()));
                    if ui.add(slider).changed() && !tunable.set(object.camouflage_mut(), value) {
                        object.camouflage_strength = value;
                    }
                }
                ui.separator();
                ui.small(summary.to_string());
                ui.small("F1: Toggle Panel | LMB: Orbit | Wheel: Zoom");
            });
    }
}

/// Everything created in `resumed`.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

struct GpuApp {
    state: AppState,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
    error: Option<anyhow::Error>,
}

impl GpuApp {
    fn new(state: AppState) -> Self {
        Self {
            state,
            gpu: None,
            egui_ctx: EguiContext::default(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<Gpu> {
        let attrs = Window::default_attributes()
            .with_title("Camouflage Shader")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no compatible GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("camoscene_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        self.state.camera.set_viewport(config.width, config.height);

        let mut renderer =
            WgpuRenderer::new(&device, &queue, surface_format, config.width, config.height)?;
        let ctx = self.state.scene.context();
        renderer.upload_geometry(&device, &ctx.geometries);
        renderer.upload_resources(&device, &queue, &ctx.resources)?;

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );
        Ok(Gpu {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn redraw(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
        self.state.last_frame = now;

        self.state.camera.update();
        self.state.scene.tick(dt)?;

        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("surface error: {e}");
                return Ok(());
            }
        };
        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let view = self.state.camera.view();
        let viewport = (gpu.config.width, gpu.config.height);
        {
            let mut frame = gpu.renderer.frame(&gpu.device, &gpu.queue);
            self.state.scene.capture(&mut frame, viewport, &view)?;
        }
        let render_scene = self.state.scene.context().render_scene();
        gpu.renderer.render(
            &gpu.device,
            &gpu.queue,
            &target,
            &render_scene,
            &view,
            self.state.camera.aspect,
        )?;

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            self.state.draw_ui(ctx);
        });
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(&gpu.device, &gpu.queue, *id, image_delta);
        }
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        gpu.egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
        gpu.window.request_redraw();
        Ok(())
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match self.init_gpu(event_loop) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => self.fail(event_loop, e.context("GPU initialization failed")),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.config.width = new_size.width.max(1);
                    gpu.config.height = new_size.height.max(1);
                    gpu.surface.configure(&gpu.device, &gpu.config);
                    gpu.renderer
                        .resize(&gpu.device, gpu.config.width, gpu.config.height);
                    self.state
                        .camera
                        .set_viewport(gpu.config.width, gpu.config.height);
                    tracing::debug!(
                        width = gpu.config.width,
                        height = gpu.config.height,
                        "viewport resized"
                    );
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                self.state.handle_key(key);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: btn_state,
                ..
            } => {
                self.state.dragging = btn_state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (true, Some(last)) = (self.state.dragging, self.state.last_cursor) {
                    self.state
                        .camera
                        .rotate((position.x - last.x) as f32, (position.y - last.y) as f32);
                }
                self.state.last_cursor = Some(position);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y * 100.0,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                self.state.camera.zoom(amount);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("camoscene-desktop starting");
    let state = AppState::new(&cli)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(state);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
