use crate::mesh::{Vertex, tessellate};
use crate::offscreen::{DEPTH_FORMAT, OffscreenTargets, depth_view};
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use camoscene_assets::{AssetError, ImageData, ResourceCache};
use camoscene_render::{
    CamouflageParams, CaptureRequest, Compositor, GeometryHandle, GeometryRegistry, MaterialRef,
    OffscreenRenderer, RenderError, RenderScene, RenderView,
};
use std::collections::BTreeMap;
use std::num::NonZeroU64;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    inv_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    ambient: [f32; 4],
    sun_color: [f32; 4],
    sun_dir: [f32; 4],
}

impl FrameUniforms {
    fn new(scene: &RenderScene, view: &RenderView, aspect: f32) -> Self {
        let v = view.view_matrix();
        let p = view.projection_matrix(aspect);
        let light = &scene.lighting;
        Self {
            view: v.to_cols_array_2d(),
            proj: p.to_cols_array_2d(),
            inv_view_proj: (p * v).inverse().to_cols_array_2d(),
            camera_pos: view.eye.extend(1.0).to_array(),
            ambient: (light.ambient_color * light.ambient_intensity)
                .extend(1.0)
                .to_array(),
            sun_color: (light.sun_color * light.sun_intensity).extend(1.0).to_array(),
            sun_dir: light.sun_direction().extend(0.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct DrawUniforms {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    tint: [f32; 4],
    uv_repeat: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CamouflageUniforms {
    base_color: [f32; 4],
    direction: [f32; 2],
    screen_size: [f32; 2],
    time: f32,
    strength: f32,
    edge_falloff: f32,
    distortion: f32,
    scale: f32,
    speed: f32,
    ior: f32,
    _pad: f32,
}

impl From<&CamouflageParams> for CamouflageUniforms {
    fn from(p: &CamouflageParams) -> Self {
        Self {
            base_color: p.base_color.extend(1.0).to_array(),
            direction: p.direction.to_array(),
            screen_size: p.screen_size.to_array(),
            time: p.time,
            strength: p.strength,
            edge_falloff: p.edge_falloff,
            distortion: p.distortion,
            scale: p.scale,
            speed: p.speed,
            ior: p.ior,
            _pad: 0.0,
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// What the camouflage overlay samples during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScreenSource {
    Slot(usize),
    Blank,
}

/// wgpu renderer for the camouflage scene.
///
/// Geometry and textures are uploaded once up front; each frame writes
/// uniforms and encodes the environment, standard and camouflage draws in
/// render order.
pub struct WgpuRenderer {
    surface_format: wgpu::TextureFormat,
    standard_pipeline: wgpu::RenderPipeline,
    overlay_pipeline: wgpu::RenderPipeline,
    camouflage_pipeline: wgpu::RenderPipeline,
    sky_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    draw_buffer: wgpu::Buffer,
    draw_stride: u64,
    max_draws: usize,
    globals: wgpu::BindGroup,
    camouflage_buffer: wgpu::Buffer,
    camouflage_layout: wgpu::BindGroupLayout,
    /// One group per offscreen slot, then one for the blank texture.
    camouflage_groups: Vec<wgpu::BindGroup>,
    material_layout: wgpu::BindGroupLayout,
    environment_layout: wgpu::BindGroupLayout,
    repeat_sampler: wgpu::Sampler,
    clamp_sampler: wgpu::Sampler,
    blank_screen: wgpu::TextureView,
    meshes: BTreeMap<GeometryHandle, GpuMesh>,
    texture_sets: BTreeMap<String, wgpu::BindGroup>,
    environments: BTreeMap<String, wgpu::BindGroup>,
    offscreen: OffscreenTargets,
    depth_texture: wgpu::TextureView,
}

impl WgpuRenderer {
    /// Build every pipeline. Shader or pipeline validation failures are
    /// reported as [`RenderError::Shader`].
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let draw_size = std::mem::size_of::<DrawUniforms>() as u64;
        let draw_stride = draw_size.div_ceil(alignment) * alignment;
        let max_draws = 256usize;
        let draw_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw_uniforms"),
            size: draw_stride * max_draws as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals_layout"),
            entries: &[
                uniform_entry(0, false, None),
                uniform_entry(1, true, NonZeroU64::new(draw_size)),
            ],
        });
        let globals = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals"),
            layout: &globals_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &draw_buffer,
                        offset: 0,
                        size: NonZeroU64::new(draw_size),
                    }),
                },
            ],
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                sampler_entry(3),
            ],
        });
        let camouflage_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("camouflage_layout"),
                entries: &[uniform_entry(0, false, None), texture_entry(1), sampler_entry(2)],
            });
        let environment_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("environment_layout"),
                entries: &[texture_entry(0), sampler_entry(1)],
            });

        let standard_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("standard_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::STANDARD_SHADER.into()),
        });
        let camouflage_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("camouflage_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::CAMOUFLAGE_SHADER.into()),
        });
        let sky_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sky_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SKY_SHADER.into()),
        });

        let standard_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("standard_pipeline_layout"),
            bind_group_layouts: &[&globals_layout, &material_layout],
            push_constant_ranges: &[],
        });
        let camouflage_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("camouflage_pipeline_layout"),
                bind_group_layouts: &[&globals_layout, &camouflage_layout],
                push_constant_ranges: &[],
            });
        let sky_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sky_pipeline_layout"),
            bind_group_layouts: &[&globals_layout, &environment_layout],
            push_constant_ranges: &[],
        });

        let standard_pipeline = mesh_pipeline(
            device,
            "standard_pipeline",
            &standard_layout,
            &standard_shader,
            surface_format,
            true,
            wgpu::CompareFunction::LessEqual,
        );
        // Transparent standard pass with depth testing off.
        let overlay_pipeline = mesh_pipeline(
            device,
            "standard_overlay_pipeline",
            &standard_layout,
            &standard_shader,
            surface_format,
            true,
            wgpu::CompareFunction::Always,
        );
        let camouflage_pipeline = mesh_pipeline(
            device,
            "camouflage_pipeline",
            &camouflage_pipeline_layout,
            &camouflage_shader,
            surface_format,
            false,
            wgpu::CompareFunction::LessEqual,
        );
        let sky_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sky_pipeline"),
            layout: Some(&sky_layout),
            vertex: wgpu::VertexState {
                module: &sky_shader,
                entry_point: Some("vs_sky"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &sky_shader,
                entry_point: Some("fs_sky"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::Shader {
                label: "camoscene pipelines".into(),
                message: error.to_string(),
            });
        }

        let camouflage_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camouflage_uniforms"),
            contents: bytemuck::bytes_of(&CamouflageUniforms::from(&CamouflageParams::default())),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let repeat_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("repeat_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let clamp_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("clamp_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let blank_screen = upload_image(
            device,
            queue,
            "blank_screen",
            &ImageData::solid([0, 0, 0, 0]),
            wgpu::TextureFormat::Rgba8Unorm,
        );

        let offscreen = OffscreenTargets::new(device, surface_format, width, height);
        let depth_texture = depth_view(device, "depth_texture", width, height);

        let mut renderer = Self {
            surface_format,
            standard_pipeline,
            overlay_pipeline,
            camouflage_pipeline,
            sky_pipeline,
            frame_buffer,
            draw_buffer,
            draw_stride,
            max_draws,
            globals,
            camouflage_buffer,
            camouflage_layout,
            camouflage_groups: Vec::new(),
            material_layout,
            environment_layout,
            repeat_sampler,
            clamp_sampler,
            blank_screen,
            meshes: BTreeMap::new(),
            texture_sets: BTreeMap::new(),
            environments: BTreeMap::new(),
            offscreen,
            depth_texture,
        };
        renderer.rebuild_camouflage_groups(device);
        tracing::info!(?surface_format, width, height, "wgpu renderer ready");
        Ok(renderer)
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn offscreen(&self) -> &OffscreenTargets {
        &self.offscreen
    }

    /// Resize the main depth buffer. Offscreen targets follow the compositor.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = depth_view(device, "depth_texture", width, height);
    }

    /// Upload every geometry not yet on the GPU.
    pub fn upload_geometry(&mut self, device: &wgpu::Device, registry: &GeometryRegistry) {
        for (handle, geometry) in registry.iter() {
            if self.meshes.contains_key(&handle) {
                continue;
            }
            let data = tessellate(geometry);
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_vertices"),
                contents: bytemuck::cast_slice(&data.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_indices"),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            tracing::debug!(?handle, triangles = data.indices.len() / 3, "mesh uploaded");
            self.meshes.insert(
                handle,
                GpuMesh {
                    vertex_buffer,
                    index_buffer,
                    index_count: data.indices.len() as u32,
                },
            );
        }
    }

    /// Upload every texture set and environment in the cache.
    pub fn upload_resources(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &ResourceCache,
    ) -> Result<(), RenderError> {
        for name in resources.texture_set_names() {
            let set = resources.texture_set(name)?;
            let albedo = upload_image(
                device,
                queue,
                "albedo",
                &set.albedo,
                wgpu::TextureFormat::Rgba8UnormSrgb,
            );
            let normal = upload_image(device, queue, "normal", &set.normal, wgpu::TextureFormat::Rgba8Unorm);
            let roughness = upload_image(
                device,
                queue,
                "roughness",
                &set.roughness,
                wgpu::TextureFormat::Rgba8Unorm,
            );
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("texture_set"),
                layout: &self.material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&albedo),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&normal),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&roughness),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(&self.repeat_sampler),
                    },
                ],
            });
            self.texture_sets.insert(name.to_string(), group);
        }

        for name in resources.environment_names() {
            let image = resources.environment(name)?;
            let view = upload_image(
                device,
                queue,
                "environment",
                image,
                wgpu::TextureFormat::Rgba8UnormSrgb,
            );
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("environment"),
                layout: &self.environment_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.repeat_sampler),
                    },
                ],
            });
            self.environments.insert(name.to_string(), group);
        }
        tracing::info!(
            texture_sets = self.texture_sets.len(),
            environments = self.environments.len(),
            "gpu resources uploaded"
        );
        Ok(())
    }

    /// Borrow the renderer with a device and queue as an offscreen backend
    /// for [`Compositor::capture`].
    pub fn frame<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
    ) -> GpuFrame<'a> {
        GpuFrame {
            renderer: self,
            device,
            queue,
        }
    }

    /// Main pass into `target`. The overlay samples the latest capture in
    /// `scene.camouflage`.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        scene: &RenderScene,
        view: &RenderView,
        aspect: f32,
    ) -> Result<(), RenderError> {
        let draws = self.write_frame(queue, scene, view, aspect)?;
        let screen = match scene.camouflage.screen_texture {
            Some(tex) if (tex.width, tex.height) == self.offscreen.size() => {
                ScreenSource::Slot(tex.slot)
            }
            _ => ScreenSource::Blank,
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("main_encoder"),
        });
        self.encode_scene(
            &mut encoder,
            "main_pass",
            target,
            &self.depth_texture,
            scene,
            draws,
            screen,
        );
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn rebuild_camouflage_groups(&mut self, device: &wgpu::Device) {
        let mut views: Vec<&wgpu::TextureView> = (0..Compositor::SLOTS)
            .filter_map(|slot| self.offscreen.color(slot))
            .collect();
        views.push(&self.blank_screen);

        self.camouflage_groups = views
            .into_iter()
            .map(|view| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("camouflage_group"),
                    layout: &self.camouflage_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: self.camouflage_buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&self.clamp_sampler),
                        },
                    ],
                })
            })
            .collect();
    }

    fn camouflage_group(&self, screen: ScreenSource) -> Option<&wgpu::BindGroup> {
        match screen {
            ScreenSource::Slot(slot) if slot < Compositor::SLOTS => self.camouflage_groups.get(slot),
            _ => self.camouflage_groups.last(),
        }
    }

    /// Write all uniforms for `scene`. Returns how many items will draw.
    fn write_frame(
        &self,
        queue: &wgpu::Queue,
        scene: &RenderScene,
        view: &RenderView,
        aspect: f32,
    ) -> Result<usize, RenderError> {
        let ordered = scene.ordered();
        for item in &ordered {
            if !self.meshes.contains_key(&item.mesh.geometry) {
                return Err(RenderError::UnknownGeometry(item.mesh.geometry.index()));
            }
            if let MaterialRef::Standard(m) = &item.mesh.material {
                if !self.texture_sets.contains_key(&m.texture_set) {
                    return Err(AssetError::TextureSetNotFound(m.texture_set.clone()).into());
                }
            }
        }
        if ordered.len() > self.max_draws {
            tracing::warn!(
                items = ordered.len(),
                max = self.max_draws,
                "draw list truncated"
            );
        }
        let count = ordered.len().min(self.max_draws);

        queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::bytes_of(&FrameUniforms::new(scene, view, aspect)),
        );
        queue.write_buffer(
            &self.camouflage_buffer,
            0,
            bytemuck::bytes_of(&CamouflageUniforms::from(&scene.camouflage)),
        );

        let stride = self.draw_stride as usize;
        let mut bytes = vec![0u8; stride * count];
        for (i, item) in ordered.iter().take(count).enumerate() {
            let (tint, uv_repeat) = match &item.mesh.material {
                MaterialRef::Standard(m) => (m.base_color.extend(m.opacity), m.uv_repeat),
                MaterialRef::Camouflage => (glam::Vec4::ONE, glam::Vec2::ONE),
            };
            let uniforms = DrawUniforms {
                model: item.model.to_cols_array_2d(),
                normal_matrix: item.model.inverse().transpose().to_cols_array_2d(),
                tint: tint.to_array(),
                uv_repeat: [uv_repeat.x, uv_repeat.y, 0.0, 0.0],
            };
            let src = bytemuck::bytes_of(&uniforms);
            bytes[i * stride..i * stride + src.len()].copy_from_slice(src);
        }
        if !bytes.is_empty() {
            queue.write_buffer(&self.draw_buffer, 0, &bytes);
        }
        Ok(count)
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        scene: &RenderScene,
        draws: usize,
        screen: ScreenSource,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        if let Some(env) = scene
            .environment
            .as_ref()
            .and_then(|name| self.environments.get(name))
        {
            pass.set_pipeline(&self.sky_pipeline);
            pass.set_bind_group(0, &self.globals, &[0]);
            pass.set_bind_group(1, env, &[]);
            pass.draw(0..3, 0..1);
        }

        for (i, item) in scene.ordered().into_iter().take(draws).enumerate() {
            let Some(mesh) = self.meshes.get(&item.mesh.geometry) else {
                continue;
            };
            let offset = (i as u64 * self.draw_stride) as u32;
            match &item.mesh.material {
                MaterialRef::Standard(m) => {
                    let Some(textures) = self.texture_sets.get(&m.texture_set) else {
                        continue;
                    };
                    let pipeline = if m.depth_test {
                        &self.standard_pipeline
                    } else {
                        &self.overlay_pipeline
                    };
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &self.globals, &[offset]);
                    pass.set_bind_group(1, textures, &[]);
                }
                MaterialRef::Camouflage => {
                    let Some(group) = self.camouflage_group(screen) else {
                        continue;
                    };
                    pass.set_pipeline(&self.camouflage_pipeline);
                    pass.set_bind_group(0, &self.globals, &[offset]);
                    pass.set_bind_group(1, group, &[]);
                }
            }
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

/// A [`WgpuRenderer`] paired with the device and queue for one frame.
pub struct GpuFrame<'a> {
    renderer: &'a mut WgpuRenderer,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
}

impl OffscreenRenderer for GpuFrame<'_> {
    fn resize_targets(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.renderer.offscreen.resize(self.device, width, height);
        self.renderer.rebuild_camouflage_groups(self.device);
        Ok(())
    }

    fn render_offscreen(
        &mut self,
        request: &CaptureRequest,
        scene: &RenderScene,
        view: &RenderView,
    ) -> Result<(), RenderError> {
        let screen = match request.previous {
            Some(prev) if prev.slot == request.target_slot => {
                return Err(RenderError::Capture(format!(
                    "capture would sample its own target (slot {})",
                    prev.slot
                )));
            }
            Some(prev) => ScreenSource::Slot(prev.slot),
            None => ScreenSource::Blank,
        };

        let renderer = &*self.renderer;
        let aspect = request.width as f32 / request.height.max(1) as f32;
        let draws = renderer.write_frame(self.queue, scene, view, aspect)?;
        let color = renderer
            .offscreen
            .color(request.target_slot)
            .ok_or_else(|| RenderError::Capture(format!("no target slot {}", request.target_slot)))?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen_encoder"),
            });
        renderer.encode_scene(
            &mut encoder,
            "offscreen_pass",
            color,
            renderer.offscreen.depth(),
            scene,
            draws,
            screen,
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

fn mesh_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x3,
                    1 => Float32x3,
                    2 => Float32x2,
                ],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn uniform_entry(
    binding: u32,
    dynamic: bool,
    min_size: Option<NonZeroU64>,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: min_size,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn upload_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: &ImageData,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &image.pixels,
    );
    texture.create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camoscene_render::Lighting;
    use glam::Vec3;

    #[test]
    fn uniform_layouts_match_wgsl() {
        // WGSL struct sizes: Frame 3 mat4 + 4 vec4, Draw 2 mat4 + 2 vec4,
        // Camouflage 4 vec4.
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 3 * 64 + 4 * 16);
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 2 * 64 + 2 * 16);
        assert_eq!(std::mem::size_of::<CamouflageUniforms>(), 64);
    }

    #[test]
    fn camouflage_uniforms_copy_params() {
        let params = CamouflageParams {
            time: 3.0,
            ior: -0.2,
            ..CamouflageParams::default()
        };
        let u = CamouflageUniforms::from(&params);
        assert_eq!(u.time, 3.0);
        assert_eq!(u.ior, -0.2);
        assert_eq!(u.strength, 0.6);
        assert_eq!(u.direction, [1.0, 0.0]);
    }

    #[test]
    fn frame_uniforms_scale_lights() {
        let scene = RenderScene {
            lighting: Lighting {
                ambient_intensity: 0.5,
                ..Lighting::default()
            },
            ..RenderScene::default()
        };
        let u = FrameUniforms::new(&scene, &RenderView::default(), 1.5);
        assert_eq!(u.ambient[..3], [0.5, 0.5, 0.5]);
        assert_eq!(u.camera_pos[..3], Vec3::new(0.0, 1.0, 5.0).to_array());
    }
}
