use camoscene_render::Compositor;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Two color targets plus a shared depth buffer for offscreen captures.
pub struct OffscreenTargets {
    color: Vec<wgpu::TextureView>,
    depth: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl OffscreenTargets {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let color = (0..Compositor::SLOTS)
            .map(|slot| {
                create_view(
                    device,
                    &format!("offscreen_color_{slot}"),
                    format,
                    width,
                    height,
                    wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                )
            })
            .collect();
        let depth = depth_view(device, "offscreen_depth", width, height);
        Self {
            color,
            depth,
            format,
            width,
            height,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        *self = Self::new(device, self.format, width, height);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color(&self, slot: usize) -> Option<&wgpu::TextureView> {
        self.color.get(slot)
    }

    pub fn depth(&self) -> &wgpu::TextureView {
        &self.depth
    }
}

pub(crate) fn depth_view(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    create_view(
        device,
        label,
        DEPTH_FORMAT,
        width,
        height,
        wgpu::TextureUsages::RENDER_ATTACHMENT,
    )
}

fn create_view(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}
