use log::info;

use crate::error::CreationError;

/// Depth-only texture written by the shadow pass and sampled afterwards.
///
/// The resolution is fixed at creation; switching resolution means switching
/// to another target.
pub struct DepthTarget {
    _texture: wgpu::Texture,
    write_view: wgpu::TextureView,
    sampled_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl DepthTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    pub fn create(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, CreationError> {
        if width == 0 || height == 0 {
            return Err(CreationError::DepthTarget {
                width,
                height,
                message: "zero-sized depth target".to_string(),
            });
        }
        let label = format!("depth-target-{width}x{height}");

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let write_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{label}-write")),
            aspect: wgpu::TextureAspect::DepthOnly,
            ..Default::default()
        });
        let sampled_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{label}-sampled")),
            aspect: wgpu::TextureAspect::DepthOnly,
            ..Default::default()
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(CreationError::DepthTarget {
                width,
                height,
                message: error.to_string(),
            });
        }

        info!("created depth target {width}x{height}");
        Ok(Self {
            _texture: texture,
            write_view,
            sampled_view,
            width,
            height,
        })
    }

    pub fn write_view(&self) -> &wgpu::TextureView {
        &self.write_view
    }

    pub fn sampled_view(&self) -> &wgpu::TextureView {
        &self.sampled_view
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Creates one target per resolution, failing on the first rejected one.
pub fn create_all(
    device: &wgpu::Device,
    resolutions: &[u32],
) -> Result<Vec<DepthTarget>, CreationError> {
    resolutions
        .iter()
        .map(|&size| DepthTarget::create(device, size, size))
        .collect()
}

/// Bind group layout for sampling a depth target without a sampler.
pub(crate) fn sampled_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }],
    })
}

/// One bind group per target, indexed like the targets themselves.
pub(crate) fn sampled_bind_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &[DepthTarget],
    label: &str,
) -> Vec<wgpu::BindGroup> {
    targets
        .iter()
        .map(|target| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(target.sampled_view()),
                }],
            })
        })
        .collect()
}
