use wgpu::util::DeviceExt;

use crate::error::CreationError;
use crate::floor::{FloorGeometry, FloorVertex};
use crate::selection::DepthMapConsumer;

use super::depth_target::{sampled_bind_groups, DepthTarget};
use super::texture::GpuTexture;
use super::{shaders, BindLayouts, DepthBuffer};

/// Textured floor quad that receives the object's shadow.
pub struct GpuFloor {
    pipeline: wgpu::RenderPipeline,
    vertices: wgpu::Buffer,
    texture_bind_group: wgpu::BindGroup,
    _texture: GpuTexture,
    shadow_bind_groups: Vec<wgpu::BindGroup>,
    bound: usize,
}

impl GpuFloor {
    pub(crate) fn new(
        device: &wgpu::Device,
        layouts: &BindLayouts,
        color_format: wgpu::TextureFormat,
        geometry: &FloorGeometry,
        texture: GpuTexture,
        targets: &[DepthTarget],
        active: usize,
    ) -> Result<Self, CreationError> {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("floor-vertices"),
            contents: bytemuck::cast_slice(&geometry.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("floor-texture-bind-group"),
            layout: &layouts.floor_texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        });
        let shadow_bind_groups =
            sampled_bind_groups(device, &layouts.depth_map, targets, "floor-shadow-bind-group");

        let shader = shaders::create_module(device, "floor-shader", &shaders::floor_source())?;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("floor-pipeline-layout"),
            bind_group_layouts: &[&layouts.frame, &layouts.floor_texture, &layouts.depth_map],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("floor-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<FloorVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            vertices,
            texture_bind_group,
            _texture: texture,
            shadow_bind_groups,
            bound: active,
        })
    }

    /// Index of the depth target currently sampled.
    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, frame: &wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, frame, &[]);
        pass.set_bind_group(1, &self.texture_bind_group, &[]);
        pass.set_bind_group(2, &self.shadow_bind_groups[self.bound], &[]);
        pass.set_vertex_buffer(0, self.vertices.slice(..));
        pass.draw(0..4, 0..1);
    }
}

impl DepthMapConsumer for GpuFloor {
    fn bind_depth_map(&mut self, index: usize) {
        if index < self.shadow_bind_groups.len() {
            self.bound = index;
        }
    }
}
