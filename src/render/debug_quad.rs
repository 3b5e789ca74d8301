use crate::error::CreationError;
use crate::selection::DepthMapConsumer;

use super::depth_target::{sampled_bind_groups, DepthTarget};
use super::{shaders, BindLayouts, DepthBuffer};

/// Shows the raw active depth map in the top-right quarter of the screen.
pub struct DebugQuad {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<wgpu::BindGroup>,
    bound: usize,
}

impl DebugQuad {
    pub(crate) fn new(
        device: &wgpu::Device,
        layouts: &BindLayouts,
        color_format: wgpu::TextureFormat,
        targets: &[DepthTarget],
        active: usize,
    ) -> Result<Self, CreationError> {
        let bind_groups =
            sampled_bind_groups(device, &layouts.depth_map, targets, "debug-quad-bind-group");
        let shader = shaders::create_module(device, "debug-quad-shader", shaders::quad_source())?;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("debug-quad-pipeline-layout"),
            bind_group_layouts: &[&layouts.depth_map],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("debug-quad-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                cull_mode: None,
                ..Default::default()
            },
            // Overlay: always passes and leaves the scene depth untouched.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
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
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });
        Ok(Self {
            pipeline,
            bind_groups,
            bound: active,
        })
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[self.bound], &[]);
        pass.draw(0..4, 0..1);
    }
}

impl DepthMapConsumer for DebugQuad {
    fn bind_depth_map(&mut self, index: usize) {
        if index < self.bind_groups.len() {
            self.bound = index;
        }
    }
}
