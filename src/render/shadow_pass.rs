use crate::error::{CreationError, ShadowPassError};
use crate::obj::VERTEX_STRIDE;
use crate::selection::Viewport;

use super::depth_target::DepthTarget;
use super::shaders;

/// Progress of the depth pass within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowPassState {
    #[default]
    Idle,
    Bound,
    Cleared,
    Rendered,
}

/// Enforces bind, clear, draw ordering for the depth pass.
#[derive(Debug, Clone, Default)]
pub struct ShadowPassTracker {
    state: ShadowPassState,
    viewport: Option<Viewport>,
}

impl ShadowPassTracker {
    pub fn state(&self) -> ShadowPassState {
        self.state
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Makes a depth target the sole render destination.
    pub fn bind(&mut self, viewport: Viewport) -> Result<(), ShadowPassError> {
        match self.state {
            // A rendered pass is superseded by the next bind.
            ShadowPassState::Idle | ShadowPassState::Rendered => {
                self.viewport = Some(viewport);
                self.transition(ShadowPassState::Bound)
            }
            from => Err(ShadowPassError::InvalidTransition {
                from,
                to: ShadowPassState::Bound,
            }),
        }
    }

    pub fn clear(&mut self) -> Result<(), ShadowPassError> {
        match self.state {
            ShadowPassState::Bound => self.transition(ShadowPassState::Cleared),
            ShadowPassState::Idle => Err(ShadowPassError::NotBound("clear")),
            from => Err(ShadowPassError::InvalidTransition {
                from,
                to: ShadowPassState::Cleared,
            }),
        }
    }

    pub fn draw(&mut self) -> Result<(), ShadowPassError> {
        match self.state {
            ShadowPassState::Cleared | ShadowPassState::Rendered => {
                self.transition(ShadowPassState::Rendered)
            }
            ShadowPassState::Idle => Err(ShadowPassError::NotBound("draw")),
            from => Err(ShadowPassError::InvalidTransition {
                from,
                to: ShadowPassState::Rendered,
            }),
        }
    }

    pub fn finish(&mut self) -> Result<(), ShadowPassError> {
        match self.state {
            ShadowPassState::Cleared | ShadowPassState::Rendered => {
                self.viewport = None;
                self.transition(ShadowPassState::Idle)
            }
            ShadowPassState::Idle => Err(ShadowPassError::NotBound("finish")),
            from => Err(ShadowPassError::InvalidTransition {
                from,
                to: ShadowPassState::Idle,
            }),
        }
    }

    fn transition(&mut self, to: ShadowPassState) -> Result<(), ShadowPassError> {
        self.state = to;
        Ok(())
    }
}

/// Geometry drawn into the depth target.
pub trait ShadowCaster {
    fn draw_depth(&self, pass: &mut wgpu::RenderPass<'_>);
}

/// Depth-only pass rendering casters from the light.
pub struct ShadowPass {
    pipeline: wgpu::RenderPipeline,
    tracker: ShadowPassTracker,
}

impl ShadowPass {
    pub fn new(
        device: &wgpu::Device,
        frame_layout: &wgpu::BindGroupLayout,
        object_layout: &wgpu::BindGroupLayout,
    ) -> Result<Self, CreationError> {
        let shader = shaders::create_module(device, "shadow-shader", &shaders::shadow_source())?;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow-pipeline-layout"),
            bind_group_layouts: &[frame_layout, object_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    }],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthTarget::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: None,
            multiview: None,
            cache: None,
        });
        Ok(Self {
            pipeline,
            tracker: ShadowPassTracker::default(),
        })
    }

    pub fn state(&self) -> ShadowPassState {
        self.tracker.state()
    }

    /// Records the depth pass for `target` into `encoder`.
    pub fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        frame: &wgpu::BindGroup,
        target: &DepthTarget,
        casters: &[&dyn ShadowCaster],
    ) -> Result<(), ShadowPassError> {
        let viewport = Viewport {
            width: target.width(),
            height: target.height(),
        };
        self.tracker.bind(viewport)?;
        self.tracker.clear()?;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shadow-pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.write_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_viewport(
            0.0,
            0.0,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, frame, &[]);
        for caster in casters {
            self.tracker.draw()?;
            caster.draw_depth(&mut pass);
        }
        drop(pass);

        self.tracker.finish()
    }
}
