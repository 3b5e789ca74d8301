//! wgpu renderer: depth pass from the light, then the shaded main pass.

mod debug_quad;
mod depth_target;
mod floor;
mod mesh;
mod shaders;
mod shadow_pass;
mod texture;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use log::info;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::error::FrameError;
use crate::obj::ObjModel;
use crate::scene::Scene;
use crate::selection::DepthMapConsumer;

pub use debug_quad::DebugQuad;
pub use depth_target::DepthTarget;
pub use floor::GpuFloor;
pub use mesh::GpuModel;
pub use shadow_pass::{ShadowCaster, ShadowPass, ShadowPassState, ShadowPassTracker};
pub use texture::{stone_pattern, GpuTexture};

/// Owns the device, the depth targets and everything drawn each frame.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    mesh_pipeline: wgpu::RenderPipeline,
    depth_targets: Vec<DepthTarget>,
    shadow_pass: ShadowPass,
    model: GpuModel,
    floor: GpuFloor,
    debug_quad: DebugQuad,
}

impl Renderer {
    /// Brings up the device and creates one depth target per configured
    /// resolution. Any rejected resource fails construction.
    pub async fn new(
        window: Arc<Window>,
        scene: &Scene,
        model: &ObjModel,
        scene_config: &SceneConfig,
    ) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        info!("using adapter {}", adapter.get_info().name);

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("umbra-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no supported formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);
        let layouts = BindLayouts::new(&device);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame-uniform"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame-bind-group"),
            layout: &layouts.frame,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let selection = scene.selection();
        let depth_targets = depth_target::create_all(&device, selection.resolutions())?;
        let shadow_pass = ShadowPass::new(&device, &layouts.frame, &layouts.object)?;
        let mesh_pipeline = mesh::create_mesh_pipeline(&device, &layouts, surface_format)?;

        let mesh_dir = scene_config
            .object
            .mesh
            .as_ref()
            .map(|mesh| scene_config.resolve(mesh))
            .and_then(|mesh| mesh.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| scene_config.base_dir.clone());
        let model = GpuModel::new(
            &device,
            &queue,
            &layouts,
            model,
            &mesh_dir,
            &depth_targets,
            selection.active(),
        )?;

        let floor_texture_path = scene_config
            .floor
            .texture
            .as_ref()
            .map(|texture| scene_config.resolve(texture));
        let floor_texture =
            GpuTexture::load_or(&device, &queue, floor_texture_path.as_deref(), || {
                GpuTexture::stone(&device, &queue)
            })?;
        let floor = GpuFloor::new(
            &device,
            &layouts,
            surface_format,
            scene.floor(),
            floor_texture,
            &depth_targets,
            selection.active(),
        )?;
        let debug_quad = DebugQuad::new(
            &device,
            &layouts,
            surface_format,
            &depth_targets,
            selection.active(),
        )?;

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            frame_buffer,
            frame_bind_group,
            mesh_pipeline,
            depth_targets,
            shadow_pass,
            model,
            floor,
            debug_quad,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn depth_targets(&self) -> &[DepthTarget] {
        &self.depth_targets
    }

    /// Resizes the swap chain; the camera projection is left untouched.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Applies any pending depth target switch, renders the depth map from
    /// the light and then the scene from the camera.
    pub fn render(&mut self, scene: &mut Scene, camera: &Camera) -> Result<(), FrameError> {
        {
            let mut consumers: [&mut dyn DepthMapConsumer; 3] =
                [&mut self.model, &mut self.floor, &mut self.debug_quad];
            scene.selection_mut().begin_frame(&mut consumers);
        }

        let uniform = FrameUniform::new(scene, camera);
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytes_of(&uniform));
        self.model
            .update(&self.queue, scene.object().world_matrix());

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        let target = &self.depth_targets[scene.selection().active()];
        self.shadow_pass
            .encode(&mut encoder, &self.frame_bind_group, target, &[&self.model])?;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("main-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.0,
                        g: 0.125,
                        b: 0.3,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.mesh_pipeline);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        self.model.draw(&mut pass);
        self.floor.draw(&mut pass, &self.frame_bind_group);
        self.debug_quad.draw(&mut pass);

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Bind group layouts shared across pipelines.
pub(crate) struct BindLayouts {
    pub frame: wgpu::BindGroupLayout,
    pub object: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
    pub floor_texture: wgpu::BindGroupLayout,
    pub depth_map: wgpu::BindGroupLayout,
}

impl BindLayouts {
    fn new(device: &wgpu::Device) -> Self {
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame-bind-layout"),
            entries: &[uniform_entry::<FrameUniform>(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[uniform_entry::<mesh::ObjectUniform>(
                0,
                wgpu::ShaderStages::VERTEX,
            )],
        });
        let [texture, sampler] = texture::texture_entries(1);
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material-bind-layout"),
            entries: &[
                uniform_entry::<mesh::MaterialUniform>(0, wgpu::ShaderStages::FRAGMENT),
                texture,
                sampler,
            ],
        });
        let floor_texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("floor-texture-bind-layout"),
            entries: &texture::texture_entries(0),
        });
        let depth_map = depth_target::sampled_layout(device, "depth-map-bind-layout");
        Self {
            frame,
            object,
            material,
            floor_texture,
            depth_map,
        }
    }
}

fn uniform_entry<T>(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<T>() as u64),
        },
        count: None,
    }
}

/// Camera depth buffer for the main pass.
struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("main-depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FrameUniform {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    eye_position: [f32; 4],
    light_position: [f32; 4],
    shadow: [f32; 4],
}

impl FrameUniform {
    fn new(scene: &Scene, camera: &Camera) -> Self {
        let flag = |enabled: bool| if enabled { 1.0 } else { 0.0 };
        let sampler = scene.sampler();
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            light_view_proj: scene.light().view_proj().to_cols_array_2d(),
            eye_position: camera.position().extend(1.0).into(),
            light_position: scene.light().position().extend(1.0).into(),
            shadow: [
                sampler.bias,
                flag(sampler.mode.is_pcf()),
                flag(scene.draw_light()),
                0.0,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn frame_uniform_carries_shadow_settings() {
        let config = SceneConfig::default();
        let mut scene = Scene::new(&config).unwrap();
        scene.set_pcf(true);
        let camera = Camera::new(
            config.camera.position,
            config.camera.direction,
            Vec3::Y,
            config.frustum(16.0 / 9.0),
        );
        let uniform = FrameUniform::new(&scene, &camera);
        assert_eq!(uniform.shadow, [0.001, 1.0, 1.0, 0.0]);
        assert_eq!(uniform.light_position, [-300.0, 50.0, -300.0, 1.0]);
        assert_eq!(
            uniform.light_view_proj,
            scene.light().view_proj().to_cols_array_2d()
        );
    }

    #[test]
    fn frame_uniform_is_std140_sized() {
        assert_eq!(std::mem::size_of::<FrameUniform>(), 2 * 64 + 3 * 16);
    }
}
