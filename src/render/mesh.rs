use std::path::Path;

use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Mat4};
use log::debug;
use wgpu::util::DeviceExt;

use crate::error::CreationError;
use crate::material::Material;
use crate::obj::{ObjModel, VERTEX_STRIDE};
use crate::selection::DepthMapConsumer;

use super::depth_target::{sampled_bind_groups, DepthTarget};
use super::shadow_pass::ShadowCaster;
use super::texture::GpuTexture;
use super::{shaders, BindLayouts, DepthBuffer};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct ObjectUniform {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
}

impl ObjectUniform {
    fn new(world: Mat4) -> Self {
        let normal = Mat3::from_mat4(world).inverse().transpose();
        Self {
            model: world.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct MaterialUniform {
    ambient: [f32; 4],
    diffuse: [f32; 4],
    specular: [f32; 4],
}

impl From<&Material> for MaterialUniform {
    fn from(material: &Material) -> Self {
        Self {
            ambient: material.ambient.extend(1.0).into(),
            diffuse: material.diffuse.extend(1.0).into(),
            specular: material.specular.extend(material.specular_exponent).into(),
        }
    }
}

struct GpuGroup {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    material: wgpu::BindGroup,
    _material_buffer: wgpu::Buffer,
    _texture: GpuTexture,
}

/// Buffers and bind groups for every material group of the moving object.
///
/// The object casts into the active depth map and also receives from it.
pub struct GpuModel {
    groups: Vec<GpuGroup>,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    shadow_bind_groups: Vec<wgpu::BindGroup>,
    bound: usize,
}

impl GpuModel {
    /// Uploads `model`; material textures resolve against `texture_dir`.
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &BindLayouts,
        model: &ObjModel,
        texture_dir: &Path,
        targets: &[DepthTarget],
        active: usize,
    ) -> Result<Self, CreationError> {
        let mut groups = Vec::with_capacity(model.groups.len());
        for group in &model.groups {
            if group.indices.is_empty() {
                continue;
            }
            let material = model.material_for(group);
            let texture_path = material.texture.as_ref().map(|file| texture_dir.join(file));
            let texture = GpuTexture::load_or(device, queue, texture_path.as_deref(), || {
                GpuTexture::white(device, queue)
            })?;

            let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-material", group.name)),
                contents: bytes_of(&MaterialUniform::from(&material)),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{}-material-bind-group", group.name)),
                layout: &layouts.material,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: material_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&texture.sampler),
                    },
                ],
            });

            let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-vertices", group.name)),
                contents: bytemuck::cast_slice(&group.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-indices", group.name)),
                contents: bytemuck::cast_slice(&group.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            debug!(
                "uploaded group {} ({} triangles)",
                group.name,
                group.triangle_count()
            );
            groups.push(GpuGroup {
                vertex,
                index,
                index_count: group.indices.len() as u32,
                material: material_bind_group,
                _material_buffer: material_buffer,
                _texture: texture,
            });
        }

        let object_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("object-uniform"),
            contents: bytes_of(&ObjectUniform::new(Mat4::IDENTITY)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let object_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object-bind-group"),
            layout: &layouts.object,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: object_buffer.as_entire_binding(),
            }],
        });

        let shadow_bind_groups =
            sampled_bind_groups(device, &layouts.depth_map, targets, "mesh-shadow-bind-group");

        Ok(Self {
            groups,
            object_buffer,
            object_bind_group,
            shadow_bind_groups,
            bound: active,
        })
    }

    /// Index of the depth target currently sampled.
    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn update(&self, queue: &wgpu::Queue, world: Mat4) {
        queue.write_buffer(&self.object_buffer, 0, bytes_of(&ObjectUniform::new(world)));
    }

    /// Shaded draw; expects the mesh pipeline and frame bind group to be set.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(1, &self.object_bind_group, &[]);
        pass.set_bind_group(3, &self.shadow_bind_groups[self.bound], &[]);
        for group in &self.groups {
            pass.set_bind_group(2, &group.material, &[]);
            pass.set_vertex_buffer(0, group.vertex.slice(..));
            pass.set_index_buffer(group.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..group.index_count, 0, 0..1);
        }
    }
}

impl ShadowCaster for GpuModel {
    fn draw_depth(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(1, &self.object_bind_group, &[]);
        for group in &self.groups {
            pass.set_vertex_buffer(0, group.vertex.slice(..));
            pass.set_index_buffer(group.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..group.index_count, 0, 0..1);
        }
    }
}

impl DepthMapConsumer for GpuModel {
    fn bind_depth_map(&mut self, index: usize) {
        if index < self.shadow_bind_groups.len() {
            self.bound = index;
        }
    }
}

pub(crate) fn create_mesh_pipeline(
    device: &wgpu::Device,
    layouts: &BindLayouts,
    color_format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, CreationError> {
    let shader = shaders::create_module(device, "mesh-shader", &shaders::mesh_source())?;
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("mesh-pipeline-layout"),
        bind_group_layouts: &[
            &layouts.frame,
            &layouts.object,
            &layouts.material,
            &layouts.depth_map,
        ],
        push_constant_ranges: &[],
    });
    let float = std::mem::size_of::<f32>() as u64;
    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("mesh-pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: VERTEX_STRIDE as u64 * float,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    },
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 3 * float,
                        shader_location: 1,
                    },
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 6 * float,
                        shader_location: 2,
                    },
                ],
            }],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
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
    }))
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn normal_matrix_ignores_translation() {
        let world = Mat4::from_translation(Vec3::new(5.0, 6.0, 7.0));
        let uniform = ObjectUniform::new(world);
        assert_eq!(uniform.model[3], [5.0, 6.0, 7.0, 1.0]);
        assert_eq!(uniform.normal[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(uniform.normal[2], [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn specular_exponent_rides_in_w() {
        let material = Material {
            specular_exponent: 32.0,
            ..Material::default()
        };
        let uniform = MaterialUniform::from(&material);
        assert_eq!(uniform.specular, [1.0, 1.0, 1.0, 32.0]);
        assert_eq!(uniform.ambient, [0.2, 0.2, 0.2, 1.0]);
    }
}
