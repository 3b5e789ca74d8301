use std::fmt::Write as _;

use crate::error::CreationError;

/// Compiles WGSL and reports compiler diagnostics verbatim on failure.
pub(crate) fn create_module(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, CreationError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let info = pollster::block_on(module.get_compilation_info());
    let validation = pollster::block_on(device.pop_error_scope());

    let mut diagnostics = String::new();
    for message in info
        .messages
        .iter()
        .filter(|message| matches!(message.message_type, wgpu::CompilationMessageType::Error))
    {
        match &message.location {
            Some(location) => {
                let _ = writeln!(
                    diagnostics,
                    "{}:{}: {}",
                    location.line_number, location.line_position, message.message
                );
            }
            None => {
                let _ = writeln!(diagnostics, "{}", message.message);
            }
        }
    }
    if let Some(error) = validation {
        if diagnostics.is_empty() {
            diagnostics = error.to_string();
        }
    }

    if diagnostics.is_empty() {
        Ok(module)
    } else {
        Err(CreationError::Shader {
            label: label.to_string(),
            diagnostics,
        })
    }
}

/// Uniforms shared by every pass, bound at group 0.
const FRAME: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    eye_position: vec4<f32>,
    light_position: vec4<f32>,
    // x: depth bias, y: pcf enabled, z: mesh lighting enabled
    shadow: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> frame: Frame;
"#;

const OBJECT: &str = r#"
struct Object {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
}

@group(1) @binding(0)
var<uniform> object: Object;
"#;

/// Depth map lookup for receivers; `group` is where the depth map is bound.
fn shadow_lookup(group: u32) -> String {
    format!("@group({group}) @binding(0)\nvar shadow_map: texture_depth_2d;\n{LIGHT_FACTOR}")
}

pub(crate) fn mesh_source() -> String {
    format!("{FRAME}{OBJECT}{MESH}{}", shadow_lookup(3))
}

pub(crate) fn shadow_source() -> String {
    format!("{FRAME}{OBJECT}{SHADOW}")
}

pub(crate) fn floor_source() -> String {
    format!("{FRAME}{FLOOR}{}", shadow_lookup(2))
}

pub(crate) fn quad_source() -> &'static str {
    QUAD
}

const MESH: &str = r#"
struct Material {
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    // w holds the specular exponent
    specular: vec4<f32>,
}

@group(2) @binding(0)
var<uniform> material: Material;
@group(2) @binding(1)
var diffuse_map: texture_2d<f32>;
@group(2) @binding(2)
var diffuse_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = frame.view_proj * world_position;
    out.world_pos = world_position.xyz;
    out.normal = normalize(mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal);
    out.uv = input.uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(diffuse_map, diffuse_sampler, input.uv);
    if frame.shadow.z < 0.5 {
        return vec4<f32>(texel.rgb * material.diffuse.rgb, 1.0);
    }

    let normal = normalize(input.normal);
    let light_dir = normalize(frame.light_position.xyz - input.world_pos);
    let view_dir = normalize(frame.eye_position.xyz - input.world_pos);
    let half_dir = normalize(light_dir + view_dir);

    let diffuse = max(dot(normal, light_dir), 0.0);
    var specular = 0.0;
    if diffuse > 0.0 {
        specular = pow(max(dot(normal, half_dir), 0.0), max(material.specular.w, 1.0));
    }
    let lit = light_factor(input.world_pos);
    let color = material.ambient.rgb * texel.rgb
        + lit * (diffuse * material.diffuse.rgb * texel.rgb + specular * material.specular.rgb);
    return vec4<f32>(color, 1.0);
}
"#;

const SHADOW: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return frame.light_view_proj * object.model * vec4<f32>(position, 1.0);
}
"#;

const LIGHT_FACTOR: &str = r#"
fn tap(texel: vec2<i32>, size: vec2<i32>, depth: f32) -> f32 {
    let clamped = clamp(texel, vec2<i32>(0, 0), size - vec2<i32>(1, 1));
    let stored = textureLoad(shadow_map, clamped, 0);
    return select(1.0, 0.0, depth > stored + frame.shadow.x);
}

fn light_factor(world: vec3<f32>) -> f32 {
    let clip = frame.light_view_proj * vec4<f32>(world, 1.0);
    let ndc = clip.xyz / clip.w;
    let coords = vec3<f32>(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5, ndc.z);
    if any(coords < vec3<f32>(0.0)) || any(coords > vec3<f32>(1.0)) {
        return 1.0;
    }

    let size = vec2<i32>(textureDimensions(shadow_map));
    let base = vec2<i32>(floor(coords.xy * vec2<f32>(size)));
    if frame.shadow.y < 0.5 {
        return tap(base, size, coords.z);
    }

    var lit = 0.0;
    for (var dy = -1; dy <= 1; dy++) {
        for (var dx = -1; dx <= 1; dx++) {
            lit += tap(base + vec2<i32>(dx, dy), size, coords.z);
        }
    }
    return lit / 9.0;
}
"#;

const FLOOR: &str = r#"
@group(1) @binding(0)
var floor_map: texture_2d<f32>;
@group(1) @binding(1)
var floor_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = frame.view_proj * vec4<f32>(input.position, 1.0);
    out.world_pos = input.position;
    out.uv = input.uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(floor_map, floor_sampler, input.uv);
    let factor = light_factor(input.world_pos);
    let ambient = 0.3;
    return vec4<f32>(texel.rgb * (ambient + (1.0 - ambient) * factor), 1.0);
}
"#;

const QUAD: &str = r#"
@group(0) @binding(0)
var depth_map: texture_depth_2d;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 4>(
        vec2<f32>(0.5, 1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(0.5, 0.5),
        vec2<f32>(1.0, 0.5),
    );
    let corner = corners[index];
    var out: VertexOutput;
    out.position = vec4<f32>(corner, 0.0, 1.0);
    out.uv = vec2<f32>((corner.x - 0.5) * 2.0, (1.0 - corner.y) * 2.0);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let size = vec2<i32>(textureDimensions(depth_map));
    let texel = clamp(
        vec2<i32>(input.uv * vec2<f32>(size)),
        vec2<i32>(0, 0),
        size - vec2<i32>(1, 1)
    );
    let depth = textureLoad(depth_map, texel, 0);
    return vec4<f32>(depth, depth, depth, 1.0);
}
"#;
