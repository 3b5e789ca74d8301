use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3};

use crate::material::{load_mtl_from_str, parse_vec3, Material};

/// Floats per vertex: `position.xyz`, `normal.xyz`, `uv`.
pub const VERTEX_STRIDE: usize = 8;

/// Group name used for faces that appear before any `g` statement.
pub const DEFAULT_GROUP: &str = "default";

/// Interleaved vertices sharing one material.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshGroup {
    pub name: String,
    pub material: Option<String>,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshGroup {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, index: u32) -> Vec3 {
        let start = index as usize * VERTEX_STRIDE;
        Vec3::from_slice(&self.vertices[start..start + 3])
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|tri| [self.position(tri[0]), self.position(tri[1]), self.position(tri[2])])
    }
}

/// A mesh split into material groups, plus the materials it references.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjModel {
    pub groups: Vec<MeshGroup>,
    pub materials: HashMap<String, Material>,
}

impl ObjModel {
    /// Material bound to `group`, or the default material.
    pub fn material_for(&self, group: &MeshGroup) -> Material {
        group
            .material
            .as_ref()
            .and_then(|name| self.materials.get(name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn triangle_count(&self) -> usize {
        self.groups.iter().map(MeshGroup::triangle_count).sum()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.groups.iter().flat_map(MeshGroup::triangles)
    }

    /// Axis-aligned textured cube centred on the origin.
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        ];
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut group = MeshGroup {
            name: "cube".to_string(),
            material: Some("default".to_string()),
            ..MeshGroup::default()
        };
        for (normal, u_axis, v_axis) in faces {
            let base = group.vertex_count() as u32;
            for (u, v) in corners {
                let position = (normal + u_axis * u + v_axis * v) * h;
                group.vertices.extend_from_slice(&position.to_array());
                group.vertices.extend_from_slice(&normal.to_array());
                group
                    .vertices
                    .extend_from_slice(&[(u + 1.0) * 0.5, 1.0 - (v + 1.0) * 0.5]);
            }
            group
                .indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let materials = HashMap::from([("default".to_string(), Material::default())]);
        Self {
            groups: vec![group],
            materials,
        }
    }
}

/// Reads an OBJ file and the material libraries it references.
pub fn load_obj_file(path: &Path) -> Result<ObjModel> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("unable to read {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    load_obj_from_str(&contents, |library| {
        let library_path = base.join(library);
        fs::read_to_string(&library_path)
            .with_context(|| format!("unable to read {}", library_path.display()))
    })
}

/// Parses an OBJ file from memory.
///
/// `load_library` returns the contents of a `mtllib` file by name. Texture
/// coordinates are flipped vertically so that `v = 0` is the top row.
pub fn load_obj_from_str<F>(data: &str, mut load_library: F) -> Result<ObjModel>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    let mut normals = Vec::new();
    let mut materials = HashMap::new();
    let mut groups = GroupBuilder::default();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        let context = || format!("invalid {tag} on line {}", line_no + 1);
        match tag {
            "v" => positions.push(parse_vec3(parts).with_context(context)?),
            "vn" => normals.push(parse_vec3(parts).with_context(context)?),
            "vt" => {
                let uv = parse_uv(parts).with_context(context)?;
                uvs.push(Vec2::new(uv.x, 1.0 - uv.y));
            }
            "f" => {
                let polygon = parse_face(parts).with_context(context)?;
                groups.push_polygon(&polygon);
            }
            "g" | "o" => groups.set_name(parts.next().unwrap_or(DEFAULT_GROUP)),
            "usemtl" => {
                let name = parts.next().ok_or_else(|| anyhow!("usemtl without a name"))?;
                if !materials.contains_key(name) {
                    bail!("line {}: unknown material {name}", line_no + 1);
                }
                groups.set_material(name);
            }
            "mtllib" => {
                for library in parts {
                    let contents = load_library(library)?;
                    let parsed = load_mtl_from_str(&contents)
                        .with_context(|| format!("failed to parse material library {library}"))?;
                    for (name, material) in parsed {
                        if materials.insert(name.clone(), material).is_some() {
                            bail!("material {name} is defined twice");
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }
    if groups.groups.is_empty() {
        return Err(anyhow!("OBJ file does not define any faces"));
    }

    let groups = groups
        .groups
        .into_iter()
        .map(|pending| build_group(pending, &positions, &uvs, &normals))
        .collect::<Result<Vec<_>>>()?;

    Ok(ObjModel { groups, materials })
}

fn parse_uv<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let u = parts
        .next()
        .ok_or_else(|| anyhow!("missing texture coordinate"))?
        .parse::<f32>()?;
    let v = match parts.next() {
        Some(v) => v.parse::<f32>()?,
        None => 0.0,
    };
    Ok(Vec2::new(u, v))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = parse_optional_index(segments.next())?;
        let vn = parse_optional_index(segments.next())?;
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn parse_optional_index(segment: Option<&str>) -> Result<i32> {
    match segment {
        Some(s) if !s.is_empty() => Ok(s.parse::<i32>()?),
        _ => Ok(0),
    }
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

/// Where a vertex normal comes from. Corners without a `vn` take the flat
/// normal of their own triangle, so they are never shared across faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NormalSource {
    Supplied(usize),
    Face(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    uv: Option<usize>,
    normal: NormalSource,
}

struct PendingGroup {
    name: String,
    material: Option<String>,
    faces: Vec<[FaceIndex; 3]>,
}

struct GroupBuilder {
    name: String,
    material: Option<String>,
    lookup: HashMap<(String, Option<String>), usize>,
    groups: Vec<PendingGroup>,
}

impl Default for GroupBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_GROUP.to_string(),
            material: None,
            lookup: HashMap::new(),
            groups: Vec::new(),
        }
    }
}

impl GroupBuilder {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn set_material(&mut self, material: &str) {
        self.material = Some(material.to_string());
    }

    fn push_polygon(&mut self, polygon: &[FaceIndex]) {
        let index = self.current();
        let faces = &mut self.groups[index].faces;
        for i in 1..(polygon.len() - 1) {
            faces.push([polygon[0], polygon[i], polygon[i + 1]]);
        }
    }

    fn current(&mut self) -> usize {
        let key = (self.name.clone(), self.material.clone());
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        // One material per group: a second material under the same name
        // becomes its own group.
        let mut name = self.name.clone();
        if self.groups.iter().any(|group| group.name == name) {
            if let Some(material) = &self.material {
                name = format!("{name}:{material}");
            }
        }
        self.groups.push(PendingGroup {
            name,
            material: self.material.clone(),
            faces: Vec::new(),
        });
        self.lookup.insert(key, self.groups.len() - 1);
        self.groups.len() - 1
    }
}

fn build_group(
    pending: PendingGroup,
    positions: &[Vec3],
    uvs: &[Vec2],
    normals: &[Vec3],
) -> Result<MeshGroup> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for (face_index, face) in pending.faces.iter().enumerate() {
        let mut corners = [Key {
            position: 0,
            uv: None,
            normal: NormalSource::Face(face_index),
        }; 3];
        for (corner, idx) in corners.iter_mut().zip(face) {
            corner.position = fix_index(idx.v, positions.len())
                .ok_or_else(|| anyhow!("invalid vertex index {}", idx.v))?;
            corner.uv = resolve_optional(idx.vt, uvs.len(), "texture coordinate")?;
            if let Some(normal) = resolve_optional(idx.vn, normals.len(), "normal")? {
                corner.normal = NormalSource::Supplied(normal);
            }
        }

        let [p0, p1, p2] = corners.map(|corner| positions[corner.position]);
        let face_normal = (p1 - p0).cross(p2 - p0).normalize_or_zero();

        for key in corners {
            let next_index = (vertices.len() / VERTEX_STRIDE) as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                let p = positions[key.position];
                let n = match key.normal {
                    NormalSource::Supplied(i) => normals[i],
                    NormalSource::Face(_) => face_normal,
                };
                let uv = key.uv.map(|i| uvs[i]).unwrap_or(Vec2::ZERO);
                vertices.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z, uv.x, uv.y]);
                next_index
            });
            indices.push(*entry);
        }
    }

    Ok(MeshGroup {
        name: pending.name,
        material: pending.material,
        vertices,
        indices,
    })
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

/// Index `0` means the face omitted the attribute; anything else must resolve.
fn resolve_optional(index: i32, len: usize, what: &str) -> Result<Option<usize>> {
    if index == 0 {
        return Ok(None);
    }
    fix_index(index, len)
        .map(Some)
        .ok_or_else(|| anyhow!("invalid {what} index {index}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_libraries(name: &str) -> Result<String> {
        Err(anyhow!("unexpected library {name}"))
    }

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let model = load_obj_from_str(obj, no_libraries).unwrap();
        assert_eq!(model.groups.len(), 1);
        let group = &model.groups[0];
        assert_eq!(group.name, DEFAULT_GROUP);
        assert_eq!(group.indices, vec![0, 1, 2]);
        assert_eq!(group.vertices.len(), 3 * VERTEX_STRIDE);
    }

    #[test]
    fn computes_missing_normals() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let model = load_obj_from_str(obj, no_libraries).unwrap();
        for chunk in model.groups[0].vertices.chunks_exact(VERTEX_STRIDE) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!((normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn groups_bind_materials_and_flip_uvs() {
        let obj = "
mtllib scene.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
g body
usemtl red
f 1/1/1 2/2/1 3/3/1 4/4/1
g trim
usemtl blue
f -4/1/1 -3/2/1 -2/3/1
";
        let mtl = "newmtl red\nKd 1 0 0\nnewmtl blue\nKd 0 0 1\n";
        let model = load_obj_from_str(obj, |name| {
            assert_eq!(name, "scene.mtl");
            Ok(mtl.to_string())
        })
        .unwrap();

        assert_eq!(model.groups.len(), 2);
        let body = &model.groups[0];
        assert_eq!(body.name, "body");
        assert_eq!(body.material.as_deref(), Some("red"));
        assert_eq!(body.triangle_count(), 2);
        assert_eq!(body.vertex_count(), 4);
        // first vertex: uv (0, 0) flipped to (0, 1)
        assert_eq!(body.vertices[6..8], [0.0f32, 1.0]);
        assert_eq!(model.material_for(body).diffuse, Vec3::X);

        let trim = &model.groups[1];
        assert_eq!(trim.name, "trim");
        assert_eq!(model.material_for(trim).diffuse, Vec3::Z);
        assert_eq!(model.triangle_count(), 3);
    }

    #[test]
    fn unknown_material_is_an_error() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl missing\nf 1 2 3\n";
        assert!(load_obj_from_str(obj, no_libraries).is_err());
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 7\n";
        assert!(load_obj_from_str(obj, no_libraries).is_err());
    }

    fn normal_at(group: &MeshGroup, vertex: usize) -> Vec3 {
        let start = vertex * VERTEX_STRIDE + 3;
        Vec3::from_slice(&group.vertices[start..start + 3])
    }

    #[test]
    fn supplied_normals_survive_faces_without_them() {
        let obj = "
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
v 1 0 1
v 0 1 1
vn 0 0 -1
f 1//1 2//1 3//1
f 4 5 6
f 1 3 4
";
        let model = load_obj_from_str(obj, no_libraries).unwrap();
        let group = &model.groups[0];
        for vertex in 0..3 {
            assert_eq!(normal_at(group, vertex), Vec3::NEG_Z);
        }
        for vertex in 3..6 {
            assert_eq!(normal_at(group, vertex), Vec3::Z);
        }
        // corners of the third face are not welded to the supplied ones
        assert_eq!(group.vertex_count(), 9);
        for vertex in 6..9 {
            assert_eq!(normal_at(group, vertex), Vec3::X);
        }
    }

    #[test]
    fn out_of_range_attribute_indices_are_errors() {
        let positions = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvn 0 0 1\n";
        let bad_uv = format!("{positions}f 1/9 2/9 3/9\n");
        let err = load_obj_from_str(&bad_uv, no_libraries).unwrap_err();
        assert!(err.to_string().contains("texture coordinate index 9"));

        let bad_normal = format!("{positions}f 1//1 2//-2 3//1\n");
        let err = load_obj_from_str(&bad_normal, no_libraries).unwrap_err();
        assert!(err.to_string().contains("normal index -2"));

        let omitted = format!("{positions}f 1 2/1 3//1\n");
        assert!(load_obj_from_str(&omitted, no_libraries).is_ok());
    }

    #[test]
    fn cube_has_closed_faces() {
        let cube = ObjModel::cube(40.0);
        assert_eq!(cube.triangle_count(), 12);
        for [a, b, c] in cube.triangles() {
            for p in [a, b, c] {
                assert_eq!(p.abs().max_element(), 20.0);
            }
        }
        assert_eq!(cube.material_for(&cube.groups[0]), Material::default());
    }
}
