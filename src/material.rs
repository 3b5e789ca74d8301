use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;

/// Surface description read from an MTL file.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub transmission: Vec3,
    pub illumination: u32,
    pub refraction_index: f32,
    pub specular_exponent: f32,
    /// Texture path as written in the file, relative to the MTL location.
    pub texture: Option<String>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.2),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::ONE,
            transmission: Vec3::ONE,
            illumination: 0,
            refraction_index: 1.0,
            specular_exponent: 8.0,
            texture: None,
        }
    }
}

/// Parses an MTL file into materials keyed by name.
pub fn load_mtl_from_str(data: &str) -> Result<HashMap<String, Material>> {
    let mut materials = HashMap::new();
    let mut current: Option<(String, Material)> = None;

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

        if tag == "newmtl" {
            let name = parts.next().ok_or_else(|| anyhow!("newmtl without a name"))?;
            if let Some((name, material)) = current.take() {
                insert_unique(&mut materials, name, material)?;
            }
            current = Some((name.to_string(), Material::default()));
            continue;
        }

        let Some((_, material)) = current.as_mut() else {
            continue;
        };
        match tag {
            "Ka" => material.ambient = parse_vec3(parts).with_context(context)?,
            "Kd" => material.diffuse = parse_vec3(parts).with_context(context)?,
            "Ks" => material.specular = parse_vec3(parts).with_context(context)?,
            "Tf" => material.transmission = parse_vec3(parts).with_context(context)?,
            "illum" => material.illumination = parse_scalar(parts).with_context(context)?,
            "Ni" => material.refraction_index = parse_scalar(parts).with_context(context)?,
            "Ns" => material.specular_exponent = parse_scalar(parts).with_context(context)?,
            "map_Ka" | "map_Kd" | "map_Ks" => {
                // Options precede the file name; the first token that looks
                // like a file is taken.
                if let Some(file) = parts.find(|part| part.contains('.')) {
                    material.texture = Some(file.to_string());
                }
            }
            _ => {}
        }
    }

    if let Some((name, material)) = current {
        insert_unique(&mut materials, name, material)?;
    }
    Ok(materials)
}

fn insert_unique(
    materials: &mut HashMap<String, Material>,
    name: String,
    material: Material,
) -> Result<()> {
    if materials.contains_key(&name) {
        bail!("material {name} is defined twice");
    }
    materials.insert(name, material);
    Ok(())
}

pub(crate) fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    let x = next()?;
    let y = next()?;
    let z = next()?;
    Ok(Vec3::new(x, y, z))
}

fn parse_scalar<'a, T>(mut parts: impl Iterator<Item = &'a str>) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parts
        .next()
        .ok_or_else(|| anyhow!("missing value"))?
        .parse::<T>()?)
}
