use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node};

use crate::camera::Frustum;
use crate::error::ConfigError;
use crate::floor::FloorGeometry;
use crate::light::LightParams;
use crate::obj::{load_obj_file, ObjModel};
use crate::selection::DEFAULT_RESOLUTIONS;
use crate::shadow::DEFAULT_BIAS;

/// Largest depth target edge accepted from configuration.
pub const MAX_RESOLUTION: u32 = 8192;

/// Everything needed to build the demo scene.
///
/// Every element of the XML form is optional; missing values keep the
/// defaults of the built-in scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub light: LightParams,
    pub shadow: ShadowConfig,
    pub camera: CameraConfig,
    pub floor: FloorConfig,
    pub object: ObjectConfig,
    /// Directory relative asset paths resolve against.
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadowConfig {
    pub resolutions: Vec<u32>,
    pub bias: f32,
    pub pcf: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub position: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
    pub near: f32,
    pub far: f32,
    pub fov_degrees: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloorConfig {
    pub geometry: FloorGeometry,
    pub texture: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectConfig {
    pub mesh: Option<PathBuf>,
    pub position: Vec3,
    pub heading: Vec3,
    pub speed: f32,
    /// Edge length of the built-in cube used when no mesh is configured.
    pub cube_size: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            light: LightParams::default(),
            shadow: ShadowConfig {
                resolutions: DEFAULT_RESOLUTIONS.to_vec(),
                bias: DEFAULT_BIAS,
                pcf: false,
            },
            camera: CameraConfig {
                position: Vec3::new(-100.0, 50.0, -100.0),
                direction: Vec3::new(1.0, -1.0, 1.0),
                up: Vec3::Y,
                near: 1.0,
                far: 1000.0,
                fov_degrees: 54.0,
            },
            floor: FloorConfig {
                geometry: FloorGeometry::default(),
                texture: None,
            },
            object: ObjectConfig {
                mesh: None,
                position: Vec3::new(-100.0, 0.0, -100.0),
                heading: Vec3::new(1.2, 0.5, 0.8),
                speed: 50.0,
                cube_size: 40.0,
            },
            base_dir: PathBuf::from("."),
        }
    }
}

impl SceneConfig {
    /// Reads a scene file; relative asset paths resolve next to it.
    pub fn load(path: &Path) -> Result<Self> {
        let xml = fs::read_to_string(path)
            .with_context(|| format!("unable to read scene file {}", path.display()))?;
        let mut config = Self::from_xml(&xml)
            .with_context(|| format!("failed to parse scene file {}", path.display()))?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    /// Parses and validates the XML scene description.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        let mut config = Self::default();

        if let Some(node) = child(&root, "light") {
            let light = &mut config.light;
            light.position = parse_vec3(optional_text(&node, "position"), light.position)?;
            light.target = parse_vec3(optional_text(&node, "target"), light.target)?;
            light.up = parse_vec3(optional_text(&node, "up"), light.up)?;
            light.width = parse_f32(optional_text(&node, "width"), light.width)?;
            light.height = parse_f32(optional_text(&node, "height"), light.height)?;
            light.near = parse_f32(optional_text(&node, "near"), light.near)?;
            light.far = parse_f32(optional_text(&node, "far"), light.far)?;
        }

        if let Some(node) = child(&root, "shadow") {
            let shadow = &mut config.shadow;
            if let Some(node) = child(&node, "resolutions") {
                shadow.resolutions = parse_u32_list(node.text().unwrap_or_default())?;
            }
            shadow.bias = parse_f32(optional_text(&node, "bias"), shadow.bias)?;
            shadow.pcf = parse_bool(optional_text(&node, "pcf"), shadow.pcf)?;
        }

        if let Some(node) = child(&root, "camera") {
            let camera = &mut config.camera;
            camera.position = parse_vec3(optional_text(&node, "position"), camera.position)?;
            camera.direction = parse_vec3(optional_text(&node, "direction"), camera.direction)?;
            camera.up = parse_vec3(optional_text(&node, "up"), camera.up)?;
            camera.near = parse_f32(optional_text(&node, "near"), camera.near)?;
            camera.far = parse_f32(optional_text(&node, "far"), camera.far)?;
            camera.fov_degrees = parse_f32(optional_text(&node, "fov"), camera.fov_degrees)?;
        }

        if let Some(node) = child(&root, "floor") {
            let floor = &mut config.floor;
            let geometry = &mut floor.geometry;
            geometry.center = parse_vec3(optional_text(&node, "center"), geometry.center)?;
            geometry.width = parse_f32(optional_text(&node, "width"), geometry.width)?;
            geometry.depth = parse_f32(optional_text(&node, "depth"), geometry.depth)?;
            geometry.tiling = parse_f32(optional_text(&node, "tiling"), geometry.tiling)?;
            floor.texture = optional_text(&node, "texture").map(PathBuf::from);
        }

        if let Some(node) = child(&root, "object") {
            let object = &mut config.object;
            object.mesh = optional_text(&node, "mesh").map(PathBuf::from);
            object.position = parse_vec3(optional_text(&node, "position"), object.position)?;
            object.heading = parse_vec3(optional_text(&node, "velocity"), object.heading)?;
            object.speed = parse_f32(optional_text(&node, "speed"), object.speed)?;
            object.cube_size = parse_f32(optional_text(&node, "size"), object.cube_size)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let shadow = &self.shadow;
        if shadow.resolutions.is_empty() {
            return Err(ConfigError::new(
                "shadow resolutions",
                "at least one resolution is required",
            ));
        }
        if let Some(bad) = shadow
            .resolutions
            .iter()
            .find(|&&size| size == 0 || size > MAX_RESOLUTION)
        {
            return Err(ConfigError::new(
                "shadow resolutions",
                format!("{bad} is outside 1..={MAX_RESOLUTION}"),
            ));
        }

        self.light.validate()?;

        let camera = &self.camera;
        check_depth_range("camera depth range", camera.near, camera.far)?;
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            return Err(ConfigError::new("camera fov", "must lie strictly between 0 and 180"));
        }
        if camera.direction.length_squared() <= f32::EPSILON {
            return Err(ConfigError::new("camera direction", "must not be zero"));
        }

        if self.object.cube_size <= 0.0 {
            return Err(ConfigError::new("object size", "must be positive"));
        }
        Ok(())
    }

    /// Resolves an asset path against the scene file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Loads the configured mesh, or builds the fallback cube.
    pub fn load_model(&self) -> Result<ObjModel> {
        match &self.object.mesh {
            Some(mesh) => load_obj_file(&self.resolve(mesh)),
            None => Ok(ObjModel::cube(self.object.cube_size)),
        }
    }

    pub fn frustum(&self, aspect_ratio: f32) -> Frustum {
        Frustum {
            near: self.camera.near,
            far: self.camera.far,
            fov_y: self.camera.fov_degrees.to_radians(),
            aspect_ratio: aspect_ratio.max(0.01),
        }
    }
}

pub(crate) fn check_depth_range(field: &'static str, near: f32, far: f32) -> Result<(), ConfigError> {
    if near > 0.0 && far > near {
        Ok(())
    } else {
        Err(ConfigError::new(field, format!("need far > near > 0, got near {near}, far {far}")))
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let components = value
        .split_whitespace()
        .map(|component| component.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("failed to parse vector {value:?}: {err}"))?;
    match components[..] {
        [x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(anyhow!("vector {value:?} must have exactly 3 components")),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float {value:?}: {err}")),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref() {
        Some("true" | "on" | "1") => Ok(true),
        Some("false" | "off" | "0") => Ok(false),
        Some(other) => Err(anyhow!("failed to parse boolean {other:?}")),
        None => Ok(default),
    }
}

fn parse_u32_list(value: &str) -> Result<Vec<u32>> {
    value
        .split_whitespace()
        .map(|item| {
            item.parse::<u32>()
                .map_err(|err| anyhow!("failed to parse resolution {item:?}: {err}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene>
        <light>
            <position>-200 80 -200</position>
            <far>800</far>
        </light>
        <shadow>
            <resolutions>512 1024</resolutions>
            <bias>0.002</bias>
            <pcf>on</pcf>
        </shadow>
        <camera>
            <fov>60</fov>
        </camera>
        <floor>
            <width>300</width>
            <texture>stone.png</texture>
        </floor>
        <object>
            <mesh>models/bth.obj</mesh>
            <speed>25</speed>
        </object>
    </scene>
    "#;

    #[test]
    fn parse_scene_overrides_defaults() {
        let config = SceneConfig::from_xml(SAMPLE).unwrap();
        assert_eq!(config.light.position, Vec3::new(-200.0, 80.0, -200.0));
        assert_eq!(config.light.far, 800.0);
        assert_eq!(config.light.width, 1000.0);
        assert_eq!(config.shadow.resolutions, vec![512, 1024]);
        assert_eq!(config.shadow.bias, 0.002);
        assert!(config.shadow.pcf);
        assert_eq!(config.camera.fov_degrees, 60.0);
        assert_eq!(config.floor.geometry.width, 300.0);
        assert_eq!(config.floor.geometry.depth, 512.0);
        assert_eq!(config.floor.texture, Some(PathBuf::from("stone.png")));
        assert_eq!(config.object.mesh, Some(PathBuf::from("models/bth.obj")));
        assert_eq!(config.object.speed, 25.0);
    }

    #[test]
    fn empty_scene_uses_defaults() {
        let config = SceneConfig::from_xml("<scene/>").unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        for xml in [
            "<scene><shadow><resolutions></resolutions></shadow></scene>",
            "<scene><shadow><resolutions>256 0</resolutions></shadow></scene>",
            "<scene><light><near>10</near><far>5</far></light></scene>",
            "<scene><light><position>0 0 0</position></light></scene>",
            "<scene><camera><fov>190</fov></camera></scene>",
            "<scene><camera><position>1 2</position></camera></scene>",
            "<scene><shadow><pcf>maybe</pcf></shadow></scene>",
        ] {
            assert!(SceneConfig::from_xml(xml).is_err(), "{xml} accepted");
        }
    }

    #[test]
    fn relative_paths_resolve_against_scene_directory() {
        let config = SceneConfig {
            base_dir: PathBuf::from("assets"),
            ..SceneConfig::default()
        };
        assert_eq!(
            config.resolve(Path::new("bth.obj")),
            PathBuf::from("assets").join("bth.obj")
        );
    }

    #[test]
    fn frustum_uses_radians() {
        let frustum = SceneConfig::default().frustum(1.5);
        assert!((frustum.fov_y - std::f32::consts::PI * 0.3).abs() < 1e-5);
        assert_eq!(frustum.aspect_ratio, 1.5);
    }
}
