use std::fmt::Write as _;

use glam::Vec3;

use crate::config::SceneConfig;
use crate::error::ConfigError;
use crate::obj::ObjModel;
use crate::scene::Scene;
use crate::shadow::{shadow_coverage, DepthMap, ShadowMode, ShadowSampler};

/// Floor samples per side used for the coverage estimate.
pub const COVERAGE_GRID: usize = 64;

/// Headless description of the scene, including CPU-rendered shadow
/// coverage of the floor for every depth target resolution.
pub fn summary(config: &SceneConfig, model: &ObjModel) -> Result<String, ConfigError> {
    let scene = Scene::new(config)?;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Mesh: {} groups, {} materials, {} triangles",
        model.groups.len(),
        model.materials.len(),
        model.triangle_count()
    );
    for group in &model.groups {
        let _ = writeln!(
            out,
            " - {}: {} triangles, material {}",
            group.name,
            group.triangle_count(),
            group.material.as_deref().unwrap_or("<none>")
        );
    }

    let resolutions = scene.selection().resolutions();
    let _ = writeln!(out, "Depth targets: {}", resolutions.len());
    for (index, size) in resolutions.iter().enumerate() {
        let _ = writeln!(out, " - {}: {size}x{size}", index + 1);
    }

    let light = scene.light();
    let centre = light.shadow_coords(light.params().target);
    let _ = writeln!(
        out,
        "Light-space target texcoord: ({:.3}, {:.3})",
        centre.x, centre.y
    );
    let _ = writeln!(out, "{}", scene.info_string());

    let light_view_proj = light.view_proj();
    let world = scene.object().world_matrix();
    let receivers: Vec<Vec3> = scene.floor().sample_points(COVERAGE_GRID);
    let bias = scene.sampler().bias;
    let point = ShadowSampler::new(ShadowMode::Point, bias);
    let pcf = ShadowSampler::new(ShadowMode::Pcf, bias);

    let _ = writeln!(out, "Floor shadow coverage (point / PCF):");
    for &size in resolutions {
        let mut map = DepthMap::new(size, size);
        map.render(light_view_proj, world, model.triangles());
        let _ = writeln!(
            out,
            " - {size}x{size}: {:.2}% / {:.2}%",
            shadow_coverage(&point, &map, light_view_proj, &receivers) * 100.0,
            shadow_coverage(&pcf, &map, light_view_proj, &receivers) * 100.0
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_summary_lists_targets_and_centre() {
        let config = SceneConfig::default();
        let model = ObjModel::cube(config.object.cube_size);
        let report = summary(&config, &model).unwrap();
        assert!(report.contains("Mesh: 1 groups, 1 materials, 12 triangles"));
        assert!(report.contains("Depth targets: 4"));
        assert!(report.contains(" - 3: 1024x1024"));
        assert!(report.contains("Light-space target texcoord: (0.500, 0.500)"));
        assert!(report.contains("Depth texture 1: 256x256, PCF: OFF"));
        assert_eq!(report.matches("% / ").count(), 4);
    }

    #[test]
    fn object_casts_shadow_on_floor() {
        let config = SceneConfig::default();
        let scene = Scene::new(&config).unwrap();
        let model = ObjModel::cube(config.object.cube_size);
        let light_view_proj = scene.light().view_proj();
        let mut map = DepthMap::new(1024, 1024);
        map.render(light_view_proj, scene.object().world_matrix(), model.triangles());
        let receivers = scene.floor().sample_points(COVERAGE_GRID);
        let coverage = shadow_coverage(&scene.sampler(), &map, light_view_proj, &receivers);
        assert!(coverage > 0.0 && coverage < 0.5, "coverage {coverage}");
    }

    #[test]
    fn invalid_config_is_reported() {
        let config = SceneConfig {
            shadow: crate::config::ShadowConfig {
                resolutions: Vec::new(),
                ..SceneConfig::default().shadow
            },
            ..SceneConfig::default()
        };
        assert!(summary(&config, &ObjModel::cube(40.0)).is_err());
    }
}
