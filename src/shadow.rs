//! Shadow-map sampling and a CPU depth map mirroring the GPU shadow pass.
//!
//! The WGSL in `render::shaders` follows the same rules as [`ShadowSampler`]:
//! light-space NDC is remapped with a flipped v axis, receivers outside the
//! light volume are lit, and PCF averages a 3×3 texel neighbourhood whose
//! taps are clamped to the map's edges.

use glam::{Mat4, Vec2, Vec3};

pub const DEFAULT_BIAS: f32 = 0.001;

/// Remaps light-space NDC to shadow-map texture coordinates, keeping depth.
pub fn ndc_to_texcoord(ndc: Vec3) -> Vec3 {
    Vec3::new(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5, ndc.z)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowMode {
    #[default]
    Point,
    /// Percentage-closer filtering over a 3×3 neighbourhood.
    Pcf,
}

impl ShadowMode {
    pub fn from_pcf(enabled: bool) -> Self {
        if enabled {
            Self::Pcf
        } else {
            Self::Point
        }
    }

    pub fn is_pcf(self) -> bool {
        self == Self::Pcf
    }
}

/// Read access to a depth map, in texels.
pub trait DepthSource {
    fn size(&self) -> (u32, u32);
    fn depth_at(&self, x: u32, y: u32) -> f32;
}

/// Compares receiver depths against a depth map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSampler {
    pub mode: ShadowMode,
    pub bias: f32,
}

impl Default for ShadowSampler {
    fn default() -> Self {
        Self {
            mode: ShadowMode::Point,
            bias: DEFAULT_BIAS,
        }
    }
}

impl ShadowSampler {
    pub fn new(mode: ShadowMode, bias: f32) -> Self {
        Self { mode, bias }
    }

    /// Fraction of light reaching `world`: 1.0 fully lit, 0.0 fully shadowed.
    pub fn light_factor(
        &self,
        map: &impl DepthSource,
        light_view_proj: Mat4,
        world: Vec3,
    ) -> f32 {
        let clip = light_view_proj * world.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        self.light_factor_at(map, ndc_to_texcoord(ndc))
    }

    /// Same as [`Self::light_factor`] for already remapped coordinates.
    pub fn light_factor_at(&self, map: &impl DepthSource, coords: Vec3) -> f32 {
        let inside = |v: f32| (0.0..=1.0).contains(&v);
        if !(inside(coords.x) && inside(coords.y) && inside(coords.z)) {
            return 1.0;
        }
        let uv = Vec2::new(coords.x, coords.y);
        match self.mode {
            ShadowMode::Point => self.tap(map, uv, coords.z, 0, 0),
            ShadowMode::Pcf => {
                let mut lit = 0.0;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        lit += self.tap(map, uv, coords.z, dx, dy);
                    }
                }
                lit / 9.0
            }
        }
    }

    fn tap(&self, map: &impl DepthSource, uv: Vec2, depth: f32, dx: i64, dy: i64) -> f32 {
        let (width, height) = map.size();
        let x = ((uv.x * width as f32).floor() as i64 + dx).clamp(0, width as i64 - 1);
        let y = ((uv.y * height as f32).floor() as i64 + dy).clamp(0, height as i64 - 1);
        let stored = map.depth_at(x as u32, y as u32);
        if depth > stored + self.bias {
            0.0
        } else {
            1.0
        }
    }
}

/// Row-major CPU depth map cleared to the far plane.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    texels: Vec<f32>,
}

/// Row-major offset, computed in `usize` so large maps cannot wrap.
fn texel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

impl DepthMap {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            texels: vec![1.0; width as usize * height as usize],
        }
    }

    pub fn filled(width: u32, height: u32, depth: f32) -> Self {
        let mut map = Self::new(width, height);
        map.texels.fill(depth);
        map
    }

    pub fn clear(&mut self) {
        self.texels.fill(1.0);
    }

    pub fn set(&mut self, x: u32, y: u32, depth: f32) {
        if x < self.width && y < self.height {
            self.texels[texel_index(self.width, x, y)] = depth;
        }
    }

    /// Renders world-space triangles with the given transform, keeping the
    /// nearest depth per texel.
    pub fn render<I>(&mut self, light_view_proj: Mat4, world: Mat4, triangles: I)
    where
        I: IntoIterator<Item = [Vec3; 3]>,
    {
        let transform = light_view_proj * world;
        for triangle in triangles {
            let projected = triangle.map(|p| {
                let clip = transform * p.extend(1.0);
                ndc_to_texcoord(clip.truncate() / clip.w)
            });
            self.rasterize(projected);
        }
    }

    /// Rasterizes one triangle given in texture coordinates plus depth.
    pub fn rasterize(&mut self, triangle: [Vec3; 3]) {
        let size = Vec2::new(self.width as f32, self.height as f32);
        let [a, b, c] = triangle.map(|p| (Vec2::new(p.x, p.y) * size, p.z));
        let area = edge(a.0, b.0, c.0);
        if area.abs() <= f32::EPSILON {
            return;
        }

        let min = a.0.min(b.0).min(c.0).floor().max(Vec2::ZERO);
        let max = a.0.max(b.0).max(c.0).ceil().min(size);
        for y in min.y as u32..max.y as u32 {
            for x in min.x as u32..max.x as u32 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(b.0, c.0, p) / area;
                let w1 = edge(c.0, a.0, p) / area;
                let w2 = edge(a.0, b.0, p) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let depth = w0 * a.1 + w1 * b.1 + w2 * c.1;
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }
                let index = texel_index(self.width, x, y);
                if depth < self.texels[index] {
                    self.texels[index] = depth;
                }
            }
        }
    }
}

impl DepthSource for DepthMap {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.texels[texel_index(self.width, x, y)]
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Mean occlusion (0 = all lit, 1 = all shadowed) over receiver points.
pub fn shadow_coverage(
    sampler: &ShadowSampler,
    map: &impl DepthSource,
    light_view_proj: Mat4,
    receivers: &[Vec3],
) -> f32 {
    if receivers.is_empty() {
        return 0.0;
    }
    let lit: f32 = receivers
        .iter()
        .map(|p| sampler.light_factor(map, light_view_proj, *p))
        .sum();
    1.0 - lit / receivers.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{LightParams, LightProjector};

    #[test]
    fn texel_index_does_not_wrap_past_u32() {
        assert_eq!(texel_index(70_000, 69_999, 69_999), 4_899_999_999);
        let map = DepthMap::new(3, 2);
        assert_eq!(map.texels.len(), 6);
    }

    #[test]
    fn remap_flips_v_axis() {
        let top_left = ndc_to_texcoord(Vec3::new(-1.0, 1.0, 0.3));
        assert_eq!(top_left, Vec3::new(0.0, 0.0, 0.3));
        let bottom_right = ndc_to_texcoord(Vec3::new(1.0, -1.0, 0.3));
        assert_eq!(bottom_right, Vec3::new(1.0, 1.0, 0.3));
    }

    #[test]
    fn occluded_receiver_is_shadowed() {
        let map = DepthMap::filled(16, 16, 0.2);
        let sampler = ShadowSampler::default();
        assert_eq!(sampler.light_factor_at(&map, Vec3::new(0.5, 0.5, 0.6)), 0.0);
        assert_eq!(sampler.light_factor_at(&map, Vec3::new(0.5, 0.5, 0.1)), 1.0);
    }

    #[test]
    fn equal_depth_is_lit_in_both_modes() {
        let map = DepthMap::filled(32, 32, 0.42);
        for mode in [ShadowMode::Point, ShadowMode::Pcf] {
            let sampler = ShadowSampler::new(mode, DEFAULT_BIAS);
            assert_eq!(sampler.light_factor_at(&map, Vec3::new(0.3, 0.7, 0.42)), 1.0);
        }
    }

    #[test]
    fn outside_light_volume_is_lit() {
        let map = DepthMap::filled(8, 8, 0.0);
        let sampler = ShadowSampler::new(ShadowMode::Pcf, DEFAULT_BIAS);
        for coords in [
            Vec3::new(-0.01, 0.5, 0.5),
            Vec3::new(0.5, 1.2, 0.5),
            Vec3::new(0.5, 0.5, 1.5),
        ] {
            assert_eq!(sampler.light_factor_at(&map, coords), 1.0);
        }
    }

    #[test]
    fn pcf_matches_point_on_uniform_map() {
        let light = LightProjector::new(LightParams::default());
        let point = ShadowSampler::new(ShadowMode::Point, DEFAULT_BIAS);
        let pcf = ShadowSampler::new(ShadowMode::Pcf, DEFAULT_BIAS);
        for depth in [0.0, 0.3, 0.43, 1.0] {
            let map = DepthMap::filled(64, 64, depth);
            for x in (-250..=250).step_by(50) {
                for z in (-250..=250).step_by(50) {
                    let world = Vec3::new(x as f32, -50.0, z as f32);
                    assert_eq!(
                        point.light_factor(&map, light.view_proj(), world),
                        pcf.light_factor(&map, light.view_proj(), world)
                    );
                }
            }
        }
    }

    #[test]
    fn pcf_softens_shadow_edges() {
        let mut map = DepthMap::new(8, 8);
        for y in 0..8 {
            for x in 0..4 {
                map.set(x, y, 0.1);
            }
        }
        let pcf = ShadowSampler::new(ShadowMode::Pcf, DEFAULT_BIAS);
        // texel column 3 is the last occluded one; its right neighbour is lit.
        let edge = Vec3::new(3.5 / 8.0, 0.5, 0.5);
        let factor = pcf.light_factor_at(&map, edge);
        assert!((factor - 3.0 / 9.0).abs() < 1e-6);
        let point = ShadowSampler::new(ShadowMode::Point, DEFAULT_BIAS);
        assert_eq!(point.light_factor_at(&map, edge), 0.0);
    }

    #[test]
    fn rasterized_triangle_keeps_nearest_depth() {
        let mut map = DepthMap::new(4, 4);
        map.rasterize([
            Vec3::new(0.0, 0.0, 0.5),
            Vec3::new(1.0, 0.0, 0.5),
            Vec3::new(0.0, 1.0, 0.5),
        ]);
        assert!((map.depth_at(0, 0) - 0.5).abs() < 1e-6);
        assert_eq!(map.depth_at(3, 3), 1.0);
        map.rasterize([
            Vec3::new(0.0, 0.0, 0.8),
            Vec3::new(1.0, 0.0, 0.8),
            Vec3::new(0.0, 1.0, 0.8),
        ]);
        assert!((map.depth_at(0, 0) - 0.5).abs() < 1e-6);
        map.clear();
        assert_eq!(map.depth_at(0, 0), 1.0);
    }

    #[test]
    fn occluder_casts_shadow_on_receiver_below() {
        let light = LightProjector::new(LightParams {
            position: Vec3::new(0.0, 500.0, 0.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            ..LightParams::default()
        });
        let mut map = DepthMap::new(256, 256);
        let quad = [
            [
                Vec3::new(-20.0, 0.0, -20.0),
                Vec3::new(20.0, 0.0, -20.0),
                Vec3::new(20.0, 0.0, 20.0),
            ],
            [
                Vec3::new(-20.0, 0.0, -20.0),
                Vec3::new(20.0, 0.0, 20.0),
                Vec3::new(-20.0, 0.0, 20.0),
            ],
        ];
        map.render(light.view_proj(), Mat4::IDENTITY, quad);

        let sampler = ShadowSampler::default();
        let below = Vec3::new(0.0, -50.0, 0.0);
        let aside = Vec3::new(200.0, -50.0, 0.0);
        assert_eq!(sampler.light_factor(&map, light.view_proj(), below), 0.0);
        assert_eq!(sampler.light_factor(&map, light.view_proj(), aside), 1.0);

        let coverage = shadow_coverage(&sampler, &map, light.view_proj(), &[below, aside]);
        assert!((coverage - 0.5).abs() < 1e-6);
    }
}
