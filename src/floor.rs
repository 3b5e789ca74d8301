use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex of the floor quad.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FloorVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Horizontal shadow-receiving quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorGeometry {
    pub center: Vec3,
    pub width: f32,
    pub depth: f32,
    /// Number of texture repeats along each side.
    pub tiling: f32,
}

impl Default for FloorGeometry {
    fn default() -> Self {
        Self {
            center: Vec3::new(0.0, -50.0, 0.0),
            width: 512.0,
            depth: 512.0,
            tiling: 60.0,
        }
    }
}

impl FloorGeometry {
    /// Triangle-strip order: far left, far right, near left, near right.
    pub fn vertices(&self) -> [FloorVertex; 4] {
        let left = self.center.x - self.width / 2.0;
        let right = self.center.x + self.width / 2.0;
        let near = self.center.z - self.depth / 2.0;
        let far = self.center.z + self.depth / 2.0;
        let y = self.center.y;
        let t = self.tiling;
        [
            FloorVertex {
                position: [left, y, far],
                uv: [0.0, 0.0],
            },
            FloorVertex {
                position: [right, y, far],
                uv: [t, 0.0],
            },
            FloorVertex {
                position: [left, y, near],
                uv: [0.0, t],
            },
            FloorVertex {
                position: [right, y, near],
                uv: [t, t],
            },
        ]
    }

    /// Centres of an `n × n` grid of cells covering the floor.
    pub fn sample_points(&self, n: usize) -> Vec<Vec3> {
        let n = n.max(1);
        let mut points = Vec::with_capacity(n * n);
        for row in 0..n {
            for col in 0..n {
                let fx = (col as f32 + 0.5) / n as f32 - 0.5;
                let fz = (row as f32 + 0.5) / n as f32 - 0.5;
                points.push(self.center + Vec3::new(fx * self.width, 0.0, fz * self.depth));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_spans_configured_extent() {
        let floor = FloorGeometry::default();
        let [far_left, far_right, near_left, near_right] = floor.vertices();
        assert_eq!(far_left.position, [-256.0, -50.0, 256.0]);
        assert_eq!(near_right.position, [256.0, -50.0, -256.0]);
        assert_eq!(far_right.uv, [60.0, 0.0]);
        assert_eq!(near_left.uv, [0.0, 60.0]);
    }

    #[test]
    fn sample_points_stay_on_floor() {
        let floor = FloorGeometry::default();
        let points = floor.sample_points(8);
        assert_eq!(points.len(), 64);
        for point in points {
            assert_eq!(point.y, -50.0);
            assert!(point.x.abs() < 256.0 && point.z.abs() < 256.0);
        }
    }
}
