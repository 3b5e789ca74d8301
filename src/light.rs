use glam::{Mat4, Vec3, Vec4};

use crate::config::check_depth_range;
use crate::error::ConfigError;
use crate::shadow::ndc_to_texcoord;

/// Builds the light's view matrix.
///
/// The basis is left-handed: `right = up × forward`, `true_up = forward × right`,
/// with `forward` pointing from the light towards `target`.
pub fn compute_view_matrix(position: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let forward = (target - position).normalize();
    let right = up.cross(forward).normalize();
    let true_up = forward.cross(right);
    Mat4::from_cols(
        Vec4::new(right.x, true_up.x, forward.x, 0.0),
        Vec4::new(right.y, true_up.y, forward.y, 0.0),
        Vec4::new(right.z, true_up.z, forward.z, 0.0),
        Vec4::new(
            -right.dot(position),
            -true_up.dot(position),
            -forward.dot(position),
            1.0,
        ),
    )
}

/// Builds an orthographic projection centred on the view axis.
///
/// x and y are scaled by `2 / width` and `2 / height`; z is remapped linearly
/// from `[near, far]` to `[0, 1]`.
pub fn compute_ortho_projection(width: f32, height: f32, near: f32, far: f32) -> Mat4 {
    let depth = far - near;
    Mat4::from_cols(
        Vec4::new(2.0 / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 / height, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0 / depth, 0.0),
        Vec4::new(0.0, 0.0, -near / depth, 1.0),
    )
}

/// Parameters describing the light's position and orthographic volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,
}

impl LightParams {
    /// Rejects parameters that would produce a degenerate view or projection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(ConfigError::new("light volume", "width and height must be positive"));
        }
        check_depth_range("light depth range", self.near, self.far)?;
        if self.position.distance_squared(self.target) <= f32::EPSILON {
            return Err(ConfigError::new("light", "position and target coincide"));
        }
        if self.up.cross(self.target - self.position).length_squared() <= f32::EPSILON {
            return Err(ConfigError::new("light", "up vector is parallel to the view direction"));
        }
        Ok(())
    }
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            position: Vec3::new(-300.0, 50.0, -300.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            width: 1000.0,
            height: 1000.0,
            near: 1.0,
            far: 1000.0,
        }
    }
}

/// Directional light with cached view and projection matrices.
#[derive(Debug, Clone)]
pub struct LightProjector {
    params: LightParams,
    view: Mat4,
    projection: Mat4,
}

impl LightProjector {
    pub fn new(params: LightParams) -> Self {
        let mut projector = Self {
            params,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        projector.recompute();
        projector
    }

    pub fn params(&self) -> &LightParams {
        &self.params
    }

    pub fn position(&self) -> Vec3 {
        self.params.position
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Combined world → light clip space transform.
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Moves the light; the matrices are rebuilt only when the position changes.
    ///
    /// A rejected position leaves the light untouched.
    pub fn set_position(&mut self, position: Vec3) -> Result<(), ConfigError> {
        if self.params.position == position {
            return Ok(());
        }
        self.apply(LightParams {
            position,
            ..self.params
        })
    }

    /// Changes the orthographic extent and depth range.
    pub fn set_volume(
        &mut self,
        width: f32,
        height: f32,
        near: f32,
        far: f32,
    ) -> Result<(), ConfigError> {
        self.apply(LightParams {
            width,
            height,
            near,
            far,
            ..self.params
        })
    }

    fn apply(&mut self, params: LightParams) -> Result<(), ConfigError> {
        params.validate()?;
        self.params = params;
        self.recompute();
        Ok(())
    }

    /// Projects a world position to light-space normalized device coordinates.
    pub fn project(&self, world: Vec3) -> Vec3 {
        let clip = self.view_proj() * world.extend(1.0);
        clip.truncate() / clip.w
    }

    /// Projects a world position to shadow-map texture coordinates plus depth.
    pub fn shadow_coords(&self, world: Vec3) -> Vec3 {
        ndc_to_texcoord(self.project(world))
    }

    fn recompute(&mut self) {
        let p = &self.params;
        self.view = compute_view_matrix(p.position, p.target, p.up);
        self.projection = compute_ortho_projection(p.width, p.height, p.near, p.far);
    }
}
