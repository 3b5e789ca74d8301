use glam::{Mat4, Vec3};

/// Half extent of the area the object bounces around in, on x and z.
pub const BOUNDS_XZ: f32 = 256.0;
pub const MIN_HEIGHT: f32 = 0.0;
pub const MAX_HEIGHT: f32 = 50.0;

/// The animated shadow caster: drifts at constant speed, bounces off the
/// bounds and spins about the vertical axis.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingObject {
    position: Vec3,
    velocity: Vec3,
    rotation: f32,
}

impl MovingObject {
    pub fn new(position: Vec3, heading: Vec3, speed: f32) -> Self {
        Self {
            position,
            velocity: heading.normalize_or_zero() * speed,
            rotation: 0.0,
        }
    }

    pub fn update(&mut self, seconds: f32) {
        self.rotation += seconds;
        self.position += self.velocity * seconds;

        // Once outside a bound the velocity always points back in.
        self.velocity.x = bounce(self.position.x, self.velocity.x, -BOUNDS_XZ, BOUNDS_XZ);
        self.velocity.y = bounce(self.position.y, self.velocity.y, MIN_HEIGHT, MAX_HEIGHT);
        self.velocity.z = bounce(self.position.z, self.velocity.z, -BOUNDS_XZ, BOUNDS_XZ);
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_rotation_y(self.rotation)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }
}

fn bounce(position: f32, velocity: f32, min: f32, max: f32) -> f32 {
    if position < min {
        velocity.abs()
    } else if position > max {
        -velocity.abs()
    } else {
        velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_at_configured_speed() {
        let mut object = MovingObject::new(Vec3::ZERO, Vec3::new(1.2, 0.5, 0.8), 50.0);
        assert!((object.velocity().length() - 50.0).abs() < 1e-4);
        object.update(0.1);
        assert!((object.position().length() - 5.0).abs() < 1e-4);
        assert!((object.rotation() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn bounces_off_ceiling_and_walls() {
        let mut object = MovingObject::new(Vec3::new(255.0, 49.0, 0.0), Vec3::new(1.0, 1.0, 0.0), 10.0);
        object.update(1.0);
        assert!(object.velocity().x < 0.0);
        assert!(object.velocity().y < 0.0);
        for _ in 0..200 {
            object.update(0.5);
            assert!(object.position().y > MIN_HEIGHT - 10.0);
            assert!(object.position().x < BOUNDS_XZ + 10.0);
        }
    }

    #[test]
    fn world_matrix_translates_then_rotates() {
        let mut object = MovingObject::new(Vec3::new(-100.0, 0.0, -100.0), Vec3::ZERO, 0.0);
        object.update(std::f32::consts::FRAC_PI_2);
        let world = object.world_matrix();
        let moved = world.transform_point3(Vec3::X);
        assert!(moved.abs_diff_eq(Vec3::new(-100.0, 0.0, -101.0), 1e-4));
    }
}
