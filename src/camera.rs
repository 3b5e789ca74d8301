use std::time::Duration;

use glam::{Mat4, Quat, Vec3};

use crate::input::{Action, InputState};

pub const MOVE_SPEED: f32 = 50.0;
/// Radians turned per elapsed millisecond.
pub const TURN_SPEED: f32 = 0.001;
pub const ZOOM_SPEED: f32 = 6.0;
pub const ZOOM_MIN: f32 = -200.0;
pub const ZOOM_MAX: f32 = -10.0;

/// Perspective view volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub near: f32,
    pub far: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect_ratio: f32,
}

/// First-person camera driven by polled input.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    direction: Vec3,
    world_up: Vec3,
    projection: Mat4,
    zoom: f32,
}

impl Camera {
    pub fn new(position: Vec3, direction: Vec3, world_up: Vec3, frustum: Frustum) -> Self {
        let projection = Mat4::perspective_lh(
            frustum.fov_y,
            frustum.aspect_ratio,
            frustum.near,
            frustum.far,
        );
        Self {
            position,
            direction: direction.normalize(),
            world_up,
            projection,
            zoom: ZOOM_MAX,
        }
    }

    /// Applies one frame of movement and turning.
    pub fn update(&mut self, elapsed: Duration, input: &InputState) {
        let seconds = elapsed.as_secs_f32();
        let step = MOVE_SPEED * seconds;

        if input.is_active(Action::StrafeLeft) {
            self.position -= self.right() * step;
        } else if input.is_active(Action::StrafeRight) {
            self.position += self.right() * step;
        }

        if input.is_active(Action::MoveForward) {
            self.position += self.walk_direction() * step;
        } else if input.is_active(Action::MoveBack) {
            self.position -= self.walk_direction() * step;
        }

        let turn = seconds * 1000.0 * TURN_SPEED;
        if input.is_active(Action::TurnLeft) {
            self.turn_horizontal(-turn);
        } else if input.is_active(Action::TurnRight) {
            self.turn_horizontal(turn);
        }

        if input.scroll() != 0.0 {
            self.zoom(input.scroll());
        }
    }

    /// Rotates the view direction about the camera's up axis.
    pub fn turn_horizontal(&mut self, angle: f32) {
        let up = self.direction.cross(self.right()).normalize();
        self.direction = (Quat::from_axis_angle(up, angle) * self.direction).normalize();
    }

    /// Tilts the view direction about the camera's right axis.
    pub fn turn_vertical(&mut self, angle: f32) {
        let right = self.right();
        self.direction = (Quat::from_axis_angle(right, angle) * self.direction).normalize();
    }

    /// Moves along the view direction by `steps × ZOOM_SPEED`, keeping the
    /// accumulated zoom inside `[ZOOM_MIN, ZOOM_MAX]`.
    pub fn zoom(&mut self, steps: f32) {
        let target = (self.zoom + steps * ZOOM_SPEED).clamp(ZOOM_MIN, ZOOM_MAX);
        let delta = target - self.zoom;
        self.position += self.direction * delta;
        self.zoom = target;
    }

    pub fn zoom_level(&self) -> f32 {
        self.zoom
    }

    pub fn set_height(&mut self, height: f32) {
        self.position.y = height;
    }

    /// Rebuilt from the current position and direction on every call.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_lh(self.position, self.direction, self.world_up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn right(&self) -> Vec3 {
        self.world_up.cross(self.direction).normalize()
    }

    fn walk_direction(&self) -> Vec3 {
        (self.direction - self.direction.dot(self.world_up) * self.world_up).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(
            Vec3::new(-100.0, 50.0, -100.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::Y,
            Frustum {
                near: 1.0,
                far: 1000.0,
                fov_y: std::f32::consts::PI * 0.3,
                aspect_ratio: 16.0 / 9.0,
            },
        )
    }

    #[test]
    fn direction_is_normalized() {
        let camera = camera();
        assert!((camera.direction().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn walking_stays_level() {
        let mut camera = camera();
        let input = InputState::with_actions([Action::MoveForward]);
        camera.update(Duration::from_secs(1), &input);
        let moved = camera.position() - Vec3::new(-100.0, 50.0, -100.0);
        assert!(moved.y.abs() < 1e-4);
        assert!((moved.length() - MOVE_SPEED).abs() < 1e-3);
    }

    #[test]
    fn strafe_left_wins_over_right() {
        let mut camera = camera();
        let input = InputState::with_actions([Action::StrafeLeft, Action::StrafeRight]);
        let right = camera.right();
        camera.update(Duration::from_millis(500), &input);
        let moved = camera.position() - Vec3::new(-100.0, 50.0, -100.0);
        assert!(moved.dot(right) < 0.0);
    }

    #[test]
    fn turning_keeps_unit_direction() {
        let mut camera = camera();
        let before = camera.direction();
        let input = InputState::with_actions([Action::TurnRight]);
        for _ in 0..10 {
            camera.update(Duration::from_millis(16), &input);
        }
        camera.turn_vertical(0.2);
        assert!((camera.direction().length() - 1.0).abs() < 1e-5);
        assert!(camera.direction().dot(before) < 1.0 - 1e-4);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = camera();
        let start = camera.position();
        camera.zoom(1.0);
        assert_eq!(camera.zoom_level(), ZOOM_MAX);
        assert_eq!(camera.position(), start);
        camera.zoom(-1000.0);
        assert_eq!(camera.zoom_level(), ZOOM_MIN);
        let travelled = (camera.position() - start).length();
        assert!((travelled - (ZOOM_MAX - ZOOM_MIN)).abs() < 1e-3);
    }

    #[test]
    fn view_matrix_places_eye_at_origin() {
        let camera = camera();
        let eye = camera.view_matrix().transform_point3(camera.position());
        assert!(eye.length() < 1e-4);
        let ahead = camera
            .view_matrix()
            .transform_point3(camera.position() + camera.direction() * 10.0);
        assert!((ahead.z - 10.0).abs() < 1e-3);
    }

    #[test]
    fn projection_is_fixed_after_construction() {
        let mut camera = camera();
        let projection = camera.projection_matrix();
        camera.update(
            Duration::from_millis(100),
            &InputState::with_actions([Action::MoveBack, Action::TurnLeft]),
        );
        assert_eq!(projection, camera.projection_matrix());
    }
}
