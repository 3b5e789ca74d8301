use std::time::Duration;

use log::debug;

use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::error::ConfigError;
use crate::input::{Action, InputState};
use crate::scene::Scene;

/// How often the overlay text is rebuilt.
pub const OVERLAY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Quit,
}

/// Counts frames and reports the rate once per interval.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    frames: u32,
    elapsed: Duration,
}

impl FrameStats {
    /// Records one frame; returns frames per second when an interval closes.
    pub fn tick(&mut self, elapsed: Duration) -> Option<f32> {
        self.frames += 1;
        self.elapsed += elapsed;
        if self.elapsed < OVERLAY_INTERVAL {
            return None;
        }
        let fps = self.frames as f32 / self.elapsed.as_secs_f32();
        self.frames = 0;
        self.elapsed = Duration::ZERO;
        Some(fps)
    }
}

/// Per-frame driver: input, camera, scene, then the overlay text.
#[derive(Debug, Clone)]
pub struct Game {
    scene: Scene,
    camera: Camera,
    stats: FrameStats,
    overlay: String,
}

impl Game {
    pub fn new(config: &SceneConfig, aspect_ratio: f32) -> Result<Self, ConfigError> {
        let scene = Scene::new(config)?;
        let camera_config = &config.camera;
        let camera = Camera::new(
            camera_config.position,
            camera_config.direction,
            camera_config.up,
            config.frustum(aspect_ratio),
        );
        let overlay = overlay_text(&scene, 0.0);
        Ok(Self {
            scene,
            camera,
            stats: FrameStats::default(),
            overlay,
        })
    }

    /// Quit is checked before anything else moves.
    pub fn update(&mut self, elapsed: Duration, input: &InputState) -> FrameControl {
        if input.is_active(Action::Quit) {
            return FrameControl::Quit;
        }
        self.camera.update(elapsed, input);
        self.scene.update(elapsed, input);
        if let Some(fps) = self.stats.tick(elapsed) {
            self.overlay = overlay_text(&self.scene, fps);
            debug!("{}", self.overlay);
        }
        FrameControl::Continue
    }

    pub fn overlay(&self) -> &str {
        &self.overlay
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Split borrow for the renderer, which applies selection switches.
    pub fn frame_parts(&mut self) -> (&mut Scene, &Camera) {
        (&mut self.scene, &self.camera)
    }
}

fn overlay_text(scene: &Scene, fps: f32) -> String {
    format!("{} | FPS: {fps:.0}", scene.info_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyCode;

    fn game() -> Game {
        Game::new(&SceneConfig::default(), 16.0 / 9.0).unwrap()
    }

    #[test]
    fn quit_stops_before_update() {
        let mut game = game();
        let start = game.scene().object().position();
        let input = InputState::with_keys([KeyCode::Escape, KeyCode::Digit(2)]);
        assert_eq!(game.update(Duration::from_millis(16), &input), FrameControl::Quit);
        assert_eq!(game.scene().object().position(), start);
        assert_eq!(game.scene().selection().pending(), None);
    }

    #[test]
    fn overlay_refreshes_once_per_second() {
        let mut game = game();
        assert_eq!(game.overlay(), "Depth texture 1: 256x256, PCF: OFF | FPS: 0");

        let pcf = InputState::with_actions([Action::PcfOn]);
        for _ in 0..49 {
            game.update(Duration::from_millis(20), &pcf);
        }
        assert!(game.overlay().contains("PCF: OFF"));

        game.update(Duration::from_millis(20), &pcf);
        assert_eq!(game.overlay(), "Depth texture 1: 256x256, PCF: ON | FPS: 50");
    }

    #[test]
    fn frame_stats_average_over_interval() {
        let mut stats = FrameStats::default();
        assert_eq!(stats.tick(Duration::from_millis(500)), None);
        let fps = stats.tick(Duration::from_millis(500)).unwrap();
        assert!((fps - 2.0).abs() < 1e-5);
        assert_eq!(stats.tick(Duration::from_millis(10)), None);
    }

    #[test]
    fn camera_moves_with_input() {
        let mut game = game();
        let start = game.camera().position();
        game.update(
            Duration::from_secs(1),
            &InputState::with_actions([Action::MoveForward]),
        );
        assert!(game.camera().position() != start);
    }
}
