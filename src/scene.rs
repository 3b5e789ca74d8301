use std::time::Duration;

use log::{info, warn};

use crate::config::SceneConfig;
use crate::error::ConfigError;
use crate::floor::FloorGeometry;
use crate::input::{Action, InputState};
use crate::light::LightProjector;
use crate::object::MovingObject;
use crate::selection::ShadowMapSelection;
use crate::shadow::{ShadowMode, ShadowSampler};

/// Number of depth targets reachable from the keyboard.
pub const SELECTABLE_TARGETS: usize = 4;

/// CPU side of the demo: light, active depth target, sampling mode and the
/// animated object.
#[derive(Debug, Clone)]
pub struct Scene {
    light: LightProjector,
    selection: ShadowMapSelection,
    sampler: ShadowSampler,
    draw_light: bool,
    object: MovingObject,
    floor: FloorGeometry,
}

impl Scene {
    pub fn new(config: &SceneConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let selection = ShadowMapSelection::new(config.shadow.resolutions.clone())
            .map_err(|err| ConfigError::new("shadow resolutions", err.to_string()))?;
        let object = &config.object;
        Ok(Self {
            light: LightProjector::new(config.light),
            selection,
            sampler: ShadowSampler::new(ShadowMode::from_pcf(config.shadow.pcf), config.shadow.bias),
            draw_light: config.shadow.pcf,
            object: MovingObject::new(object.position, object.heading, object.speed),
            floor: config.floor.geometry,
        })
    }

    /// Applies this frame's held keys and advances the object.
    ///
    /// Only the first held key among the selection and PCF keys acts.
    pub fn update(&mut self, elapsed: Duration, input: &InputState) {
        let selected = (0..SELECTABLE_TARGETS)
            .map(Action::SelectDepthMap)
            .find(|&action| input.is_active(action));

        if let Some(Action::SelectDepthMap(index)) = selected {
            if let Err(err) = self.selection.request(index) {
                warn!("ignoring depth target key: {err}");
            }
        } else if input.is_active(Action::PcfOff) {
            self.set_pcf(false);
        } else if input.is_active(Action::PcfOn) {
            self.set_pcf(true);
        }

        self.object.update(elapsed.as_secs_f32());
    }

    /// Switches the sampling mode; mesh lighting follows the same switch.
    pub fn set_pcf(&mut self, enabled: bool) {
        if self.sampler.mode.is_pcf() != enabled {
            info!("PCF {}", if enabled { "enabled" } else { "disabled" });
        }
        self.sampler.mode = ShadowMode::from_pcf(enabled);
        self.draw_light = enabled;
    }

    pub fn pcf_enabled(&self) -> bool {
        self.sampler.mode.is_pcf()
    }

    pub fn draw_light(&self) -> bool {
        self.draw_light
    }

    pub fn light(&self) -> &LightProjector {
        &self.light
    }

    pub fn selection(&self) -> &ShadowMapSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut ShadowMapSelection {
        &mut self.selection
    }

    pub fn sampler(&self) -> ShadowSampler {
        self.sampler
    }

    pub fn object(&self) -> &MovingObject {
        &self.object
    }

    pub fn floor(&self) -> &FloorGeometry {
        &self.floor
    }

    /// Overlay text for the active depth target and sampling mode.
    pub fn info_string(&self) -> String {
        let viewport = self.selection.viewport();
        format!(
            "Depth texture {}: {}x{}, PCF: {}",
            self.selection.active() + 1,
            viewport.width,
            viewport.height,
            if self.pcf_enabled() { "ON" } else { "OFF" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyCode;

    fn scene() -> Scene {
        Scene::new(&SceneConfig::default()).unwrap()
    }

    #[test]
    fn starts_on_first_target_without_pcf() {
        let scene = scene();
        assert_eq!(scene.selection().active(), 0);
        assert!(!scene.pcf_enabled());
        assert_eq!(scene.info_string(), "Depth texture 1: 256x256, PCF: OFF");
    }

    #[test]
    fn digit_key_queues_switch_for_next_frame() {
        let mut scene = scene();
        let input = InputState::with_keys([KeyCode::Digit(3)]);
        scene.update(Duration::from_millis(16), &input);
        assert_eq!(scene.selection().active(), 0);
        assert_eq!(scene.selection().pending(), Some(2));

        scene.selection_mut().begin_frame(&mut []);
        assert_eq!(scene.info_string(), "Depth texture 3: 1024x1024, PCF: OFF");
    }

    #[test]
    fn pcf_keys_toggle_sampling_and_lighting() {
        let mut scene = scene();
        scene.update(Duration::ZERO, &InputState::with_actions([Action::PcfOn]));
        assert!(scene.pcf_enabled());
        assert!(scene.draw_light());
        scene.update(Duration::ZERO, &InputState::with_actions([Action::PcfOff]));
        assert!(!scene.pcf_enabled());
        assert!(!scene.draw_light());
    }

    #[test]
    fn first_held_key_wins() {
        let mut scene = scene();
        let input = InputState::with_keys([KeyCode::Digit(2), KeyCode::Function(2)]);
        scene.update(Duration::ZERO, &input);
        assert_eq!(scene.selection().pending(), Some(1));
        assert!(!scene.pcf_enabled());
    }

    #[test]
    fn missing_target_key_is_ignored() {
        let config = SceneConfig {
            shadow: crate::config::ShadowConfig {
                resolutions: vec![128, 256],
                ..SceneConfig::default().shadow
            },
            ..SceneConfig::default()
        };
        let mut scene = Scene::new(&config).unwrap();
        scene.update(Duration::ZERO, &InputState::with_keys([KeyCode::Digit(4)]));
        assert_eq!(scene.selection().pending(), None);
    }

    #[test]
    fn update_moves_object() {
        let mut scene = scene();
        let start = scene.object().position();
        scene.update(
            Duration::from_millis(100),
            &InputState::with_keys([KeyCode::Character('X')]),
        );
        assert!((scene.object().position() - start).length() > 4.9);
    }
}
