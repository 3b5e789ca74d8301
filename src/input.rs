use std::collections::HashSet;

/// Physical keys bound to an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Escape,
    Character(char),
    Digit(u8),
    Function(u8),
}

/// Everything the per-frame update reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    MoveForward,
    MoveBack,
    StrafeLeft,
    StrafeRight,
    TurnLeft,
    TurnRight,
    SelectDepthMap(usize),
    PcfOff,
    PcfOn,
}

impl Action {
    /// Key bound to the action; depth map selection uses digits 1-9.
    pub fn key(self) -> Option<KeyCode> {
        Some(match self {
            Action::Quit => KeyCode::Escape,
            Action::MoveForward => KeyCode::Character('W'),
            Action::MoveBack => KeyCode::Character('S'),
            Action::StrafeLeft => KeyCode::Character('Q'),
            Action::StrafeRight => KeyCode::Character('E'),
            Action::TurnLeft => KeyCode::Character('A'),
            Action::TurnRight => KeyCode::Character('D'),
            Action::SelectDepthMap(index) if index < 9 => KeyCode::Digit(index as u8 + 1),
            Action::SelectDepthMap(_) => return None,
            Action::PcfOff => KeyCode::Function(1),
            Action::PcfOn => KeyCode::Function(2),
        })
    }
}

/// Snapshot of held keys plus wheel motion accumulated since the last frame.
///
/// Keys are polled: an action whose key stays down fires on every frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    scroll: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot with the given keys held.
    pub fn with_keys(keys: impl IntoIterator<Item = KeyCode>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            scroll: 0.0,
        }
    }

    /// Builds a snapshot with the keys of the given actions held.
    pub fn with_actions(actions: impl IntoIterator<Item = Action>) -> Self {
        Self::with_keys(actions.into_iter().filter_map(Action::key))
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn add_scroll(&mut self, lines: f32) {
        self.scroll += lines;
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_active(&self, action: Action) -> bool {
        action.key().is_some_and(|key| self.is_key_down(key))
    }

    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    /// Copies the held keys and drains the accumulated scroll.
    pub fn snapshot(&mut self) -> InputState {
        InputState {
            keys: self.keys.clone(),
            scroll: std::mem::take(&mut self.scroll),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_state_tracks_keys() {
        let mut state = InputState::new();
        state.set_key_down(KeyCode::Character('W'));
        assert!(state.is_active(Action::MoveForward));
        state.set_key_up(KeyCode::Character('W'));
        assert!(!state.is_active(Action::MoveForward));
    }

    #[test]
    fn depth_map_actions_use_digits() {
        assert_eq!(Action::SelectDepthMap(0).key(), Some(KeyCode::Digit(1)));
        assert_eq!(Action::SelectDepthMap(3).key(), Some(KeyCode::Digit(4)));
        assert_eq!(Action::SelectDepthMap(12).key(), None);
        let state = InputState::with_keys([KeyCode::Digit(3)]);
        assert!(state.is_active(Action::SelectDepthMap(2)));
    }

    #[test]
    fn snapshot_drains_scroll_but_keeps_keys() {
        let mut state = InputState::with_actions([Action::PcfOn]);
        state.add_scroll(1.5);
        state.add_scroll(-0.5);
        let frame = state.snapshot();
        assert_eq!(frame.scroll(), 1.0);
        assert!(frame.is_active(Action::PcfOn));
        assert_eq!(state.scroll(), 0.0);
        assert!(state.is_active(Action::PcfOn));
    }
}
