use log::info;

use crate::error::SelectionError;

/// Depth target resolutions used when the scene does not override them.
pub const DEFAULT_RESOLUTIONS: [u32; 4] = [256, 512, 1024, 2048];

/// Viewport covering a whole depth target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Anything that samples the active depth target and must follow a switch.
pub trait DepthMapConsumer {
    fn bind_depth_map(&mut self, index: usize);
}

/// Tracks which of the available depth targets is active.
///
/// Requests made during a frame are applied at the next frame boundary so a
/// target is never written and sampled by different selections within one
/// frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowMapSelection {
    resolutions: Vec<u32>,
    active: usize,
    pending: Option<usize>,
}

impl ShadowMapSelection {
    pub fn new(resolutions: Vec<u32>) -> Result<Self, SelectionError> {
        if resolutions.is_empty() {
            return Err(SelectionError::Empty);
        }
        Ok(Self {
            resolutions,
            active: 0,
            pending: None,
        })
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    pub fn resolutions(&self) -> &[u32] {
        &self.resolutions
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    pub fn resolution(&self) -> u32 {
        self.resolutions[self.active]
    }

    pub fn viewport(&self) -> Viewport {
        let size = self.resolution();
        Viewport {
            width: size,
            height: size,
        }
    }

    /// Queues a switch for the next frame boundary.
    pub fn request(&mut self, index: usize) -> Result<(), SelectionError> {
        self.check(index)?;
        self.pending = Some(index);
        Ok(())
    }

    /// Switches immediately and returns the new viewport.
    pub fn select(&mut self, index: usize) -> Result<Viewport, SelectionError> {
        self.check(index)?;
        self.active = index;
        self.pending = None;
        Ok(self.viewport())
    }

    /// Applies a queued switch and re-points the consumers at the new target.
    ///
    /// Returns the new viewport when the active target changed.
    pub fn begin_frame(&mut self, consumers: &mut [&mut dyn DepthMapConsumer]) -> Option<Viewport> {
        let index = self.pending.take()?;
        if index == self.active {
            return None;
        }
        self.active = index;
        for consumer in consumers.iter_mut() {
            consumer.bind_depth_map(index);
        }
        let viewport = self.viewport();
        info!(
            "depth target {} active ({}x{})",
            index + 1,
            viewport.width,
            viewport.height
        );
        Some(viewport)
    }

    fn check(&self, index: usize) -> Result<(), SelectionError> {
        if index < self.resolutions.len() {
            Ok(())
        } else {
            Err(SelectionError::IndexOutOfBounds {
                index,
                len: self.resolutions.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Binding {
        bound: Option<usize>,
        rebinds: usize,
    }

    impl DepthMapConsumer for Binding {
        fn bind_depth_map(&mut self, index: usize) {
            self.bound = Some(index);
            self.rebinds += 1;
        }
    }

    fn selection() -> ShadowMapSelection {
        ShadowMapSelection::new(DEFAULT_RESOLUTIONS.to_vec()).unwrap()
    }

    #[test]
    fn empty_selection_is_rejected() {
        assert_eq!(ShadowMapSelection::new(vec![]), Err(SelectionError::Empty));
    }

    #[test]
    fn selecting_third_target_rebinds_consumers() {
        let mut maps = selection();
        let mut floor = Binding::default();
        let mut overlay = Binding::default();
        maps.request(2).unwrap();
        assert_eq!(maps.viewport().width, 256);

        let viewport = maps.begin_frame(&mut [&mut floor, &mut overlay]);
        assert_eq!(
            viewport,
            Some(Viewport {
                width: 1024,
                height: 1024
            })
        );
        assert_eq!(maps.active(), 2);
        assert_eq!(floor.bound, Some(2));
        assert_eq!(overlay.bound, Some(2));
    }

    #[test]
    fn out_of_range_index_fails() {
        let mut maps = selection();
        assert_eq!(
            maps.request(4),
            Err(SelectionError::IndexOutOfBounds { index: 4, len: 4 })
        );
        assert_eq!(
            maps.select(9),
            Err(SelectionError::IndexOutOfBounds { index: 9, len: 4 })
        );
        assert_eq!(maps.active(), 0);
        assert_eq!(maps.pending(), None);
    }

    #[test]
    fn repeated_request_does_not_rebind() {
        let mut maps = selection();
        let mut floor = Binding::default();
        for _ in 0..3 {
            maps.request(1).unwrap();
            maps.begin_frame(&mut [&mut floor]);
        }
        assert_eq!(floor.rebinds, 1);
        assert_eq!(maps.resolution(), 512);
    }

    #[test]
    fn select_applies_immediately() {
        let mut maps = selection();
        maps.request(1).unwrap();
        let viewport = maps.select(3).unwrap();
        assert_eq!(viewport.width, 2048);
        assert_eq!(maps.pending(), None);
    }
}
