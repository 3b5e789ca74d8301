use thiserror::Error;

use crate::render::ShadowPassState;

/// A GPU resource the device refused to create.
#[derive(Debug, Error)]
pub enum CreationError {
    #[error("failed to create {width}x{height} depth target: {message}")]
    DepthTarget {
        width: u32,
        height: u32,
        message: String,
    },
    #[error("failed to create texture {label}: {message}")]
    Texture { label: String, message: String },
    #[error("shader {label} failed to compile:\n{diagnostics}")]
    Shader { label: String, diagnostics: String },
}

/// Invalid change of the active depth target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("depth target index {index} is out of bounds (have {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("at least one depth target resolution is required")]
    Empty,
}

/// Misuse of the shadow pass state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShadowPassError {
    #[error("shadow pass must be bound before {0}")]
    NotBound(&'static str),
    #[error("invalid shadow pass transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ShadowPassState,
        to: ShadowPassState,
    },
}

/// Scene configuration value outside its valid range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure while producing a single frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("surface unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    ShadowPass(#[from] ShadowPassError),
}
