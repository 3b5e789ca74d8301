//! Real-time shadow mapping demo built on wgpu.
//!
//! A textured mesh drifts above a floor while a static directional light
//! renders it into one of several depth targets. The floor samples the
//! active target with point or percentage-closer filtering. Everything
//! except the [`render`] module is plain CPU code and can be exercised
//! without a GPU; [`shadow::DepthMap`] and [`shadow::ShadowSampler`] mirror
//! the GPU passes for headless inspection.

pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod floor;
pub mod input;
pub mod light;
pub mod material;
pub mod obj;
pub mod object;
pub mod render;
pub mod report;
pub mod scene;
pub mod selection;
pub mod shadow;

pub use app::{FrameControl, Game};
pub use camera::{Camera, Frustum};
pub use config::SceneConfig;
pub use error::{ConfigError, CreationError, FrameError, SelectionError, ShadowPassError};
pub use input::{Action, InputState, KeyCode};
pub use light::{compute_ortho_projection, compute_view_matrix, LightParams, LightProjector};
pub use material::Material;
pub use obj::{load_obj_file, load_obj_from_str, MeshGroup, ObjModel};
pub use render::{DepthTarget, Renderer, ShadowPassState};
pub use scene::Scene;
pub use selection::{DepthMapConsumer, ShadowMapSelection, Viewport};
pub use shadow::{DepthMap, DepthSource, ShadowMode, ShadowSampler};
