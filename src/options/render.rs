use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Host-side rendering parameters used by the `motionfx` binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Render", inline)]
#[serde(default)]
pub struct RenderOptions {
    /// Render width in pixels.
    #[schemars(title = "Width", range(min = 1, max = 8192))]
    pub width: u32,
    /// Render height in pixels.
    #[schemars(title = "Height", range(min = 1, max = 8192))]
    pub height: u32,
    /// Number of frames to render before exiting.
    #[schemars(title = "Frames", range(min = 1, max = 10000))]
    pub frames: u32,
    /// Directory holding the screen-space shaders. Defaults to the bundled
    /// `assets/shaders/screen`.
    #[schemars(skip)]
    pub shader_dir: Option<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frames: 120,
            shader_dir: None,
        }
    }
}
