use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::gpu::texture::TextureFormat;

/// Motion blur parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Motion Blur", inline)]
#[serde(default)]
pub struct MotionBlurOptions {
    /// Write `reference_fps` as the frame-rate scaler every frame instead of
    /// deriving it from the measured frame time.
    #[schemars(title = "Fixed Timestep")]
    pub fixed_timestep: bool,
    /// Frame rate the velocity buffer is authored against.
    #[schemars(title = "Reference FPS", range(min = 24.0, max = 240.0), extend("step" = 1.0))]
    pub reference_fps: f32,
    /// Lower clamp for the measured frame rate.
    #[schemars(title = "Min FPS", range(min = 1.0, max = 120.0), extend("step" = 1.0))]
    pub min_fps: f32,
    /// Upper clamp for the measured frame rate.
    #[schemars(title = "Max FPS", range(min = 30.0, max = 1000.0), extend("step" = 10.0))]
    pub max_fps: f32,
    /// Storage format of the ping-pong textures.
    #[schemars(skip)]
    pub output_format: TextureFormat,
}

impl Default for MotionBlurOptions {
    fn default() -> Self {
        Self {
            fixed_timestep: true,
            reference_fps: 60.0,
            min_fps: 10.0,
            max_fps: 240.0,
            output_format: TextureFormat::Rgba16Float,
        }
    }
}
