//! Frame-rate scaler fed to velocity-based effects.

use crate::options::MotionBlurOptions;
use crate::util::frame_timing::FrameTime;

/// Derives the `fps_scaler` uniform from the frame time.
///
/// In fixed-timestep mode the value is always the reference rate. Otherwise
/// it is the measured frame rate clamped to `[min_fps, max_fps]`; a
/// non-finite or non-positive frame time falls back to the reference rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsScaler {
    fixed_timestep: bool,
    reference_fps: f32,
    min_fps: f32,
    max_fps: f32,
}

impl Default for FpsScaler {
    fn default() -> Self {
        Self::from_options(&MotionBlurOptions::default())
    }
}

impl FpsScaler {
    /// Scaler configured from motion blur options. A reversed clamp range is
    /// reordered.
    #[must_use]
    pub fn from_options(options: &MotionBlurOptions) -> Self {
        Self {
            fixed_timestep: options.fixed_timestep,
            reference_fps: options.reference_fps,
            min_fps: options.min_fps.min(options.max_fps),
            max_fps: options.max_fps.max(options.min_fps),
        }
    }

    /// Scaler that always yields `reference_fps`.
    #[must_use]
    pub const fn fixed(reference_fps: f32) -> Self {
        Self {
            fixed_timestep: true,
            reference_fps,
            min_fps: reference_fps,
            max_fps: reference_fps,
        }
    }

    /// Whether the value ignores frame time.
    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        self.fixed_timestep
    }

    /// Rate the velocity buffer is authored against. Shaders divide the
    /// uniform value by this to get the velocity scale.
    #[must_use]
    pub const fn reference_fps(&self) -> f32 {
        self.reference_fps
    }

    /// Uniform value for a frame.
    #[must_use]
    pub fn value(&self, frame: FrameTime) -> f32 {
        if self.fixed_timestep {
            return self.reference_fps;
        }
        frame
            .fps()
            .map_or(self.reference_fps, |fps| fps.max(self.min_fps).min(self.max_fps))
    }
}
