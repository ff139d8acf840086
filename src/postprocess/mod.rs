//! Post-processing effects.
//!
//! Every effect implements [`RenderEffect`] for its lifecycle and exposes an
//! effect-specific `render` that issues its passes on a
//! [`GpuBackend`](crate::gpu::GpuBackend). Provides a three-pass ping-pong
//! motion blur.

pub mod effect;
pub mod fps_scaler;
pub mod motion_blur;

pub use effect::{EffectBase, RenderEffect};
pub use fps_scaler::FpsScaler;
pub use motion_blur::{MotionBlur, MotionBlurInputs};
