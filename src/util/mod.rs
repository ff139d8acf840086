//! Shared utilities.
//!
//! Frame timing for hosts that drive effects from a render loop.

pub mod frame_timing;

pub use frame_timing::{FrameTime, FrameTiming};
