//! Crate-level error types.

use std::fmt;
use std::path::PathBuf;

use crate::gpu::render_context::RenderContextError;
use crate::gpu::GpuError;

/// Errors produced by the motionfx crate.
#[derive(Debug)]
pub enum EffectError {
    /// A GPU-layer call failed (allocation, binding, or draw).
    Gpu(GpuError),
    /// GPU context initialization failure.
    Context(RenderContextError),
    /// `render` or an output accessor was called before `load`.
    NotLoaded,
    /// A shader source file could not be read.
    ShaderRead {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// A shader source failed WGSL composition or validation.
    ShaderCompose {
        /// Path (or virtual path) of the shader being composed.
        path: PathBuf,
        /// Composer diagnostic.
        message: String,
    },
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
}

impl fmt::Display for EffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::Context(e) => write!(f, "GPU context error: {e}"),
            Self::NotLoaded => {
                write!(f, "effect used before load() completed")
            }
            Self::ShaderRead { path, source } => {
                write!(f, "failed to read shader '{}': {source}", path.display())
            }
            Self::ShaderCompose { path, message } => {
                write!(f, "failed to compose shader '{}': {message}", path.display())
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
        }
    }
}

impl std::error::Error for EffectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::Context(e) => Some(e),
            Self::ShaderRead { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for EffectError {
    fn from(e: GpuError) -> Self {
        Self::Gpu(e)
    }
}

impl From<RenderContextError> for EffectError {
    fn from(e: RenderContextError) -> Self {
        Self::Context(e)
    }
}

impl From<std::io::Error> for EffectError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
