use crate::gpu::backend::{GpuBackend, GpuError};

/// Full-viewport drawable.
///
/// Draws one oversized triangle (three vertices generated in the vertex
/// stage, no vertex buffer) so every pixel of the viewport runs the active
/// program's fragment stage exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenQuad;

impl ScreenQuad {
    /// Create the drawable.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Issue one fullscreen draw with the backend's current state.
    ///
    /// # Errors
    ///
    /// Propagates the backend's draw validation failure.
    pub fn render<G: GpuBackend>(&self, gpu: &mut G) -> Result<(), GpuError> {
        gpu.draw_fullscreen()
    }
}
