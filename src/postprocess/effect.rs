//! Lifecycle shared by every effect: load, unload, reload and resize.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::EffectError;
use crate::gpu::backend::{GpuBackend, GpuError};
use crate::gpu::program_loader::ProgramLoader;
use crate::gpu::texture::Resolution;

/// Constructor inputs shared by every effect: the program loader, the
/// directory holding the effect's shader files, and the render resolution.
#[derive(Debug, Clone)]
pub struct EffectBase {
    loader: Rc<ProgramLoader>,
    shader_dir: PathBuf,
    resolution: Resolution,
}

impl EffectBase {
    /// Bundle the shared inputs.
    pub fn new(
        loader: Rc<ProgramLoader>,
        shader_dir: impl Into<PathBuf>,
        resolution: Resolution,
    ) -> Self {
        Self {
            loader,
            shader_dir: shader_dir.into(),
            resolution,
        }
    }

    /// The shared program loader.
    #[must_use]
    pub fn loader(&self) -> &ProgramLoader {
        &self.loader
    }

    /// Directory holding the effect's shader files.
    #[must_use]
    pub fn shader_dir(&self) -> &Path {
        &self.shader_dir
    }

    /// Path of a shader file inside the shader directory.
    #[must_use]
    pub fn shader_path(&self, file: &str) -> PathBuf {
        self.shader_dir.join(file)
    }

    /// Render resolution owned textures are sized to.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Change the render resolution. Takes effect on the next load.
    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }
}

/// Lifecycle shared by every post-processing effect.
///
/// Unloaded → `load` → Ready → `unload` → Unloaded. `reload` and `resize`
/// keep an effect Ready. Effects never restore GPU state after rendering.
pub trait RenderEffect {
    /// Effect name, used in logs and frame-target labels.
    fn name(&self) -> &str;

    /// Shared constructor inputs.
    fn base(&self) -> &EffectBase;

    /// Mutable shared constructor inputs.
    fn base_mut(&mut self) -> &mut EffectBase;

    /// Compile programs and allocate resolution-sized resources. Loading an
    /// already loaded effect reloads it.
    ///
    /// # Errors
    ///
    /// Shader read/compose failures and GPU allocation failures. Anything
    /// created before the failure is released.
    fn load<G: GpuBackend>(&mut self, gpu: &mut G) -> Result<(), EffectError>;

    /// Release every GPU resource. Idempotent.
    fn unload<G: GpuBackend>(&mut self, gpu: &mut G);

    /// Whether `load` has completed since the last `unload`.
    fn is_loaded(&self) -> bool;

    /// `unload` followed by `load`.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    fn reload<G: GpuBackend>(&mut self, gpu: &mut G) -> Result<(), EffectError> {
        log::info!("reloading effect '{}'", self.name());
        self.unload(gpu);
        self.load(gpu)
    }

    /// Current render resolution.
    fn resolution(&self) -> Resolution {
        self.base().resolution()
    }

    /// Change the render resolution, reloading if the effect is loaded and
    /// the resolution differs.
    ///
    /// # Errors
    ///
    /// [`GpuError::InvalidDescriptor`] for an empty resolution, otherwise
    /// the errors of [`reload`](Self::reload).
    fn resize<G: GpuBackend>(
        &mut self,
        gpu: &mut G,
        resolution: Resolution,
    ) -> Result<(), EffectError> {
        if resolution.is_empty() {
            return Err(GpuError::InvalidDescriptor(format!(
                "cannot resize '{}' to {}x{}",
                self.name(),
                resolution.width,
                resolution.height
            ))
            .into());
        }
        if resolution == self.resolution() {
            return Ok(());
        }
        self.base_mut().set_resolution(resolution);
        if self.is_loaded() {
            self.reload(gpu)?;
        }
        Ok(())
    }
}
