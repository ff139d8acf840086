//! Framework-agnostic texture abstraction.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::gpu::backend::{GpuBackend, GpuError, TextureId};
use crate::gpu::program::SamplerHandle;

/// Render resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Create a resolution.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` if either dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width and height as a vector.
    #[must_use]
    pub const fn as_uvec2(&self) -> glam::UVec2 {
        glam::UVec2::new(self.width, self.height)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Texture target kind. Effects only work with plain 2D images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    /// Single 2D image.
    #[default]
    D2,
}

/// Storage format. Combines the internal format and the pixel format/type
/// pair of an immediate-mode API into one value.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    /// Four-channel half float (HDR color).
    #[default]
    Rgba16Float,
    /// Four-channel full float.
    Rgba32Float,
    /// Four-channel normalized byte.
    Rgba8Unorm,
    /// Two-channel half float (velocity).
    Rg16Float,
    /// Single-channel half float.
    R16Float,
    /// Single-channel full float (linear depth).
    R32Float,
    /// Depth buffer.
    Depth32Float,
}

impl TextureFormat {
    /// The matching wgpu format.
    #[must_use]
    pub const fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            Self::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            Self::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            Self::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            Self::Rg16Float => wgpu::TextureFormat::Rg16Float,
            Self::R16Float => wgpu::TextureFormat::R16Float,
            Self::R32Float => wgpu::TextureFormat::R32Float,
            Self::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }

    /// Whether linear filtering is available without optional device
    /// features.
    #[must_use]
    pub const fn is_filterable(self) -> bool {
        !matches!(self, Self::Rgba32Float | Self::R32Float | Self::Depth32Float)
    }

    /// Whether this is a depth format.
    #[must_use]
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }

    /// Size of one texel in bytes.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba32Float => 16,
            Self::Rgba16Float => 8,
            Self::Rgba8Unorm
            | Self::Rg16Float
            | Self::R32Float
            | Self::Depth32Float => 4,
            Self::R16Float => 2,
        }
    }
}

impl TryFrom<wgpu::TextureFormat> for TextureFormat {
    type Error = GpuError;

    fn try_from(format: wgpu::TextureFormat) -> Result<Self, Self::Error> {
        match format {
            wgpu::TextureFormat::Rgba16Float => Ok(Self::Rgba16Float),
            wgpu::TextureFormat::Rgba32Float => Ok(Self::Rgba32Float),
            wgpu::TextureFormat::Rgba8Unorm => Ok(Self::Rgba8Unorm),
            wgpu::TextureFormat::Rg16Float => Ok(Self::Rg16Float),
            wgpu::TextureFormat::R16Float => Ok(Self::R16Float),
            wgpu::TextureFormat::R32Float => Ok(Self::R32Float),
            wgpu::TextureFormat::Depth32Float => Ok(Self::Depth32Float),
            other => Err(GpuError::UnsupportedFormat(format!("{other:?}"))),
        }
    }
}

/// Minification / magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Bilinear.
    #[default]
    Linear,
}

impl FilterMode {
    /// The matching wgpu filter.
    #[must_use]
    pub const fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            Self::Nearest => wgpu::FilterMode::Nearest,
            Self::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Tile.
    Repeat,
    /// Tile with mirroring.
    MirrorRepeat,
}

impl WrapMode {
    /// The matching wgpu address mode.
    #[must_use]
    pub const fn to_wgpu(self) -> wgpu::AddressMode {
        match self {
            Self::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            Self::Repeat => wgpu::AddressMode::Repeat,
            Self::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

/// Everything needed to allocate a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    /// Debug label.
    pub label: String,
    /// Target kind.
    pub kind: TextureKind,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of mip levels (at least 1).
    pub mip_levels: u32,
    /// Storage format.
    pub format: TextureFormat,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Wrap mode on both axes.
    pub wrap: WrapMode,
}

impl TextureDescriptor {
    /// A single-mip 2D color target with linear filtering and edge clamping.
    #[must_use]
    pub fn color_target(
        label: &str,
        resolution: Resolution,
        format: TextureFormat,
    ) -> Self {
        Self {
            label: label.to_owned(),
            kind: TextureKind::D2,
            width: resolution.width,
            height: resolution.height,
            mip_levels: 1,
            format,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            wrap: WrapMode::ClampToEdge,
        }
    }

    /// Width and height.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Check the descriptor against a maximum 2D dimension.
    ///
    /// # Errors
    ///
    /// [`GpuError::InvalidDescriptor`] for zero or oversized dimensions and
    /// for mip counts the size cannot hold.
    pub fn validate(&self, max_dimension: u32) -> Result<(), GpuError> {
        if self.resolution().is_empty() {
            return Err(GpuError::InvalidDescriptor(format!(
                "'{}' has zero size {}x{}",
                self.label, self.width, self.height
            )));
        }
        if self.width > max_dimension || self.height > max_dimension {
            return Err(GpuError::InvalidDescriptor(format!(
                "'{}' is {}x{}, limit is {max_dimension}",
                self.label, self.width, self.height
            )));
        }
        let max_mips = 32 - self.width.max(self.height).leading_zeros();
        if self.mip_levels == 0 || self.mip_levels > max_mips {
            return Err(GpuError::InvalidDescriptor(format!(
                "'{}' requests {} mip levels, {max_mips} possible",
                self.label, self.mip_levels
            )));
        }
        Ok(())
    }
}

/// A texture allocated on a [`GpuBackend`].
///
/// Creation allocates; [`release`](Self::release) consumes the handle, so a
/// released texture cannot be bound again.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    desc: TextureDescriptor,
}

impl Texture {
    /// Allocate a texture on `gpu`.
    ///
    /// # Errors
    ///
    /// Propagates the backend's allocation failure.
    pub fn create<G: GpuBackend>(
        gpu: &mut G,
        desc: TextureDescriptor,
    ) -> Result<Self, GpuError> {
        let id = gpu.create_texture(&desc)?;
        log::debug!(
            "allocated texture '{}' {}x{} {:?}",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        Ok(Self { id, desc })
    }

    /// Wrap an id the backend already allocated for `desc`.
    pub(crate) const fn from_parts(id: TextureId, desc: TextureDescriptor) -> Self {
        Self { id, desc }
    }

    /// Backend handle.
    #[must_use]
    pub const fn id(&self) -> TextureId {
        self.id
    }

    /// The descriptor this texture was created from.
    #[must_use]
    pub const fn descriptor(&self) -> &TextureDescriptor {
        &self.desc
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.desc.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.desc.height
    }

    /// Width and height.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.desc.resolution()
    }

    /// Storage format.
    #[must_use]
    pub const fn format(&self) -> TextureFormat {
        self.desc.format
    }

    /// Bind to texture unit `slot` and route `sampler` to it.
    ///
    /// # Errors
    ///
    /// Propagates the backend's binding failure.
    pub fn bind<G: GpuBackend>(
        &self,
        gpu: &mut G,
        sampler: SamplerHandle,
        slot: u32,
    ) -> Result<(), GpuError> {
        gpu.bind_texture(self.id, sampler, slot)
    }

    /// Free the GPU allocation.
    pub fn release<G: GpuBackend>(self, gpu: &mut G) {
        log::debug!("releasing texture '{}'", self.desc.label);
        gpu.release_texture(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_target_defaults() {
        let desc = TextureDescriptor::color_target(
            "Output",
            Resolution::new(1920, 1080),
            TextureFormat::Rgba16Float,
        );
        assert_eq!(desc.kind, TextureKind::D2);
        assert_eq!(desc.mip_levels, 1);
        assert_eq!(desc.min_filter, FilterMode::Linear);
        assert_eq!(desc.mag_filter, FilterMode::Linear);
        assert_eq!(desc.wrap, WrapMode::ClampToEdge);
        assert_eq!(desc.resolution(), Resolution::new(1920, 1080));
    }

    #[test]
    fn validate_rejects_empty_and_oversized() {
        let mut desc = TextureDescriptor::color_target(
            "T",
            Resolution::new(0, 16),
            TextureFormat::R16Float,
        );
        assert!(desc.validate(8192).is_err());
        desc.width = 9000;
        assert!(desc.validate(8192).is_err());
        desc.width = 16;
        assert!(desc.validate(8192).is_ok());
        desc.mip_levels = 6;
        assert!(desc.validate(8192).is_err());
        desc.mip_levels = 5;
        assert!(desc.validate(8192).is_ok());
    }

    #[test]
    fn format_properties() {
        assert!(TextureFormat::Rgba16Float.is_filterable());
        assert!(!TextureFormat::R32Float.is_filterable());
        assert!(TextureFormat::Depth32Float.is_depth());
        assert_eq!(TextureFormat::Rgba16Float.bytes_per_pixel(), 8);
        assert_eq!(
            TextureFormat::try_from(wgpu::TextureFormat::Rg16Float),
            Ok(TextureFormat::Rg16Float)
        );
        assert!(TextureFormat::try_from(wgpu::TextureFormat::Bgra8Unorm).is_err());
    }
}
