use std::fmt;

use crate::gpu::frame_target::Attachment;
use crate::gpu::program::{ProgramLayout, SamplerHandle, UniformLocation};
use crate::gpu::texture::{Resolution, TextureDescriptor};

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Wrap a backend-assigned raw id.
            #[must_use]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// The backend-assigned raw id.
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

resource_id!(
    /// Handle to a texture owned by a [`GpuBackend`].
    TextureId
);
resource_id!(
    /// Handle to a compiled shading program owned by a [`GpuBackend`].
    ProgramId
);
resource_id!(
    /// Handle to an off-screen frame target owned by a [`GpuBackend`].
    FrameTargetId
);

/// Pixel rectangle that fullscreen draws are mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Viewport covering an entire surface of the given resolution.
    #[must_use]
    pub const fn covering(resolution: Resolution) -> Self {
        Self {
            x: 0,
            y: 0,
            width: resolution.width,
            height: resolution.height,
        }
    }

    /// Whether the viewport lies entirely inside `resolution`.
    #[must_use]
    pub fn fits_within(&self, resolution: Resolution) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(resolution.width)
            && u64::from(self.y) + u64::from(self.height)
                <= u64::from(resolution.height)
    }
}

/// Errors reported by the GPU layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuError {
    /// The texture id is unknown or was released.
    UnknownTexture(TextureId),
    /// The program id is unknown or was released.
    UnknownProgram(ProgramId),
    /// The frame target id is unknown or was released.
    UnknownFrameTarget(FrameTargetId),
    /// The texture descriptor cannot be allocated.
    InvalidDescriptor(String),
    /// A format the backend cannot represent.
    UnsupportedFormat(String),
    /// The shader module lacks a required entry point.
    MissingEntryPoint(&'static str),
    /// A program asked for more sampler inputs than the backend supports.
    SamplerCapacity {
        /// Requested sampler count.
        requested: u32,
        /// Supported maximum.
        max: u32,
    },
    /// A program registered more uniforms than its uniform block holds.
    UniformCapacity {
        /// Requested uniform count.
        requested: usize,
        /// Supported maximum.
        max: usize,
    },
    /// Uniform name not registered on the program.
    UnknownUniform(String),
    /// Sampler index beyond the program's enabled sampler count.
    SamplerOutOfRange {
        /// Requested sampler index.
        index: u32,
        /// Number of enabled samplers.
        count: u32,
    },
    /// Texture unit beyond the backend's unit count.
    SlotOutOfRange {
        /// Requested slot.
        slot: u32,
        /// Number of texture units.
        max: u32,
    },
    /// Uniform or sampler handle belongs to a program that is not active.
    ProgramNotActive(ProgramId),
    /// A draw was issued with no active program.
    NoActiveProgram,
    /// A draw was issued with no bound frame target.
    NoFrameTarget,
    /// Draw buffers were selected on a frame target that is not bound.
    FrameTargetNotBound(FrameTargetId),
    /// A draw-buffer selection was empty.
    EmptyDrawBuffers,
    /// The bound frame target has no texture at this attachment.
    MissingAttachment(Attachment),
    /// A texture cannot be used as a color attachment.
    InvalidAttachment(TextureId),
    /// Active attachments have different dimensions.
    AttachmentSizeMismatch,
    /// A draw was issued before any viewport was set.
    NoViewport,
    /// The viewport extends past the active attachments.
    ViewportOutOfBounds(Viewport),
    /// A sampler input of the active program has no texture bound.
    UnboundSampler(u32),
    /// A texture is sampled while also being written by the draw.
    FeedbackLoop(TextureId),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTexture(id) => write!(f, "unknown texture {id}"),
            Self::UnknownProgram(id) => write!(f, "unknown program {id}"),
            Self::UnknownFrameTarget(id) => {
                write!(f, "unknown frame target {id}")
            }
            Self::InvalidDescriptor(msg) => {
                write!(f, "invalid texture descriptor: {msg}")
            }
            Self::UnsupportedFormat(msg) => {
                write!(f, "unsupported texture format: {msg}")
            }
            Self::MissingEntryPoint(name) => {
                write!(f, "shader module has no `{name}` entry point")
            }
            Self::SamplerCapacity { requested, max } => write!(
                f,
                "program requests {requested} samplers, at most {max} supported"
            ),
            Self::UniformCapacity { requested, max } => write!(
                f,
                "program registers {requested} uniforms, at most {max} supported"
            ),
            Self::UnknownUniform(name) => {
                write!(f, "uniform '{name}' is not registered on the program")
            }
            Self::SamplerOutOfRange { index, count } => write!(
                f,
                "sampler index {index} out of range ({count} enabled)"
            ),
            Self::SlotOutOfRange { slot, max } => {
                write!(f, "texture slot {slot} out of range ({max} units)")
            }
            Self::ProgramNotActive(id) => {
                write!(f, "program {id} is not the active program")
            }
            Self::NoActiveProgram => {
                write!(f, "draw issued with no active program")
            }
            Self::NoFrameTarget => {
                write!(f, "draw issued with no bound frame target")
            }
            Self::FrameTargetNotBound(id) => {
                write!(f, "frame target {id} is not bound")
            }
            Self::EmptyDrawBuffers => write!(f, "empty draw-buffer selection"),
            Self::MissingAttachment(att) => {
                write!(f, "bound frame target has no texture at {att}")
            }
            Self::InvalidAttachment(id) => {
                write!(f, "texture {id} cannot be a color attachment")
            }
            Self::AttachmentSizeMismatch => {
                write!(f, "active attachments differ in size")
            }
            Self::NoViewport => write!(f, "draw issued before a viewport was set"),
            Self::ViewportOutOfBounds(vp) => write!(
                f,
                "viewport {}x{} at ({}, {}) exceeds the active attachments",
                vp.width, vp.height, vp.x, vp.y
            ),
            Self::UnboundSampler(index) => {
                write!(f, "sampler {index} has no texture bound")
            }
            Self::FeedbackLoop(id) => {
                write!(f, "texture {id} is both sampled and written by the draw")
            }
        }
    }
}

impl std::error::Error for GpuError {}

/// The explicit GPU context.
///
/// Mirrors the state model of an immediate-mode graphics API: a bound frame
/// target with a draw-buffer selection, an active program with per-program
/// uniform values, a viewport, and a bank of texture units. Binding calls
/// mutate that state; [`draw_fullscreen`](Self::draw_fullscreen) snapshots it
/// into one pass. Nothing is restored after a draw.
///
/// Release calls ignore ids that are unknown or already released, so teardown
/// is idempotent.
pub trait GpuBackend {
    /// Allocate a texture.
    ///
    /// # Errors
    ///
    /// [`GpuError::InvalidDescriptor`] for zero-sized or oversized textures,
    /// [`GpuError::UnsupportedFormat`] for formats the device cannot sample.
    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
    ) -> Result<TextureId, GpuError>;

    /// Free a texture and unbind it from every texture unit. Draws already
    /// issued but not yet submitted stay valid.
    fn release_texture(&mut self, id: TextureId);

    /// Compile a program from composed shader IR.
    ///
    /// # Errors
    ///
    /// [`GpuError::MissingEntryPoint`] if `vs_main` or `fs_main` is absent,
    /// or a capacity error if the layout exceeds backend limits.
    fn create_program(
        &mut self,
        label: &str,
        module: naga::Module,
        layout: &ProgramLayout,
    ) -> Result<ProgramId, GpuError>;

    /// Free a program, deactivating it if it is active.
    fn release_program(&mut self, id: ProgramId);

    /// Create a frame target from attachment → texture pairs.
    ///
    /// # Errors
    ///
    /// Unknown textures, textures that cannot be rendered to (depth formats,
    /// or formats the device only samples), or attachments of differing
    /// size.
    fn create_frame_target(
        &mut self,
        name: &str,
        attachments: &[(Attachment, TextureId)],
    ) -> Result<FrameTargetId, GpuError>;

    /// Free a frame target, unbinding it if it is bound. Attached textures
    /// are not released.
    fn release_frame_target(&mut self, id: FrameTargetId);

    /// Bind a frame target for writing with an initial draw-buffer selection.
    ///
    /// # Errors
    ///
    /// Unknown target, empty selection, or a selected attachment the target
    /// does not have.
    fn bind_frame_target(
        &mut self,
        id: FrameTargetId,
        draw_buffers: &[Attachment],
    ) -> Result<(), GpuError>;

    /// Reselect the writable attachments of the bound frame target.
    ///
    /// # Errors
    ///
    /// [`GpuError::FrameTargetNotBound`] if `id` is not the bound target,
    /// plus the selection errors of [`bind_frame_target`](Self::bind_frame_target).
    fn set_draw_buffers(
        &mut self,
        id: FrameTargetId,
        draw_buffers: &[Attachment],
    ) -> Result<(), GpuError>;

    /// Set the viewport for subsequent draws.
    ///
    /// # Errors
    ///
    /// [`GpuError::InvalidDescriptor`] for an empty viewport.
    fn set_viewport(&mut self, viewport: Viewport) -> Result<(), GpuError>;

    /// Make a program the active program.
    ///
    /// # Errors
    ///
    /// [`GpuError::UnknownProgram`].
    fn use_program(&mut self, id: ProgramId) -> Result<(), GpuError>;

    /// Write a float uniform of the active program.
    ///
    /// # Errors
    ///
    /// The location's program is not active or the index is out of range.
    fn set_uniform_f32(
        &mut self,
        location: UniformLocation,
        value: f32,
    ) -> Result<(), GpuError>;

    /// Bind a texture to a texture unit and point a sampler input of the
    /// active program at that unit.
    ///
    /// # Errors
    ///
    /// Unknown texture, inactive program, or an out-of-range sampler/slot.
    fn bind_texture(
        &mut self,
        texture: TextureId,
        sampler: SamplerHandle,
        slot: u32,
    ) -> Result<(), GpuError>;

    /// Issue one fullscreen draw with the current state.
    ///
    /// # Errors
    ///
    /// Missing program, target, viewport or sampler binding, and textures
    /// that are sampled while also being written.
    fn draw_fullscreen(&mut self) -> Result<(), GpuError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_bounds() {
        let res = Resolution::new(640, 480);
        assert!(Viewport::covering(res).fits_within(res));
        let shifted = Viewport {
            x: 1,
            ..Viewport::covering(res)
        };
        assert!(!shifted.fits_within(res));
    }

    #[test]
    fn ids_display_with_kind() {
        assert_eq!(TextureId::from_raw(7).to_string(), "TextureId#7");
        assert_eq!(ProgramId::from_raw(2).raw(), 2);
    }
}
