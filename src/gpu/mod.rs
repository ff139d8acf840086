//! GPU resource management and the explicit GPU context.
//!
//! Effects talk to the GPU exclusively through [`GpuBackend`]. Resources
//! (textures, programs, frame targets) are referred to by opaque ids that the
//! backend hands out; the thin wrappers in this module ([`texture::Texture`],
//! [`frame_target::FrameTarget`], [`program::Program`]) pair those ids with
//! their CPU-side description and an explicit `release`.

/// The `GpuBackend` trait, resource ids, and GPU-layer errors.
pub mod backend;
/// Off-screen render targets with selectable draw buffers.
pub mod frame_target;
/// Shared wgpu boilerplate helpers for screen-space post-process pipelines.
pub mod pipeline_helpers;
/// Compiled shading programs, uniform locations and sampler handles.
pub mod program;
/// Shader file loading, composition and caching.
pub mod program_loader;
/// Command-recording backend for tests and tooling.
pub mod recording;
/// wgpu device and queue initialization.
pub mod render_context;
/// Fullscreen drawable used to invoke a program once per pixel.
pub mod screen_quad;
/// WGSL shader composition with `#import` support via naga-oil.
pub mod shader_composer;
/// Binding-state tracking shared by backends.
pub mod state;
/// Texture descriptors, formats and owned texture handles.
pub mod texture;
/// wgpu implementation of [`GpuBackend`].
pub mod wgpu_backend;

pub use backend::{
    FrameTargetId, GpuBackend, GpuError, ProgramId, TextureId, Viewport,
};
pub use frame_target::{Attachment, FrameTarget};
pub use program::{
    Program, ProgramBuilder, ProgramLayout, SamplerHandle, UniformLocation,
};
pub use program_loader::{ProgramLoader, ShaderFile, ShaderStage};
pub use screen_quad::ScreenQuad;
pub use texture::{
    FilterMode, Resolution, Texture, TextureDescriptor, TextureFormat,
    TextureKind, WrapMode,
};
