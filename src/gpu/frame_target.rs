use std::collections::BTreeMap;
use std::fmt;

use crate::gpu::backend::{FrameTargetId, GpuBackend, GpuError, TextureId};
use crate::gpu::texture::Texture;

/// Color attachment slot of a frame target.
///
/// A draw-buffer selection lists attachments in fragment-output order:
/// output `@location(i)` lands in the `i`-th selected attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attachment(u32);

impl Attachment {
    /// Color attachment 0.
    pub const COLOR0: Self = Self(0);
    /// Color attachment 1.
    pub const COLOR1: Self = Self(1);
    /// Color attachment 2.
    pub const COLOR2: Self = Self(2);
    /// Color attachment 3.
    pub const COLOR3: Self = Self(3);

    /// Color attachment `index`.
    #[must_use]
    pub const fn color(index: u32) -> Self {
        Self(index)
    }

    /// Attachment index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "color attachment {}", self.0)
    }
}

/// A named off-screen render target.
///
/// Holds attachment → texture bindings but not the textures themselves;
/// releasing the target leaves its textures alive.
#[derive(Debug)]
pub struct FrameTarget {
    name: String,
    id: Option<FrameTargetId>,
    attachments: BTreeMap<Attachment, TextureId>,
}

impl FrameTarget {
    /// An unloaded frame target.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            id: None,
            attachments: BTreeMap::new(),
        }
    }

    /// Create the backend target from `attachments`. A previously loaded
    /// target is released first.
    ///
    /// # Errors
    ///
    /// Propagates the backend's creation failure.
    pub fn load<G: GpuBackend>(
        &mut self,
        gpu: &mut G,
        attachments: &BTreeMap<Attachment, &Texture>,
    ) -> Result<(), GpuError> {
        self.release(gpu);
        let pairs: Vec<(Attachment, TextureId)> = attachments
            .iter()
            .map(|(att, tex)| (*att, tex.id()))
            .collect();
        let id = gpu.create_frame_target(&self.name, &pairs)?;
        log::debug!(
            "created frame target '{}' with {} attachments",
            self.name,
            pairs.len()
        );
        self.id = Some(id);
        self.attachments = pairs.into_iter().collect();
        Ok(())
    }

    /// Bind for writing with an initial draw-buffer selection.
    ///
    /// # Errors
    ///
    /// [`GpuError::NoFrameTarget`] if not loaded, or the backend's binding
    /// failure.
    pub fn bind<G: GpuBackend>(
        &self,
        gpu: &mut G,
        draw_buffers: &[Attachment],
    ) -> Result<(), GpuError> {
        gpu.bind_frame_target(self.loaded_id()?, draw_buffers)
    }

    /// Reselect the writable attachments. The target must be bound.
    ///
    /// # Errors
    ///
    /// [`GpuError::NoFrameTarget`] if not loaded, or the backend's selection
    /// failure.
    pub fn bind_attachments<G: GpuBackend>(
        &self,
        gpu: &mut G,
        draw_buffers: &[Attachment],
    ) -> Result<(), GpuError> {
        gpu.set_draw_buffers(self.loaded_id()?, draw_buffers)
    }

    /// Free the backend target. Safe to call repeatedly.
    pub fn release<G: GpuBackend>(&mut self, gpu: &mut G) {
        if let Some(id) = self.id.take() {
            log::debug!("releasing frame target '{}'", self.name);
            gpu.release_frame_target(id);
        }
        self.attachments.clear();
    }

    /// Target name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend handle, if loaded.
    #[must_use]
    pub const fn id(&self) -> Option<FrameTargetId> {
        self.id
    }

    /// Whether [`load`](Self::load) has succeeded since the last release.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.id.is_some()
    }

    /// Texture attached at `attachment`.
    #[must_use]
    pub fn texture_at(&self, attachment: Attachment) -> Option<TextureId> {
        self.attachments.get(&attachment).copied()
    }

    fn loaded_id(&self) -> Result<FrameTargetId, GpuError> {
        self.id.ok_or(GpuError::NoFrameTarget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::RecordingBackend;
    use crate::gpu::texture::{Resolution, TextureDescriptor, TextureFormat};

    fn color(gpu: &mut RecordingBackend, label: &str) -> Texture {
        Texture::create(
            gpu,
            TextureDescriptor::color_target(
                label,
                Resolution::new(64, 32),
                TextureFormat::Rgba16Float,
            ),
        )
        .unwrap()
    }

    #[test]
    fn load_records_attachments() {
        let mut gpu = RecordingBackend::new();
        let a = color(&mut gpu, "A");
        let b = color(&mut gpu, "B");
        let mut target = FrameTarget::new("Ping Pong");
        target
            .load(
                &mut gpu,
                &BTreeMap::from([(Attachment::COLOR0, &a), (Attachment::COLOR1, &b)]),
            )
            .unwrap();
        assert!(target.is_loaded());
        assert_eq!(target.texture_at(Attachment::COLOR0), Some(a.id()));
        assert_eq!(target.texture_at(Attachment::COLOR1), Some(b.id()));
        assert_eq!(target.texture_at(Attachment::COLOR2), None);
    }

    #[test]
    fn unloaded_target_cannot_bind() {
        let mut gpu = RecordingBackend::new();
        let target = FrameTarget::new("Empty");
        assert_eq!(
            target.bind(&mut gpu, &[Attachment::COLOR0]),
            Err(GpuError::NoFrameTarget)
        );
    }

    #[test]
    fn bind_attachments_requires_bound_target() {
        let mut gpu = RecordingBackend::new();
        let a = color(&mut gpu, "A");
        let mut target = FrameTarget::new("T");
        target
            .load(&mut gpu, &BTreeMap::from([(Attachment::COLOR0, &a)]))
            .unwrap();
        let id = target.id().unwrap();
        assert_eq!(
            target.bind_attachments(&mut gpu, &[Attachment::COLOR0]),
            Err(GpuError::FrameTargetNotBound(id))
        );
        target.bind(&mut gpu, &[Attachment::COLOR0]).unwrap();
        assert_eq!(
            target.bind_attachments(&mut gpu, &[Attachment::COLOR1]),
            Err(GpuError::MissingAttachment(Attachment::COLOR1))
        );
    }

    #[test]
    fn release_is_idempotent() {
        let mut gpu = RecordingBackend::new();
        let a = color(&mut gpu, "A");
        let mut target = FrameTarget::new("T");
        target
            .load(&mut gpu, &BTreeMap::from([(Attachment::COLOR0, &a)]))
            .unwrap();
        target.release(&mut gpu);
        target.release(&mut gpu);
        assert!(!target.is_loaded());
        assert_eq!(gpu.live_frame_targets(), 0);
        assert_eq!(gpu.live_textures(), 1);
    }
}
