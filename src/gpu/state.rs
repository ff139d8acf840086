//! Binding-state bookkeeping shared by every [`GpuBackend`] implementation.
//!
//! Backends own their resources; this module owns the rules: which program
//! is active, which frame target and draw buffers receive output, what each
//! texture unit holds, and which unit each sampler input reads.
//!
//! [`GpuBackend`]: crate::gpu::backend::GpuBackend

use rustc_hash::FxHashMap;

use crate::gpu::backend::{FrameTargetId, GpuError, ProgramId, TextureId, Viewport};
use crate::gpu::frame_target::Attachment;
use crate::gpu::program::{SamplerHandle, UniformLocation, MAX_TEXTURE_UNITS};
use crate::gpu::texture::{Resolution, TextureDescriptor};

/// Id-keyed storage with monotonically increasing raw ids. Released ids are
/// never reused, so a stale handle can't alias a new resource.
#[derive(Debug)]
pub struct ResourceTable<T> {
    next: u32,
    items: FxHashMap<u32, T>,
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self {
            next: 1,
            items: FxHashMap::default(),
        }
    }
}

impl<T> ResourceTable<T> {
    /// Store `item` and return its raw id.
    pub fn insert(&mut self, item: T) -> u32 {
        let id = self.next;
        self.next += 1;
        let _ = self.items.insert(id, item);
        id
    }

    /// Look up a live item.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&T> {
        self.items.get(&id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    /// Remove and return an item.
    pub fn remove(&mut self, id: u32) -> Option<T> {
        self.items.remove(&id)
    }

    /// Number of live items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What a fullscreen draw reads and writes, resolved from [`BindingState`].
#[derive(Debug, Clone, PartialEq)]
pub struct DrawBindings {
    /// Active program.
    pub program: ProgramId,
    /// Bound frame target.
    pub target: FrameTargetId,
    /// Textures written, in fragment-output order.
    pub outputs: Vec<TextureId>,
    /// Viewport.
    pub viewport: Viewport,
    /// Texture read by each sampler input, in sampler-index order.
    pub inputs: Vec<TextureId>,
}

/// Immediate-mode pipeline state.
#[derive(Debug, Default)]
pub struct BindingState {
    program: Option<ProgramId>,
    target: Option<FrameTargetId>,
    draw_buffers: Vec<Attachment>,
    viewport: Option<Viewport>,
    units: FxHashMap<u32, TextureId>,
    sampler_units: FxHashMap<SamplerHandle, u32>,
}

impl BindingState {
    /// Active program, if any.
    #[must_use]
    pub const fn program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Bound frame target, if any.
    #[must_use]
    pub const fn target(&self) -> Option<FrameTargetId> {
        self.target
    }

    /// Current draw-buffer selection.
    #[must_use]
    pub fn draw_buffers(&self) -> &[Attachment] {
        &self.draw_buffers
    }

    /// Texture held by a unit.
    #[must_use]
    pub fn unit(&self, slot: u32) -> Option<TextureId> {
        self.units.get(&slot).copied()
    }

    /// Bind `id` with `draw_buffers`, given the target's attachments.
    ///
    /// # Errors
    ///
    /// Empty selection or an attachment the target lacks.
    pub fn bind_target(
        &mut self,
        id: FrameTargetId,
        draw_buffers: &[Attachment],
        attachments: &[(Attachment, TextureId)],
    ) -> Result<(), GpuError> {
        check_draw_buffers(draw_buffers, attachments)?;
        self.target = Some(id);
        self.draw_buffers = draw_buffers.to_vec();
        Ok(())
    }

    /// Reselect draw buffers on the bound target.
    ///
    /// # Errors
    ///
    /// [`GpuError::FrameTargetNotBound`] or selection errors.
    pub fn set_draw_buffers(
        &mut self,
        id: FrameTargetId,
        draw_buffers: &[Attachment],
        attachments: &[(Attachment, TextureId)],
    ) -> Result<(), GpuError> {
        if self.target != Some(id) {
            return Err(GpuError::FrameTargetNotBound(id));
        }
        check_draw_buffers(draw_buffers, attachments)?;
        self.draw_buffers = draw_buffers.to_vec();
        Ok(())
    }

    /// Set the viewport.
    ///
    /// # Errors
    ///
    /// [`GpuError::InvalidDescriptor`] for a zero-sized viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), GpuError> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(GpuError::InvalidDescriptor(format!(
                "empty viewport {}x{}",
                viewport.width, viewport.height
            )));
        }
        self.viewport = Some(viewport);
        Ok(())
    }

    /// Activate a program.
    pub fn use_program(&mut self, id: ProgramId) {
        self.program = Some(id);
    }

    /// Validate a uniform write against the active program.
    ///
    /// # Errors
    ///
    /// Location of an inactive program or past `uniform_count`.
    pub fn check_uniform(
        &self,
        location: UniformLocation,
        uniform_count: usize,
    ) -> Result<(), GpuError> {
        if self.program != Some(location.program) {
            return Err(GpuError::ProgramNotActive(location.program));
        }
        if location.index as usize >= uniform_count {
            return Err(GpuError::UnknownUniform(format!(
                "location {}",
                location.index
            )));
        }
        Ok(())
    }

    /// Put `texture` in unit `slot` and route `sampler` to it.
    ///
    /// # Errors
    ///
    /// Out-of-range slot or sampler, or a sampler of an inactive program.
    pub fn bind_texture(
        &mut self,
        texture: TextureId,
        sampler: SamplerHandle,
        slot: u32,
        sampler_count: u32,
    ) -> Result<(), GpuError> {
        if slot >= MAX_TEXTURE_UNITS {
            return Err(GpuError::SlotOutOfRange {
                slot,
                max: MAX_TEXTURE_UNITS,
            });
        }
        if self.program != Some(sampler.program) {
            return Err(GpuError::ProgramNotActive(sampler.program));
        }
        if sampler.index >= sampler_count {
            return Err(GpuError::SamplerOutOfRange {
                index: sampler.index,
                count: sampler_count,
            });
        }
        let _ = self.units.insert(slot, texture);
        let _ = self.sampler_units.insert(sampler, slot);
        Ok(())
    }

    /// Resolve the state into one draw.
    ///
    /// `attachments` are the bound target's attachments; `size_of` reports
    /// the size of a texture so attachment sizes and the viewport can be
    /// checked.
    ///
    /// # Errors
    ///
    /// Missing program/target/viewport, unbound samplers, mismatched or
    /// undersized attachments, and feedback loops.
    pub fn resolve_draw(
        &self,
        sampler_count: u32,
        attachments: &[(Attachment, TextureId)],
        size_of: impl Fn(TextureId) -> Result<Resolution, GpuError>,
    ) -> Result<DrawBindings, GpuError> {
        let program = self.program.ok_or(GpuError::NoActiveProgram)?;
        let target = self.target.ok_or(GpuError::NoFrameTarget)?;
        let viewport = self.viewport.ok_or(GpuError::NoViewport)?;

        let outputs = self
            .draw_buffers
            .iter()
            .map(|att| attachment_texture(*att, attachments))
            .collect::<Result<Vec<_>, _>>()?;

        let mut output_size = None;
        for &texture in &outputs {
            let size = size_of(texture)?;
            match output_size {
                None => output_size = Some(size),
                Some(s) if s != size => return Err(GpuError::AttachmentSizeMismatch),
                Some(_) => {}
            }
        }
        if let Some(size) = output_size {
            if !viewport.fits_within(size) {
                return Err(GpuError::ViewportOutOfBounds(viewport));
            }
        }

        let mut inputs = Vec::with_capacity(sampler_count as usize);
        for index in 0..sampler_count {
            let handle = SamplerHandle { program, index };
            let texture = self
                .sampler_units
                .get(&handle)
                .and_then(|slot| self.units.get(slot))
                .copied()
                .ok_or(GpuError::UnboundSampler(index))?;
            if outputs.contains(&texture) {
                return Err(GpuError::FeedbackLoop(texture));
            }
            inputs.push(texture);
        }

        Ok(DrawBindings {
            program,
            target,
            outputs,
            viewport,
            inputs,
        })
    }

    /// Drop every reference to a released texture.
    pub fn forget_texture(&mut self, id: TextureId) {
        self.units.retain(|_, tex| *tex != id);
    }

    /// Drop every reference to a released program.
    pub fn forget_program(&mut self, id: ProgramId) {
        if self.program == Some(id) {
            self.program = None;
        }
        self.sampler_units.retain(|handle, _| handle.program != id);
    }

    /// Drop every reference to a released frame target.
    pub fn forget_target(&mut self, id: FrameTargetId) {
        if self.target == Some(id) {
            self.target = None;
            self.draw_buffers.clear();
        }
    }
}

/// Check that `attachments` can form one frame target: every texture exists,
/// none is a depth texture, and all share one size.
///
/// # Errors
///
/// [`GpuError::UnknownTexture`], [`GpuError::InvalidAttachment`] or
/// [`GpuError::AttachmentSizeMismatch`].
pub fn check_attachments<'a>(
    attachments: &[(Attachment, TextureId)],
    describe: impl Fn(TextureId) -> Option<&'a TextureDescriptor>,
) -> Result<(), GpuError> {
    let mut size = None;
    for &(_, texture) in attachments {
        let desc = describe(texture).ok_or(GpuError::UnknownTexture(texture))?;
        if desc.format.is_depth() {
            return Err(GpuError::InvalidAttachment(texture));
        }
        if size.is_some_and(|s| s != desc.resolution()) {
            return Err(GpuError::AttachmentSizeMismatch);
        }
        size = Some(desc.resolution());
    }
    Ok(())
}

fn attachment_texture(
    attachment: Attachment,
    attachments: &[(Attachment, TextureId)],
) -> Result<TextureId, GpuError> {
    attachments
        .iter()
        .find(|(att, _)| *att == attachment)
        .map(|(_, tex)| *tex)
        .ok_or(GpuError::MissingAttachment(attachment))
}

fn check_draw_buffers(
    draw_buffers: &[Attachment],
    attachments: &[(Attachment, TextureId)],
) -> Result<(), GpuError> {
    if draw_buffers.is_empty() {
        return Err(GpuError::EmptyDrawBuffers);
    }
    for att in draw_buffers {
        let _ = attachment_texture(*att, attachments)?;
    }
    Ok(())
}
