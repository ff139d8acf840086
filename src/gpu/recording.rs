//! A [`GpuBackend`] that records commands instead of executing them.
//!
//! Enforces the same binding rules as the wgpu backend (through
//! [`BindingState`]) so that effect protocols can be verified without a GPU:
//! draw counts, sampler bindings per pass, uniform values, and resource
//! lifetimes.

use crate::gpu::backend::{
    FrameTargetId, GpuBackend, GpuError, ProgramId, TextureId, Viewport,
};
use crate::gpu::frame_target::Attachment;
use crate::gpu::program::{
    ProgramLayout, SamplerHandle, UniformLocation, MAX_UNIFORMS,
};
use crate::gpu::state::{
    check_attachments, BindingState, DrawBindings, ResourceTable,
};
use crate::gpu::texture::{Resolution, TextureDescriptor};

/// Largest texture dimension the recording backend accepts.
pub const MAX_DIMENSION: u32 = 16_384;

/// One recorded draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Resolved bindings.
    pub bindings: DrawBindings,
    /// Uniform block contents at draw time.
    pub uniforms: Vec<f32>,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Texture allocation.
    CreateTexture {
        /// New id.
        id: TextureId,
        /// Allocated size.
        resolution: Resolution,
    },
    /// Texture release.
    ReleaseTexture(TextureId),
    /// Program compilation.
    CreateProgram {
        /// New id.
        id: ProgramId,
        /// Program label.
        label: String,
    },
    /// Program release.
    ReleaseProgram(ProgramId),
    /// Frame target creation.
    CreateFrameTarget {
        /// New id.
        id: FrameTargetId,
        /// Target name.
        name: String,
    },
    /// Frame target release.
    ReleaseFrameTarget(FrameTargetId),
    /// Frame target bound with a draw-buffer selection.
    BindFrameTarget {
        /// Bound target.
        id: FrameTargetId,
        /// Selected attachments.
        draw_buffers: Vec<Attachment>,
    },
    /// Draw-buffer reselection.
    SetDrawBuffers(Vec<Attachment>),
    /// Viewport change.
    SetViewport(Viewport),
    /// Program activation.
    UseProgram(ProgramId),
    /// Uniform write.
    SetUniform {
        /// Written location.
        location: UniformLocation,
        /// Written value.
        value: f32,
    },
    /// Texture bound to a unit.
    BindTexture {
        /// Bound texture.
        texture: TextureId,
        /// Sampler input routed to the unit.
        sampler: SamplerHandle,
        /// Texture unit.
        slot: u32,
    },
    /// Fullscreen draw.
    Draw(DrawCall),
}

#[derive(Debug)]
struct RecordedProgram {
    layout: ProgramLayout,
    uniforms: [f32; MAX_UNIFORMS],
}

/// Command-recording backend.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    textures: ResourceTable<TextureDescriptor>,
    programs: ResourceTable<RecordedProgram>,
    targets: ResourceTable<Vec<(Attachment, TextureId)>>,
    state: BindingState,
    commands: Vec<GpuCommand>,
    fail_texture_after: Option<usize>,
}

impl RecordingBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the texture allocation after the next `successes` ones fail,
    /// simulating GPU memory exhaustion.
    pub fn fail_texture_allocation_after(&mut self, successes: usize) {
        self.fail_texture_after = Some(successes);
    }

    /// Every recorded command, oldest first.
    #[must_use]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Forget recorded commands; resources and binding state are kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Recorded draws, oldest first.
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|cmd| match cmd {
            GpuCommand::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    /// Number of recorded draws.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    /// Recorded texture bindings to unit `slot`, oldest first.
    #[must_use]
    pub fn bindings_to_slot(&self, slot: u32) -> Vec<TextureId> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                GpuCommand::BindTexture {
                    texture, slot: s, ..
                } if *s == slot => Some(*texture),
                _ => None,
            })
            .collect()
    }

    /// Descriptor of a live texture.
    #[must_use]
    pub fn texture_descriptor(&self, id: TextureId) -> Option<&TextureDescriptor> {
        self.textures.get(id.raw())
    }

    /// Number of live textures.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of live programs.
    #[must_use]
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Number of live frame targets.
    #[must_use]
    pub fn live_frame_targets(&self) -> usize {
        self.targets.len()
    }

    /// Current binding state.
    #[must_use]
    pub const fn state(&self) -> &BindingState {
        &self.state
    }

    fn program(&self, id: ProgramId) -> Result<&RecordedProgram, GpuError> {
        self.programs.get(id.raw()).ok_or(GpuError::UnknownProgram(id))
    }

    fn target(&self, id: FrameTargetId) -> Result<&[(Attachment, TextureId)], GpuError> {
        self.targets
            .get(id.raw())
            .map(Vec::as_slice)
            .ok_or(GpuError::UnknownFrameTarget(id))
    }

    fn texture_size(&self, id: TextureId) -> Result<Resolution, GpuError> {
        self.textures
            .get(id.raw())
            .map(TextureDescriptor::resolution)
            .ok_or(GpuError::UnknownTexture(id))
    }
}

impl GpuBackend for RecordingBackend {
    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
    ) -> Result<TextureId, GpuError> {
        desc.validate(MAX_DIMENSION)?;
        if let Some(remaining) = self.fail_texture_after {
            if remaining == 0 {
                self.fail_texture_after = None;
                return Err(GpuError::InvalidDescriptor(format!(
                    "out of memory allocating '{}'",
                    desc.label
                )));
            }
            self.fail_texture_after = Some(remaining - 1);
        }
        let id = TextureId::from_raw(self.textures.insert(desc.clone()));
        self.commands.push(GpuCommand::CreateTexture {
            id,
            resolution: desc.resolution(),
        });
        Ok(id)
    }

    fn release_texture(&mut self, id: TextureId) {
        if self.textures.remove(id.raw()).is_some() {
            self.state.forget_texture(id);
            self.commands.push(GpuCommand::ReleaseTexture(id));
        }
    }

    fn create_program(
        &mut self,
        label: &str,
        module: naga::Module,
        layout: &ProgramLayout,
    ) -> Result<ProgramId, GpuError> {
        layout.validate()?;
        for entry in ["vs_main", "fs_main"] {
            if !module.entry_points.iter().any(|ep| ep.name == entry) {
                return Err(GpuError::MissingEntryPoint(entry));
            }
        }
        let id = ProgramId::from_raw(self.programs.insert(RecordedProgram {
            layout: layout.clone(),
            uniforms: [0.0; MAX_UNIFORMS],
        }));
        self.commands.push(GpuCommand::CreateProgram {
            id,
            label: label.to_owned(),
        });
        Ok(id)
    }

    fn release_program(&mut self, id: ProgramId) {
        if self.programs.remove(id.raw()).is_some() {
            self.state.forget_program(id);
            self.commands.push(GpuCommand::ReleaseProgram(id));
        }
    }

    fn create_frame_target(
        &mut self,
        name: &str,
        attachments: &[(Attachment, TextureId)],
    ) -> Result<FrameTargetId, GpuError> {
        check_attachments(attachments, |id| self.textures.get(id.raw()))?;
        let id = FrameTargetId::from_raw(self.targets.insert(attachments.to_vec()));
        self.commands.push(GpuCommand::CreateFrameTarget {
            id,
            name: name.to_owned(),
        });
        Ok(id)
    }

    fn release_frame_target(&mut self, id: FrameTargetId) {
        if self.targets.remove(id.raw()).is_some() {
            self.state.forget_target(id);
            self.commands.push(GpuCommand::ReleaseFrameTarget(id));
        }
    }

    fn bind_frame_target(
        &mut self,
        id: FrameTargetId,
        draw_buffers: &[Attachment],
    ) -> Result<(), GpuError> {
        let attachments = self.target(id)?.to_vec();
        self.state.bind_target(id, draw_buffers, &attachments)?;
        self.commands.push(GpuCommand::BindFrameTarget {
            id,
            draw_buffers: draw_buffers.to_vec(),
        });
        Ok(())
    }

    fn set_draw_buffers(
        &mut self,
        id: FrameTargetId,
        draw_buffers: &[Attachment],
    ) -> Result<(), GpuError> {
        let attachments = self.target(id)?.to_vec();
        self.state.set_draw_buffers(id, draw_buffers, &attachments)?;
        self.commands
            .push(GpuCommand::SetDrawBuffers(draw_buffers.to_vec()));
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<(), GpuError> {
        self.state.set_viewport(viewport)?;
        self.commands.push(GpuCommand::SetViewport(viewport));
        Ok(())
    }

    fn use_program(&mut self, id: ProgramId) -> Result<(), GpuError> {
        let _ = self.program(id)?;
        self.state.use_program(id);
        self.commands.push(GpuCommand::UseProgram(id));
        Ok(())
    }

    fn set_uniform_f32(
        &mut self,
        location: UniformLocation,
        value: f32,
    ) -> Result<(), GpuError> {
        let count = self.program(location.program)?.layout.uniforms.len();
        self.state.check_uniform(location, count)?;
        if let Some(program) = self.programs.get_mut(location.program.raw()) {
            program.uniforms[location.index as usize] = value;
        }
        self.commands
            .push(GpuCommand::SetUniform { location, value });
        Ok(())
    }

    fn bind_texture(
        &mut self,
        texture: TextureId,
        sampler: SamplerHandle,
        slot: u32,
    ) -> Result<(), GpuError> {
        let _ = self.texture_size(texture)?;
        let count = self.program(sampler.program)?.layout.sampler_count;
        self.state.bind_texture(texture, sampler, slot, count)?;
        self.commands.push(GpuCommand::BindTexture {
            texture,
            sampler,
            slot,
        });
        Ok(())
    }

    fn draw_fullscreen(&mut self) -> Result<(), GpuError> {
        let program_id = self.state.program().ok_or(GpuError::NoActiveProgram)?;
        let target_id = self.state.target().ok_or(GpuError::NoFrameTarget)?;
        let program = self.program(program_id)?;
        let attachments = self.target(target_id)?;
        let bindings = self.state.resolve_draw(
            program.layout.sampler_count,
            attachments,
            |id| self.texture_size(id),
        )?;
        let uniforms = program.uniforms[..program.layout.uniforms.len()].to_vec();
        self.commands
            .push(GpuCommand::Draw(DrawCall { bindings, uniforms }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::program::ProgramBuilder;
    use crate::gpu::shader_composer::tests::passthrough_module;
    use crate::gpu::texture::{Texture, TextureFormat};

    #[test]
    fn draw_requires_program() {
        let mut gpu = RecordingBackend::new();
        assert_eq!(gpu.draw_fullscreen(), Err(GpuError::NoActiveProgram));
    }

    #[test]
    fn draw_snapshots_uniforms_and_inputs() {
        let mut gpu = RecordingBackend::new();
        let res = Resolution::new(32, 32);
        let out = Texture::create(
            &mut gpu,
            TextureDescriptor::color_target("Out", res, TextureFormat::Rgba16Float),
        )
        .unwrap();
        let input = Texture::create(
            &mut gpu,
            TextureDescriptor::color_target("In", res, TextureFormat::Rgba16Float),
        )
        .unwrap();
        let program = ProgramBuilder::new("P", passthrough_module())
            .enable_samplers(1)
            .add_uniform("gain")
            .build(&mut gpu)
            .unwrap();
        let target = gpu
            .create_frame_target("T", &[(Attachment::COLOR0, out.id())])
            .unwrap();

        gpu.bind_frame_target(target, &[Attachment::COLOR0]).unwrap();
        gpu.set_viewport(Viewport::covering(res)).unwrap();
        program.bind(&mut gpu).unwrap();
        gpu.set_uniform_f32(program.uniform("gain").unwrap(), 2.5)
            .unwrap();
        input.bind(&mut gpu, program.sampler(0).unwrap(), 0).unwrap();
        gpu.draw_fullscreen().unwrap();

        let draw = gpu.draws().next().unwrap();
        assert_eq!(draw.uniforms, vec![2.5]);
        assert_eq!(draw.bindings.inputs, vec![input.id()]);
        assert_eq!(draw.bindings.outputs, vec![out.id()]);
    }

    #[test]
    fn depth_textures_are_not_color_attachments() {
        let mut gpu = RecordingBackend::new();
        let depth = Texture::create(
            &mut gpu,
            TextureDescriptor::color_target(
                "Depth",
                Resolution::new(8, 8),
                TextureFormat::Depth32Float,
            ),
        )
        .unwrap();
        assert_eq!(
            gpu.create_frame_target("T", &[(Attachment::COLOR0, depth.id())]),
            Err(GpuError::InvalidAttachment(depth.id()))
        );
    }

    #[test]
    fn injected_allocation_failure() {
        let mut gpu = RecordingBackend::new();
        gpu.fail_texture_allocation_after(1);
        let desc = TextureDescriptor::color_target(
            "T",
            Resolution::new(4, 4),
            TextureFormat::Rgba16Float,
        );
        assert!(gpu.create_texture(&desc).is_ok());
        assert!(gpu.create_texture(&desc).is_err());
        assert!(gpu.create_texture(&desc).is_ok());
    }

    #[test]
    fn releasing_twice_records_once() {
        let mut gpu = RecordingBackend::new();
        let id = gpu
            .create_texture(&TextureDescriptor::color_target(
                "T",
                Resolution::new(4, 4),
                TextureFormat::Rgba16Float,
            ))
            .unwrap();
        gpu.release_texture(id);
        gpu.release_texture(id);
        let releases = gpu
            .commands()
            .iter()
            .filter(|c| matches!(c, GpuCommand::ReleaseTexture(_)))
            .count();
        assert_eq!(releases, 1);
        assert_eq!(gpu.live_textures(), 0);
    }
}
