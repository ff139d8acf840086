//! wgpu implementation of [`GpuBackend`].
//!
//! Binding calls only update [`BindingState`]. Each
//! [`draw_fullscreen`](GpuBackend::draw_fullscreen) resolves that state into
//! one render pass on an internal command encoder:
//!
//! - color attachments are the selected draw buffers, in order, loaded (not
//!   cleared) and stored
//! - the pipeline is looked up by (program, attachment formats, per-input
//!   filterability) and built on a cache miss
//! - a bind group is built from the program's uniform block and the texture
//!   and sampler of every sampler input
//!
//! Passes run in issue order, so each pass sees the previous pass's writes.
//! Nothing reaches the GPU until [`WgpuBackend::submit`].

use std::borrow::Cow;

use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;

use crate::gpu::backend::{
    FrameTargetId, GpuBackend, GpuError, ProgramId, TextureId, Viewport,
};
use crate::gpu::frame_target::Attachment;
use crate::gpu::pipeline_helpers::{
    create_screen_space_pipeline, program_layout_entries, sampler_binding,
    sampler_for, texture_binding,
};
use crate::gpu::program::{
    ProgramLayout, SamplerHandle, UniformLocation, MAX_UNIFORMS,
};
use crate::gpu::render_context::RenderContext;
use crate::gpu::state::{check_attachments, BindingState, DrawBindings, ResourceTable};
use crate::gpu::texture::{
    Resolution, Texture, TextureDescriptor, TextureFormat, TextureKind,
};

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    desc: TextureDescriptor,
}

struct GpuProgram {
    label: String,
    shader: wgpu::ShaderModule,
    layout: ProgramLayout,
    uniforms: [f32; MAX_UNIFORMS],
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    formats: Vec<wgpu::TextureFormat>,
    filterable: Vec<bool>,
}

struct CachedPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// State-tracking [`GpuBackend`] over a wgpu device and queue.
pub struct WgpuBackend {
    context: RenderContext,
    textures: ResourceTable<GpuTexture>,
    programs: ResourceTable<GpuProgram>,
    targets: ResourceTable<Vec<(Attachment, TextureId)>>,
    state: BindingState,
    pipelines: FxHashMap<PipelineKey, CachedPipeline>,
    encoder: Option<wgpu::CommandEncoder>,
    pending_passes: usize,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("textures", &self.textures.len())
            .field("programs", &self.programs.len())
            .field("frame_targets", &self.targets.len())
            .field("pipelines", &self.pipelines.len())
            .field("pending_passes", &self.pending_passes)
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Wrap a device and queue.
    #[must_use]
    pub fn new(context: RenderContext) -> Self {
        Self {
            context,
            textures: ResourceTable::default(),
            programs: ResourceTable::default(),
            targets: ResourceTable::default(),
            state: BindingState::default(),
            pipelines: FxHashMap::default(),
            encoder: None,
            pending_passes: 0,
        }
    }

    /// The underlying device and queue.
    #[must_use]
    pub const fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Submit every pass issued since the last submit. Returns the number of
    /// passes submitted.
    pub fn submit(&mut self) -> usize {
        let passes = self.pending_passes;
        if let Some(encoder) = self.encoder.take() {
            self.context.submit(encoder);
        }
        self.pending_passes = 0;
        passes
    }

    /// Number of cached render pipelines.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// The wgpu texture behind a handle, for hosts that read results back or
    /// present them.
    #[must_use]
    pub fn wgpu_texture(&self, id: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(id.raw()).map(|t| &t.texture)
    }

    /// Adopt a texture the host created, so it can be bound as an effect
    /// input. The texture needs `TEXTURE_BINDING` usage; sampling uses
    /// linear filtering and clamp-to-edge. Releasing the handle drops this
    /// backend's reference only; the host keeps ownership of the texture.
    ///
    /// # Errors
    ///
    /// [`GpuError::UnsupportedFormat`] for formats with no
    /// [`TextureFormat`] counterpart, [`GpuError::InvalidDescriptor`] for
    /// textures without `TEXTURE_BINDING` usage.
    pub fn import_texture(
        &mut self,
        texture: wgpu::Texture,
        label: &str,
    ) -> Result<Texture, GpuError> {
        let format = TextureFormat::try_from(texture.format())?;
        if !texture.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING) {
            return Err(GpuError::InvalidDescriptor(format!(
                "'{label}' cannot be sampled"
            )));
        }
        let desc = TextureDescriptor {
            mip_levels: texture.mip_level_count(),
            ..TextureDescriptor::color_target(
                label,
                Resolution::new(texture.width(), texture.height()),
                format,
            )
        };
        let id = self.insert_texture(texture, desc.clone());
        log::debug!("imported texture '{label}' as {id}");
        Ok(Texture::from_parts(id, desc))
    }

    /// Upload tightly packed texel data covering all of mip level 0.
    ///
    /// # Errors
    ///
    /// [`GpuError::UnknownTexture`], [`GpuError::UnsupportedFormat`] for
    /// depth textures or textures without `COPY_DST` usage, or
    /// [`GpuError::InvalidDescriptor`] when `data` has the wrong length.
    pub fn write_texture(&self, texture: &Texture, data: &[u8]) -> Result<(), GpuError> {
        let entry = self
            .textures
            .get(texture.id().raw())
            .ok_or(GpuError::UnknownTexture(texture.id()))?;
        let desc = &entry.desc;
        if desc.format.is_depth()
            || !entry.texture.usage().contains(wgpu::TextureUsages::COPY_DST)
        {
            return Err(GpuError::UnsupportedFormat(format!(
                "cannot upload to '{}'",
                desc.label
            )));
        }
        let bytes_per_row = desc.width * desc.format.bytes_per_pixel();
        let expected = u64::from(bytes_per_row) * u64::from(desc.height);
        if data.len() as u64 != expected {
            return Err(GpuError::InvalidDescriptor(format!(
                "'{}' expects {expected} bytes, got {}",
                desc.label,
                data.len()
            )));
        }
        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn insert_texture(&mut self, texture: wgpu::Texture, desc: TextureDescriptor) -> TextureId {
        // Views cover mip 0 only so the same view can be sampled and
        // rendered to.
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&desc.label),
            mip_level_count: Some(1),
            ..Default::default()
        });
        let sampler = sampler_for(&self.context.device, &desc);
        TextureId::from_raw(self.textures.insert(GpuTexture {
            texture,
            view,
            sampler,
            desc,
        }))
    }

    fn program(&self, id: ProgramId) -> Result<&GpuProgram, GpuError> {
        self.programs.get(id.raw()).ok_or(GpuError::UnknownProgram(id))
    }

    fn texture(&self, id: TextureId) -> Result<&GpuTexture, GpuError> {
        self.textures.get(id.raw()).ok_or(GpuError::UnknownTexture(id))
    }

    fn target(&self, id: FrameTargetId) -> Result<&[(Attachment, TextureId)], GpuError> {
        self.targets
            .get(id.raw())
            .map(Vec::as_slice)
            .ok_or(GpuError::UnknownFrameTarget(id))
    }

    fn pipeline_key(&self, draw: &DrawBindings) -> Result<PipelineKey, GpuError> {
        let formats = draw
            .outputs
            .iter()
            .map(|&id| self.texture(id).map(|t| t.desc.format.to_wgpu()))
            .collect::<Result<_, _>>()?;
        let filterable = draw
            .inputs
            .iter()
            .map(|&id| self.texture(id).map(|t| t.desc.format.is_filterable()))
            .collect::<Result<_, _>>()?;
        Ok(PipelineKey {
            program: draw.program,
            formats,
            filterable,
        })
    }

    fn build_pipeline(&self, key: &PipelineKey) -> Result<CachedPipeline, GpuError> {
        let program = self.program(key.program)?;
        let device = &self.context.device;
        let entries = program_layout_entries(&key.filterable);
        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{} Bind Group Layout", program.label)),
                entries: &entries,
            });
        let pipeline = create_screen_space_pipeline(
            device,
            &program.label,
            &program.shader,
            &key.formats,
            &[&bind_group_layout],
        );
        log::debug!(
            "built pipeline for '{}' ({} targets, {} inputs)",
            program.label,
            key.formats.len(),
            key.filterable.len()
        );
        Ok(CachedPipeline {
            pipeline,
            bind_group_layout,
        })
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        draw: &DrawBindings,
        key: &PipelineKey,
    ) -> Result<(), GpuError> {
        let cached = self
            .pipelines
            .get(key)
            .ok_or(GpuError::UnknownProgram(draw.program))?;
        let program = self.program(draw.program)?;
        let device = &self.context.device;

        let uniform_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Uniforms", program.label)),
                contents: bytemuck::cast_slice(&program.uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let inputs = draw
            .inputs
            .iter()
            .map(|&id| self.texture(id))
            .collect::<Result<Vec<_>, _>>()?;
        let mut entries = Vec::with_capacity(1 + 2 * inputs.len());
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        });
        for (index, input) in (0u32..).zip(&inputs) {
            entries.push(wgpu::BindGroupEntry {
                binding: texture_binding(index),
                resource: wgpu::BindingResource::TextureView(&input.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: sampler_binding(index),
                resource: wgpu::BindingResource::Sampler(&input.sampler),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Bind Group", program.label)),
            layout: &cached.bind_group_layout,
            entries: &entries,
        });

        let color_attachments = draw
            .outputs
            .iter()
            .map(|&id| {
                self.texture(id).map(|t| {
                    Some(wgpu::RenderPassColorAttachment {
                        view: &t.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&program.label),
                color_attachments: &color_attachments,
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            let vp = draw.viewport;
            #[allow(clippy::cast_precision_loss)]
            pass.set_viewport(
                vp.x as f32,
                vp.y as f32,
                vp.width as f32,
                vp.height as f32,
                0.0,
                1.0,
            );
            pass.set_pipeline(&cached.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        Ok(())
    }
}

impl GpuBackend for WgpuBackend {
    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
    ) -> Result<TextureId, GpuError> {
        desc.validate(self.context.max_texture_dimension())?;
        let format = desc.format.to_wgpu();
        let allowed = self.context.format_features(format).allowed_usages;
        if !allowed.contains(wgpu::TextureUsages::TEXTURE_BINDING) {
            return Err(GpuError::UnsupportedFormat(format!(
                "{format:?} cannot be sampled on this device"
            )));
        }
        // Depth textures are only sampled. Color textures get the render and
        // copy usages the format allows on this device.
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING;
        if !desc.format.is_depth() {
            usage |= allowed
                & (wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC);
        }
        if !usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
            log::debug!("'{}' ({format:?}) is sample-only on this device", desc.label);
        }
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: match desc.kind {
                TextureKind::D2 => wgpu::TextureDimension::D2,
            },
            format,
            usage,
            view_formats: &[],
        });
        Ok(self.insert_texture(texture, desc.clone()))
    }

    // Drops this backend's reference only. Unsubmitted passes and the host
    // (for imported textures) keep the texture alive.
    fn release_texture(&mut self, id: TextureId) {
        if self.textures.remove(id.raw()).is_some() {
            self.state.forget_texture(id);
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
        let shader = self
            .context
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
            });
        Ok(ProgramId::from_raw(self.programs.insert(GpuProgram {
            label: label.to_owned(),
            shader,
            layout: layout.clone(),
            uniforms: [0.0; MAX_UNIFORMS],
        })))
    }

    fn release_program(&mut self, id: ProgramId) {
        if self.programs.remove(id.raw()).is_some() {
            self.state.forget_program(id);
            self.pipelines.retain(|key, _| key.program != id);
        }
    }

    fn create_frame_target(
        &mut self,
        name: &str,
        attachments: &[(Attachment, TextureId)],
    ) -> Result<FrameTargetId, GpuError> {
        check_attachments(attachments, |id| {
            self.textures.get(id.raw()).map(|t| &t.desc)
        })?;
        for &(_, texture) in attachments {
            let usage = self.texture(texture)?.texture.usage();
            if !usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
                return Err(GpuError::InvalidAttachment(texture));
            }
        }
        let id = FrameTargetId::from_raw(self.targets.insert(attachments.to_vec()));
        log::debug!("frame target '{name}' is {id}");
        Ok(id)
    }

    fn release_frame_target(&mut self, id: FrameTargetId) {
        if self.targets.remove(id.raw()).is_some() {
            self.state.forget_target(id);
        }
    }

    fn bind_frame_target(
        &mut self,
        id: FrameTargetId,
        draw_buffers: &[Attachment],
    ) -> Result<(), GpuError> {
        let attachments = self.target(id)?.to_vec();
        self.state.bind_target(id, draw_buffers, &attachments)
    }

    fn set_draw_buffers(
        &mut self,
        id: FrameTargetId,
        draw_buffers: &[Attachment],
    ) -> Result<(), GpuError> {
        let attachments = self.target(id)?.to_vec();
        self.state.set_draw_buffers(id, draw_buffers, &attachments)
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<(), GpuError> {
        self.state.set_viewport(viewport)
    }

    fn use_program(&mut self, id: ProgramId) -> Result<(), GpuError> {
        let _ = self.program(id)?;
        self.state.use_program(id);
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
        Ok(())
    }

    fn bind_texture(
        &mut self,
        texture: TextureId,
        sampler: SamplerHandle,
        slot: u32,
    ) -> Result<(), GpuError> {
        let _ = self.texture(texture)?;
        let count = self.program(sampler.program)?.layout.sampler_count;
        self.state.bind_texture(texture, sampler, slot, count)
    }

    fn draw_fullscreen(&mut self) -> Result<(), GpuError> {
        let program_id = self.state.program().ok_or(GpuError::NoActiveProgram)?;
        let target_id = self.state.target().ok_or(GpuError::NoFrameTarget)?;
        let sampler_count = self.program(program_id)?.layout.sampler_count;
        let attachments = self.target(target_id)?;
        let draw = self.state.resolve_draw(sampler_count, attachments, |id| {
            self.texture(id).map(|t| t.desc.resolution())
        })?;

        let key = self.pipeline_key(&draw)?;
        if !self.pipelines.contains_key(&key) {
            let cached = self.build_pipeline(&key)?;
            let _ = self.pipelines.insert(key.clone(), cached);
        }

        let mut encoder = self
            .encoder
            .take()
            .unwrap_or_else(|| self.context.create_encoder());
        let encoded = self.encode_pass(&mut encoder, &draw, &key);
        self.encoder = Some(encoder);
        encoded?;
        self.pending_passes += 1;
        Ok(())
    }
}
