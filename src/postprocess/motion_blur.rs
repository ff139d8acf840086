//! Motion blur: three fullscreen passes ping-ponging between two owned
//! textures.
//!
//! Each pass blurs its input along the per-pixel velocity, reading depth to
//! keep foreground samples out of the background. Chaining three passes
//! compounds the sample count without a long per-pixel loop.
//!
//! | pass | reads (slot 0) | writes          |
//! |------|----------------|-----------------|
//! | 1    | scene          | final (COLOR0)  |
//! | 2    | final          | intermediate (COLOR1) |
//! | 3    | intermediate   | final (COLOR0)  |
//!
//! Velocity (slot 1) and depth (slot 2) are bound once and stay bound for
//! all three passes.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::EffectError;
use crate::gpu::backend::{GpuBackend, Viewport};
use crate::gpu::frame_target::{Attachment, FrameTarget};
use crate::gpu::program::{Program, UniformLocation};
use crate::gpu::program_loader::{ProgramLoader, ShaderFile};
use crate::gpu::screen_quad::ScreenQuad;
use crate::gpu::texture::{Resolution, Texture, TextureDescriptor};
use crate::options::MotionBlurOptions;
use crate::postprocess::effect::{EffectBase, RenderEffect};
use crate::postprocess::fps_scaler::FpsScaler;
use crate::util::frame_timing::FrameTime;

/// Fragment shader file, relative to the effect's shader directory.
pub const SHADER_FILE: &str = "motion_blur.wgsl";
/// Name of the frame-rate scaler uniform.
pub const FPS_SCALER_UNIFORM: &str = "fps_scaler";
/// Name of the uniform holding the rate the velocity buffer is authored at.
pub const REFERENCE_FPS_UNIFORM: &str = "reference_fps";
/// Sampler slot of the image being blurred.
pub const SCENE_SLOT: u32 = 0;
/// Sampler slot of the velocity buffer.
pub const VELOCITY_SLOT: u32 = 1;
/// Sampler slot of the depth buffer.
pub const DEPTH_SLOT: u32 = 2;
const SAMPLER_COUNT: u32 = 3;

const EFFECT_NAME: &str = "Motion Blur";
const FINAL_LABEL: &str = "Motion Blur Final";
const INTERMEDIATE_LABEL: &str = "Motion Blur Intermediate";

/// Per-frame inputs, owned by the caller.
#[derive(Debug, Clone, Copy)]
pub struct MotionBlurInputs<'a> {
    /// Scene color to blur.
    pub scene: &'a Texture,
    /// Scene depth.
    pub depth: &'a Texture,
    /// Screen-space velocity in UV units per frame.
    pub velocity: &'a Texture,
}

#[derive(Debug, Clone, Copy)]
struct BlurUniforms {
    fps_scaler: UniformLocation,
    reference_fps: UniformLocation,
}

#[derive(Debug)]
struct MotionBlurResources {
    program: Program,
    uniforms: BlurUniforms,
    target: FrameTarget,
    final_texture: Texture,
    intermediate_texture: Texture,
}

impl MotionBlurResources {
    fn release<G: GpuBackend>(mut self, gpu: &mut G) {
        self.target.release(gpu);
        self.final_texture.release(gpu);
        self.intermediate_texture.release(gpu);
        self.program.release(gpu);
    }
}

/// Three-pass ping-pong motion blur.
#[derive(Debug)]
pub struct MotionBlur {
    base: EffectBase,
    options: MotionBlurOptions,
    scaler: FpsScaler,
    resources: Option<MotionBlurResources>,
    warned_mismatch: Cell<bool>,
}

impl MotionBlur {
    /// An unloaded effect. Call [`load`](RenderEffect::load) before
    /// rendering.
    pub fn new(
        loader: Rc<ProgramLoader>,
        shader_dir: impl Into<PathBuf>,
        resolution: Resolution,
        options: MotionBlurOptions,
    ) -> Self {
        Self {
            base: EffectBase::new(loader, shader_dir, resolution),
            scaler: FpsScaler::from_options(&options),
            options,
            resources: None,
            warned_mismatch: Cell::new(false),
        }
    }

    /// Current options.
    #[must_use]
    pub const fn options(&self) -> &MotionBlurOptions {
        &self.options
    }

    /// Replace the options. A changed output format reloads a loaded effect;
    /// timing options apply from the next `render`.
    ///
    /// # Errors
    ///
    /// The errors of [`reload`](RenderEffect::reload).
    pub fn apply_options<G: GpuBackend>(
        &mut self,
        gpu: &mut G,
        options: &MotionBlurOptions,
    ) -> Result<(), EffectError> {
        let format_changed = options.output_format != self.options.output_format;
        self.options = options.clone();
        self.scaler = FpsScaler::from_options(options);
        if format_changed && self.is_loaded() {
            self.reload(gpu)?;
        }
        Ok(())
    }

    /// Pass-3 output: the blurred image.
    ///
    /// # Errors
    ///
    /// [`EffectError::NotLoaded`] before `load`.
    pub fn final_texture(&self) -> Result<&Texture, EffectError> {
        self.loaded().map(|r| &r.final_texture)
    }

    /// Pass-2 output.
    ///
    /// # Errors
    ///
    /// [`EffectError::NotLoaded`] before `load`.
    pub fn intermediate_texture(&self) -> Result<&Texture, EffectError> {
        self.loaded().map(|r| &r.intermediate_texture)
    }

    /// Blur `inputs.scene` into [`final_texture`](Self::final_texture).
    ///
    /// Leaves the frame target bound with attachment 0 selected, the blur
    /// program active, and the inputs bound to texture units 0-2.
    ///
    /// # Errors
    ///
    /// [`EffectError::NotLoaded`] before `load`, or the first GPU-layer
    /// failure.
    pub fn render<G: GpuBackend>(
        &self,
        gpu: &mut G,
        quad: &ScreenQuad,
        inputs: &MotionBlurInputs<'_>,
        frame: FrameTime,
    ) -> Result<(), EffectError> {
        let res = self.loaded()?;
        self.check_input_sizes(inputs);

        res.target.bind(gpu, &[Attachment::COLOR0])?;
        gpu.set_viewport(Viewport::covering(res.final_texture.resolution()))?;

        res.program.bind(gpu)?;
        gpu.set_uniform_f32(res.uniforms.fps_scaler, self.scaler.value(frame))?;
        gpu.set_uniform_f32(
            res.uniforms.reference_fps,
            self.scaler.reference_fps(),
        )?;

        let scene_sampler = res.program.sampler(SCENE_SLOT)?;
        inputs
            .velocity
            .bind(gpu, res.program.sampler(VELOCITY_SLOT)?, VELOCITY_SLOT)?;
        inputs
            .depth
            .bind(gpu, res.program.sampler(DEPTH_SLOT)?, DEPTH_SLOT)?;

        // Pass 1: scene -> final
        inputs.scene.bind(gpu, scene_sampler, SCENE_SLOT)?;
        quad.render(gpu)?;

        // Pass 2: final -> intermediate
        res.target.bind_attachments(gpu, &[Attachment::COLOR1])?;
        res.final_texture.bind(gpu, scene_sampler, SCENE_SLOT)?;
        quad.render(gpu)?;

        // Pass 3: intermediate -> final
        res.target.bind_attachments(gpu, &[Attachment::COLOR0])?;
        res.intermediate_texture.bind(gpu, scene_sampler, SCENE_SLOT)?;
        quad.render(gpu)?;

        log::trace!(
            "motion blur rendered at {}x{}",
            res.final_texture.width(),
            res.final_texture.height()
        );
        Ok(())
    }

    fn loaded(&self) -> Result<&MotionBlurResources, EffectError> {
        self.resources.as_ref().ok_or(EffectError::NotLoaded)
    }

    // Warns at most once per load.
    fn check_input_sizes(&self, inputs: &MotionBlurInputs<'_>) {
        if self.warned_mismatch.get() {
            return;
        }
        let expected = self.base.resolution();
        for (name, texture) in [
            ("scene", inputs.scene),
            ("depth", inputs.depth),
            ("velocity", inputs.velocity),
        ] {
            if texture.resolution() != expected {
                log::warn!(
                    "motion blur {name} input is {}x{}, expected {}x{}",
                    texture.width(),
                    texture.height(),
                    expected.width,
                    expected.height
                );
                self.warned_mismatch.set(true);
            }
        }
    }

    fn load_programs<G: GpuBackend>(
        &self,
        gpu: &mut G,
    ) -> Result<(Program, BlurUniforms), EffectError> {
        let program = self
            .base
            .loader()
            .create_post_processing_program(&[ShaderFile::fragment(
                self.base.shader_path(SHADER_FILE),
            )])?
            .enable_samplers(SAMPLER_COUNT)
            .add_uniform(FPS_SCALER_UNIFORM)
            .add_uniform(REFERENCE_FPS_UNIFORM)
            .build(gpu)?;
        let uniforms = program.uniform(FPS_SCALER_UNIFORM).and_then(|fps_scaler| {
            Ok(BlurUniforms {
                fps_scaler,
                reference_fps: program.uniform(REFERENCE_FPS_UNIFORM)?,
            })
        });
        match uniforms {
            Ok(uniforms) => Ok((program, uniforms)),
            Err(e) => {
                program.release(gpu);
                Err(e.into())
            }
        }
    }

    fn load_buffers<G: GpuBackend>(
        &self,
        gpu: &mut G,
    ) -> Result<(FrameTarget, Texture, Texture), EffectError> {
        let resolution = self.base.resolution();
        let format = self.options.output_format;

        let final_texture = Texture::create(
            gpu,
            TextureDescriptor::color_target(FINAL_LABEL, resolution, format),
        )?;
        let intermediate_texture = match Texture::create(
            gpu,
            TextureDescriptor::color_target(INTERMEDIATE_LABEL, resolution, format),
        ) {
            Ok(texture) => texture,
            Err(e) => {
                final_texture.release(gpu);
                return Err(e.into());
            }
        };

        let mut target = FrameTarget::new(EFFECT_NAME);
        let attachments = BTreeMap::from([
            (Attachment::COLOR0, &final_texture),
            (Attachment::COLOR1, &intermediate_texture),
        ]);
        if let Err(e) = target.load(gpu, &attachments) {
            final_texture.release(gpu);
            intermediate_texture.release(gpu);
            return Err(e.into());
        }
        Ok((target, final_texture, intermediate_texture))
    }
}

impl RenderEffect for MotionBlur {
    fn name(&self) -> &str {
        EFFECT_NAME
    }

    fn base(&self) -> &EffectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EffectBase {
        &mut self.base
    }

    fn load<G: GpuBackend>(&mut self, gpu: &mut G) -> Result<(), EffectError> {
        if self.is_loaded() {
            self.unload(gpu);
        }
        let (program, uniforms) = self.load_programs(gpu)?;
        let (target, final_texture, intermediate_texture) =
            match self.load_buffers(gpu) {
                Ok(buffers) => buffers,
                Err(e) => {
                    program.release(gpu);
                    return Err(e);
                }
            };
        self.resources = Some(MotionBlurResources {
            program,
            uniforms,
            target,
            final_texture,
            intermediate_texture,
        });
        self.warned_mismatch.set(false);
        let res = self.base.resolution();
        log::info!(
            "loaded effect '{}' at {}x{} ({:?})",
            EFFECT_NAME,
            res.width,
            res.height,
            self.options.output_format
        );
        Ok(())
    }

    fn unload<G: GpuBackend>(&mut self, gpu: &mut G) {
        if let Some(resources) = self.resources.take() {
            resources.release(gpu);
            log::info!("unloaded effect '{EFFECT_NAME}'");
        }
    }

    fn is_loaded(&self) -> bool {
        self.resources.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{GpuCommand, RecordingBackend};
    use crate::gpu::texture::TextureFormat;

    fn shader_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/shaders/screen")
    }

    fn effect(resolution: Resolution) -> MotionBlur {
        MotionBlur::new(
            Rc::new(ProgramLoader::new().unwrap()),
            shader_dir(),
            resolution,
            MotionBlurOptions::default(),
        )
    }

    fn input(
        gpu: &mut RecordingBackend,
        label: &str,
        res: Resolution,
        format: TextureFormat,
    ) -> Texture {
        Texture::create(gpu, TextureDescriptor::color_target(label, res, format))
            .unwrap()
    }

    #[test]
    fn outputs_require_load() {
        let blur = effect(Resolution::new(64, 64));
        assert!(matches!(blur.final_texture(), Err(EffectError::NotLoaded)));
        assert!(matches!(blur.intermediate_texture(), Err(EffectError::NotLoaded)));
    }

    #[test]
    fn load_allocates_matching_textures() {
        let mut gpu = RecordingBackend::new();
        let mut blur = effect(Resolution::new(320, 200));
        blur.load(&mut gpu).unwrap();
        let final_tex = blur.final_texture().unwrap();
        let inter = blur.intermediate_texture().unwrap();
        assert_eq!(final_tex.resolution(), Resolution::new(320, 200));
        assert_eq!(inter.resolution(), Resolution::new(320, 200));
        assert_eq!(final_tex.format(), TextureFormat::Rgba16Float);
        assert_eq!(gpu.live_textures(), 2);
        assert_eq!(gpu.live_programs(), 1);
        assert_eq!(gpu.live_frame_targets(), 1);
    }

    #[test]
    fn unload_releases_everything_and_is_idempotent() {
        let mut gpu = RecordingBackend::new();
        let mut blur = effect(Resolution::new(32, 32));
        blur.load(&mut gpu).unwrap();
        blur.unload(&mut gpu);
        blur.unload(&mut gpu);
        assert!(!blur.is_loaded());
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_programs(), 0);
        assert_eq!(gpu.live_frame_targets(), 0);
    }

    #[test]
    fn failed_buffer_allocation_releases_partial_state() {
        let mut gpu = RecordingBackend::new();
        gpu.fail_texture_allocation_after(1);
        let mut blur = effect(Resolution::new(32, 32));
        assert!(matches!(blur.load(&mut gpu), Err(EffectError::Gpu(_))));
        assert!(!blur.is_loaded());
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_programs(), 0);
    }

    #[test]
    fn missing_shader_fails_load() {
        let mut gpu = RecordingBackend::new();
        let mut blur = MotionBlur::new(
            Rc::new(ProgramLoader::new().unwrap()),
            "/nonexistent/shaders",
            Resolution::new(32, 32),
            MotionBlurOptions::default(),
        );
        assert!(matches!(
            blur.load(&mut gpu),
            Err(EffectError::ShaderRead { .. })
        ));
        assert_eq!(gpu.live_programs(), 0);
    }

    #[test]
    fn resize_reloads_at_new_resolution() {
        let mut gpu = RecordingBackend::new();
        let mut blur = effect(Resolution::new(32, 32));
        blur.load(&mut gpu).unwrap();
        blur.resize(&mut gpu, Resolution::new(64, 48)).unwrap();
        assert_eq!(
            blur.final_texture().unwrap().resolution(),
            Resolution::new(64, 48)
        );
        assert_eq!(gpu.live_textures(), 2);
        assert!(blur.resize(&mut gpu, Resolution::new(0, 48)).is_err());
    }

    #[test]
    fn format_change_reloads() {
        let mut gpu = RecordingBackend::new();
        let mut blur = effect(Resolution::new(16, 16));
        blur.load(&mut gpu).unwrap();
        let options = MotionBlurOptions {
            output_format: TextureFormat::Rgba32Float,
            ..MotionBlurOptions::default()
        };
        blur.apply_options(&mut gpu, &options).unwrap();
        assert_eq!(
            blur.final_texture().unwrap().format(),
            TextureFormat::Rgba32Float
        );
    }

    #[test]
    fn variable_timestep_scaler_reaches_the_uniform() {
        let mut gpu = RecordingBackend::new();
        let res = Resolution::new(16, 16);
        let mut blur = effect(res);
        blur.apply_options(
            &mut gpu,
            &MotionBlurOptions {
                fixed_timestep: false,
                ..MotionBlurOptions::default()
            },
        )
        .unwrap();
        blur.load(&mut gpu).unwrap();
        let scene = input(&mut gpu, "Scene", res, TextureFormat::Rgba16Float);
        let depth = input(&mut gpu, "Depth", res, TextureFormat::Depth32Float);
        let velocity = input(&mut gpu, "Velocity", res, TextureFormat::Rg16Float);
        let inputs = MotionBlurInputs {
            scene: &scene,
            depth: &depth,
            velocity: &velocity,
        };
        blur.render(&mut gpu, &ScreenQuad::new(), &inputs, FrameTime::at_fps(32.0))
            .unwrap();
        let uniform_writes: Vec<f32> = gpu
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::SetUniform { value, .. } => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(uniform_writes, vec![32.0, 60.0]);
    }

    #[test]
    fn reference_fps_reaches_the_shader() {
        let mut gpu = RecordingBackend::new();
        let res = Resolution::new(16, 16);
        let mut blur = effect(res);
        blur.apply_options(
            &mut gpu,
            &MotionBlurOptions {
                reference_fps: 30.0,
                ..MotionBlurOptions::default()
            },
        )
        .unwrap();
        blur.load(&mut gpu).unwrap();
        let scene = input(&mut gpu, "Scene", res, TextureFormat::Rgba16Float);
        let depth = input(&mut gpu, "Depth", res, TextureFormat::R32Float);
        let velocity = input(&mut gpu, "Velocity", res, TextureFormat::Rg16Float);
        let inputs = MotionBlurInputs {
            scene: &scene,
            depth: &depth,
            velocity: &velocity,
        };
        blur.render(&mut gpu, &ScreenQuad::new(), &inputs, FrameTime::at_fps(90.0))
            .unwrap();
        // Fixed timestep at the reference rate: the shader's velocity scale
        // (fps_scaler / reference_fps) stays at one.
        for draw in gpu.draws() {
            assert_eq!(draw.uniforms, vec![30.0, 30.0]);
        }
    }
}
