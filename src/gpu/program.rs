//! Compiled shading programs.
//!
//! A program is built in two steps: the [`ProgramLoader`] composes shader
//! files into a [`ProgramBuilder`], which records the sampler count and the
//! uniform names before [`ProgramBuilder::build`] compiles it on a backend.
//! After that the layout is fixed.
//!
//! Binding convention (group 0) shared by every backend and shader:
//! - binding 0: uniform block `array<vec4<f32>, 4>`; uniform `i` is
//!   component `i % 4` of element `i / 4`
//! - binding `1 + 2i`: texture for sampler input `i`
//! - binding `2 + 2i`: sampler for sampler input `i`
//!
//! [`ProgramLoader`]: crate::gpu::program_loader::ProgramLoader

use rustc_hash::FxHashMap;

use crate::gpu::backend::{GpuBackend, GpuError, ProgramId};

/// Number of `f32` uniforms a program's uniform block holds.
pub const MAX_UNIFORMS: usize = 16;
/// Number of sampler inputs a program may enable.
pub const MAX_SAMPLERS: u32 = 8;
/// Number of texture units on a backend.
pub const MAX_TEXTURE_UNITS: u32 = 16;

/// Sampler count and uniform names of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    /// Number of sampler inputs.
    pub sampler_count: u32,
    /// Uniform names, in location order.
    pub uniforms: Vec<String>,
}

impl ProgramLayout {
    /// Check the layout against backend limits.
    ///
    /// # Errors
    ///
    /// [`GpuError::SamplerCapacity`] or [`GpuError::UniformCapacity`].
    pub fn validate(&self) -> Result<(), GpuError> {
        if self.sampler_count > MAX_SAMPLERS {
            return Err(GpuError::SamplerCapacity {
                requested: self.sampler_count,
                max: MAX_SAMPLERS,
            });
        }
        if self.uniforms.len() > MAX_UNIFORMS {
            return Err(GpuError::UniformCapacity {
                requested: self.uniforms.len(),
                max: MAX_UNIFORMS,
            });
        }
        Ok(())
    }
}

/// Location of a uniform inside one program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    /// Owning program.
    pub program: ProgramId,
    /// Index into the uniform block.
    pub index: u32,
}

/// A sampler input of one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle {
    /// Owning program.
    pub program: ProgramId,
    /// Sampler input index.
    pub index: u32,
}

/// A composed but not yet compiled program.
#[derive(Debug)]
pub struct ProgramBuilder {
    label: String,
    module: naga::Module,
    layout: ProgramLayout,
}

impl ProgramBuilder {
    /// Start a program from composed shader IR.
    #[must_use]
    pub fn new(label: &str, module: naga::Module) -> Self {
        Self {
            label: label.to_owned(),
            module,
            layout: ProgramLayout::default(),
        }
    }

    /// Enable `count` sampler inputs (indices `0..count`).
    #[must_use]
    pub fn enable_samplers(mut self, count: u32) -> Self {
        self.layout.sampler_count = count;
        self
    }

    /// Register a uniform. Registering the same name twice keeps the first
    /// location.
    #[must_use]
    pub fn add_uniform(mut self, name: &str) -> Self {
        if !self.layout.uniforms.iter().any(|u| u == name) {
            self.layout.uniforms.push(name.to_owned());
        }
        self
    }

    /// The layout recorded so far.
    #[must_use]
    pub const fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    /// Compile on `gpu`.
    ///
    /// # Errors
    ///
    /// Layout capacity errors, or the backend's compilation failure.
    pub fn build<G: GpuBackend>(self, gpu: &mut G) -> Result<Program, GpuError> {
        self.layout.validate()?;
        let id = gpu.create_program(&self.label, self.module, &self.layout)?;
        log::debug!(
            "built program '{}' ({} samplers, {} uniforms)",
            self.label,
            self.layout.sampler_count,
            self.layout.uniforms.len()
        );
        let uniform_index = self
            .layout
            .uniforms
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as u32))
            .collect();
        Ok(Program {
            id,
            label: self.label,
            layout: self.layout,
            uniform_index,
        })
    }
}

/// A compiled program on a [`GpuBackend`].
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    label: String,
    layout: ProgramLayout,
    uniform_index: FxHashMap<String, u32>,
}

impl Program {
    /// Make this the active program.
    ///
    /// # Errors
    ///
    /// Propagates the backend's failure.
    pub fn bind<G: GpuBackend>(&self, gpu: &mut G) -> Result<(), GpuError> {
        gpu.use_program(self.id)
    }

    /// Look up a registered uniform.
    ///
    /// # Errors
    ///
    /// [`GpuError::UnknownUniform`] if `name` was never registered.
    pub fn uniform(&self, name: &str) -> Result<UniformLocation, GpuError> {
        self.uniform_index
            .get(name)
            .map(|&index| UniformLocation {
                program: self.id,
                index,
            })
            .ok_or_else(|| GpuError::UnknownUniform(name.to_owned()))
    }

    /// Handle for sampler input `index`.
    ///
    /// # Errors
    ///
    /// [`GpuError::SamplerOutOfRange`] past the enabled sampler count.
    pub fn sampler(&self, index: u32) -> Result<SamplerHandle, GpuError> {
        if index >= self.layout.sampler_count {
            return Err(GpuError::SamplerOutOfRange {
                index,
                count: self.layout.sampler_count,
            });
        }
        Ok(SamplerHandle {
            program: self.id,
            index,
        })
    }

    /// Backend handle.
    #[must_use]
    pub const fn id(&self) -> ProgramId {
        self.id
    }

    /// Debug label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sampler count and uniform names.
    #[must_use]
    pub const fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    /// Free the compiled program.
    pub fn release<G: GpuBackend>(self, gpu: &mut G) {
        log::debug!("releasing program '{}'", self.label);
        gpu.release_program(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::RecordingBackend;
    use crate::gpu::shader_composer::tests::passthrough_module;

    #[test]
    fn add_uniform_dedupes() {
        let builder = ProgramBuilder::new("P", passthrough_module())
            .add_uniform("a")
            .add_uniform("b")
            .add_uniform("a");
        assert_eq!(builder.layout().uniforms, vec!["a", "b"]);
    }

    #[test]
    fn uniform_and_sampler_lookup() {
        let mut gpu = RecordingBackend::new();
        let program = ProgramBuilder::new("P", passthrough_module())
            .enable_samplers(3)
            .add_uniform("fps_scaler")
            .add_uniform("strength")
            .build(&mut gpu)
            .unwrap();

        let loc = program.uniform("strength").unwrap();
        assert_eq!(loc.index, 1);
        assert_eq!(loc.program, program.id());
        assert_eq!(
            program.uniform("missing"),
            Err(GpuError::UnknownUniform("missing".to_owned()))
        );
        assert_eq!(program.sampler(2).unwrap().index, 2);
        assert_eq!(
            program.sampler(3),
            Err(GpuError::SamplerOutOfRange { index: 3, count: 3 })
        );
    }

    #[test]
    fn capacity_limits_are_enforced() {
        let mut gpu = RecordingBackend::new();
        let err = ProgramBuilder::new("P", passthrough_module())
            .enable_samplers(MAX_SAMPLERS + 1)
            .build(&mut gpu)
            .unwrap_err();
        assert_eq!(
            err,
            GpuError::SamplerCapacity {
                requested: MAX_SAMPLERS + 1,
                max: MAX_SAMPLERS
            }
        );

        let mut builder = ProgramBuilder::new("P", passthrough_module());
        for i in 0..=MAX_UNIFORMS {
            builder = builder.add_uniform(&format!("u{i}"));
        }
        assert!(matches!(
            builder.build(&mut gpu),
            Err(GpuError::UniformCapacity { .. })
        ));
    }
}
