use std::fmt;

use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, ComposerError, NagaModuleDescriptor,
    ShaderLanguage, ShaderType,
};

/// Wraps `naga_oil::compose::Composer` to provide shader composition with
/// `#import` support.
///
/// Pre-loads the shared WGSL modules at construction time. Consuming shaders
/// use `#import motionfx::module_name` to pull in shared code. The composer
/// produces `naga::Module` IR directly, skipping WGSL re-parse when the
/// program is created.
pub struct ShaderComposer {
    composer: Composer,
}

impl fmt::Debug for ShaderComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderComposer").finish_non_exhaustive()
    }
}

/// Shared module definition: (source, file_path)
struct ModuleDef {
    source: &'static str,
    file_path: &'static str,
}

/// Shared modules in dependency order.
const MODULES: &[ModuleDef] = &[ModuleDef {
    source: include_str!("../../assets/shaders/modules/fullscreen.wgsl"),
    file_path: "modules/fullscreen.wgsl",
}];

impl ShaderComposer {
    /// Create a composer with every shared module registered.
    ///
    /// # Errors
    ///
    /// Returns the composer error of the first shared module that fails to
    /// register.
    pub fn new() -> Result<Self, Box<ComposerError>> {
        let mut composer = Composer::default();
        for m in MODULES {
            let _ = composer
                .add_composable_module(ComposableModuleDescriptor {
                    source: m.source,
                    file_path: m.file_path,
                    language: ShaderLanguage::Wgsl,
                    ..Default::default()
                })
                .map_err(Box::new)?;
        }
        Ok(Self { composer })
    }

    /// Compose a shader source (which may contain `#import` directives) into
    /// a `naga::Module`.
    ///
    /// # Errors
    ///
    /// Returns the composer error on parse, import or validation failure.
    pub fn compose_naga(
        &mut self,
        source: &str,
        file_path: &str,
    ) -> Result<naga::Module, Box<ComposerError>> {
        self.composer
            .make_naga_module(NagaModuleDescriptor {
                source,
                file_path,
                shader_type: ShaderType::Wgsl,
                ..Default::default()
            })
            .map_err(Box::new)
    }

    /// Render a composer error with its source context.
    #[must_use]
    pub fn describe(&self, error: &ComposerError) -> String {
        error.emit_to_string(&self.composer)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const PASSTHROUGH: &str = r"
#import motionfx::fullscreen::{FullscreenVertex, fullscreen_vertex}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> FullscreenVertex {
    return fullscreen_vertex(vertex_index);
}

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 0.0, 1.0);
}
";

    /// A minimal composed program with both entry points.
    pub(crate) fn passthrough_module() -> naga::Module {
        ShaderComposer::new()
            .unwrap()
            .compose_naga(PASSTHROUGH, "passthrough.wgsl")
            .unwrap()
    }

    /// Shader source definitions for all composable shaders in the project.
    /// Each entry is (source, file_path).
    fn all_shader_sources() -> Vec<(&'static str, &'static str)> {
        vec![(
            include_str!("../../assets/shaders/screen/motion_blur.wgsl"),
            "motion_blur.wgsl",
        )]
    }

    #[test]
    fn test_all_shaders_compose() {
        let mut composer = ShaderComposer::new().unwrap();
        for (source, file_path) in all_shader_sources() {
            let _ = composer
                .compose_naga(source, file_path)
                .unwrap_or_else(|e| {
                    panic!("Shader '{}' failed to compose: {}", file_path, e)
                });
        }
    }

    #[test]
    fn passthrough_has_both_entry_points() {
        let module = passthrough_module();
        let names: Vec<_> =
            module.entry_points.iter().map(|ep| ep.name.as_str()).collect();
        assert!(names.contains(&"vs_main"));
        assert!(names.contains(&"fs_main"));
    }
}
