//! Shader file loading, composition and caching.
//!
//! The loader reads WGSL files from disk, stitches vertex and fragment
//! stages into one source, composes it with the shared `motionfx::*`
//! modules, and hands back a [`ProgramBuilder`]. Composed IR is cached per
//! file list so reloading an effect does not re-read or re-compose shaders;
//! call [`ProgramLoader::clear_cache`] to pick up edited sources.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::error::EffectError;
use crate::gpu::program::ProgramBuilder;
use crate::gpu::shader_composer::ShaderComposer;

/// Import injected into post-processing programs that ship no vertex stage.
const FULLSCREEN_IMPORT: &str =
    "#import motionfx::fullscreen::{FullscreenVertex, fullscreen_vertex}";

/// Vertex stage injected into post-processing programs.
const FULLSCREEN_VERTEX: &str = "
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> FullscreenVertex {
    return fullscreen_vertex(vertex_index);
}
";

/// Pipeline stage a shader file provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage (`vs_main`).
    Vertex,
    /// Fragment stage (`fs_main`).
    Fragment,
}

/// One shader source file and the stage it provides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderFile {
    /// Stage implemented by the file.
    pub stage: ShaderStage,
    /// Path on disk.
    pub path: PathBuf,
}

impl ShaderFile {
    /// A fragment-stage file.
    pub fn fragment(path: impl Into<PathBuf>) -> Self {
        Self {
            stage: ShaderStage::Fragment,
            path: path.into(),
        }
    }

    /// A vertex-stage file.
    pub fn vertex(path: impl Into<PathBuf>) -> Self {
        Self {
            stage: ShaderStage::Vertex,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    files: Vec<ShaderFile>,
    fullscreen: bool,
}

/// Composes shader files into programs, caching the composed IR.
///
/// Shared between effects through `Rc`; interior mutability keeps the
/// composer and cache usable through a shared reference.
#[derive(Debug)]
pub struct ProgramLoader {
    composer: RefCell<ShaderComposer>,
    cache: RefCell<FxHashMap<CacheKey, naga::Module>>,
}

impl ProgramLoader {
    /// Create a loader with the shared shader modules registered.
    ///
    /// # Errors
    ///
    /// [`EffectError::ShaderCompose`] if a shared module fails to register.
    pub fn new() -> Result<Self, EffectError> {
        let composer = ShaderComposer::new().map_err(|e| {
            EffectError::ShaderCompose {
                path: PathBuf::from("modules"),
                message: e.to_string(),
            }
        })?;
        Ok(Self {
            composer: RefCell::new(composer),
            cache: RefCell::new(FxHashMap::default()),
        })
    }

    /// Compose `files` as-is. The files together must define `vs_main` and
    /// `fs_main`.
    ///
    /// # Errors
    ///
    /// [`EffectError::ShaderRead`] for unreadable files,
    /// [`EffectError::ShaderCompose`] for composition failures.
    pub fn create_program(
        &self,
        label: &str,
        files: &[ShaderFile],
    ) -> Result<ProgramBuilder, EffectError> {
        let module = self.compose(files, false)?;
        Ok(ProgramBuilder::new(label, module))
    }

    /// Compose a screen-space program. When `files` has no vertex stage the
    /// shared fullscreen-triangle vertex stage is injected; fragment stages
    /// receive the interpolated `@location(0) uv: vec2<f32>`.
    ///
    /// The program label is the first file's stem.
    ///
    /// # Errors
    ///
    /// Same as [`create_program`](Self::create_program).
    pub fn create_post_processing_program(
        &self,
        files: &[ShaderFile],
    ) -> Result<ProgramBuilder, EffectError> {
        let label = files
            .first()
            .and_then(|f| f.path.file_stem())
            .map_or_else(
                || "post_process".to_owned(),
                |stem| stem.to_string_lossy().into_owned(),
            );
        let fullscreen = !files.iter().any(|f| f.stage == ShaderStage::Vertex);
        let module = self.compose(files, fullscreen)?;
        Ok(ProgramBuilder::new(&label, module))
    }

    /// Drop every cached module.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Number of cached modules.
    #[must_use]
    pub fn cached_programs(&self) -> usize {
        self.cache.borrow().len()
    }

    fn compose(
        &self,
        files: &[ShaderFile],
        fullscreen: bool,
    ) -> Result<naga::Module, EffectError> {
        let key = CacheKey {
            files: files.to_vec(),
            fullscreen,
        };
        if let Some(module) = self.cache.borrow().get(&key) {
            return Ok(module.clone());
        }

        let primary = files
            .iter()
            .find(|f| f.stage == ShaderStage::Fragment)
            .or_else(|| files.first())
            .map_or_else(PathBuf::new, |f| f.path.clone());

        let mut sources = Vec::with_capacity(files.len() + 1);
        for file in files {
            sources.push(read_source(&file.path)?);
        }
        if fullscreen {
            sources.push(format!("{FULLSCREEN_IMPORT}\n{FULLSCREEN_VERTEX}"));
        }
        let source = stitch(&sources);

        let mut composer = self.composer.borrow_mut();
        let module = composer
            .compose_naga(&source, &primary.to_string_lossy())
            .map_err(|e| EffectError::ShaderCompose {
                path: primary.clone(),
                message: composer.describe(&e),
            })?;
        log::debug!("composed shader program from '{}'", primary.display());

        let _ = self.cache.borrow_mut().insert(key, module.clone());
        Ok(module)
    }
}

fn read_source(path: &Path) -> Result<String, EffectError> {
    std::fs::read_to_string(path).map_err(|source| EffectError::ShaderRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Join stage sources into one composable source. `#import` directives
/// (including multi-line brace lists) are hoisted to the top and
/// de-duplicated, since the composer expects them before any declaration.
fn stitch(sources: &[String]) -> String {
    let mut imports: Vec<String> = Vec::new();
    let mut body = String::new();
    for source in sources {
        let mut pending: Option<String> = None;
        for line in source.lines() {
            if let Some(mut import) = pending.take() {
                import.push('\n');
                import.push_str(line);
                if braces_balanced(&import) {
                    push_unique(&mut imports, import);
                } else {
                    pending = Some(import);
                }
            } else if line.trim_start().starts_with("#import") {
                if braces_balanced(line) {
                    push_unique(&mut imports, line.to_owned());
                } else {
                    pending = Some(line.to_owned());
                }
            } else {
                body.push_str(line);
                body.push('\n');
            }
        }
        if let Some(import) = pending {
            push_unique(&mut imports, import);
        }
    }
    let mut out = imports.join("\n");
    out.push('\n');
    out.push_str(&body);
    out
}

fn braces_balanced(text: &str) -> bool {
    text.matches('{').count() == text.matches('}').count()
}

fn push_unique(imports: &mut Vec<String>, import: String) {
    if !imports.contains(&import) {
        imports.push(import);
    }
}
