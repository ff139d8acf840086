//! Effect and host options with TOML preset support.
//!
//! Options serialize to/from TOML so tuned settings can be kept as presets.
//! Every sub-struct uses `#[serde(default)]`, so a preset only needs the
//! fields it overrides.

mod motion_blur;
mod render;

use std::path::Path;

pub use motion_blur::MotionBlurOptions;
pub use render::RenderOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::EffectError;

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[motion_blur]`) work correctly.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Motion blur parameters.
    pub motion_blur: MotionBlurOptions,
    /// Host rendering parameters.
    pub render: RenderOptions,
}

impl Options {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// [`EffectError::Io`] if the file can't be read,
    /// [`EffectError::OptionsParse`] if it isn't valid options TOML.
    pub fn load(path: &Path) -> Result<Self, EffectError> {
        let content = std::fs::read_to_string(path).map_err(EffectError::Io)?;
        toml::from_str(&content)
            .map_err(|e| EffectError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// [`EffectError::OptionsParse`] on serialization failure,
    /// [`EffectError::Io`] on write failure.
    pub fn save(&self, path: &Path) -> Result<(), EffectError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EffectError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(EffectError::Io)?;
        }
        std::fs::write(path, content).map_err(EffectError::Io)
    }

    /// List available preset names (TOML file stems) in a directory.
    #[must_use]
    pub fn list_presets(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) =
                        path.file_stem().and_then(|s| s.to_str())
                    {
                        names.push(stem.to_owned());
                    }
                }
            }
        }
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::texture::TextureFormat;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = Options::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: Options = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[motion_blur]
fixed_timestep = false
output_format = "rgba32_float"
"#;
        let opts: Options = toml::from_str(toml_str).unwrap();
        assert!(!opts.motion_blur.fixed_timestep);
        assert_eq!(opts.motion_blur.output_format, TextureFormat::Rgba32Float);
        // Everything else should be default
        assert_eq!(opts.motion_blur.reference_fps, 60.0);
        assert_eq!(opts.render, RenderOptions::default());
    }

    #[test]
    fn save_load_and_list_presets() {
        let dir = std::env::temp_dir().join("motionfx_presets_test");
        let _ = std::fs::remove_dir_all(&dir);
        let mut opts = Options::default();
        opts.render.width = 640;
        opts.save(&dir.join("small.toml")).unwrap();
        Options::default().save(&dir.join("default.toml")).unwrap();

        assert_eq!(Options::load(&dir.join("small.toml")).unwrap(), opts);
        assert_eq!(Options::list_presets(&dir), vec!["default", "small"]);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = std::env::temp_dir().join("motionfx_bad_options_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[motion_blur]\nreference_fps = \"fast\"\n").unwrap();
        assert!(matches!(
            Options::load(&path),
            Err(EffectError::OptionsParse(_))
        ));
    }

    #[test]
    fn schema_exposes_motion_blur_controls() {
        let schema = serde_json::to_value(Options::json_schema()).unwrap();
        let controls = schema["properties"]["motion_blur"]["properties"]
            .as_object()
            .unwrap();
        assert_eq!(controls["fixed_timestep"]["title"], "Fixed Timestep");
        assert_eq!(controls["reference_fps"]["title"], "Reference FPS");
        // The storage format is a host decision, not a UI control.
        assert!(!controls.contains_key("output_format"));
    }
}
