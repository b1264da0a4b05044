//! Shader Library
//!
//! Maps program names to WGSL sources and their uniform layouts.
//!
//! Built-in programs are embedded from `src/renderer/shaders` with
//! `rust-embed`; program `passes/gradient_fog` lives in
//! `shaders/passes/gradient_fog.wgsl`. Hosts may register extra programs at
//! runtime, which take precedence over embedded files with the same name.
//!
//! Every program follows the same binding convention:
//!
//! | Group | Binding | Resource                                    |
//! |-------|---------|---------------------------------------------|
//! | 0     | 0       | source color `texture_2d<f32>`, unfiltered  |
//! | 0     | 1       | scene depth `texture_depth_2d`              |
//! | 0     | 2       | frame uniforms (near, far, flag)            |
//! | 1     | 0       | program uniform block                       |
//!
//! There is no sampler: programs read with `textureLoad` so the source may
//! be any float format, `Rgba32Float` included.

use std::borrow::Cow;

use rust_embed::RustEmbed;
use rustc_hash::FxHashMap;

use super::uniforms::UniformLayout;
use crate::resources::ShaderHandle;

#[derive(RustEmbed)]
#[folder = "src/renderer/shaders"]
struct ShaderAssets;

/// WGSL source and uniform layout of one program.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    pub wgsl: Cow<'static, str>,
    pub layout: UniformLayout,
}

/// Lookup table of program sources.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    registered: FxHashMap<String, ProgramSource>,
}

impl ShaderLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a program, replacing any previous source under `name`.
    pub fn register(&mut self, name: impl Into<String>, wgsl: impl Into<String>, layout: UniformLayout) {
        self.registered.insert(
            name.into(),
            ProgramSource {
                wgsl: Cow::Owned(wgsl.into()),
                layout,
            },
        );
    }

    /// Finds the source of a program, registered programs first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ProgramSource> {
        if let Some(source) = self.registered.get(name) {
            return Some(source.clone());
        }

        let file = ShaderAssets::get(&format!("{name}.wgsl"))?;
        let wgsl = match file.data {
            Cow::Borrowed(bytes) => Cow::Borrowed(std::str::from_utf8(bytes).ok()?),
            Cow::Owned(bytes) => Cow::Owned(String::from_utf8(bytes).ok()?),
        };
        Some(ProgramSource {
            wgsl,
            layout: builtin_layout(name).unwrap_or_default(),
        })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.registered.contains_key(name) || ShaderAssets::get(&format!("{name}.wgsl")).is_some()
    }

    /// Names of the embedded programs.
    pub fn embedded_names() -> impl Iterator<Item = String> {
        ShaderAssets::iter().filter_map(|path| path.strip_suffix(".wgsl").map(str::to_string))
    }
}

fn builtin_layout(name: &str) -> Option<UniformLayout> {
    match name {
        ShaderHandle::GRADIENT_FOG => Some(UniformLayout::gradient_fog()),
        _ => None,
    }
}
