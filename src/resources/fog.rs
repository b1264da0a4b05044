//! Gradient Fog Configuration
//!
//! This module defines the gradient fog settings as pure data structures,
//! following the same pattern as the other post-processing settings: the
//! pass reads them, nothing here touches the GPU.
//!
//! The fog blends the scene color towards a three-stop color gradient
//! (`near` → `middle` → `far`) as the view distance of a pixel moves from
//! `start_distance` to `end_distance`.
//!
//! # Uniform Slots
//!
//! | Slot                | Kind   | Field                |
//! |---------------------|--------|----------------------|
//! | `startDistance`     | scalar | `start_distance`     |
//! | `endDistance`       | scalar | `end_distance`       |
//! | `transparentFactor` | scalar | `transparent_factor` |
//! | `nearColor`         | color  | `near_color`         |
//! | `middleColor`       | color  | `middle_color`       |
//! | `farColor`          | color  | `far_color`          |
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut settings = FogSettings::load("fog.json")?;
//! settings.parameters_mut().end_distance = 120.0;
//! feature.set_settings(settings);
//! ```

use std::path::Path;
use std::sync::Arc;

use glam::Vec4;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::{FogError, Result};
use crate::resources::shader::ShaderHandle;

/// Smallest distance span used when normalizing the fog factor.
const MIN_FOG_SPAN: f32 = 1e-4;

/// Named uniform slots of the gradient fog program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FogUniform {
    StartDistance,
    EndDistance,
    TransparentFactor,
    NearColor,
    MiddleColor,
    FarColor,
}

impl FogUniform {
    /// Scalar slots, in upload order.
    pub const SCALARS: [FogUniform; 3] = [
        Self::StartDistance,
        Self::EndDistance,
        Self::TransparentFactor,
    ];

    /// Color slots, in upload order.
    pub const COLORS: [FogUniform; 3] = [Self::NearColor, Self::MiddleColor, Self::FarColor];

    /// Uniform slot name as declared by the program layout.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StartDistance => "startDistance",
            Self::EndDistance => "endDistance",
            Self::TransparentFactor => "transparentFactor",
            Self::NearColor => "nearColor",
            Self::MiddleColor => "middleColor",
            Self::FarColor => "farColor",
        }
    }
}

/// GPU layout of the gradient fog uniform block.
///
/// Must match `struct FogUniforms` in `gradient_fog.wgsl`.
/// Total size: 64 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FogUniforms {
    pub near_color: [f32; 4],
    pub middle_color: [f32; 4],
    pub far_color: [f32; 4],
    pub start_distance: f32,
    pub end_distance: f32,
    pub transparent_factor: f32,
    pub _pad: f32,
}

/// The six tunables of the gradient fog.
///
/// Values are taken as-is. [`validate`](Self::validate) reports values that
/// produce odd output, but nothing clamps or rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogParameters {
    /// View distance at which the fog starts (world units).
    pub start_distance: f32,
    /// View distance at which the fog reaches the far color.
    pub end_distance: f32,
    /// How much of the skybox shows through the fog, in `[0, 1]`.
    pub transparent_factor: f32,
    pub near_color: Vec4,
    pub middle_color: Vec4,
    pub far_color: Vec4,
}

impl Default for FogParameters {
    fn default() -> Self {
        Self {
            start_distance: 0.0,
            end_distance: 50.0,
            transparent_factor: 0.6,
            near_color: Vec4::new(0.0, 0.2, 0.35, 1.0),
            middle_color: Vec4::new(0.62, 0.86, 1.0, 1.0),
            far_color: Vec4::new(0.85, 0.96, 1.0, 1.0),
        }
    }
}

impl FogParameters {
    /// Value of a scalar slot, `None` for color slots.
    #[must_use]
    pub fn scalar(&self, slot: FogUniform) -> Option<f32> {
        match slot {
            FogUniform::StartDistance => Some(self.start_distance),
            FogUniform::EndDistance => Some(self.end_distance),
            FogUniform::TransparentFactor => Some(self.transparent_factor),
            _ => None,
        }
    }

    /// Value of a color slot, `None` for scalar slots.
    #[must_use]
    pub fn color(&self, slot: FogUniform) -> Option<Vec4> {
        match slot {
            FogUniform::NearColor => Some(self.near_color),
            FogUniform::MiddleColor => Some(self.middle_color),
            FogUniform::FarColor => Some(self.far_color),
            _ => None,
        }
    }

    /// Checks the documented ranges.
    ///
    /// Returns the first violation found. Callers decide what to do with it;
    /// the fog pass only logs it.
    pub fn validate(&self) -> Result<()> {
        let scalars = [
            ("start_distance", self.start_distance),
            ("end_distance", self.end_distance),
            ("transparent_factor", self.transparent_factor),
        ];
        if let Some((name, value)) = scalars.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FogError::InvalidParameters(format!(
                "{name} is not finite ({value})"
            )));
        }
        if self.start_distance < 0.0 {
            return Err(FogError::InvalidParameters(format!(
                "start_distance must be >= 0 (got {})",
                self.start_distance
            )));
        }
        if self.end_distance <= self.start_distance {
            return Err(FogError::InvalidParameters(format!(
                "end_distance ({}) must be greater than start_distance ({})",
                self.end_distance, self.start_distance
            )));
        }
        if !(0.0..=1.0).contains(&self.transparent_factor) {
            return Err(FogError::InvalidParameters(format!(
                "transparent_factor must be in [0, 1] (got {})",
                self.transparent_factor
            )));
        }

        let colors = [
            ("near_color", self.near_color),
            ("middle_color", self.middle_color),
            ("far_color", self.far_color),
        ];
        for (name, color) in colors {
            if !color.is_finite() || color.min_element() < 0.0 || color.max_element() > 1.0 {
                return Err(FogError::InvalidParameters(format!(
                    "{name} channels must be in [0, 1] (got {color})"
                )));
            }
        }
        Ok(())
    }

    /// Normalized fog amount for a view distance (0 at start, 1 at end).
    #[must_use]
    pub fn fog_factor(&self, distance: f32) -> f32 {
        let span = (self.end_distance - self.start_distance).max(MIN_FOG_SPAN);
        ((distance - self.start_distance) / span).clamp(0.0, 1.0)
    }

    /// Samples the three-stop gradient at `t` in `[0, 1]`.
    #[must_use]
    pub fn gradient(&self, t: f32) -> Vec4 {
        if t < 0.5 {
            self.near_color.lerp(self.middle_color, t * 2.0)
        } else {
            self.middle_color.lerp(self.far_color, (t - 0.5) * 2.0)
        }
    }

    /// Reference gradient fog blend.
    ///
    /// `distance` is the linear view distance of the pixel, `None` when no
    /// depth is available (the color passes through). Sky pixels are fogged
    /// by `1 - transparent_factor` of the regular amount. Scene alpha is kept.
    #[must_use]
    pub fn shade(&self, scene: Vec4, distance: Option<f32>, is_sky: bool) -> Vec4 {
        let Some(distance) = distance else {
            return scene;
        };

        let t = self.fog_factor(distance);
        let fog = self.gradient(t);
        let mut amount = t * fog.w;
        if is_sky {
            amount *= 1.0 - self.transparent_factor;
        }

        let rgb = scene.truncate().lerp(fog.truncate(), amount);
        rgb.extend(scene.w)
    }

    /// Packs the parameters into the GPU uniform layout.
    #[must_use]
    pub fn to_uniforms(&self) -> FogUniforms {
        FogUniforms {
            near_color: self.near_color.to_array(),
            middle_color: self.middle_color.to_array(),
            far_color: self.far_color.to_array(),
            start_distance: self.start_distance,
            end_distance: self.end_distance,
            transparent_factor: self.transparent_factor,
            _pad: 0.0,
        }
    }

    /// Raw bits of the packed uniforms. Unlike `==`, two parameter sets
    /// holding the same NaN compare equal.
    #[must_use]
    pub fn bit_pattern(&self) -> [u32; 16] {
        bytemuck::cast(self.to_uniforms())
    }
}

/// User-facing gradient fog settings: the tunables plus the shader program.
///
/// Serialized flat, e.g.
///
/// ```json
/// {
///   "shader": "passes/gradient_fog",
///   "start_distance": 0.0,
///   "end_distance": 50.0,
///   "transparent_factor": 0.6,
///   "near_color": [0.0, 0.2, 0.35, 1.0],
///   "middle_color": [0.62, 0.86, 1.0, 1.0],
///   "far_color": [0.85, 0.96, 1.0, 1.0]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogSettings {
    shader: ShaderHandle,
    #[serde(flatten)]
    parameters: FogParameters,
}

impl FogSettings {
    /// Creates settings with default parameters and the built-in program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates settings for an explicit program.
    #[must_use]
    pub fn with_shader(shader: ShaderHandle, parameters: FogParameters) -> Self {
        Self { shader, parameters }
    }

    #[inline]
    #[must_use]
    pub fn shader(&self) -> &ShaderHandle {
        &self.shader
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &FogParameters {
        &self.parameters
    }

    #[inline]
    pub fn parameters_mut(&mut self) -> &mut FogParameters {
        &mut self.parameters
    }

    #[inline]
    #[must_use]
    pub fn start_distance(&self) -> f32 {
        self.parameters.start_distance
    }

    #[inline]
    #[must_use]
    pub fn end_distance(&self) -> f32 {
        self.parameters.end_distance
    }

    #[inline]
    #[must_use]
    pub fn transparent_factor(&self) -> f32 {
        self.parameters.transparent_factor
    }

    #[inline]
    #[must_use]
    pub fn near_color(&self) -> Vec4 {
        self.parameters.near_color
    }

    #[inline]
    #[must_use]
    pub fn middle_color(&self) -> Vec4 {
        self.parameters.middle_color
    }

    #[inline]
    #[must_use]
    pub fn far_color(&self) -> Vec4 {
        self.parameters.far_color
    }

    /// Replaces the tunables wholesale.
    pub fn set_parameters(&mut self, parameters: FogParameters) {
        self.parameters = parameters;
    }

    /// Points the settings at another program.
    pub fn set_shader(&mut self, shader: ShaderHandle) {
        self.shader = shader;
    }

    /// Parses settings from a JSON string. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the settings as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&json)?;
        log::debug!("Loaded fog settings from {}", path.display());
        Ok(settings)
    }

    /// Writes settings to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Wraps the settings for sharing with an editor or config watcher.
    #[must_use]
    pub fn into_shared(self) -> SharedFogSettings {
        Arc::new(RwLock::new(self))
    }
}

/// Settings shared between the render loop and an external editor.
pub type SharedFogSettings = Arc<RwLock<FogSettings>>;
