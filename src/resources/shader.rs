//! Shader Handles
//!
//! A [`ShaderHandle`] names a shader program owned by the backend's shader
//! library. It is cheap to clone and serializes as a plain string, so it can
//! live in settings files next to the effect parameters.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a compiled fullscreen shader program.
///
/// The handle itself carries no GPU state. A backend resolves it into a
/// [`ShaderProgramId`](crate::renderer::ShaderProgramId) once the program is
/// available; until then the handle is simply "unresolved".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShaderHandle(Cow<'static, str>);

impl ShaderHandle {
    /// Name of the built-in gradient fog program.
    pub const GRADIENT_FOG: &'static str = "passes/gradient_fog";

    /// Creates a handle from a static program name.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a handle from an owned program name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Handle of the built-in gradient fog program.
    #[must_use]
    pub const fn gradient_fog() -> Self {
        Self::from_static(Self::GRADIENT_FOG)
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for ShaderHandle {
    fn default() -> Self {
        Self::gradient_fog()
    }
}

impl fmt::Display for ShaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ShaderHandle {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}
