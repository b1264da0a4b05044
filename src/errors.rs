//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`FogError`] covers:
//! - Shader program resolution and uniform writes
//! - Render target lookups and descriptor mismatches
//! - Parameter validation
//! - Settings file I/O and JSON parsing
//!
//! None of these are fatal to a frame. The fog pass degrades to a no-op
//! when its resources are missing, and the frame builder logs node errors
//! instead of propagating them.
//!
//! ```rust,ignore
//! use gradient_fog::errors::{FogError, Result};
//!
//! fn load() -> Result<FogSettings> {
//!     FogSettings::load("fog.json")
//! }
//! ```

use thiserror::Error;

/// The main error type for the gradient fog crate.
#[derive(Error, Debug)]
pub enum FogError {
    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// The shader program is not loaded yet or failed to load.
    #[error("Shader program unavailable: {0}")]
    ShaderUnavailable(String),

    /// A program id that the backend does not know (released or foreign).
    #[error("Unknown shader program")]
    UnknownProgram,

    /// The program has no uniform slot with this name.
    #[error("Program '{program}' has no uniform named '{name}'")]
    UnknownUniform {
        /// Program name
        program: String,
        /// Requested slot name
        name: String,
    },

    /// A scalar was written into a color slot, or the other way around.
    #[error("Uniform '{name}' expects a {expected}")]
    UniformKindMismatch {
        /// Slot name
        name: String,
        /// Kind declared by the layout
        expected: &'static str,
    },

    // ========================================================================
    // Target Errors
    // ========================================================================
    /// The frame color target is no longer valid.
    #[error("Frame color target is no longer valid")]
    TargetInvalid,

    /// A target id that the backend does not know.
    #[error("Unknown render target")]
    UnknownTarget,

    /// Source and destination of a copy disagree on size or format.
    #[error("Target descriptor mismatch: {0}")]
    DescriptorMismatch(String),

    /// The backend cannot read or write pixels of this format.
    #[error("Unsupported texture format: {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),

    // ========================================================================
    // Parameter Errors
    // ========================================================================
    /// Fog parameters outside their documented ranges.
    #[error("Invalid fog parameters: {0}")]
    InvalidParameters(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings file I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Settings JSON parse error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, FogError>`.
pub type Result<T> = std::result::Result<T, FogError>;
