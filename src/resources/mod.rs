//! Resource definitions
//!
//! Pure data structures, independent of any GPU implementation:
//! - Fog: gradient fog parameters and settings
//! - Shader: program handles

pub mod fog;
pub mod shader;

pub use fog::{FogParameters, FogSettings, FogUniform, FogUniforms, SharedFogSettings};
pub use shader::ShaderHandle;
