//! Rendering
//!
//! - [`backend`]: host capability ([`RenderBackend`]) with a headless and a wgpu implementation
//! - [`command`]: recorded blits submitted per pass
//! - [`graph`]: stages, nodes, and the frame builder
//! - [`scratch`]: reallocate-on-mismatch intermediate target
//! - [`shader_library`]: embedded WGSL programs
//! - [`target`]: target ids and descriptions, frame descriptors
//! - [`uniforms`]: named uniform slots packed into a byte block

pub mod backend;
pub mod command;
pub mod graph;
pub mod scratch;
pub mod shader_library;
pub mod target;
pub mod uniforms;

pub use backend::{HeadlessBackend, RenderBackend, WgpuBackend};
pub use command::{CommandBuffer, RenderCommand};
pub use graph::{FrameBuilder, GradientFogPass, RenderNode, RenderStage};
pub use scratch::{ScratchStats, ScratchTarget};
pub use shader_library::ShaderLibrary;
pub use target::{CameraClip, FrameDescriptor, ShaderProgramId, TargetDesc, TargetId};
pub use uniforms::{UniformBlock, UniformKind, UniformLayout, UniformSlotDesc};
