//! Render Backends
//!
//! [`RenderBackend`] is the narrow capability the fog pass needs from its
//! host: resolve programs, write their uniforms, allocate targets, and
//! accept command buffers. It is object-safe so passes and the frame builder
//! work with `&mut dyn RenderBackend`.
//!
//! | Backend              | Storage            | Programs                 |
//! |----------------------|--------------------|--------------------------|
//! | [`HeadlessBackend`]  | CPU pixel buffers  | CPU fragment functions   |
//! | [`WgpuBackend`]      | `wgpu::Texture`    | WGSL from shader library |

pub mod headless;
pub mod gpu;

pub use headless::{CpuFragmentFn, FragmentInput, HeadlessBackend};
pub use gpu::WgpuBackend;

use glam::Vec4;

use crate::errors::Result;
use crate::resources::ShaderHandle;

use super::command::CommandBuffer;
use super::target::{FrameDescriptor, ShaderProgramId, TargetDesc, TargetId};

/// Host rendering capability consumed by render nodes.
pub trait RenderBackend {
    /// Backend name (for logging).
    fn name(&self) -> &str;

    // ── Shader programs ────────────────────────────────────────────────────

    /// Resolves a handle into a program, `None` while it is not available.
    ///
    /// Resolving the same handle again returns the same id and adds a
    /// reference; balance each success with [`release_shader`](Self::release_shader).
    fn resolve_shader(&mut self, handle: &ShaderHandle) -> Option<ShaderProgramId>;

    /// Drops one reference to a resolved program.
    fn release_shader(&mut self, program: ShaderProgramId);

    /// Writes a scalar uniform slot of a program.
    fn set_scalar(&mut self, program: ShaderProgramId, name: &str, value: f32) -> Result<()>;

    /// Writes an RGBA uniform slot of a program.
    fn set_color(&mut self, program: ShaderProgramId, name: &str, rgba: Vec4) -> Result<()>;

    // ── Targets ────────────────────────────────────────────────────────────

    /// Allocates a new target.
    fn create_target(&mut self, desc: &TargetDesc, label: &str) -> Result<TargetId>;

    /// Frees a target. Unknown ids are ignored.
    fn release_target(&mut self, target: TargetId);

    /// Description of a live target.
    fn target_desc(&self, target: TargetId) -> Option<TargetDesc>;

    #[inline]
    fn is_target_alive(&self, target: TargetId) -> bool {
        self.target_desc(target).is_some()
    }

    // ── Frame ──────────────────────────────────────────────────────────────

    /// Called by the frame builder before any node runs. The camera target's
    /// depth attachment, when present, becomes the scene depth for programs.
    fn begin_frame(&mut self, _camera_target: TargetId, _frame: &FrameDescriptor) {}

    /// Called by the frame builder after every node ran.
    fn end_frame(&mut self) {}

    /// Executes the recorded commands in order.
    fn submit(&mut self, commands: CommandBuffer) -> Result<()>;
}
