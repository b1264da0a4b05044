//! Render Node Trait
//!
//! The abstract interface of a node scheduled by the
//! [`FrameBuilder`](super::FrameBuilder).

use crate::errors::Result;
use crate::renderer::backend::RenderBackend;
use crate::renderer::target::{FrameDescriptor, TargetId};

/// A unit of work scheduled at a [`RenderStage`](super::RenderStage).
///
/// Per frame the builder calls, in order: [`configure`](Self::configure),
/// [`execute`](Self::execute), and once every node ran,
/// [`on_target_invalidated`](Self::on_target_invalidated).
pub trait RenderNode {
    /// Returns the node name, used for logging.
    fn name(&self) -> &str;

    /// Binds the frame's color target and pushes per-frame state.
    fn configure(&mut self, backend: &mut dyn RenderBackend, color_target: TargetId);

    /// Records and submits the node's commands.
    fn execute(&mut self, backend: &mut dyn RenderBackend, frame: &FrameDescriptor) -> Result<()>;

    /// The frame target stored by `configure` is no longer valid.
    fn on_target_invalidated(&mut self) {}

    /// Releases every backend resource the node owns.
    fn teardown(&mut self, _backend: &mut dyn RenderBackend) {}
}
