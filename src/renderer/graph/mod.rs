//! Frame Organization
//!
//! - [`RenderStage`]: ordered stages of a frame
//! - [`RenderNode`]: interface of a scheduled node
//! - [`FrameBuilder`]: per-frame node list and executor
//! - [`passes`]: concrete nodes

pub mod builder;
pub mod node;
pub mod passes;
pub mod stage;

pub use builder::FrameBuilder;
pub use node::RenderNode;
pub use passes::GradientFogPass;
pub use stage::RenderStage;
