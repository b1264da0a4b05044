#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Distance-based gradient fog for a staged renderer.
//!
//! ```ignore
//! let mut backend = HeadlessBackend::new();
//! let mut fog = GradientFogFeature::create(FogSettings::default(), &mut backend);
//!
//! let mut builder = FrameBuilder::new();
//! fog.add_render_passes(&mut builder);
//! builder.execute(&mut backend, camera_target, &frame);
//! ```

pub mod errors;
pub mod feature;
pub mod renderer;
pub mod resources;

pub use errors::{FogError, Result};
pub use feature::GradientFogFeature;
pub use renderer::{
    CameraClip, CommandBuffer, FrameBuilder, FrameDescriptor, GradientFogPass, HeadlessBackend,
    RenderBackend, RenderCommand, RenderNode, RenderStage, TargetDesc, TargetId, WgpuBackend,
};
pub use resources::{FogParameters, FogSettings, ShaderHandle, SharedFogSettings};
