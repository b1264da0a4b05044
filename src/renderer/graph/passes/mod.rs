//! Render Pass Implementations

pub mod gradient_fog;

pub use gradient_fog::GradientFogPass;
