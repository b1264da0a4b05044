//! Render Stage Definitions
//!
//! `RenderStage` defines the fixed ordering of a frame. Render nodes are
//! scheduled at a stage; the gradient fog pass runs at
//! [`RenderStage::BeforeTransparent`], after opaque geometry and the sky have
//! written color and depth, and before translucent surfaces are blended.

/// Render stage enumeration.
///
/// Nodes within the same stage execute in insertion order.
///
/// | Stage | Typical Content |
/// |-------|-----------------|
/// | `PreProcess` | Resource upload, compute pre-processing |
/// | `ShadowMap` | Shadow map rendering |
/// | `Opaque` | Opaque geometry |
/// | `Skybox` | Environment maps, procedural sky |
/// | `BeforeTransparent` | Depth-based screen effects (fog) |
/// | `Transparent` | Alpha-blended objects |
/// | `PostProcess` | Tone mapping, bloom, FXAA |
/// | `UI` | Overlays |
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[repr(u8)]
pub enum RenderStage {
    PreProcess = 0,
    ShadowMap = 1,
    Opaque = 2,
    Skybox = 3,
    /// Final opaque sub-stage. Color and depth hold opaque geometry and sky.
    BeforeTransparent = 4,
    Transparent = 5,
    PostProcess = 6,
    /// Executed last.
    UI = 7,
}

impl RenderStage {
    /// Every stage, in execution order.
    pub const ALL: [Self; 8] = [
        Self::PreProcess,
        Self::ShadowMap,
        Self::Opaque,
        Self::Skybox,
        Self::BeforeTransparent,
        Self::Transparent,
        Self::PostProcess,
        Self::UI,
    ];

    /// Returns the numeric index of the stage (used for sorting).
    #[inline]
    #[must_use]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Stage name (for debugging).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PreProcess => "PreProcess",
            Self::ShadowMap => "ShadowMap",
            Self::Opaque => "Opaque",
            Self::Skybox => "Skybox",
            Self::BeforeTransparent => "BeforeTransparent",
            Self::Transparent => "Transparent",
            Self::PostProcess => "PostProcess",
            Self::UI => "UI",
        }
    }
}

impl std::fmt::Display for RenderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
