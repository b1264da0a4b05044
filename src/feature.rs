//! Gradient Fog Renderer Feature
//!
//! The host-facing entry point. It owns the [`GradientFogPass`] and the
//! shared [`FogSettings`], and enqueues the pass into each frame.
//!
//! ```text
//! SharedFogSettings ──snapshot per frame──► GradientFogPass
//!                                              │
//! FrameBuilder::add_node(BeforeTransparent) ◄──┘
//! ```

use crate::renderer::backend::RenderBackend;
use crate::renderer::graph::{FrameBuilder, GradientFogPass, RenderNode, RenderStage};
use crate::renderer::scratch::ScratchStats;
use crate::renderer::target::ShaderProgramId;
use crate::resources::{FogParameters, FogSettings, SharedFogSettings};

/// Stage the fog pass is scheduled at.
pub const FOG_STAGE: RenderStage = RenderStage::BeforeTransparent;

/// Renderer feature that applies gradient fog before transparent geometry.
pub struct GradientFogFeature {
    settings: SharedFogSettings,
    pass: GradientFogPass,
}

impl GradientFogFeature {
    /// Builds and initializes the fog pass.
    ///
    /// A program that cannot be resolved yet is logged; the feature stays
    /// usable and the pass retries every frame.
    pub fn create(settings: FogSettings, backend: &mut dyn RenderBackend) -> Self {
        Self::with_shared(settings.into_shared(), backend)
    }

    /// Same as [`create`](Self::create), over settings that are already
    /// shared with an editor.
    pub fn with_shared(settings: SharedFogSettings, backend: &mut dyn RenderBackend) -> Self {
        let mut pass = GradientFogPass::new(&settings.read());
        if let Err(e) = pass.initialize(backend) {
            log::warn!("Gradient fog feature created without a program: {e}");
        }
        Self { settings, pass }
    }

    /// Enqueues the fog pass for the current frame.
    ///
    /// The current settings are copied into the pass first, so edits made
    /// through [`shared_settings`](Self::shared_settings) take effect here.
    pub fn add_render_passes<'a>(&'a mut self, builder: &mut FrameBuilder<'a>) {
        {
            let settings = self.settings.read();
            self.pass.set_parameters(*settings.parameters());
            self.pass.set_shader(settings.shader().clone());
        }
        builder.add_node(FOG_STAGE, &mut self.pass);
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn settings(&self) -> FogSettings {
        self.settings.read().clone()
    }

    /// Replaces the tunables used from the next frame on.
    pub fn set_parameters(&mut self, parameters: FogParameters) {
        self.settings.write().set_parameters(parameters);
    }

    /// Replaces the whole settings, including the shader handle.
    pub fn set_settings(&mut self, settings: FogSettings) {
        *self.settings.write() = settings;
    }

    /// Handle for editing the settings from elsewhere.
    #[must_use]
    pub fn shared_settings(&self) -> SharedFogSettings {
        SharedFogSettings::clone(&self.settings)
    }

    #[must_use]
    pub fn pass(&self) -> &GradientFogPass {
        &self.pass
    }

    #[must_use]
    pub fn program(&self) -> Option<ShaderProgramId> {
        self.pass.program()
    }

    #[must_use]
    pub fn scratch_stats(&self) -> ScratchStats {
        self.pass.scratch_stats()
    }

    /// The camera owning the frame target went away. Its frame target is
    /// dropped and the scratch target sized for it is released.
    pub fn on_camera_removed(&mut self, backend: &mut dyn RenderBackend) {
        self.pass.on_target_invalidated();
        self.pass.release_scratch(backend);
    }

    /// Releases every backend resource held by the fog pass. Later frames
    /// leave the target untouched.
    pub fn dispose(&mut self, backend: &mut dyn RenderBackend) {
        self.pass.teardown(backend);
    }
}
