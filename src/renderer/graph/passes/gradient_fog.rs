//! Gradient Fog Pass
//!
//! Tints the frame color with a three-stop fog gradient driven by scene
//! depth. Sky pixels (depth at the far plane) are fogged less, scaled by
//! `transparentFactor`.
//!
//! # Data Flow
//!
//! ```text
//! camera color ──FilteredCopy(fog program)──► _TempTex ──Copy──► camera color
//!                 └── scene depth, fog uniforms
//! ```
//!
//! Both commands are submitted in one command buffer labelled
//! `"Gradient Fog"`.
//!
//! # Degradation
//!
//! The fog is cosmetic. While the program cannot be resolved, or no frame
//! target is bound, the pass records nothing and the frame is left as-is.
//! Resolution is retried on every `configure`. Zero-area frames (a
//! minimised window) are skipped.
//!
//! After [`teardown`](RenderNode::teardown) the pass is inert until
//! [`initialize`](GradientFogPass::initialize) is called again.

use crate::errors::{FogError, Result};
use crate::renderer::backend::RenderBackend;
use crate::renderer::command::CommandBuffer;
use crate::renderer::graph::node::RenderNode;
use crate::renderer::scratch::{ScratchStats, ScratchTarget};
use crate::renderer::target::{FrameDescriptor, ShaderProgramId, TargetId};
use crate::resources::fog::FogUniform;
use crate::resources::{FogParameters, FogSettings, ShaderHandle};

/// Label of the submitted command buffer.
pub const COMMAND_BUFFER_LABEL: &str = "Gradient Fog";

/// Label of the intermediate target.
pub const SCRATCH_LABEL: &str = "_TempTex";

/// Distance-based gradient fog render pass.
pub struct GradientFogPass {
    shader: ShaderHandle,
    /// Replacement handle swapped in by the next `configure`
    pending_shader: Option<ShaderHandle>,
    program: Option<ShaderProgramId>,
    /// Frame color target bound by `configure`, cleared on invalidation
    source: Option<TargetId>,
    scratch: ScratchTarget,
    parameters: FogParameters,
    /// Set by `release`, cleared by `initialize`
    torn_down: bool,

    // === Logging State ===
    /// Bit pattern of the last parameter set reported as invalid
    warned_params: Option<[u32; 16]>,
    invalid_reports: u32,
    /// An unavailable shader has been reported since the last success
    warned_unavailable: bool,
}

impl GradientFogPass {
    /// Creates an inert pass. Call [`initialize`](Self::initialize) to
    /// resolve its program.
    #[must_use]
    pub fn new(settings: &FogSettings) -> Self {
        Self {
            shader: settings.shader().clone(),
            pending_shader: None,
            program: None,
            source: None,
            scratch: ScratchTarget::new(SCRATCH_LABEL),
            parameters: *settings.parameters(),
            torn_down: false,
            warned_params: None,
            invalid_reports: 0,
            warned_unavailable: false,
        }
    }

    /// Resolves the fog program.
    ///
    /// On failure the pass stays valid but inert, and resolution is retried
    /// by later `configure` calls. Re-initializing releases the scratch
    /// target and the previously resolved program first.
    pub fn initialize(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        self.scratch.release(backend);
        if let Some(program) = self.program.take() {
            backend.release_shader(program);
        }
        self.swap_pending_shader(backend);
        self.torn_down = false;

        if self.try_resolve(backend) {
            Ok(())
        } else {
            Err(FogError::ShaderUnavailable(self.shader.name().to_string()))
        }
    }

    fn try_resolve(&mut self, backend: &mut dyn RenderBackend) -> bool {
        if self.program.is_some() {
            return true;
        }
        match backend.resolve_shader(&self.shader) {
            Some(program) => {
                if self.warned_unavailable {
                    log::info!("Gradient fog shader '{}' is now available", self.shader);
                }
                self.program = Some(program);
                self.warned_unavailable = false;
                true
            }
            None => {
                if !self.warned_unavailable {
                    log::warn!(
                        "Gradient fog shader '{}' unavailable on {}, fog disabled",
                        self.shader,
                        backend.name()
                    );
                    self.warned_unavailable = true;
                }
                false
            }
        }
    }

    /// Binds the frame target and pushes `parameters` to the program.
    ///
    /// Invalid parameters are reported once per distinct set and still
    /// applied.
    pub fn apply(
        &mut self,
        backend: &mut dyn RenderBackend,
        color_target: TargetId,
        parameters: &FogParameters,
    ) {
        self.parameters = *parameters;
        if self.torn_down {
            return;
        }
        self.source = Some(color_target);

        self.swap_pending_shader(backend);
        if !self.try_resolve(backend) {
            return;
        }
        let Some(program) = self.program else {
            return;
        };

        if let Err(e) = parameters.validate() {
            let bits = parameters.bit_pattern();
            if self.warned_params != Some(bits) {
                log::warn!("Gradient fog: {e}; applying as-is");
                self.warned_params = Some(bits);
                self.invalid_reports += 1;
            }
        } else {
            self.warned_params = None;
        }

        for slot in FogUniform::SCALARS {
            if let Some(value) = parameters.scalar(slot)
                && let Err(e) = backend.set_scalar(program, slot.name(), value)
            {
                log::warn!("Gradient fog: failed to set '{}': {e}", slot.name());
            }
        }
        for slot in FogUniform::COLORS {
            if let Some(rgba) = parameters.color(slot)
                && let Err(e) = backend.set_color(program, slot.name(), rgba)
            {
                log::warn!("Gradient fog: failed to set '{}': {e}", slot.name());
            }
        }
    }

    /// Replaces the parameters pushed by the next `configure`.
    pub fn set_parameters(&mut self, parameters: FogParameters) {
        self.parameters = parameters;
    }

    /// Replaces the shader handle. The current program is released and the
    /// new one resolved by the next `configure`.
    pub fn set_shader(&mut self, shader: ShaderHandle) {
        if shader == self.shader {
            self.pending_shader = None;
        } else {
            self.pending_shader = Some(shader);
        }
    }

    fn swap_pending_shader(&mut self, backend: &mut dyn RenderBackend) {
        let Some(shader) = self.pending_shader.take() else {
            return;
        };
        if let Some(program) = self.program.take() {
            backend.release_shader(program);
        }
        log::debug!("Gradient fog shader '{}' -> '{shader}'", self.shader);
        self.shader = shader;
        self.warned_unavailable = false;
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &FogParameters {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn shader(&self) -> &ShaderHandle {
        &self.shader
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> Option<ShaderProgramId> {
        self.program
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<TargetId> {
        self.source
    }

    #[inline]
    #[must_use]
    pub fn scratch_target(&self) -> Option<TargetId> {
        self.scratch.current()
    }

    #[inline]
    #[must_use]
    pub fn scratch_stats(&self) -> ScratchStats {
        self.scratch.stats()
    }

    /// Whether `teardown` ran since the last `initialize`.
    #[inline]
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Number of distinct invalid parameter sets reported so far.
    #[inline]
    #[must_use]
    pub fn invalid_parameter_reports(&self) -> u32 {
        self.invalid_reports
    }

    /// Records the fog for one frame.
    ///
    /// Without a resolved program or a bound frame target, after teardown,
    /// or for a zero-area frame this is a no-op. A bound target the backend no longer knows is dropped and reported
    /// as [`FogError::TargetInvalid`].
    pub fn execute_frame(
        &mut self,
        backend: &mut dyn RenderBackend,
        frame: &FrameDescriptor,
    ) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        let (Some(program), Some(source)) = (self.program, self.source) else {
            return Ok(());
        };
        if frame.target.width == 0 || frame.target.height == 0 {
            return Ok(());
        }

        if !backend.is_target_alive(source) {
            self.source = None;
            return Err(FogError::TargetInvalid);
        }

        let desc = frame.target.color_only();
        let scratch = self.scratch.get_or_allocate(backend, &desc)?;

        let mut commands = CommandBuffer::new(COMMAND_BUFFER_LABEL);
        commands
            .blit_with(source, scratch, program)
            .blit(scratch, source);
        backend.submit(commands)
    }

    /// Drops the reference to the frame target.
    pub fn invalidate_target(&mut self) {
        self.source = None;
    }

    /// Releases the scratch target only; the program stays resolved.
    pub fn release_scratch(&mut self, backend: &mut dyn RenderBackend) {
        self.scratch.release(backend);
    }

    /// Releases the scratch target and the program. Idempotent. The pass
    /// stays inert until the next `initialize`.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        self.scratch.release(backend);
        if let Some(program) = self.program.take() {
            backend.release_shader(program);
        }
        self.source = None;
        self.torn_down = true;
    }
}

impl RenderNode for GradientFogPass {
    fn name(&self) -> &str {
        "Gradient Fog Pass"
    }

    fn configure(&mut self, backend: &mut dyn RenderBackend, color_target: TargetId) {
        let parameters = self.parameters;
        self.apply(backend, color_target, &parameters);
    }

    fn execute(&mut self, backend: &mut dyn RenderBackend, frame: &FrameDescriptor) -> Result<()> {
        self.execute_frame(backend, frame)
    }

    fn on_target_invalidated(&mut self) {
        self.invalidate_target();
    }

    fn teardown(&mut self, backend: &mut dyn RenderBackend) {
        self.release(backend);
    }
}
