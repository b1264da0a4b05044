//! Scratch Target
//!
//! A single owned intermediate target that is reused as long as the
//! requested description does not change.
//!
//! ```text
//! get_or_allocate(desc)
//!   ├─ slot holds desc ──────────► reuse (same id)
//!   └─ slot empty / other desc ──► release stale → create → store
//! ```
//!
//! Unlike a per-frame pool, the target survives across frames so that a
//! steady stream of identical frames performs no allocation at all.

use crate::errors::Result;
use crate::renderer::backend::RenderBackend;
use crate::renderer::target::{TargetDesc, TargetId};

/// Allocation counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScratchStats {
    pub allocations: u32,
    pub reuses: u32,
    pub releases: u32,
}

/// Reallocate-on-mismatch cache for one intermediate target.
#[derive(Debug)]
pub struct ScratchTarget {
    label: &'static str,
    slot: Option<(TargetId, TargetDesc)>,
    stats: ScratchStats,
}

impl ScratchTarget {
    #[must_use]
    pub const fn new(label: &'static str) -> Self {
        Self {
            label,
            slot: None,
            stats: ScratchStats {
                allocations: 0,
                reuses: 0,
                releases: 0,
            },
        }
    }

    /// Returns a target matching `desc`, allocating only when the
    /// description differs from the held one.
    pub fn get_or_allocate(
        &mut self,
        backend: &mut dyn RenderBackend,
        desc: &TargetDesc,
    ) -> Result<TargetId> {
        if let Some((id, held)) = self.slot
            && held == *desc
            && backend.is_target_alive(id)
        {
            self.stats.reuses += 1;
            return Ok(id);
        }

        self.release(backend);

        let id = backend.create_target(desc, self.label)?;
        log::debug!(
            "Scratch '{}' allocated {}x{} {:?}",
            self.label,
            desc.width,
            desc.height,
            desc.format
        );
        self.slot = Some((id, *desc));
        self.stats.allocations += 1;
        Ok(id)
    }

    /// Releases the held target, if any.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        if let Some((id, _)) = self.slot.take() {
            backend.release_target(id);
            self.stats.releases += 1;
        }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<TargetId> {
        self.slot.map(|(id, _)| id)
    }

    #[inline]
    #[must_use]
    pub fn desc(&self) -> Option<TargetDesc> {
        self.slot.map(|(_, desc)| desc)
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> ScratchStats {
        self.stats
    }
}
