//! Named Uniform Blocks
//!
//! A program declares its uniform slots as a [`UniformLayout`]: a list of
//! `(name, byte offset, kind)` entries over one uniform buffer. Passes write
//! slots by name into a [`UniformBlock`], which keeps the CPU-side bytes and
//! a version counter. Backends read slots back by name (CPU programs) or
//! upload the bytes when the version moved (GPU programs).

use std::borrow::Cow;
use std::sync::Arc;

use glam::Vec4;

use crate::errors::{FogError, Result};
use crate::resources::fog::{FogUniform, FogUniforms};

/// Type of a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// One `f32`.
    Scalar,
    /// Four `f32` (RGBA).
    Color,
}

impl UniformKind {
    #[must_use]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::Scalar => 4,
            Self::Color => 16,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Color => "color",
        }
    }
}

/// One named slot inside a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlotDesc {
    pub name: Cow<'static, str>,
    pub offset: usize,
    pub kind: UniformKind,
}

impl UniformSlotDesc {
    #[must_use]
    pub const fn new(name: &'static str, offset: usize, kind: UniformKind) -> Self {
        Self {
            name: Cow::Borrowed(name),
            offset,
            kind,
        }
    }
}

/// Slot table of a program's uniform buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniformLayout {
    slots: Vec<UniformSlotDesc>,
    size: usize,
}

impl UniformLayout {
    /// Builds a layout. The block size is rounded up to 16 bytes.
    #[must_use]
    pub fn new(slots: Vec<UniformSlotDesc>) -> Self {
        let end = slots
            .iter()
            .map(|s| s.offset + s.kind.byte_size())
            .max()
            .unwrap_or(0);
        Self {
            slots,
            size: end.div_ceil(16) * 16,
        }
    }

    /// Layout of the built-in gradient fog program ([`FogUniforms`]).
    #[must_use]
    pub fn gradient_fog() -> Self {
        use std::mem::offset_of;

        let layout = Self::new(vec![
            UniformSlotDesc::new(
                FogUniform::NearColor.name(),
                offset_of!(FogUniforms, near_color),
                UniformKind::Color,
            ),
            UniformSlotDesc::new(
                FogUniform::MiddleColor.name(),
                offset_of!(FogUniforms, middle_color),
                UniformKind::Color,
            ),
            UniformSlotDesc::new(
                FogUniform::FarColor.name(),
                offset_of!(FogUniforms, far_color),
                UniformKind::Color,
            ),
            UniformSlotDesc::new(
                FogUniform::StartDistance.name(),
                offset_of!(FogUniforms, start_distance),
                UniformKind::Scalar,
            ),
            UniformSlotDesc::new(
                FogUniform::EndDistance.name(),
                offset_of!(FogUniforms, end_distance),
                UniformKind::Scalar,
            ),
            UniformSlotDesc::new(
                FogUniform::TransparentFactor.name(),
                offset_of!(FogUniforms, transparent_factor),
                UniformKind::Scalar,
            ),
        ]);
        debug_assert_eq!(layout.size(), std::mem::size_of::<FogUniforms>());
        layout
    }

    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&UniformSlotDesc> {
        self.slots.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn slots(&self) -> &[UniformSlotDesc] {
        &self.slots
    }

    /// Size of the uniform buffer in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// CPU-side contents of a program's uniform buffer.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    label: String,
    layout: Arc<UniformLayout>,
    bytes: Vec<u8>,
    version: u64,
}

impl UniformBlock {
    /// Creates a zero-filled block.
    #[must_use]
    pub fn new(label: impl Into<String>, layout: Arc<UniformLayout>) -> Self {
        let bytes = vec![0; layout.size()];
        Self {
            label: label.into(),
            layout,
            bytes,
            version: 0,
        }
    }

    /// Writes a scalar slot. The version only moves when the value changes.
    pub fn set_scalar(&mut self, name: &str, value: f32) -> Result<()> {
        let offset = self.checked_offset(name, UniformKind::Scalar)?;
        self.write(offset, bytemuck::bytes_of(&value));
        Ok(())
    }

    /// Writes a color slot. The version only moves when the value changes.
    pub fn set_color(&mut self, name: &str, rgba: Vec4) -> Result<()> {
        let offset = self.checked_offset(name, UniformKind::Color)?;
        let data = rgba.to_array();
        self.write(offset, bytemuck::cast_slice(&data));
        Ok(())
    }

    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f32> {
        let slot = self.layout.slot(name)?;
        if slot.kind != UniformKind::Scalar {
            return None;
        }
        let raw = &self.bytes[slot.offset..slot.offset + 4];
        Some(bytemuck::pod_read_unaligned(raw))
    }

    #[must_use]
    pub fn color(&self, name: &str) -> Option<Vec4> {
        let slot = self.layout.slot(name)?;
        if slot.kind != UniformKind::Color {
            return None;
        }
        let raw = &self.bytes[slot.offset..slot.offset + 16];
        let data: [f32; 4] = bytemuck::pod_read_unaligned(raw);
        Some(Vec4::from_array(data))
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    fn checked_offset(&self, name: &str, kind: UniformKind) -> Result<usize> {
        let slot = self
            .layout
            .slot(name)
            .ok_or_else(|| FogError::UnknownUniform {
                program: self.label.clone(),
                name: name.to_string(),
            })?;
        if slot.kind != kind {
            return Err(FogError::UniformKindMismatch {
                name: name.to_string(),
                expected: slot.kind.name(),
            });
        }
        Ok(slot.offset)
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        let dst = &mut self.bytes[offset..offset + data.len()];
        if dst != data {
            dst.copy_from_slice(data);
            self.version += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::FogParameters;

    fn fog_block() -> UniformBlock {
        UniformBlock::new("Gradient Fog", Arc::new(UniformLayout::gradient_fog()))
    }

    #[test]
    fn gradient_fog_layout_matches_gpu_struct() {
        let layout = UniformLayout::gradient_fog();
        assert_eq!(layout.size(), 64);
        assert_eq!(layout.slots().len(), 6);
        assert_eq!(layout.slot("startDistance").unwrap().offset, 48);
        assert_eq!(layout.slot("farColor").unwrap().kind, UniformKind::Color);
    }

    #[test]
    fn writes_by_name_produce_gpu_struct_bytes() {
        let params = FogParameters::default();
        let mut block = fog_block();
        for slot in FogUniform::SCALARS {
            block.set_scalar(slot.name(), params.scalar(slot).unwrap()).unwrap();
        }
        for slot in FogUniform::COLORS {
            block.set_color(slot.name(), params.color(slot).unwrap()).unwrap();
        }
        assert_eq!(block.as_bytes(), bytemuck::bytes_of(&params.to_uniforms()));
        assert_eq!(block.scalar("endDistance"), Some(50.0));
        assert_eq!(block.color("nearColor"), Some(params.near_color));
    }

    #[test]
    fn version_moves_only_on_change() {
        let mut block = fog_block();
        block.set_scalar("endDistance", 10.0).unwrap();
        let v = block.version();
        block.set_scalar("endDistance", 10.0).unwrap();
        assert_eq!(block.version(), v);
        block.set_scalar("endDistance", 11.0).unwrap();
        assert_eq!(block.version(), v + 1);
    }

    #[test]
    fn unknown_and_mismatched_slots_are_errors() {
        let mut block = fog_block();
        assert!(matches!(
            block.set_scalar("_StartDist", 1.0),
            Err(FogError::UnknownUniform { .. })
        ));
        assert!(matches!(
            block.set_scalar("nearColor", 1.0),
            Err(FogError::UniformKindMismatch { .. })
        ));
        assert_eq!(block.scalar("nearColor"), None);
    }
}
