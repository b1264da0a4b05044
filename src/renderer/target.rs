//! Render Target Descriptions
//!
//! Backend-agnostic descriptions of color targets and of the frame being
//! rendered. Backends map a [`TargetDesc`] onto their own storage and hand
//! out [`TargetId`]s.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a render target owned by a backend.
    pub struct TargetId;

    /// Handle to a resolved shader program owned by a backend.
    pub struct ShaderProgramId;
}

/// Description of a 2D render target.
///
/// Two descriptions are compatible (same allocation can be reused) exactly
/// when they compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    /// Color format.
    pub format: wgpu::TextureFormat,
    /// Depth attachment format, `None` for color-only targets.
    pub depth_format: Option<wgpu::TextureFormat>,
}

impl TargetDesc {
    /// Color-only target description.
    #[must_use]
    pub const fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            depth_format: None,
        }
    }

    /// Adds a depth attachment.
    #[must_use]
    pub const fn with_depth(mut self, depth_format: wgpu::TextureFormat) -> Self {
        self.depth_format = Some(depth_format);
        self
    }

    /// Same resolution and color format, depth disabled.
    #[must_use]
    pub const fn color_only(mut self) -> Self {
        self.depth_format = None;
        self
    }

    #[inline]
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    #[must_use]
    pub const fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// Camera clip planes, used to turn stored depth into view distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraClip {
    pub near: f32,
    pub far: f32,
}

impl Default for CameraClip {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraClip {
    #[must_use]
    pub const fn new(near: f32, far: f32) -> Self {
        Self { near, far }
    }

    /// Converts a `[0, 1]` perspective depth value into linear view distance.
    #[must_use]
    pub fn linearize(&self, depth: f32) -> f32 {
        let Self { near, far } = *self;
        near * far / (far - depth * (far - near))
    }

    /// Depth values at the far plane belong to the skybox.
    #[inline]
    #[must_use]
    pub fn is_sky(depth: f32) -> bool {
        depth >= 1.0
    }
}

/// Per-frame description supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDescriptor {
    /// Description of the camera's color target for this frame.
    pub target: TargetDesc,
    pub clip: CameraClip,
    pub frame_index: u64,
}

impl FrameDescriptor {
    #[must_use]
    pub fn new(target: TargetDesc) -> Self {
        Self {
            target,
            clip: CameraClip::default(),
            frame_index: 0,
        }
    }

    #[must_use]
    pub fn with_clip(mut self, clip: CameraClip) -> Self {
        self.clip = clip;
        self
    }

    #[must_use]
    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_descriptor_defaults_and_builders() {
        let desc = TargetDesc::new(8, 8, wgpu::TextureFormat::Rgba8Unorm);
        let frame = FrameDescriptor::new(desc);
        assert_eq!(frame.frame_index, 0);
        assert_eq!(frame.clip, CameraClip::default());

        let clip = CameraClip::new(0.5, 200.0);
        let frame = frame.with_clip(clip).with_frame_index(42);
        assert_eq!(frame.frame_index, 42);
        assert_eq!(frame.clip, clip);
        assert_eq!(frame.target, desc);
    }

    #[test]
    fn color_only_drops_depth_and_keeps_the_rest() {
        let desc = TargetDesc::new(1920, 1080, wgpu::TextureFormat::Rgba8Unorm)
            .with_depth(wgpu::TextureFormat::Depth32Float);
        let scratch = desc.color_only();
        assert_eq!(scratch.depth_format, None);
        assert_eq!((scratch.width, scratch.height), (1920, 1080));
        assert_eq!(scratch.format, wgpu::TextureFormat::Rgba8Unorm);
        assert_ne!(desc, scratch);
    }

    #[test]
    fn linearize_maps_clip_planes() {
        let clip = CameraClip::new(0.5, 200.0);
        assert!((clip.linearize(0.0) - 0.5).abs() < 1e-4);
        assert!((clip.linearize(1.0) - 200.0).abs() < 1e-2);
        assert!(CameraClip::is_sky(1.0));
        assert!(!CameraClip::is_sky(0.99));
    }
}
