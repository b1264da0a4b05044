//! Headless CPU Backend
//!
//! A [`RenderBackend`] that keeps every target in system memory and runs
//! programs as CPU fragment functions. Every submitted [`CommandBuffer`] is
//! kept, so callers can inspect exactly what a pass recorded.
//!
//! # Pixel Formats
//!
//! | Format                       | Read/Write | Notes                  |
//! |------------------------------|------------|------------------------|
//! | `Rgba8Unorm[Srgb]`           | ✅         | values taken as stored |
//! | `Bgra8Unorm[Srgb]`           | ✅         | swizzled on access     |
//! | `Rgba16Float`                | ✅         | via `half`             |
//! | `Rgba32Float`                | ✅         |                        |
//! | other sized color formats    | copy only  | byte copy, same format |
//!
//! Depth attachments are stored as one `f32` per pixel regardless of the
//! requested depth format.
//!
//! # Deferred Programs
//!
//! [`defer_shader`](HeadlessBackend::defer_shader) makes a registered program
//! unresolvable until [`finish_loading`](HeadlessBackend::finish_loading) is
//! called, mimicking an asset that is still streaming in.

use std::sync::Arc;

use glam::{Vec2, Vec4};
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use super::RenderBackend;
use crate::errors::{FogError, Result};
use crate::renderer::command::{CommandBuffer, RenderCommand};
use crate::renderer::target::{CameraClip, FrameDescriptor, ShaderProgramId, TargetDesc, TargetId};
use crate::renderer::uniforms::{UniformBlock, UniformLayout};
use crate::resources::{FogParameters, FogUniform, ShaderHandle};

/// Inputs of one CPU fragment invocation.
pub struct FragmentInput<'a> {
    /// Pixel center in `[0, 1]²`.
    pub uv: Vec2,
    /// Source color at this pixel.
    pub color: Vec4,
    /// Raw `[0, 1]` depth of the scene at this pixel, if the frame has depth.
    pub depth: Option<f32>,
    pub clip: CameraClip,
    pub uniforms: &'a UniformBlock,
}

/// CPU implementation of a fullscreen program.
pub type CpuFragmentFn = Arc<dyn Fn(&FragmentInput<'_>) -> Vec4 + Send + Sync>;

/// CPU counterpart of `gradient_fog.wgsl`.
#[must_use]
pub fn gradient_fog_fragment(input: &FragmentInput<'_>) -> Vec4 {
    let u = input.uniforms;
    let defaults = FogParameters::default();
    let scalar = |slot: FogUniform, fallback: f32| u.scalar(slot.name()).unwrap_or(fallback);
    let color = |slot: FogUniform, fallback: Vec4| u.color(slot.name()).unwrap_or(fallback);

    let params = FogParameters {
        start_distance: scalar(FogUniform::StartDistance, defaults.start_distance),
        end_distance: scalar(FogUniform::EndDistance, defaults.end_distance),
        transparent_factor: scalar(FogUniform::TransparentFactor, defaults.transparent_factor),
        near_color: color(FogUniform::NearColor, defaults.near_color),
        middle_color: color(FogUniform::MiddleColor, defaults.middle_color),
        far_color: color(FogUniform::FarColor, defaults.far_color),
    };

    let distance = input.depth.map(|d| input.clip.linearize(d));
    let is_sky = input.depth.is_some_and(CameraClip::is_sky);
    params.shade(input.color, distance, is_sky)
}

/// Allocation and submission counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub targets_created: u32,
    pub targets_released: u32,
    pub resolve_attempts: u32,
    pub frames: u64,
}

struct ProgramSource {
    layout: Arc<UniformLayout>,
    fragment: CpuFragmentFn,
}

struct CpuProgram {
    name: String,
    uniforms: UniformBlock,
    fragment: CpuFragmentFn,
    refs: u32,
}

struct CpuTarget {
    desc: TargetDesc,
    label: String,
    bytes_per_pixel: usize,
    pixels: Vec<u8>,
    depth: Option<Vec<f32>>,
}

/// In-memory backend used for tests and offline rendering.
pub struct HeadlessBackend {
    sources: FxHashMap<String, ProgramSource>,
    deferred: FxHashSet<String>,
    programs: SlotMap<ShaderProgramId, CpuProgram>,
    program_lookup: FxHashMap<String, ShaderProgramId>,
    targets: SlotMap<TargetId, CpuTarget>,
    submissions: Vec<CommandBuffer>,
    scene_depth: Option<TargetId>,
    clip: CameraClip,
    stats: HeadlessStats,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    /// Creates a backend with the built-in gradient fog program registered.
    #[must_use]
    pub fn new() -> Self {
        let mut backend = Self::empty();
        backend.register_program(
            ShaderHandle::GRADIENT_FOG,
            UniformLayout::gradient_fog(),
            Arc::new(gradient_fog_fragment),
        );
        backend
    }

    /// Creates a backend without any registered program.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sources: FxHashMap::default(),
            deferred: FxHashSet::default(),
            programs: SlotMap::with_key(),
            program_lookup: FxHashMap::default(),
            targets: SlotMap::with_key(),
            submissions: Vec::new(),
            scene_depth: None,
            clip: CameraClip::default(),
            stats: HeadlessStats::default(),
        }
    }

    /// Registers (or replaces) a program source under `name`.
    pub fn register_program(
        &mut self,
        name: impl Into<String>,
        layout: UniformLayout,
        fragment: CpuFragmentFn,
    ) {
        self.sources.insert(
            name.into(),
            ProgramSource {
                layout: Arc::new(layout),
                fragment,
            },
        );
    }

    /// Makes `name` unresolvable until [`finish_loading`](Self::finish_loading).
    pub fn defer_shader(&mut self, name: impl Into<String>) {
        self.deferred.insert(name.into());
    }

    /// Ends a deferred load started by [`defer_shader`](Self::defer_shader).
    pub fn finish_loading(&mut self, name: &str) {
        self.deferred.remove(name);
    }

    // ── Pixel access ───────────────────────────────────────────────────────

    /// Raw color bytes of a target.
    #[must_use]
    pub fn pixels(&self, target: TargetId) -> Option<&[u8]> {
        self.targets.get(target).map(|t| t.pixels.as_slice())
    }

    /// Replaces the color bytes of a target.
    pub fn write_pixels(&mut self, target: TargetId, data: &[u8]) -> Result<()> {
        let t = self.targets.get_mut(target).ok_or(FogError::UnknownTarget)?;
        if data.len() != t.pixels.len() {
            return Err(FogError::DescriptorMismatch(format!(
                "'{}' holds {} bytes, got {}",
                t.label,
                t.pixels.len(),
                data.len()
            )));
        }
        t.pixels.copy_from_slice(data);
        Ok(())
    }

    /// Fills every pixel of a target with one color.
    pub fn fill(&mut self, target: TargetId, color: Vec4) -> Result<()> {
        let t = self.targets.get_mut(target).ok_or(FogError::UnknownTarget)?;
        let format = t.desc.format;
        let mut texel = vec![0u8; t.bytes_per_pixel];
        encode_texel(format, color, &mut texel)?;
        for chunk in t.pixels.chunks_exact_mut(texel.len()) {
            chunk.copy_from_slice(&texel);
        }
        Ok(())
    }

    /// Replaces the depth plane of a target created with a depth format.
    pub fn write_depth(&mut self, target: TargetId, depth: &[f32]) -> Result<()> {
        let t = self.targets.get_mut(target).ok_or(FogError::UnknownTarget)?;
        let label = t.label.clone();
        let plane = t.depth.as_mut().ok_or_else(|| {
            FogError::DescriptorMismatch(format!("'{label}' has no depth attachment"))
        })?;
        if plane.len() != depth.len() {
            return Err(FogError::DescriptorMismatch(format!(
                "'{label}' depth holds {} values, got {}",
                plane.len(),
                depth.len()
            )));
        }
        plane.copy_from_slice(depth);
        Ok(())
    }

    /// Decoded color of one pixel.
    #[must_use]
    pub fn read_color(&self, target: TargetId, x: u32, y: u32) -> Option<Vec4> {
        let t = self.targets.get(target)?;
        if x >= t.desc.width || y >= t.desc.height {
            return None;
        }
        let index = (y as usize * t.desc.width as usize + x as usize) * t.bytes_per_pixel;
        decode_texel(t.desc.format, &t.pixels[index..index + t.bytes_per_pixel]).ok()
    }

    /// Exports a target as an 8-bit RGBA image.
    #[must_use]
    pub fn read_rgba8(&self, target: TargetId) -> Option<image::RgbaImage> {
        let t = self.targets.get(target)?;
        let TargetDesc { width, height, .. } = t.desc;
        if t.desc.format == wgpu::TextureFormat::Rgba8Unorm
            || t.desc.format == wgpu::TextureFormat::Rgba8UnormSrgb
        {
            return image::RgbaImage::from_raw(width, height, t.pixels.clone());
        }

        let mut out = Vec::with_capacity(t.desc.pixel_count() * 4);
        for texel in t.pixels.chunks_exact(t.bytes_per_pixel) {
            let c = decode_texel(t.desc.format, texel).ok()?;
            out.extend(c.to_array().map(unorm8));
        }
        image::RgbaImage::from_raw(width, height, out)
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    /// Every command buffer submitted so far, oldest first.
    #[must_use]
    pub fn submissions(&self) -> &[CommandBuffer] {
        &self.submissions
    }

    /// Removes and returns the recorded submissions.
    pub fn take_submissions(&mut self) -> Vec<CommandBuffer> {
        std::mem::take(&mut self.submissions)
    }

    /// Total number of commands across all recorded submissions.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.submissions.iter().map(CommandBuffer::len).sum()
    }

    #[must_use]
    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    #[must_use]
    pub fn live_target_count(&self) -> usize {
        self.targets.len()
    }

    /// Uniform state of a resolved program.
    #[must_use]
    pub fn program_uniforms(&self, program: ShaderProgramId) -> Option<&UniformBlock> {
        self.programs.get(program).map(|p| &p.uniforms)
    }

    /// Outstanding references to a resolved program, 0 once released.
    #[must_use]
    pub fn program_refs(&self, program: ShaderProgramId) -> u32 {
        self.programs.get(program).map_or(0, |p| p.refs)
    }

    #[must_use]
    pub fn target_label(&self, target: TargetId) -> Option<&str> {
        self.targets.get(target).map(|t| t.label.as_str())
    }

    // ── Command execution ──────────────────────────────────────────────────

    fn run_filtered_copy(
        &mut self,
        source: TargetId,
        destination: TargetId,
        program: ShaderProgramId,
    ) -> Result<()> {
        let (src_desc, dst_desc) = self.copy_descs(source, destination)?;
        let program = self.programs.get(program).ok_or(FogError::UnknownProgram)?;

        let depth = self
            .scene_depth
            .and_then(|id| self.targets.get(id))
            .filter(|t| t.desc.width == dst_desc.width && t.desc.height == dst_desc.height)
            .and_then(|t| t.depth.as_deref());

        let src = &self.targets[source];
        let dst_bpp = self.targets[destination].bytes_per_pixel;
        let mut out = vec![0u8; dst_desc.pixel_count() * dst_bpp];

        let (w, h) = (dst_desc.width as usize, dst_desc.height as usize);
        let mut texel = vec![0u8; dst_bpp];
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                let color = decode_texel(
                    src_desc.format,
                    &src.pixels[i * src.bytes_per_pixel..(i + 1) * src.bytes_per_pixel],
                )?;
                let input = FragmentInput {
                    uv: Vec2::new((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32),
                    color,
                    depth: depth.map(|d| d[i]),
                    clip: self.clip,
                    uniforms: &program.uniforms,
                };
                encode_texel(dst_desc.format, (program.fragment)(&input), &mut texel)?;
                out[i * dst_bpp..(i + 1) * dst_bpp].copy_from_slice(&texel);
            }
        }

        self.targets[destination].pixels = out;
        Ok(())
    }

    fn run_copy(&mut self, source: TargetId, destination: TargetId) -> Result<()> {
        let (src_desc, dst_desc) = self.copy_descs(source, destination)?;

        let pixels = if src_desc.format == dst_desc.format {
            self.targets[source].pixels.clone()
        } else {
            let src = &self.targets[source];
            let dst_bpp = self.targets[destination].bytes_per_pixel;
            let mut out = vec![0u8; dst_desc.pixel_count() * dst_bpp];
            for (texel, slot) in src
                .pixels
                .chunks_exact(src.bytes_per_pixel)
                .zip(out.chunks_exact_mut(dst_bpp))
            {
                encode_texel(dst_desc.format, decode_texel(src_desc.format, texel)?, slot)?;
            }
            out
        };

        self.targets[destination].pixels = pixels;
        Ok(())
    }

    fn copy_descs(&self, source: TargetId, destination: TargetId) -> Result<(TargetDesc, TargetDesc)> {
        let src = self.targets.get(source).ok_or(FogError::UnknownTarget)?;
        let dst = self.targets.get(destination).ok_or(FogError::UnknownTarget)?;
        if source == destination {
            return Err(FogError::DescriptorMismatch(format!(
                "'{}' cannot be copied onto itself",
                src.label
            )));
        }
        if (src.desc.width, src.desc.height) != (dst.desc.width, dst.desc.height) {
            return Err(FogError::DescriptorMismatch(format!(
                "'{}' is {}x{}, '{}' is {}x{}",
                src.label, src.desc.width, src.desc.height, dst.label, dst.desc.width, dst.desc.height
            )));
        }
        Ok((src.desc, dst.desc))
    }
}

impl RenderBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "Headless"
    }

    fn resolve_shader(&mut self, handle: &ShaderHandle) -> Option<ShaderProgramId> {
        self.stats.resolve_attempts += 1;
        let name = handle.name();

        if self.deferred.contains(name) {
            return None;
        }

        if let Some(&id) = self.program_lookup.get(name)
            && let Some(program) = self.programs.get_mut(id)
        {
            program.refs += 1;
            return Some(id);
        }

        let source = self.sources.get(name)?;
        let id = self.programs.insert(CpuProgram {
            name: name.to_string(),
            uniforms: UniformBlock::new(name, Arc::clone(&source.layout)),
            fragment: Arc::clone(&source.fragment),
            refs: 1,
        });
        self.program_lookup.insert(name.to_string(), id);
        log::debug!("Headless: resolved program '{name}'");
        Some(id)
    }

    fn release_shader(&mut self, program: ShaderProgramId) {
        let Some(p) = self.programs.get_mut(program) else {
            return;
        };
        p.refs = p.refs.saturating_sub(1);
        if p.refs == 0 {
            let name = p.name.clone();
            self.programs.remove(program);
            self.program_lookup.remove(&name);
            log::debug!("Headless: released program '{name}'");
        }
    }

    fn set_scalar(&mut self, program: ShaderProgramId, name: &str, value: f32) -> Result<()> {
        self.programs
            .get_mut(program)
            .ok_or(FogError::UnknownProgram)?
            .uniforms
            .set_scalar(name, value)
    }

    fn set_color(&mut self, program: ShaderProgramId, name: &str, rgba: Vec4) -> Result<()> {
        self.programs
            .get_mut(program)
            .ok_or(FogError::UnknownProgram)?
            .uniforms
            .set_color(name, rgba)
    }

    fn create_target(&mut self, desc: &TargetDesc, label: &str) -> Result<TargetId> {
        let bytes_per_pixel = desc
            .format
            .block_copy_size(None)
            .ok_or(FogError::UnsupportedFormat(desc.format))? as usize;

        let id = self.targets.insert(CpuTarget {
            desc: *desc,
            label: label.to_string(),
            bytes_per_pixel,
            pixels: vec![0; desc.pixel_count() * bytes_per_pixel],
            depth: desc.depth_format.map(|_| vec![1.0; desc.pixel_count()]),
        });
        self.stats.targets_created += 1;
        log::debug!(
            "Headless: created target '{label}' {}x{} {:?}",
            desc.width,
            desc.height,
            desc.format
        );
        Ok(id)
    }

    fn release_target(&mut self, target: TargetId) {
        if let Some(t) = self.targets.remove(target) {
            self.stats.targets_released += 1;
            if self.scene_depth == Some(target) {
                self.scene_depth = None;
            }
            log::debug!("Headless: released target '{}'", t.label);
        }
    }

    fn target_desc(&self, target: TargetId) -> Option<TargetDesc> {
        self.targets.get(target).map(|t| t.desc)
    }

    fn begin_frame(&mut self, camera_target: TargetId, frame: &FrameDescriptor) {
        self.stats.frames += 1;
        self.clip = frame.clip;
        self.scene_depth = self
            .targets
            .get(camera_target)
            .filter(|t| t.depth.is_some())
            .map(|_| camera_target);
    }

    fn end_frame(&mut self) {
        self.scene_depth = None;
    }

    fn submit(&mut self, commands: CommandBuffer) -> Result<()> {
        for command in commands.commands() {
            match *command {
                RenderCommand::FilteredCopy {
                    source,
                    destination,
                    program,
                } => self.run_filtered_copy(source, destination, program)?,
                RenderCommand::Copy {
                    source,
                    destination,
                } => self.run_copy(source, destination)?,
            }
        }
        self.submissions.push(commands);
        Ok(())
    }
}

// ─── Texel codecs ─────────────────────────────────────────────────────────────

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn decode_texel(format: wgpu::TextureFormat, texel: &[u8]) -> Result<Vec4> {
    use wgpu::TextureFormat as F;
    let unorm = |b: u8| f32::from(b) / 255.0;
    match format {
        F::Rgba8Unorm | F::Rgba8UnormSrgb => Ok(Vec4::new(
            unorm(texel[0]),
            unorm(texel[1]),
            unorm(texel[2]),
            unorm(texel[3]),
        )),
        F::Bgra8Unorm | F::Bgra8UnormSrgb => Ok(Vec4::new(
            unorm(texel[2]),
            unorm(texel[1]),
            unorm(texel[0]),
            unorm(texel[3]),
        )),
        F::Rgba16Float => {
            let halfs: [u16; 4] = bytemuck::pod_read_unaligned(texel);
            Ok(Vec4::from_array(
                halfs.map(|bits| half::f16::from_bits(bits).to_f32()),
            ))
        }
        F::Rgba32Float => Ok(Vec4::from_array(bytemuck::pod_read_unaligned(texel))),
        other => Err(FogError::UnsupportedFormat(other)),
    }
}

fn encode_texel(format: wgpu::TextureFormat, color: Vec4, out: &mut [u8]) -> Result<()> {
    use wgpu::TextureFormat as F;
    match format {
        F::Rgba8Unorm | F::Rgba8UnormSrgb => {
            out.copy_from_slice(&color.to_array().map(unorm8));
        }
        F::Bgra8Unorm | F::Bgra8UnormSrgb => {
            let [r, g, b, a] = color.to_array().map(unorm8);
            out.copy_from_slice(&[b, g, r, a]);
        }
        F::Rgba16Float => {
            let halfs = color
                .to_array()
                .map(|v| half::f16::from_f32(v).to_bits());
            out.copy_from_slice(bytemuck::cast_slice(&halfs));
        }
        F::Rgba32Float => {
            out.copy_from_slice(bytemuck::cast_slice(&color.to_array()));
        }
        other => return Err(FogError::UnsupportedFormat(other)),
    }
    Ok(())
}
