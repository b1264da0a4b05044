//! wgpu Backend
//!
//! A [`RenderBackend`] over a `wgpu::Device`.
//!
//! # Data Flow
//!
//! ```text
//! FilteredCopy: source view ─┬─ group(0) ─► fullscreen triangle ─► destination
//!            scene depth ─────┤
//!        frame uniforms ──────┘
//!       program uniforms ─── group(1)
//!
//! Copy:         copy_texture_to_texture(source → destination)
//! ```
//!
//! # Performance
//!
//! - One pipeline per (program, destination format), created on first use
//! - Program uniforms uploaded only when their block version moved
//! - All commands of a buffer share one `CommandEncoder` and one queue submit

use glam::Vec4;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use super::RenderBackend;
use crate::errors::{FogError, Result};
use crate::renderer::command::{CommandBuffer, RenderCommand};
use crate::renderer::shader_library::ShaderLibrary;
use crate::renderer::target::{FrameDescriptor, ShaderProgramId, TargetDesc, TargetId};
use crate::renderer::uniforms::UniformBlock;
use crate::resources::ShaderHandle;

/// Usages given to every color target so it can be sampled, rendered to,
/// and copied in both directions.
const COLOR_TARGET_USAGES: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

const DEPTH_TARGET_USAGES: wgpu::TextureUsages =
    wgpu::TextureUsages::RENDER_ATTACHMENT.union(wgpu::TextureUsages::TEXTURE_BINDING);

/// Uniforms in group(0) binding(2). Must match `FrameUniforms` in WGSL.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniforms {
    near: f32,
    far: f32,
    has_depth: u32,
    _pad: u32,
}

struct GpuTarget {
    desc: TargetDesc,
    label: String,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    depth_view: Option<wgpu::TextureView>,
}

struct GpuProgram {
    name: String,
    module: wgpu::ShaderModule,
    uniforms: UniformBlock,
    uploaded_version: Option<u64>,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    refs: u32,
}

/// GPU backend rendering through `wgpu`.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    library: ShaderLibrary,

    // === Shared GPU Resources ===
    /// group(0): source texture, scene depth, frame uniforms
    frame_layout: wgpu::BindGroupLayout,
    /// group(1): program uniform block
    program_layout: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    /// Bound when the frame has no depth attachment (`has_depth == 0`)
    fallback_depth_view: wgpu::TextureView,

    // === Registries ===
    targets: SlotMap<TargetId, GpuTarget>,
    programs: SlotMap<ShaderProgramId, GpuProgram>,
    program_lookup: FxHashMap<String, ShaderProgramId>,

    // === Frame State ===
    scene_depth: Option<TargetId>,
}

impl WgpuBackend {
    /// Creates the backend with the embedded program library.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self::with_library(device, queue, ShaderLibrary::new())
    }

    /// Creates the backend and its shared layouts over `library`, which may
    /// carry host-registered programs.
    #[must_use]
    pub fn with_library(device: wgpu::Device, queue: wgpu::Queue, library: ShaderLibrary) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fullscreen Frame Layout"),
            entries: &frame_layout_entries(),
        });

        let program_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fullscreen Program Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fullscreen Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let fallback_depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Fallback Scene Depth"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: DEPTH_TARGET_USAGES,
            view_formats: &[],
        });
        let fallback_depth_view = fallback_depth.create_view(&depth_view_descriptor());

        Self {
            device,
            queue,
            library,
            frame_layout,
            program_layout,
            frame_buffer,
            fallback_depth_view,
            targets: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            program_lookup: FxHashMap::default(),
            scene_depth: None,
        }
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Wraps an existing texture as a target.
    ///
    /// The texture must carry `TEXTURE_BINDING`, `RENDER_ATTACHMENT` and the
    /// copy usages if the fog pass is going to read and write it.
    pub fn import_target(
        &mut self,
        texture: wgpu::Texture,
        depth: Option<wgpu::Texture>,
        label: &str,
    ) -> TargetId {
        let mut desc = TargetDesc::new(texture.width(), texture.height(), texture.format());
        if let Some(depth) = &depth {
            desc = desc.with_depth(depth.format());
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.map(|d| d.create_view(&depth_view_descriptor()));
        self.targets.insert(GpuTarget {
            desc,
            label: label.to_string(),
            texture,
            view,
            depth_view,
        })
    }

    /// Uploads dirty uniforms and makes sure a pipeline exists for `format`.
    fn sync_program(&mut self, id: ShaderProgramId, format: wgpu::TextureFormat) -> Result<()> {
        let program = self.programs.get_mut(id).ok_or(FogError::UnknownProgram)?;

        let version = program.uniforms.version();
        if program.uploaded_version != Some(version) {
            let bytes = program.uniforms.as_bytes();
            if !bytes.is_empty() {
                self.queue.write_buffer(&program.buffer, 0, bytes);
            }
            program.uploaded_version = Some(version);
        }

        if !program.pipelines.contains_key(&format) {
            log::debug!("Compiling fullscreen pipeline '{}' for {format:?}", program.name);
            let pipeline = create_fullscreen_pipeline(
                &self.device,
                &program.module,
                &[&self.frame_layout, &self.program_layout],
                format,
                &program.name,
            );
            program.pipelines.insert(format, pipeline);
        }
        Ok(())
    }

    fn encode_filtered_copy(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        source: TargetId,
        destination: TargetId,
        program_id: ShaderProgramId,
    ) -> Result<()> {
        if source == destination {
            return Err(FogError::DescriptorMismatch(
                "a filtered copy cannot read and write the same target".to_string(),
            ));
        }
        let format = self
            .targets
            .get(destination)
            .ok_or(FogError::UnknownTarget)?
            .desc
            .format;
        self.sync_program(program_id, format)?;

        let src = self.targets.get(source).ok_or(FogError::UnknownTarget)?;
        let dst = &self.targets[destination];
        let program = &self.programs[program_id];

        let depth_view = self
            .scene_depth
            .and_then(|id| self.targets.get(id))
            .and_then(|t| t.depth_view.as_ref())
            .unwrap_or(&self.fallback_depth_view);

        let frame_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fullscreen Frame BindGroup"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.frame_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline = program
            .pipelines
            .get(&format)
            .ok_or(FogError::UnknownProgram)?;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&program.name),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &dst.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &frame_bind_group, &[]);
        pass.set_bind_group(1, &program.bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn encode_copy(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: TargetId,
        destination: TargetId,
    ) -> Result<()> {
        let src = self.targets.get(source).ok_or(FogError::UnknownTarget)?;
        let dst = self.targets.get(destination).ok_or(FogError::UnknownTarget)?;
        if src.desc.color_only() != dst.desc.color_only() {
            return Err(FogError::DescriptorMismatch(format!(
                "cannot copy '{}' ({}x{} {:?}) into '{}' ({}x{} {:?})",
                src.label,
                src.desc.width,
                src.desc.height,
                src.desc.format,
                dst.label,
                dst.desc.width,
                dst.desc.height,
                dst.desc.format,
            )));
        }

        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &src.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            src.desc.extent(),
        );
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn resolve_shader(&mut self, handle: &ShaderHandle) -> Option<ShaderProgramId> {
        let name = handle.name();
        if let Some(&id) = self.program_lookup.get(name)
            && let Some(program) = self.programs.get_mut(id)
        {
            program.refs += 1;
            return Some(id);
        }

        let source = self.library.get(name)?;
        log::debug!("Compiling shader module '{name}'");

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.wgsl),
        });

        let uniforms = UniformBlock::new(name, std::sync::Arc::new(source.layout));
        // Uniform bindings cannot be empty.
        let buffer_size = uniforms.as_bytes().len().max(16) as u64;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name),
            size: buffer_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(name),
            layout: &self.program_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        let id = self.programs.insert(GpuProgram {
            name: name.to_string(),
            module,
            uniforms,
            uploaded_version: None,
            buffer,
            bind_group,
            pipelines: FxHashMap::default(),
            refs: 1,
        });
        self.program_lookup.insert(name.to_string(), id);
        Some(id)
    }

    fn release_shader(&mut self, program: ShaderProgramId) {
        let Some(p) = self.programs.get_mut(program) else {
            return;
        };
        p.refs = p.refs.saturating_sub(1);
        if p.refs == 0
            && let Some(p) = self.programs.remove(program)
        {
            self.program_lookup.remove(&p.name);
            log::debug!("Released shader program '{}'", p.name);
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
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: desc.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: COLOR_TARGET_USAGES,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let depth_view = desc.depth_format.map(|format| {
            self.device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: desc.extent(),
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: DEPTH_TARGET_USAGES,
                    view_formats: &[],
                })
                .create_view(&depth_view_descriptor())
        });

        log::debug!(
            "Created target '{label}' {}x{} {:?}",
            desc.width,
            desc.height,
            desc.format
        );

        Ok(self.targets.insert(GpuTarget {
            desc: *desc,
            label: label.to_string(),
            texture,
            view,
            depth_view,
        }))
    }

    fn release_target(&mut self, target: TargetId) {
        if let Some(t) = self.targets.remove(target) {
            if self.scene_depth == Some(target) {
                self.scene_depth = None;
            }
            t.texture.destroy();
            log::debug!("Released target '{}'", t.label);
        }
    }

    fn target_desc(&self, target: TargetId) -> Option<TargetDesc> {
        self.targets.get(target).map(|t| t.desc)
    }

    fn begin_frame(&mut self, camera_target: TargetId, frame: &FrameDescriptor) {
        self.scene_depth = self
            .targets
            .get(camera_target)
            .filter(|t| t.depth_view.is_some())
            .map(|_| camera_target);

        let uniforms = FrameUniforms {
            near: frame.clip.near,
            far: frame.clip.far,
            has_depth: u32::from(self.scene_depth.is_some()),
            _pad: 0,
        };
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    fn end_frame(&mut self) {
        self.scene_depth = None;
    }

    fn submit(&mut self, commands: CommandBuffer) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(commands.label()),
            });

        for command in commands.commands() {
            match *command {
                RenderCommand::FilteredCopy {
                    source,
                    destination,
                    program,
                } => self.encode_filtered_copy(&mut encoder, source, destination, program)?,
                RenderCommand::Copy {
                    source,
                    destination,
                } => self.encode_copy(&mut encoder, source, destination)?,
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

/// group(0) layout shared by every fullscreen program.
///
/// The source is bound as a non-filterable float texture and read with
/// `textureLoad`, which keeps `Rgba32Float` targets valid without
/// `FLOAT32_FILTERABLE`.
fn frame_layout_entries() -> [wgpu::BindGroupLayoutEntry; 3] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
    ]
}

/// View of a depth attachment bound as `texture_depth_2d`. Combined
/// depth-stencil formats must expose the depth aspect alone.
fn depth_view_descriptor() -> wgpu::TextureViewDescriptor<'static> {
    wgpu::TextureViewDescriptor {
        label: Some("Scene Depth View"),
        aspect: wgpu::TextureAspect::DepthOnly,
        ..Default::default()
    }
}

fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::RenderPipeline {
    let bind_group_layouts: Vec<Option<&wgpu::BindGroupLayout>> =
        bind_group_layouts.iter().copied().map(Some).collect();
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &bind_group_layouts,
        immediate_size: 0,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
