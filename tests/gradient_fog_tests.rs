//! Gradient Fog Pass Tests
//!
//! Tests for:
//! - Command recording (filtered copy then copy, one buffer)
//! - Degradation while the program is unavailable
//! - Scratch target reuse and reallocation on resize
//! - Teardown and frame target invalidation
//! - Fogged pixels against scene depth

use anyhow::{Context, Result};
use glam::Vec4;

use gradient_fog::renderer::graph::passes::gradient_fog::{COMMAND_BUFFER_LABEL, SCRATCH_LABEL};
use gradient_fog::renderer::scratch::ScratchStats;
use gradient_fog::{
    CameraClip, FogParameters, FogSettings, FrameBuilder, FrameDescriptor, GradientFogFeature,
    GradientFogPass, HeadlessBackend, RenderBackend, RenderCommand, RenderNode, RenderStage,
    ShaderHandle, TargetDesc, TargetId,
};

const RGBA8: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn close(a: Vec4, b: Vec4, tolerance: f32) -> bool {
    (a - b).abs().max_element() <= tolerance
}

fn scenario_parameters() -> FogParameters {
    FogParameters {
        start_distance: 0.0,
        end_distance: 50.0,
        transparent_factor: 0.6,
        near_color: Vec4::new(0.0, 0.2, 0.35, 1.0),
        middle_color: Vec4::new(0.62, 0.86, 1.0, 1.0),
        far_color: Vec4::new(0.85, 0.96, 1.0, 1.0),
    }
}

/// Initialized pass plus a color-only camera target.
fn setup(
    backend: &mut HeadlessBackend,
    desc: TargetDesc,
) -> Result<(GradientFogPass, TargetId, FrameDescriptor)> {
    let camera = backend.create_target(&desc, "camera")?;
    let mut pass = GradientFogPass::new(&FogSettings::default());
    pass.initialize(backend)?;
    Ok((pass, camera, FrameDescriptor::new(desc)))
}

fn run_frame(
    pass: &mut GradientFogPass,
    backend: &mut HeadlessBackend,
    camera: TargetId,
    frame: &FrameDescriptor,
) {
    let mut builder = FrameBuilder::new();
    builder.add_node(RenderStage::BeforeTransparent, pass);
    builder.execute(backend, camera, frame);
}

// ============================================================================
// Command Recording
// ============================================================================

#[test]
fn valid_parameters_record_two_commands_in_order() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let (mut pass, camera, frame) = setup(&mut backend, TargetDesc::new(32, 16, RGBA8))?;

    pass.apply(&mut backend, camera, &scenario_parameters());
    pass.execute_frame(&mut backend, &frame)?;

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].label(), COMMAND_BUFFER_LABEL);

    let commands = submissions[0].commands();
    assert_eq!(commands.len(), 2);
    let scratch = pass.scratch_target().context("scratch allocated")?;
    assert!(matches!(
        commands[0],
        RenderCommand::FilteredCopy { source, destination, .. }
            if source == camera && destination == scratch
    ));
    assert_eq!(
        commands[1],
        RenderCommand::Copy {
            source: scratch,
            destination: camera
        }
    );
    assert_eq!(backend.target_label(scratch), Some(SCRATCH_LABEL));
    Ok(())
}

#[test]
fn end_to_end_1080p_scenario() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let desc = TargetDesc::new(1920, 1080, RGBA8);
    let (mut pass, camera, frame) = setup(&mut backend, desc)?;

    pass.apply(&mut backend, camera, &scenario_parameters());
    pass.execute_frame(&mut backend, &frame)?;

    let commands = backend.submissions()[0].commands();
    let RenderCommand::FilteredCopy {
        source,
        destination: scratch,
        program,
    } = commands[0]
    else {
        anyhow::bail!("expected a filtered copy first, got {:?}", commands[0]);
    };
    assert_eq!(source, camera);
    assert_eq!(Some(program), pass.program());
    assert_eq!(backend.target_desc(scratch), Some(desc));

    assert_eq!(commands[1].source(), scratch);
    assert_eq!(commands[1].destination(), camera);
    assert_eq!(backend.target_desc(camera), Some(desc));
    Ok(())
}

// ============================================================================
// Degradation
// ============================================================================

#[test]
fn unresolved_program_records_nothing_and_leaves_frame_untouched() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::empty();
    let desc = TargetDesc::new(8, 8, RGBA8);
    let camera = backend.create_target(&desc, "camera")?;
    backend.fill(camera, Vec4::new(0.1, 0.2, 0.3, 1.0))?;
    let before = backend.pixels(camera).context("camera pixels")?.to_vec();

    let mut pass = GradientFogPass::new(&FogSettings::default());
    assert!(pass.initialize(&mut backend).is_err());

    run_frame(&mut pass, &mut backend, camera, &FrameDescriptor::new(desc));

    assert_eq!(backend.command_count(), 0);
    assert_eq!(backend.pixels(camera), Some(before.as_slice()));
    assert_eq!(pass.scratch_stats(), ScratchStats::default());
    Ok(())
}

#[test]
fn deferred_shader_is_picked_up_once_loaded() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    backend.defer_shader(ShaderHandle::GRADIENT_FOG);
    let desc = TargetDesc::new(8, 8, RGBA8);
    let camera = backend.create_target(&desc, "camera")?;
    let frame = FrameDescriptor::new(desc);

    let mut feature = GradientFogFeature::create(FogSettings::default(), &mut backend);
    assert_eq!(feature.program(), None);

    for _ in 0..2 {
        let mut builder = FrameBuilder::new();
        feature.add_render_passes(&mut builder);
        builder.execute(&mut backend, camera, &frame);
    }
    assert_eq!(backend.command_count(), 0);

    backend.finish_loading(ShaderHandle::GRADIENT_FOG);

    let mut builder = FrameBuilder::new();
    feature.add_render_passes(&mut builder);
    builder.execute(&mut backend, camera, &frame);

    assert!(feature.program().is_some());
    assert_eq!(backend.submissions().len(), 1);
    assert_eq!(backend.command_count(), 2);
    // One attempt at creation, then one per frame until resolved
    assert_eq!(backend.stats().resolve_attempts, 4);
    assert_eq!(backend.stats().frames, 3);

    let mut builder = FrameBuilder::new();
    feature.add_render_passes(&mut builder);
    builder.execute(&mut backend, camera, &frame);
    assert_eq!(backend.stats().resolve_attempts, 4);
    Ok(())
}

#[test]
fn invalid_parameters_are_still_applied() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let (mut pass, camera, frame) = setup(&mut backend, TargetDesc::new(4, 4, RGBA8))?;
    let inverted = FogParameters {
        start_distance: 80.0,
        end_distance: 20.0,
        ..FogParameters::default()
    };
    assert!(inverted.validate().is_err());

    pass.apply(&mut backend, camera, &inverted);
    pass.execute_frame(&mut backend, &frame)?;

    let uniforms = backend
        .program_uniforms(pass.program().context("program")?)
        .context("uniforms")?;
    assert_eq!(uniforms.scalar("startDistance"), Some(80.0));
    assert_eq!(uniforms.scalar("endDistance"), Some(20.0));
    assert_eq!(backend.command_count(), 2);
    Ok(())
}

// ============================================================================
// Scratch Target
// ============================================================================

#[test]
fn identical_frames_reuse_the_scratch_target() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let (mut pass, camera, frame) = setup(&mut backend, TargetDesc::new(16, 16, RGBA8))?;

    let mut scratch = Vec::new();
    for _ in 0..3 {
        run_frame(&mut pass, &mut backend, camera, &frame);
        let submitted = backend.take_submissions();
        assert_eq!(submitted.len(), 1);
        scratch.push(submitted[0].commands()[0].destination());
    }

    assert!(backend.submissions().is_empty());
    assert_eq!(scratch.len(), 3);
    assert!(scratch.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(
        pass.scratch_stats(),
        ScratchStats {
            allocations: 1,
            reuses: 2,
            releases: 0
        }
    );
    Ok(())
}

#[test]
fn resize_reallocates_exactly_once() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let small = TargetDesc::new(16, 16, RGBA8);
    let large = TargetDesc::new(32, 24, RGBA8);
    let (mut pass, small_camera, small_frame) = setup(&mut backend, small)?;
    let large_camera = backend.create_target(&large, "camera (resized)")?;
    let large_frame = FrameDescriptor::new(large);

    run_frame(&mut pass, &mut backend, small_camera, &small_frame);
    let released_before = backend.stats().targets_released;
    run_frame(&mut pass, &mut backend, large_camera, &large_frame);
    run_frame(&mut pass, &mut backend, large_camera, &large_frame);

    let stats = pass.scratch_stats();
    assert_eq!(stats.allocations, 2);
    assert_eq!(stats.releases, 1);
    assert_eq!(backend.stats().targets_released, released_before + 1);

    let scratch = pass.scratch_target().context("scratch")?;
    assert_eq!(backend.target_desc(scratch), Some(large));
    Ok(())
}

#[test]
fn scratch_drops_the_depth_attachment() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let desc = TargetDesc::new(8, 8, RGBA8).with_depth(DEPTH);
    let (mut pass, camera, frame) = setup(&mut backend, desc)?;

    run_frame(&mut pass, &mut backend, camera, &frame);

    let scratch = pass.scratch_target().context("scratch")?;
    assert_eq!(backend.target_desc(scratch), Some(desc.color_only()));
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn teardown_then_execute_is_a_no_op() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let (mut pass, camera, frame) = setup(&mut backend, TargetDesc::new(8, 8, RGBA8))?;
    run_frame(&mut pass, &mut backend, camera, &frame);
    let commands_before = backend.command_count();

    pass.teardown(&mut backend);
    pass.teardown(&mut backend);
    run_frame(&mut pass, &mut backend, camera, &frame);
    pass.execute_frame(&mut backend, &frame)?;

    assert_eq!(backend.command_count(), commands_before);
    assert_eq!(pass.program(), None);
    assert_eq!(pass.scratch_target(), None);
    assert_eq!(backend.live_target_count(), 1);
    Ok(())
}

#[test]
fn disposed_feature_stays_inert_on_later_frames() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let desc = TargetDesc::new(8, 8, RGBA8);
    let camera = backend.create_target(&desc, "camera")?;
    let frame = FrameDescriptor::new(desc);
    let mut feature = GradientFogFeature::create(FogSettings::default(), &mut backend);

    let mut builder = FrameBuilder::new();
    feature.add_render_passes(&mut builder);
    builder.execute(&mut backend, camera, &frame);
    let program = feature.program().context("program resolved")?;
    let commands_before = backend.command_count();

    feature.dispose(&mut backend);
    for _ in 0..2 {
        let mut builder = FrameBuilder::new();
        feature.add_render_passes(&mut builder);
        builder.execute(&mut backend, camera, &frame);
    }

    assert!(feature.pass().is_torn_down());
    assert_eq!(feature.program(), None);
    assert_eq!(backend.program_refs(program), 0);
    assert_eq!(backend.live_target_count(), 1);
    assert_eq!(backend.command_count(), commands_before);
    assert_eq!(feature.scratch_stats().allocations, 1);
    Ok(())
}

#[test]
fn zero_area_frame_passes_through() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let (mut pass, camera, _) = setup(&mut backend, TargetDesc::new(0, 0, RGBA8))?;
    let minimised = FrameDescriptor::new(TargetDesc::new(0, 0, RGBA8));

    run_frame(&mut pass, &mut backend, camera, &minimised);
    pass.apply(&mut backend, camera, &scenario_parameters());
    pass.execute_frame(&mut backend, &minimised)?;

    assert!(pass.program().is_some());
    assert_eq!(backend.command_count(), 0);
    assert_eq!(pass.scratch_target(), None);
    assert_eq!(pass.scratch_stats().allocations, 0);
    assert_eq!(backend.stats().targets_created, 1);
    Ok(())
}

#[test]
fn frame_target_is_released_at_end_of_frame() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let (mut pass, camera, frame) = setup(&mut backend, TargetDesc::new(8, 8, RGBA8))?;

    run_frame(&mut pass, &mut backend, camera, &frame);
    assert_eq!(pass.source(), None);

    pass.execute_frame(&mut backend, &frame)?;
    assert_eq!(backend.submissions().len(), 1);
    Ok(())
}

#[test]
fn camera_removal_releases_the_scratch_target() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let desc = TargetDesc::new(8, 8, RGBA8);
    let camera = backend.create_target(&desc, "camera")?;
    let mut feature = GradientFogFeature::create(FogSettings::default(), &mut backend);

    let mut builder = FrameBuilder::new();
    feature.add_render_passes(&mut builder);
    builder.execute(&mut backend, camera, &FrameDescriptor::new(desc));
    assert_eq!(backend.live_target_count(), 2);

    feature.on_camera_removed(&mut backend);

    assert_eq!(feature.pass().source(), None);
    assert_eq!(feature.pass().scratch_target(), None);
    assert_eq!(feature.scratch_stats().releases, 1);
    assert!(feature.program().is_some());
    assert!(backend.is_target_alive(camera));
    assert_eq!(backend.live_target_count(), 1);
    Ok(())
}

#[test]
fn fog_runs_between_opaque_and_transparent_nodes() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let mut feature = GradientFogFeature::create(FogSettings::default(), &mut backend);

    let mut builder = FrameBuilder::new();
    feature.add_render_passes(&mut builder);

    let schedule = builder.schedule();
    assert_eq!(schedule.len(), 1);
    assert!(RenderStage::Opaque < schedule[0].0);
    assert!(schedule[0].0 < RenderStage::Transparent);
    Ok(())
}

// ============================================================================
// Pixels
// ============================================================================

#[test]
fn fogged_pixels_follow_scene_depth() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let desc = TargetDesc::new(3, 1, RGBA8).with_depth(DEPTH);
    let clip = CameraClip::new(0.1, 100.0);
    let (mut pass, camera, frame) = setup(&mut backend, desc)?;
    let frame = frame.with_clip(clip);
    let params = scenario_parameters();
    pass.set_parameters(params);

    let scene = Vec4::new(0.2, 0.1, 0.05, 1.0);
    backend.fill(camera, scene)?;
    // near plane, mid-range geometry, sky
    let mid_depth = 0.998;
    backend.write_depth(camera, &[0.0, mid_depth, 1.0])?;

    run_frame(&mut pass, &mut backend, camera, &frame);

    let tolerance = 1.5 / 255.0;
    let read = |x| backend.read_color(camera, x, 0).context("pixel");

    let near = read(0)?;
    assert!(close(near, params.shade(scene, Some(clip.near), false), tolerance));

    let mid = read(1)?;
    let expected_mid = params.shade(scene, Some(clip.linearize(mid_depth)), false);
    assert!(close(mid, expected_mid, tolerance), "{mid} vs {expected_mid}");
    assert!(!close(mid, scene, tolerance));

    let sky = read(2)?;
    let expected_sky = params.shade(scene, Some(clip.far), true);
    assert!(close(sky, expected_sky, tolerance), "{sky} vs {expected_sky}");
    // 40% of the far color over the sky
    let manual = scene.truncate().lerp(params.far_color.truncate(), 0.4);
    assert!(close(sky.truncate().extend(1.0), manual.extend(1.0), tolerance));
    assert_eq!(sky.w, 1.0);
    Ok(())
}

#[test]
fn frame_without_depth_keeps_colors() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let (mut pass, camera, frame) = setup(&mut backend, TargetDesc::new(4, 4, RGBA8))?;
    backend.fill(camera, Vec4::new(0.4, 0.5, 0.6, 1.0))?;
    let before = backend.pixels(camera).context("pixels")?.to_vec();

    run_frame(&mut pass, &mut backend, camera, &frame);

    assert_eq!(backend.command_count(), 2);
    assert_eq!(backend.pixels(camera), Some(before.as_slice()));
    Ok(())
}

#[test]
fn readback_exports_an_rgba_image() -> Result<()> {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let desc = TargetDesc::new(2, 2, wgpu::TextureFormat::Rgba16Float);
    let target = backend.create_target(&desc, "hdr")?;
    backend.fill(target, Vec4::new(1.0, 0.0, 0.0, 1.0))?;

    let image = backend.read_rgba8(target).context("image")?;

    assert_eq!(image.dimensions(), (2, 2));
    assert_eq!(image.get_pixel(1, 1).0, [255, 0, 0, 255]);
    Ok(())
}
