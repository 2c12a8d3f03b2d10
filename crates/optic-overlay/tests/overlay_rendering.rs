//! End-to-end overlay rendering against the simulated device.

use std::path::Path;

use optic_gpu::cmd::Command;
use optic_gpu::testing::{SimDevice, SimWindow};
use optic_gpu::{
    DescriptorHeapKind, DescriptorSlot, Device, HeapKind, PixelFormat, ResourceDesc, ResourceId,
    ResourceState, TextureDimension, FONT_SRV_SLOT, TEX_DISPLAY_SRV_SLOT,
};
use optic_overlay::renderer::{RESTYPE_TEX2D, RESTYPE_TEX2DMS, RESTYPE_TEX3D};
use optic_overlay::surface::SurfaceHandle;
use optic_overlay::testing::{fixed_cell_atlas, SimCompiler};
use optic_overlay::{DebugOverlay, DisplayOverlay, OverlayError, TextureDisplay};
use pretty_assertions::assert_eq;

fn new_overlay(dir: &Path) -> DebugOverlay<SimDevice, SimCompiler> {
    DebugOverlay::new(
        SimDevice::new(),
        SimCompiler::default(),
        fixed_cell_atlas(),
        dir.join("shaders.cache"),
    )
    .unwrap()
}

fn bind_surface(overlay: &mut DebugOverlay<SimDevice, SimCompiler>) -> SurfaceHandle {
    let window = SimWindow::new(200, 100);
    let handle = overlay.create_output_surface(Box::new(window), false);
    assert!(!handle.is_none());
    overlay.bind_output_surface(handle);
    handle
}

/// Bytes of the constant buffer bound at `slot` in the last submission.
fn constant_buffer_bytes(device: &SimDevice, slot: u32) -> Vec<u8> {
    let list = device.submitted.last().expect("no submissions");
    let (buffer, offset) = list
        .commands
        .iter()
        .find_map(|command| match command {
            Command::SetConstantBuffer {
                slot: s,
                buffer,
                offset,
            } if *s == slot => Some((*buffer, *offset)),
            _ => None,
        })
        .expect("constant buffer not bound");
    device.resource(buffer).unwrap().bytes[offset as usize..].to_vec()
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

// Field offsets within the pixel constant block.
const PX_CHANNELS: usize = 0;
const PX_RANGE_MIN: usize = 48;
const PX_INV_RANGE: usize = 52;
const PX_SLICE: usize = 76;
const PX_FORMAT: usize = 80;
const PX_SAMPLE: usize = 84;

#[test]
fn construction_compiles_every_shader_once() {
    let dir = tempfile::tempdir().unwrap();
    let overlay = new_overlay(dir.path());

    let stats = overlay.shader_cache_stats();
    assert_eq!(stats.compile_calls, 5);
    assert_eq!(stats.compile_failures, 0);
}

#[test]
fn second_session_builds_from_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    drop(new_overlay(dir.path()));

    let overlay = new_overlay(dir.path());
    let stats = overlay.shader_cache_stats();
    assert_eq!(stats.compile_calls, 0);
    assert_eq!(stats.loaded_from_disk, 5);
    assert_eq!(stats.memory_hits, 5);
}

#[test]
fn failed_required_shader_aborts_construction() {
    let dir = tempfile::tempdir().unwrap();
    let mut compiler = SimCompiler::default();
    compiler.fail_entry_points.insert("TexDisplayPS".into());

    let result = DebugOverlay::new(
        SimDevice::new(),
        compiler,
        fixed_cell_atlas(),
        dir.path().join("shaders.cache"),
    );
    match result {
        Err(OverlayError::ShaderCompile {
            entry_point,
            diagnostics,
        }) => {
            assert_eq!(entry_point, "TexDisplayPS");
            assert!(!diagnostics.is_empty());
        }
        other => panic!("expected shader compile error, got {:?}", other.is_ok()),
    }
}

#[test]
fn font_atlas_is_uploaded_and_bound() {
    let dir = tempfile::tempdir().unwrap();
    let overlay = new_overlay(dir.path());

    let slot = DescriptorSlot {
        heap: DescriptorHeapKind::Resource,
        index: FONT_SRV_SLOT,
    };
    let atlas = overlay.device().view_target(slot).expect("font SRV unbound");
    assert_eq!(
        overlay.device().subresource_states(atlas),
        vec![ResourceState::PixelShaderResource]
    );
    assert_eq!(
        overlay.device().resource_desc(atlas).unwrap().format,
        PixelFormat::R8Unorm
    );
}

#[test]
fn checkerboard_fills_the_bound_surface() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    let waits_before = overlay.device().waits;
    overlay.render_checkerboard([0.9, 0.9, 0.9, 1.0], [0.5, 0.5, 0.5, 1.0]);
    assert_eq!(overlay.device().draws, 1);
    assert!(overlay.device().waits > waits_before);

    let pixel = constant_buffer_bytes(overlay.device(), 1);
    assert_eq!(read_f32(&pixel, 16), 0.9);
    assert_eq!(read_f32(&pixel, 32), 0.5);
}

#[test]
fn draws_without_a_bound_surface_are_noops() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());

    overlay.render_checkerboard([1.0; 4], [0.0; 4]);
    overlay.render_text(0.0, 0.0, "hello");
    assert!(!overlay.render_texture(&TextureDisplay::default()));
    assert_eq!(overlay.device().draws, 0);
}

#[test]
fn text_draws_one_instanced_quad_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    overlay.render_text(1.0, 1.0, "ab\nlonger line\n\ncd");
    // Three non-empty lines; the empty one only advances.
    assert_eq!(overlay.device().draws, 3);

    let last = overlay.device().submitted.last().unwrap();
    let draw = last
        .commands
        .iter()
        .find_map(|command| match command {
            Command::Draw {
                vertex_count,
                instance_count,
            } => Some((*vertex_count, *instance_count)),
            _ => None,
        })
        .unwrap();
    assert_eq!(draw, (4, 2));
}

#[test]
fn oversized_text_line_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    let long = "x".repeat(300);
    overlay.render_text(0.0, 0.0, &long);
    assert_eq!(overlay.device().draws, 0);

    // Lines under the limit still render after a rejection.
    overlay.render_text(0.0, 0.0, "ok");
    assert_eq!(overlay.device().draws, 1);
}

#[test]
fn glyph_ring_wraps_without_overrunning() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    let line = "y".repeat(200);
    for _ in 0..40 {
        overlay.render_text(0.0, 0.0, &line);
    }
    assert_eq!(overlay.device().draws, 40);

    // Every character-buffer binding lands on a 256-byte boundary.
    for list in &overlay.device().submitted {
        for command in &list.commands {
            if let Command::SetConstantBuffer { slot: 2, offset, .. } = command {
                assert_eq!(offset % 256, 0);
            }
        }
    }
}

#[test]
fn text_pipeline_follows_the_selected_format() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    assert!(overlay.set_text_target_format(PixelFormat::Rgba16Float));
    assert!(!overlay.set_text_target_format(PixelFormat::R32Uint));
    assert_eq!(overlay.text_target_format(), PixelFormat::Rgba16Float);

    overlay.render_text(0.0, 0.0, "hi");
    let last = overlay.device().submitted.last().unwrap();
    let pipeline = last
        .commands
        .iter()
        .find_map(|command| match command {
            Command::SetPipeline(id) => Some(*id),
            _ => None,
        })
        .unwrap();
    let desc = overlay.device().pipeline(pipeline).unwrap();
    assert_eq!(desc.render_target_format, PixelFormat::Rgba16Float);
    assert!(desc.blend_enabled);
}

#[test]
fn render_texture_restores_subresource_states() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    let desc = ResourceDesc {
        dimension: TextureDimension::Texture2D,
        width: 64,
        height: 64,
        depth_or_array_size: 2,
        mip_levels: 3,
        sample_count: 1,
        format: PixelFormat::Rgba8Unorm,
    };
    let tex = overlay
        .device_mut()
        .create_resource(&desc, HeapKind::Default, ResourceState::RenderTarget)
        .unwrap();
    // One subresource already sits in the sampled state.
    overlay
        .device_mut()
        .set_subresource_state(tex, 2, ResourceState::PixelShaderResource);
    let before = overlay.device().subresource_states(tex);
    assert_eq!(before.len(), 6);

    assert!(overlay.render_texture(&TextureDisplay {
        resource: tex,
        ..TextureDisplay::default()
    }));

    assert_eq!(overlay.device().subresource_states(tex), before);
    assert_eq!(overlay.device().barrier_mismatches, 0);
    assert_eq!(overlay.device().draws, 1);

    let srv = DescriptorSlot {
        heap: DescriptorHeapKind::Resource,
        index: TEX_DISPLAY_SRV_SLOT,
    };
    assert_eq!(overlay.device().view_target(srv), Some(tex));
}

#[test]
fn unknown_or_undisplayable_resources_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    // Never-created handle.
    assert!(!overlay.render_texture(&TextureDisplay {
        resource: ResourceId(9999),
        ..TextureDisplay::default()
    }));

    let unknown = overlay
        .device_mut()
        .create_resource(
            &ResourceDesc::texture2d(8, 8, PixelFormat::Unknown),
            HeapKind::Default,
            ResourceState::GenericRead,
        )
        .unwrap();
    assert!(!overlay.render_texture(&TextureDisplay {
        resource: unknown,
        ..TextureDisplay::default()
    }));

    assert_eq!(overlay.device().draws, 0);
}

#[test]
fn degenerate_range_still_produces_finite_constants() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    let tex = overlay
        .device_mut()
        .create_resource(
            &ResourceDesc::texture2d(16, 16, PixelFormat::Rgba8Unorm),
            HeapKind::Default,
            ResourceState::PixelShaderResource,
        )
        .unwrap();

    assert!(overlay.render_texture(&TextureDisplay {
        resource: tex,
        range_min: 0.5,
        range_max: 0.5,
        ..TextureDisplay::default()
    }));

    let pixel = constant_buffer_bytes(overlay.device(), 1);
    assert_eq!(read_f32(&pixel, PX_RANGE_MIN), 0.5);
    let inverse = read_f32(&pixel, PX_INV_RANGE);
    assert!(inverse.is_finite());
    assert!(inverse > 0.0);
    assert_eq!(read_u32(&pixel, PX_FORMAT) & 0xf, RESTYPE_TEX2D);
}

#[test]
fn multisample_resolve_uses_the_negative_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    let desc = ResourceDesc {
        dimension: TextureDimension::Texture2D,
        width: 32,
        height: 32,
        depth_or_array_size: 1,
        mip_levels: 1,
        sample_count: 4,
        format: PixelFormat::Rgba16Float,
    };
    let tex = overlay
        .device_mut()
        .create_resource(&desc, HeapKind::Default, ResourceState::PixelShaderResource)
        .unwrap();

    assert!(overlay.render_texture(&TextureDisplay {
        resource: tex,
        sample_index: !0,
        ..TextureDisplay::default()
    }));

    let pixel = constant_buffer_bytes(overlay.device(), 1);
    assert_eq!(read_u32(&pixel, PX_FORMAT) & 0xf, RESTYPE_TEX2DMS);
    assert_eq!(read_i32(&pixel, PX_SAMPLE), -4);
}

#[test]
fn volume_slice_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    let desc = ResourceDesc {
        dimension: TextureDimension::Texture3D,
        width: 32,
        height: 32,
        depth_or_array_size: 8,
        mip_levels: 1,
        sample_count: 1,
        format: PixelFormat::Rgba8Unorm,
    };
    let tex = overlay
        .device_mut()
        .create_resource(&desc, HeapKind::Default, ResourceState::PixelShaderResource)
        .unwrap();

    assert!(overlay.render_texture(&TextureDisplay {
        resource: tex,
        slice: 4,
        ..TextureDisplay::default()
    }));

    let pixel = constant_buffer_bytes(overlay.device(), 1);
    assert_eq!(read_u32(&pixel, PX_FORMAT) & 0xf, RESTYPE_TEX3D);
    let slice = read_f32(&pixel, PX_SLICE);
    assert!(slice > 0.5 && slice < 0.51, "slice {slice}");
}

#[test]
fn alpha_only_formats_display_alpha_as_gray() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    let tex = overlay
        .device_mut()
        .create_resource(
            &ResourceDesc::texture2d(16, 16, PixelFormat::A8Unorm),
            HeapKind::Default,
            ResourceState::PixelShaderResource,
        )
        .unwrap();

    assert!(overlay.render_texture(&TextureDisplay {
        resource: tex,
        ..TextureDisplay::default()
    }));

    let pixel = constant_buffer_bytes(overlay.device(), 1);
    let channels: Vec<f32> = (0..4).map(|i| read_f32(&pixel, PX_CHANNELS + i * 4)).collect();
    assert_eq!(channels, vec![0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn auto_fit_preserves_aspect_and_centers() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    // Surface is 200x100.
    bind_surface(&mut overlay);

    let tex = overlay
        .device_mut()
        .create_resource(
            &ResourceDesc::texture2d(50, 50, PixelFormat::Rgba8Unorm),
            HeapKind::Default,
            ResourceState::PixelShaderResource,
        )
        .unwrap();

    assert!(overlay.render_texture(&TextureDisplay {
        resource: tex,
        scale: 0.0,
        ..TextureDisplay::default()
    }));

    let vertex = constant_buffer_bytes(overlay.device(), 0);
    // Fit is limited by height: 100/50 = 2, doubled for clip space.
    assert_eq!(read_f32(&vertex, 24), 4.0);
    // Centered horizontally at 50px, flush to the top.
    assert_eq!(read_f32(&vertex, 0), -0.5);
    assert_eq!(read_f32(&vertex, 4), 1.0);
    assert_eq!(read_f32(&vertex, 16), 50.0);
    assert_eq!(read_f32(&vertex, 20), 50.0);
}

#[test]
fn nan_overlay_sets_the_display_flag() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    bind_surface(&mut overlay);

    let tex = overlay
        .device_mut()
        .create_resource(
            &ResourceDesc::texture2d(16, 16, PixelFormat::Rgba32Float),
            HeapKind::Default,
            ResourceState::PixelShaderResource,
        )
        .unwrap();

    assert!(overlay.render_texture(&TextureDisplay {
        resource: tex,
        overlay: DisplayOverlay::NanInf,
        ..TextureDisplay::default()
    }));

    let pixel = constant_buffer_bytes(overlay.device(), 1);
    let format = read_u32(&pixel, PX_FORMAT);
    assert_ne!(format & optic_overlay::renderer::FLAG_NANS, 0);
}

#[test]
fn flip_after_draws_keeps_barriers_symmetric() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    let handle = bind_surface(&mut overlay);

    overlay.render_checkerboard([1.0; 4], [0.0; 4]);
    overlay.render_text(0.0, 0.0, "frame 1");
    overlay.flip(handle);

    assert_eq!(overlay.device().presents, 1);
    assert_eq!(overlay.device().barrier_mismatches, 0);
}

#[test]
fn clears_route_through_the_surface_views() {
    let dir = tempfile::tempdir().unwrap();
    let mut overlay = new_overlay(dir.path());
    let handle = bind_surface(&mut overlay);

    overlay.clear_color(handle, [0.0, 0.0, 0.0, 1.0]);
    assert_eq!(overlay.device().clears, 1);
    // No depth target was requested for this surface.
    overlay.clear_depth(handle, 1.0, 0);
    assert_eq!(overlay.device().clears, 1);
}
