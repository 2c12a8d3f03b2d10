//! Output surface lifecycle against the simulated device.

use optic_gpu::testing::{SimDevice, SimWindow};
use optic_gpu::{DescriptorAllocator, Device, ResourceState, SwapChainId};
use optic_overlay::surface::{SurfaceManager, SurfaceHandle, SWAP_CHAIN_FORMAT};
use pretty_assertions::assert_eq;

struct Fixture {
    device: SimDevice,
    descriptors: DescriptorAllocator,
    surfaces: SurfaceManager,
}

impl Fixture {
    fn new() -> Self {
        Self {
            device: SimDevice::new(),
            descriptors: DescriptorAllocator::new(),
            surfaces: SurfaceManager::new(),
        }
    }

    fn create(&mut self, window: &SimWindow, want_depth: bool) -> SurfaceHandle {
        self.surfaces.create(
            &mut self.device,
            &mut self.descriptors,
            Box::new(window.clone()),
            want_depth,
        )
    }
}

#[test]
fn handles_are_monotonic_and_never_reused() {
    let mut f = Fixture::new();
    let window = SimWindow::new(64, 64);

    let first = f.create(&window, false);
    let second = f.create(&window, false);
    assert_eq!(first, SurfaceHandle(1));
    assert_eq!(second, SurfaceHandle(2));

    f.surfaces
        .destroy(&mut f.device, &mut f.descriptors, first);
    let third = f.create(&window, false);
    assert_eq!(third, SurfaceHandle(3));
}

#[test]
fn swap_chain_failure_yields_none_handle() {
    let mut f = Fixture::new();
    let window = SimWindow::new(64, 64);

    f.device.fail_next_swap_chain = true;
    let handle = f.create(&window, true);
    assert!(handle.is_none());
    assert_eq!(f.device.live_resources(), 0);
}

#[test]
fn color_target_failure_tears_the_surface_down() {
    let mut f = Fixture::new();
    let window = SimWindow::new(64, 64);

    f.device.fail_next_resource = true;
    let handle = f.create(&window, false);
    assert!(handle.is_none());
    // The swap chain created before the failure was released again.
    assert_eq!(f.device.live_resources(), 0);
    assert!(f.surfaces.dimensions(handle).is_none());
}

#[test]
fn destroy_releases_every_resource() {
    let mut f = Fixture::new();
    let window = SimWindow::new(64, 64);

    let handle = f.create(&window, true);
    // Two back buffers, a color target, and a depth target.
    assert_eq!(f.device.live_resources(), 4);

    f.surfaces
        .destroy(&mut f.device, &mut f.descriptors, handle);
    assert_eq!(f.device.live_resources(), 0);
    assert!(f.surfaces.dimensions(handle).is_none());
}

#[test]
fn resize_flushes_and_rebuilds_targets() {
    let mut f = Fixture::new();
    let window = SimWindow::new(100, 50);
    let handle = f.create(&window, true);

    // Unchanged size is a cheap no-op.
    assert!(!f.surfaces.check_and_resize(&mut f.device, handle));
    assert_eq!(f.device.waits, 0);

    window.set_client_size(200, 100);
    assert!(f.surfaces.check_and_resize(&mut f.device, handle));
    assert_eq!(f.surfaces.dimensions(handle), Some((200, 100)));
    // The device was drained before anything was released.
    assert_eq!(f.device.waits, 1);

    let swap = f.device.swap_chain(SwapChainId(0)).unwrap();
    assert_eq!(swap.resizes, 1);
    assert_eq!(swap.desc.width, 200);
    assert_eq!(swap.desc.format, SWAP_CHAIN_FORMAT);
    assert_eq!(swap.desc.buffer_count, 2);
    // Back buffers, color and depth were all rebuilt at the new size.
    assert_eq!(f.device.live_resources(), 4);
    let color = f.surfaces.get(handle).unwrap().color_target().unwrap();
    let desc = f.device.resource_desc(color).unwrap();
    assert_eq!((desc.width, desc.height), (200, 100));

    // A second resize lands on the newest dimensions again.
    window.set_client_size(64, 64);
    assert!(f.surfaces.check_and_resize(&mut f.device, handle));
    assert_eq!(f.surfaces.dimensions(handle), Some((64, 64)));
}

#[test]
fn minimized_window_skips_the_device_resize() {
    let mut f = Fixture::new();
    let window = SimWindow::new(100, 50);
    let handle = f.create(&window, false);

    window.set_client_size(0, 50);
    assert!(f.surfaces.check_and_resize(&mut f.device, handle));
    // The new size is recorded but the swap chain is left alone.
    assert_eq!(f.surfaces.dimensions(handle), Some((0, 50)));
    assert_eq!(f.device.swap_chain(SwapChainId(0)).unwrap().resizes, 0);
}

#[test]
fn flip_copies_presents_and_toggles() {
    let mut f = Fixture::new();
    let window = SimWindow::new(64, 64);
    let handle = f.create(&window, false);

    assert_eq!(f.surfaces.get(handle).unwrap().back_buffer_index(), 0);
    f.surfaces.flip(&mut f.device, handle);
    assert_eq!(f.device.presents, 1);
    assert_eq!(f.surfaces.get(handle).unwrap().back_buffer_index(), 1);

    f.surfaces.flip(&mut f.device, handle);
    assert_eq!(f.device.presents, 2);
    assert_eq!(f.surfaces.get(handle).unwrap().back_buffer_index(), 0);

    // Every transition matched the tracked state and was restored.
    assert_eq!(f.device.barrier_mismatches, 0);
    let color = f.surfaces.get(handle).unwrap().color_target().unwrap();
    assert_eq!(
        f.device.subresource_states(color),
        vec![ResourceState::RenderTarget]
    );
}

#[test]
fn unknown_handles_are_safe_noops() {
    let mut f = Fixture::new();
    let bogus = SurfaceHandle(99);

    f.surfaces.bind(bogus);
    assert_eq!(f.surfaces.current(), SurfaceHandle::NONE);

    assert!(!f.surfaces.check_and_resize(&mut f.device, bogus));
    f.surfaces.flip(&mut f.device, bogus);
    f.surfaces.clear_color(&mut f.device, bogus, [0.0; 4]);
    f.surfaces.clear_depth(&mut f.device, bogus, 1.0, 0);
    f.surfaces.destroy(&mut f.device, &mut f.descriptors, bogus);
    f.surfaces
        .destroy(&mut f.device, &mut f.descriptors, SurfaceHandle::NONE);

    assert_eq!(f.device.presents, 0);
    assert_eq!(f.device.clears, 0);
    assert!(!f.surfaces.is_visible(bogus));
}

#[test]
fn visibility_follows_the_window() {
    let mut f = Fixture::new();
    let window = SimWindow::new(64, 64);
    let handle = f.create(&window, false);

    assert!(f.surfaces.is_visible(handle));
    window.set_visible(false);
    assert!(!f.surfaces.is_visible(handle));
}

#[test]
fn clears_are_recorded_against_the_surface_views() {
    let mut f = Fixture::new();
    let window = SimWindow::new(64, 64);
    let with_depth = f.create(&window, true);
    let without_depth = f.create(&window, false);

    f.surfaces
        .clear_color(&mut f.device, with_depth, [0.2, 0.2, 0.2, 1.0]);
    f.surfaces.clear_depth(&mut f.device, with_depth, 1.0, 0);
    assert_eq!(f.device.clears, 2);

    // No depth target means the depth clear is skipped entirely.
    f.surfaces.clear_depth(&mut f.device, without_depth, 1.0, 0);
    assert_eq!(f.device.clears, 2);
}

#[test]
fn bind_selects_the_draw_target() {
    let mut f = Fixture::new();
    let window = SimWindow::new(64, 64);
    let first = f.create(&window, false);
    let second = f.create(&window, false);

    f.surfaces.bind(second);
    assert_eq!(f.surfaces.current(), second);
    f.surfaces.bind(first);
    assert_eq!(f.surfaces.current(), first);
    // Binding a dead handle leaves the selection alone.
    f.surfaces.bind(SurfaceHandle(42));
    assert_eq!(f.surfaces.current(), first);
}
