//! Output surface lifecycle.
//!
//! Each presentable surface owns a two-buffer swap chain, an off-screen
//! sRGB color target that all overlay draws land in, and an optional
//! depth target. Surfaces are keyed by opaque monotonically-increasing
//! handles; handle 0 is reserved and means "no surface". The bound
//! ("current") surface is an explicit selection field, never implicit
//! global state.

use std::collections::HashMap;

use optic_gpu::cmd::{Barrier, Command, CommandList};
use optic_gpu::{
    DescriptorAllocator, DescriptorSlot, Device, HeapKind, NativeWindow, PixelFormat, ResourceDesc,
    ResourceId, ResourceState, SwapChainDesc, SwapChainId,
};
use tracing::{debug, error};

pub const SWAP_CHAIN_FORMAT: PixelFormat = PixelFormat::Rgba8Unorm;
pub const COLOR_TARGET_FORMAT: PixelFormat = PixelFormat::Rgba8UnormSrgb;
pub const DEPTH_TARGET_FORMAT: PixelFormat = PixelFormat::D24UnormS8Uint;
pub const BACK_BUFFER_COUNT: u32 = 2;

/// Opaque surface identity. Never reused; 0 means "no surface".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

impl SurfaceHandle {
    pub const NONE: SurfaceHandle = SurfaceHandle(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// One presentable output surface.
///
/// `back_buffers`/`color` become `None` when a resize fails partway; all
/// draw/flip/clear paths treat that as "do nothing" rather than crash.
pub struct Surface {
    window: Box<dyn NativeWindow>,
    width: u32,
    height: u32,
    swap_chain: SwapChainId,
    back_buffers: Option<[ResourceId; 2]>,
    back_buffer_index: usize,
    color: Option<ResourceId>,
    depth: Option<ResourceId>,
    rtv: DescriptorSlot,
    dsv: Option<DescriptorSlot>,
}

impl Surface {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn rtv(&self) -> DescriptorSlot {
        self.rtv
    }

    pub fn color_target(&self) -> Option<ResourceId> {
        self.color
    }

    pub fn back_buffer_index(&self) -> usize {
        self.back_buffer_index
    }

    /// Whether the surface has live targets to draw into.
    pub fn is_usable(&self) -> bool {
        self.back_buffers.is_some() && self.color.is_some()
    }
}

/// Owning table of surfaces plus the current selection.
pub struct SurfaceManager {
    surfaces: HashMap<u64, Surface>,
    next_handle: u64,
    current: SurfaceHandle,
}

impl SurfaceManager {
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
            next_handle: 1,
            current: SurfaceHandle::NONE,
        }
    }

    pub fn get(&self, handle: SurfaceHandle) -> Option<&Surface> {
        if handle.is_none() {
            return None;
        }
        self.surfaces.get(&handle.0)
    }

    pub fn current(&self) -> SurfaceHandle {
        self.current
    }

    pub fn bound_surface(&self) -> Option<&Surface> {
        self.get(self.current)
    }

    /// Create a surface for `window`, reading its current client size.
    ///
    /// Any creation failure tears the partial surface back down and
    /// returns handle 0; there are no half-usable surfaces in the table.
    pub fn create<D: Device>(
        &mut self,
        device: &mut D,
        descriptors: &mut DescriptorAllocator,
        window: Box<dyn NativeWindow>,
        want_depth: bool,
    ) -> SurfaceHandle {
        let (width, height) = window.client_size();

        let swap_chain = match device.create_swap_chain(&SwapChainDesc {
            width,
            height,
            buffer_count: BACK_BUFFER_COUNT,
            format: SWAP_CHAIN_FORMAT,
        }) {
            Ok(swap_chain) => swap_chain,
            Err(err) => {
                error!(%err, "failed to create swap chain for output surface");
                return SurfaceHandle::NONE;
            }
        };

        let Some(back_buffers) = acquire_back_buffers(device, swap_chain) else {
            device.destroy_swap_chain(swap_chain);
            return SurfaceHandle::NONE;
        };

        let Some(rtv) = descriptors.allocate_rtv() else {
            device.destroy_swap_chain(swap_chain);
            return SurfaceHandle::NONE;
        };
        let dsv = if want_depth {
            match descriptors.allocate_dsv() {
                Some(dsv) => Some(dsv),
                None => {
                    device.destroy_swap_chain(swap_chain);
                    return SurfaceHandle::NONE;
                }
            }
        } else {
            None
        };

        let Some(color) = make_color_target(device, width, height) else {
            device.destroy_swap_chain(swap_chain);
            return SurfaceHandle::NONE;
        };
        device.create_render_target_view(color, rtv);

        let depth = if let Some(dsv) = dsv {
            let Some(depth) = make_depth_target(device, width, height) else {
                device.destroy_resource(color);
                device.destroy_swap_chain(swap_chain);
                return SurfaceHandle::NONE;
            };
            device.create_depth_stencil_view(depth, dsv);
            Some(depth)
        } else {
            None
        };

        let handle = SurfaceHandle(self.next_handle);
        self.next_handle += 1;
        self.surfaces.insert(
            handle.0,
            Surface {
                window,
                width,
                height,
                swap_chain,
                back_buffers: Some(back_buffers),
                back_buffer_index: 0,
                color: Some(color),
                depth,
                rtv,
                dsv,
            },
        );
        debug!(handle = handle.0, width, height, want_depth, "created output surface");
        handle
    }

    /// Make `handle` the implicit target for subsequent draws. Unknown
    /// handles are ignored.
    pub fn bind(&mut self, handle: SurfaceHandle) {
        if self.get(handle).is_some() {
            self.current = handle;
        }
    }

    /// Compare the cached size against the live client rectangle and
    /// rebuild size-dependent resources if it changed.
    ///
    /// All pending device work is flushed before anything is released so
    /// no in-flight command references a dying resource. A zero dimension
    /// (minimized window) skips the swap-chain resize but still records
    /// the new size.
    pub fn check_and_resize<D: Device>(&mut self, device: &mut D, handle: SurfaceHandle) -> bool {
        if handle.is_none() {
            return false;
        }
        let Some(surface) = self.surfaces.get_mut(&handle.0) else {
            return false;
        };

        let (width, height) = surface.window.client_size();
        if width == surface.width && height == surface.height {
            return false;
        }

        surface.width = width;
        surface.height = height;

        device.wait_idle();

        if width > 0 && height > 0 {
            if let Some([bb0, bb1]) = surface.back_buffers.take() {
                device.destroy_resource(bb0);
                device.destroy_resource(bb1);
            }

            if let Err(err) = device.resize_swap_chain(surface.swap_chain, width, height) {
                error!(%err, handle = handle.0, "failed to resize swap chain");
                return true;
            }

            let Some(back_buffers) = acquire_back_buffers(device, surface.swap_chain) else {
                return true;
            };
            surface.back_buffers = Some(back_buffers);
            surface.back_buffer_index = 0;

            if let Some(color) = surface.color.take() {
                device.destroy_resource(color);
            }
            if let Some(color) = make_color_target(device, width, height) {
                device.create_render_target_view(color, surface.rtv);
                surface.color = Some(color);
            }

            if let Some(dsv) = surface.dsv {
                if let Some(depth) = surface.depth.take() {
                    device.destroy_resource(depth);
                }
                if let Some(depth) = make_depth_target(device, width, height) {
                    device.create_depth_stencil_view(depth, dsv);
                    surface.depth = Some(depth);
                }
            }
        }

        true
    }

    /// Copy the color target into the current back buffer and present.
    ///
    /// The color target and back buffer each pass through a copy state
    /// and are transitioned back before the list is submitted; the call
    /// blocks until the copy completes, then advances the buffer index.
    pub fn flip<D: Device>(&mut self, device: &mut D, handle: SurfaceHandle) {
        if handle.is_none() {
            return;
        }
        let Some(surface) = self.surfaces.get_mut(&handle.0) else {
            return;
        };
        let (Some(color), Some(back_buffers)) = (surface.color, surface.back_buffers) else {
            return;
        };
        let back_buffer = back_buffers[surface.back_buffer_index];

        let barriers = vec![
            Barrier {
                resource: color,
                subresource: 0,
                before: ResourceState::RenderTarget,
                after: ResourceState::CopySource,
            },
            Barrier {
                resource: back_buffer,
                subresource: 0,
                before: ResourceState::Present,
                after: ResourceState::CopyDest,
            },
        ];

        let mut list = CommandList::new("surface flip");
        list.transition(barriers.clone());
        list.copy_resource(back_buffer, color);
        list.transition(barriers.iter().map(|b| b.reversed()).collect());

        if let Err(err) = device.submit(list) {
            error!(%err, handle = handle.0, "failed to submit flip");
            return;
        }
        device.wait_idle();

        if let Err(err) = device.present(surface.swap_chain) {
            error!(%err, handle = handle.0, "present failed");
        }

        surface.back_buffer_index = (surface.back_buffer_index + 1) % 2;
    }

    /// Release all GPU resources tied to the surface. Its descriptor
    /// slots are not reclaimed.
    pub fn destroy<D: Device>(
        &mut self,
        device: &mut D,
        descriptors: &mut DescriptorAllocator,
        handle: SurfaceHandle,
    ) {
        if handle.is_none() {
            return;
        }
        let Some(surface) = self.surfaces.remove(&handle.0) else {
            return;
        };

        if let Some([bb0, bb1]) = surface.back_buffers {
            device.destroy_resource(bb0);
            device.destroy_resource(bb1);
        }
        if let Some(color) = surface.color {
            device.destroy_resource(color);
        }
        if let Some(depth) = surface.depth {
            device.destroy_resource(depth);
        }
        device.destroy_swap_chain(surface.swap_chain);

        descriptors.free(surface.rtv);
        if let Some(dsv) = surface.dsv {
            descriptors.free(dsv);
        }
    }

    pub fn dimensions(&self, handle: SurfaceHandle) -> Option<(u32, u32)> {
        self.get(handle).map(Surface::dimensions)
    }

    pub fn is_visible(&self, handle: SurfaceHandle) -> bool {
        self.get(handle)
            .map(|surface| surface.window.is_visible())
            .unwrap_or(false)
    }

    pub fn clear_color<D: Device>(
        &self,
        device: &mut D,
        handle: SurfaceHandle,
        color: [f32; 4],
    ) {
        let Some(surface) = self.get(handle) else {
            return;
        };
        let mut list = CommandList::new("clear color");
        list.commands.push(Command::ClearRenderTarget {
            view: surface.rtv,
            color,
        });
        if let Err(err) = device.submit(list) {
            error!(%err, handle = handle.0, "failed to submit clear");
        }
    }

    pub fn clear_depth<D: Device>(
        &self,
        device: &mut D,
        handle: SurfaceHandle,
        depth: f32,
        stencil: u8,
    ) {
        let Some(surface) = self.get(handle) else {
            return;
        };
        let Some(dsv) = surface.dsv else {
            return;
        };
        let mut list = CommandList::new("clear depth");
        list.commands.push(Command::ClearDepthStencil {
            view: dsv,
            depth,
            stencil,
        });
        if let Err(err) = device.submit(list) {
            error!(%err, handle = handle.0, "failed to submit depth clear");
        }
    }
}

impl Default for SurfaceManager {
    fn default() -> Self {
        Self::new()
    }
}

fn acquire_back_buffers<D: Device>(
    device: &mut D,
    swap_chain: SwapChainId,
) -> Option<[ResourceId; 2]> {
    let mut buffers = [ResourceId(0); 2];
    for (index, buffer) in buffers.iter_mut().enumerate() {
        match device.swap_chain_buffer(swap_chain, index as u32) {
            Ok(id) => *buffer = id,
            Err(err) => {
                error!(%err, index, "failed to acquire swap chain buffer");
                return None;
            }
        }
    }
    Some(buffers)
}

fn make_color_target<D: Device>(device: &mut D, width: u32, height: u32) -> Option<ResourceId> {
    match device.create_resource(
        &ResourceDesc::texture2d(u64::from(width), height, COLOR_TARGET_FORMAT),
        HeapKind::Default,
        ResourceState::RenderTarget,
    ) {
        Ok(color) => Some(color),
        Err(err) => {
            error!(%err, width, height, "failed to create surface color target");
            None
        }
    }
}

fn make_depth_target<D: Device>(device: &mut D, width: u32, height: u32) -> Option<ResourceId> {
    match device.create_resource(
        &ResourceDesc::texture2d(u64::from(width), height, DEPTH_TARGET_FORMAT),
        HeapKind::Default,
        ResourceState::DepthWrite,
    ) {
        Ok(depth) => Some(depth),
        Err(err) => {
            error!(%err, width, height, "failed to create surface depth target");
            None
        }
    }
}
