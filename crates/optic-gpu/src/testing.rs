//! Deterministic simulated collaborators.
//!
//! [`SimDevice`] tracks resource descriptors and per-subresource states,
//! applies recorded barrier transitions, and counts draws, presents and
//! full flushes, so lifecycle and barrier invariants can be asserted
//! without a GPU. [`SimWindow`] is a cloneable window handle whose client
//! size and visibility can be changed from the test while a surface owns
//! another handle to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::cmd::{Command, CommandList};
use crate::descriptors::DescriptorSlot;
use crate::device::{
    Device, DeviceError, HeapKind, PipelineDesc, PipelineId, PixelFormat, ResourceDesc, ResourceId,
    ResourceState, SamplerDesc, SwapChainDesc, SwapChainId,
};
use crate::window::NativeWindow;

#[derive(Debug)]
pub struct SimResource {
    pub desc: ResourceDesc,
    pub heap: HeapKind,
    pub states: Vec<ResourceState>,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct SimSwapChain {
    pub desc: SwapChainDesc,
    pub buffers: Vec<ResourceId>,
    pub presents: u64,
    pub resizes: u64,
}

#[derive(Debug, Default)]
pub struct SimDevice {
    resources: HashMap<u32, SimResource>,
    swap_chains: HashMap<u32, SimSwapChain>,
    pipelines: Vec<PipelineDesc>,
    views: HashMap<DescriptorSlot, ResourceId>,
    next_resource: u32,
    next_swap_chain: u32,

    pub submitted: Vec<CommandList>,
    pub draws: u64,
    pub clears: u64,
    pub waits: u64,
    pub presents: u64,
    /// Transitions whose `before` state did not match the tracked state.
    pub barrier_mismatches: u64,

    pub fail_next_swap_chain: bool,
    pub fail_next_resource: bool,
}

impl SimDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(&self, id: ResourceId) -> Option<&SimResource> {
        self.resources.get(&id.0)
    }

    pub fn swap_chain(&self, id: SwapChainId) -> Option<&SimSwapChain> {
        self.swap_chains.get(&id.0)
    }

    pub fn is_alive(&self, id: ResourceId) -> bool {
        self.resources.contains_key(&id.0)
    }

    pub fn live_resources(&self) -> usize {
        self.resources.len()
    }

    pub fn pipeline(&self, id: PipelineId) -> Option<&PipelineDesc> {
        self.pipelines.get(id.0 as usize)
    }

    /// The resource bound at a view slot, if any.
    pub fn view_target(&self, slot: DescriptorSlot) -> Option<ResourceId> {
        self.views.get(&slot).copied()
    }

    /// Force a tracked subresource into an arbitrary state.
    pub fn set_subresource_state(&mut self, id: ResourceId, subresource: u32, state: ResourceState) {
        if let Some(res) = self.resources.get_mut(&id.0) {
            res.states[subresource as usize] = state;
        }
    }

    fn alloc_resource(&mut self, res: SimResource) -> ResourceId {
        let id = self.next_resource;
        self.next_resource += 1;
        self.resources.insert(id, res);
        ResourceId(id)
    }

    fn make_back_buffer(&mut self, desc: &SwapChainDesc) -> ResourceId {
        self.alloc_resource(SimResource {
            desc: ResourceDesc::texture2d(u64::from(desc.width), desc.height, desc.format),
            heap: HeapKind::Default,
            // Swap-chain buffers start out presentable.
            states: vec![ResourceState::Present],
            bytes: Vec::new(),
        })
    }

    fn apply(&mut self, command: &Command) -> Result<(), DeviceError> {
        match command {
            Command::Transition(barriers) => {
                for barrier in barriers {
                    let Some(res) = self.resources.get_mut(&barrier.resource.0) else {
                        return Err(DeviceError::UnknownResource(barrier.resource));
                    };
                    let Some(state) = res.states.get_mut(barrier.subresource as usize) else {
                        return Err(DeviceError::Submission(format!(
                            "subresource {} out of range for {:?}",
                            barrier.subresource, barrier.resource
                        )));
                    };
                    if *state != barrier.before {
                        self.barrier_mismatches += 1;
                    }
                    *state = barrier.after;
                }
            }
            Command::CopyResource { dst, src } | Command::CopyBufferToTexture { dst, src, .. } => {
                if !self.resources.contains_key(&src.0) {
                    return Err(DeviceError::UnknownResource(*src));
                }
                if !self.resources.contains_key(&dst.0) {
                    return Err(DeviceError::UnknownResource(*dst));
                }
            }
            Command::ClearRenderTarget { .. } | Command::ClearDepthStencil { .. } => {
                self.clears += 1;
            }
            Command::Draw { .. } => {
                self.draws += 1;
            }
            Command::SetRenderTarget { .. }
            | Command::SetViewport { .. }
            | Command::SetScissor { .. }
            | Command::SetPipeline(_)
            | Command::SetConstantBuffer { .. } => {}
        }
        Ok(())
    }
}

impl Device for SimDevice {
    fn create_resource(
        &mut self,
        desc: &ResourceDesc,
        heap: HeapKind,
        initial_state: ResourceState,
    ) -> Result<ResourceId, DeviceError> {
        if self.fail_next_resource {
            self.fail_next_resource = false;
            return Err(DeviceError::OutOfMemory {
                what: "committed resource",
            });
        }
        let bytes = match heap {
            HeapKind::Upload => vec![0u8; desc.width as usize],
            HeapKind::Default => Vec::new(),
        };
        Ok(self.alloc_resource(SimResource {
            desc: *desc,
            heap,
            states: vec![initial_state; desc.subresource_count() as usize],
            bytes,
        }))
    }

    fn destroy_resource(&mut self, resource: ResourceId) {
        self.resources.remove(&resource.0);
    }

    fn resource_desc(&self, resource: ResourceId) -> Option<ResourceDesc> {
        self.resources.get(&resource.0).map(|r| r.desc)
    }

    fn subresource_states(&self, resource: ResourceId) -> Vec<ResourceState> {
        self.resources
            .get(&resource.0)
            .map(|r| r.states.clone())
            .unwrap_or_default()
    }

    fn write_buffer(
        &mut self,
        resource: ResourceId,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), DeviceError> {
        let res = self
            .resources
            .get_mut(&resource.0)
            .ok_or(DeviceError::UnknownResource(resource))?;
        let end = offset as usize + bytes.len();
        if end > res.bytes.len() {
            return Err(DeviceError::WriteOutOfBounds {
                offset,
                len: bytes.len() as u64,
                size: res.bytes.len() as u64,
            });
        }
        res.bytes[offset as usize..end].copy_from_slice(bytes);
        Ok(())
    }

    fn create_render_target_view(&mut self, resource: ResourceId, slot: DescriptorSlot) {
        self.views.insert(slot, resource);
    }

    fn create_depth_stencil_view(&mut self, resource: ResourceId, slot: DescriptorSlot) {
        self.views.insert(slot, resource);
    }

    fn create_shader_resource_view(&mut self, resource: ResourceId, slot: DescriptorSlot) {
        self.views.insert(slot, resource);
    }

    fn create_sampler(&mut self, _desc: &SamplerDesc, _slot: DescriptorSlot) {}

    fn create_swap_chain(&mut self, desc: &SwapChainDesc) -> Result<SwapChainId, DeviceError> {
        if self.fail_next_swap_chain {
            self.fail_next_swap_chain = false;
            return Err(DeviceError::SwapChainCreation("injected failure".into()));
        }
        let buffers = (0..desc.buffer_count)
            .map(|_| self.make_back_buffer(desc))
            .collect();
        let id = self.next_swap_chain;
        self.next_swap_chain += 1;
        self.swap_chains.insert(
            id,
            SimSwapChain {
                desc: desc.clone(),
                buffers,
                presents: 0,
                resizes: 0,
            },
        );
        Ok(SwapChainId(id))
    }

    fn resize_swap_chain(
        &mut self,
        swap_chain: SwapChainId,
        width: u32,
        height: u32,
    ) -> Result<(), DeviceError> {
        let old_buffers;
        let desc;
        {
            let swap = self
                .swap_chains
                .get_mut(&swap_chain.0)
                .ok_or(DeviceError::UnknownSwapChain(swap_chain))?;
            swap.desc.width = width;
            swap.desc.height = height;
            swap.resizes += 1;
            old_buffers = std::mem::take(&mut swap.buffers);
            desc = swap.desc.clone();
        }
        for buffer in old_buffers {
            self.resources.remove(&buffer.0);
        }
        let buffers: Vec<ResourceId> = (0..desc.buffer_count)
            .map(|_| self.make_back_buffer(&desc))
            .collect();
        self.swap_chains.get_mut(&swap_chain.0).unwrap().buffers = buffers;
        Ok(())
    }

    fn swap_chain_buffer(
        &mut self,
        swap_chain: SwapChainId,
        index: u32,
    ) -> Result<ResourceId, DeviceError> {
        let swap = self
            .swap_chains
            .get(&swap_chain.0)
            .ok_or(DeviceError::UnknownSwapChain(swap_chain))?;
        swap.buffers
            .get(index as usize)
            .copied()
            .ok_or(DeviceError::SwapChainBufferOutOfRange {
                index,
                count: swap.desc.buffer_count,
            })
    }

    fn destroy_swap_chain(&mut self, swap_chain: SwapChainId) {
        if let Some(swap) = self.swap_chains.remove(&swap_chain.0) {
            for buffer in swap.buffers {
                self.resources.remove(&buffer.0);
            }
        }
    }

    fn present(&mut self, swap_chain: SwapChainId) -> Result<(), DeviceError> {
        let swap = self
            .swap_chains
            .get_mut(&swap_chain.0)
            .ok_or(DeviceError::UnknownSwapChain(swap_chain))?;
        swap.presents += 1;
        self.presents += 1;
        Ok(())
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineId, DeviceError> {
        if desc.vertex_shader.is_empty() || desc.pixel_shader.is_empty() {
            return Err(DeviceError::PipelineCreation("empty shader bytecode".into()));
        }
        self.pipelines.push(desc.clone());
        Ok(PipelineId(self.pipelines.len() as u32 - 1))
    }

    fn submit(&mut self, list: CommandList) -> Result<(), DeviceError> {
        for command in &list.commands {
            self.apply(command)?;
        }
        self.submitted.push(list);
        Ok(())
    }

    fn wait_idle(&mut self) {
        self.waits += 1;
    }
}

#[derive(Debug, Default)]
struct SimWindowState {
    width: AtomicU32,
    height: AtomicU32,
    visible: AtomicBool,
}

/// Cloneable simulated native window.
#[derive(Clone, Debug)]
pub struct SimWindow(Arc<SimWindowState>);

impl SimWindow {
    pub fn new(width: u32, height: u32) -> Self {
        let state = SimWindowState {
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
            visible: AtomicBool::new(true),
        };
        Self(Arc::new(state))
    }

    pub fn set_client_size(&self, width: u32, height: u32) {
        self.0.width.store(width, Ordering::Relaxed);
        self.0.height.store(height, Ordering::Relaxed);
    }

    pub fn set_visible(&self, visible: bool) {
        self.0.visible.store(visible, Ordering::Relaxed);
    }
}

impl NativeWindow for SimWindow {
    fn client_size(&self) -> (u32, u32) {
        (
            self.0.width.load(Ordering::Relaxed),
            self.0.height.load(Ordering::Relaxed),
        )
    }

    fn is_visible(&self) -> bool {
        self.0.visible.load(Ordering::Relaxed)
    }
}

/// Shorthand used throughout the overlay: a 2D render-target texture.
pub fn render_target_desc(width: u32, height: u32) -> ResourceDesc {
    ResourceDesc::texture2d(u64::from(width), height, PixelFormat::Rgba8UnormSrgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::Barrier;

    #[test]
    fn barriers_update_tracked_state() {
        let mut dev = SimDevice::new();
        let tex = dev
            .create_resource(
                &ResourceDesc::texture2d(64, 64, PixelFormat::Rgba8Unorm),
                HeapKind::Default,
                ResourceState::RenderTarget,
            )
            .unwrap();

        let mut list = CommandList::new("test");
        list.transition(vec![Barrier {
            resource: tex,
            subresource: 0,
            before: ResourceState::RenderTarget,
            after: ResourceState::CopySource,
        }]);
        dev.submit(list).unwrap();

        assert_eq!(dev.subresource_states(tex), vec![ResourceState::CopySource]);
        assert_eq!(dev.barrier_mismatches, 0);
    }

    #[test]
    fn mismatched_before_state_is_counted() {
        let mut dev = SimDevice::new();
        let tex = dev
            .create_resource(
                &ResourceDesc::texture2d(4, 4, PixelFormat::Rgba8Unorm),
                HeapKind::Default,
                ResourceState::CopyDest,
            )
            .unwrap();

        let mut list = CommandList::new("test");
        list.transition(vec![Barrier {
            resource: tex,
            subresource: 0,
            before: ResourceState::RenderTarget,
            after: ResourceState::PixelShaderResource,
        }]);
        dev.submit(list).unwrap();
        assert_eq!(dev.barrier_mismatches, 1);
    }

    #[test]
    fn swap_chain_resize_recreates_buffers() {
        let mut dev = SimDevice::new();
        let swap = dev
            .create_swap_chain(&SwapChainDesc {
                width: 100,
                height: 50,
                buffer_count: 2,
                format: PixelFormat::Rgba8Unorm,
            })
            .unwrap();

        let old = dev.swap_chain_buffer(swap, 0).unwrap();
        dev.resize_swap_chain(swap, 200, 100).unwrap();
        let new = dev.swap_chain_buffer(swap, 0).unwrap();

        assert_ne!(old, new);
        assert!(!dev.is_alive(old));
        assert_eq!(dev.resource_desc(new).unwrap().width, 200);
    }

    #[test]
    fn upload_buffer_writes_are_bounds_checked() {
        let mut dev = SimDevice::new();
        let buf = dev
            .create_resource(
                &ResourceDesc::buffer(16),
                HeapKind::Upload,
                ResourceState::GenericRead,
            )
            .unwrap();

        dev.write_buffer(buf, 8, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert!(dev.write_buffer(buf, 12, &[0; 8]).is_err());
        assert_eq!(&dev.resource(buf).unwrap().bytes[8..12], &[1, 2, 3, 4]);
    }
}
