use std::sync::Arc;

use thiserror::Error;

use crate::cmd::CommandList;
use crate::descriptors::DescriptorSlot;

/// Lightweight handle to a committed GPU resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u32);

/// Lightweight handle to a compiled pipeline state object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineId(pub u32);

/// Lightweight handle to a swap chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SwapChainId(pub u32);

/// Which heap a committed resource is placed in.
///
/// `Upload` resources are CPU-writable (constant buffers, staging);
/// `Default` resources are GPU-local (textures, render targets).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeapKind {
    Upload,
    Default,
}

/// Pixel formats the overlay cares about. Anything else the debugger
/// encounters maps to `Unknown` and is rejected before drawing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    #[default]
    Unknown,
    R8Unorm,
    A8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba8Uint,
    Rgba8Sint,
    Rgba16Float,
    Rgba32Float,
    R32Uint,
    R32Sint,
    D24UnormS8Uint,
}

impl PixelFormat {
    pub fn is_uint(self) -> bool {
        matches!(self, PixelFormat::Rgba8Uint | PixelFormat::R32Uint)
    }

    pub fn is_sint(self) -> bool {
        matches!(self, PixelFormat::Rgba8Sint | PixelFormat::R32Sint)
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, PixelFormat::Rgba8UnormSrgb)
    }

    pub fn is_depth(self) -> bool {
        matches!(self, PixelFormat::D24UnormS8Uint)
    }
}

/// Per-subresource resource state, mirroring explicit transition barriers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// CPU-readable upload heap contents; never transitioned.
    GenericRead,
    RenderTarget,
    DepthWrite,
    Present,
    CopySource,
    CopyDest,
    PixelShaderResource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureDimension {
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

/// Description of a committed resource.
///
/// Buffers use `width` as their byte size with `height == 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourceDesc {
    pub dimension: TextureDimension,
    pub width: u64,
    pub height: u32,
    pub depth_or_array_size: u16,
    pub mip_levels: u16,
    pub sample_count: u32,
    pub format: PixelFormat,
}

impl ResourceDesc {
    pub fn buffer(size: u64) -> Self {
        Self {
            dimension: TextureDimension::Buffer,
            width: size,
            height: 1,
            depth_or_array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            format: PixelFormat::Unknown,
        }
    }

    pub fn texture2d(width: u64, height: u32, format: PixelFormat) -> Self {
        Self {
            dimension: TextureDimension::Texture2D,
            width,
            height,
            depth_or_array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            format,
        }
    }

    /// Number of separately-stated subresources.
    ///
    /// 3D textures have one subresource per mip; array textures have one per
    /// mip per slice.
    pub fn subresource_count(&self) -> u32 {
        match self.dimension {
            TextureDimension::Buffer => 1,
            TextureDimension::Texture3D => u32::from(self.mip_levels),
            _ => u32::from(self.mip_levels) * u32::from(self.depth_or_array_size),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerFilter {
    Point,
    Linear,
}

/// Fixed clamp-addressed sampler description.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerDesc {
    pub filter: SamplerFilter,
}

/// Which of the two fixed root signatures a pipeline binds against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootSignatureKind {
    /// Generic VS/PS constant buffers + SRV table + sampler table.
    Display,
    /// Font constants, glyph data, character buffer + font SRV + samplers.
    Text,
}

/// Graphics pipeline description. Blend/raster state beyond the blend
/// toggle is fixed (no culling, triangle strips, single sample).
#[derive(Clone, Debug)]
pub struct PipelineDesc {
    pub label: Option<String>,
    pub root_signature: RootSignatureKind,
    pub vertex_shader: Arc<[u8]>,
    pub pixel_shader: Arc<[u8]>,
    pub blend_enabled: bool,
    pub render_target_format: PixelFormat,
}

#[derive(Clone, Debug)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub buffer_count: u32,
    pub format: PixelFormat,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("out of memory creating {what}")]
    OutOfMemory { what: &'static str },
    #[error("unknown resource {0:?}")]
    UnknownResource(ResourceId),
    #[error("unknown swap chain {0:?}")]
    UnknownSwapChain(SwapChainId),
    #[error("swap chain creation failed: {0}")]
    SwapChainCreation(String),
    #[error("swap chain buffer index {index} out of range (count {count})")]
    SwapChainBufferOutOfRange { index: u32, count: u32 },
    #[error("write of {len} bytes at offset {offset} exceeds buffer size {size}")]
    WriteOutOfBounds { offset: u64, len: u64, size: u64 },
    #[error("pipeline creation failed: {0}")]
    PipelineCreation(String),
    #[error("command submission failed: {0}")]
    Submission(String),
}

/// The host graphics device, treated as an opaque collaborator.
///
/// The device accepts recorded command lists and executes them
/// asynchronously per queue; `wait_idle` blocks the calling thread until
/// all submitted work has completed. The overlay submits and immediately
/// waits after every logical action (documented scheduling policy — see
/// the crate docs of `optic-overlay`), so no fence tracking is modeled.
pub trait Device {
    fn create_resource(
        &mut self,
        desc: &ResourceDesc,
        heap: HeapKind,
        initial_state: ResourceState,
    ) -> Result<ResourceId, DeviceError>;

    fn destroy_resource(&mut self, resource: ResourceId);

    fn resource_desc(&self, resource: ResourceId) -> Option<ResourceDesc>;

    /// Current per-subresource states, in subresource-index order.
    /// Unknown resources yield an empty vector.
    fn subresource_states(&self, resource: ResourceId) -> Vec<ResourceState>;

    /// Map + copy into an upload-heap buffer.
    fn write_buffer(
        &mut self,
        resource: ResourceId,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), DeviceError>;

    fn create_render_target_view(&mut self, resource: ResourceId, slot: DescriptorSlot);
    fn create_depth_stencil_view(&mut self, resource: ResourceId, slot: DescriptorSlot);
    fn create_shader_resource_view(&mut self, resource: ResourceId, slot: DescriptorSlot);
    fn create_sampler(&mut self, desc: &SamplerDesc, slot: DescriptorSlot);

    fn create_swap_chain(&mut self, desc: &SwapChainDesc) -> Result<SwapChainId, DeviceError>;

    /// Resize preserving buffer count and format. The caller must have
    /// released its references to the old back buffers first.
    fn resize_swap_chain(
        &mut self,
        swap_chain: SwapChainId,
        width: u32,
        height: u32,
    ) -> Result<(), DeviceError>;

    fn swap_chain_buffer(
        &mut self,
        swap_chain: SwapChainId,
        index: u32,
    ) -> Result<ResourceId, DeviceError>;

    fn destroy_swap_chain(&mut self, swap_chain: SwapChainId);

    fn present(&mut self, swap_chain: SwapChainId) -> Result<(), DeviceError>;

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineId, DeviceError>;

    /// Submit a recorded command list for ordered execution.
    fn submit(&mut self, list: CommandList) -> Result<(), DeviceError>;

    /// Block until all submitted work has completed.
    fn wait_idle(&mut self);
}
