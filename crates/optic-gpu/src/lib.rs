//! `optic-gpu` contains the device-facing plumbing for the Optic debug
//! overlay.
//!
//! Currently this crate provides:
//! - Opaque collaborator traits for the host graphics device and the
//!   window system (see [`Device`] and [`NativeWindow`]).
//! - A backend-agnostic recorded command stream (see [`cmd`]).
//! - Fixed-capacity descriptor-slot allocation (see [`DescriptorAllocator`]).
//! - Cursor allocators for streamed per-draw data (see [`CharRing`]).
//! - A deterministic simulated device/window for tests (see [`testing`]).

pub mod cmd;
mod descriptors;
mod device;
mod ring;
pub mod testing;
mod window;

pub use descriptors::{
    DescriptorAllocator, DescriptorHeapKind, DescriptorSlot, FONT_SRV_SLOT, LINEAR_SAMPLER_SLOT,
    POINT_SAMPLER_SLOT, RESERVED_SRV_SLOTS, TEX_DISPLAY_SRV_SLOT,
};
pub use device::{
    Device, DeviceError, HeapKind, PipelineDesc, PipelineId, PixelFormat, ResourceDesc, ResourceId,
    ResourceState, RootSignatureKind, SamplerDesc, SamplerFilter, SwapChainDesc, SwapChainId,
    TextureDimension,
};
pub use ring::{align_up, CharRing, ConstantRing};
pub use window::NativeWindow;
