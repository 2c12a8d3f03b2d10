use tracing::{error, warn};

/// Which of the four fixed descriptor heaps a slot belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    RenderTarget,
    DepthStencil,
    /// Shader-visible CBV/SRV heap.
    Resource,
    Sampler,
}

/// An index into one of the fixed-size descriptor heaps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorSlot {
    pub heap: DescriptorHeapKind,
    pub index: u32,
}

pub const RTV_HEAP_CAPACITY: u32 = 1024;
pub const DSV_HEAP_CAPACITY: u32 = 16;
pub const SRV_HEAP_CAPACITY: u32 = 4096;
pub const SAMPLER_HEAP_CAPACITY: u32 = 16;

/// SRV slot the texture-display pipeline samples from.
pub const TEX_DISPLAY_SRV_SLOT: u32 = 2;
/// SRV slot holding the font glyph atlas.
pub const FONT_SRV_SLOT: u32 = 30;
/// Slots below this index are pre-reserved for the fixed overlay
/// pipelines; only slots at or beyond it are dynamically allocated.
pub const RESERVED_SRV_SLOTS: u32 = 32;

pub const POINT_SAMPLER_SLOT: u32 = 0;
pub const LINEAR_SAMPLER_SLOT: u32 = 1;

/// Monotonic slot allocator over the fixed descriptor heaps.
///
/// RTV and DSV slots share one counter (one of each is consumed per
/// surface created, matching how surfaces pair a color and depth view).
/// There is no free list; [`DescriptorAllocator::free`] is a permanent
/// no-op that only logs. Exhausting a heap returns `None` rather than
/// handing out an out-of-range index.
#[derive(Debug)]
pub struct DescriptorAllocator {
    next_target_slot: u32,
    next_dynamic_srv: u32,
}

impl DescriptorAllocator {
    pub fn new() -> Self {
        Self {
            // Slot 0 in both target heaps is left for scratch use during
            // initialization.
            next_target_slot: 1,
            next_dynamic_srv: RESERVED_SRV_SLOTS,
        }
    }

    pub fn allocate_rtv(&mut self) -> Option<DescriptorSlot> {
        self.allocate_target(DescriptorHeapKind::RenderTarget, RTV_HEAP_CAPACITY)
    }

    pub fn allocate_dsv(&mut self) -> Option<DescriptorSlot> {
        self.allocate_target(DescriptorHeapKind::DepthStencil, DSV_HEAP_CAPACITY)
    }

    fn allocate_target(&mut self, heap: DescriptorHeapKind, capacity: u32) -> Option<DescriptorSlot> {
        if self.next_target_slot >= capacity {
            error!(?heap, capacity, "descriptor heap exhausted");
            return None;
        }
        let index = self.next_target_slot;
        self.next_target_slot += 1;
        Some(DescriptorSlot { heap, index })
    }

    /// A pre-reserved SRV slot used by the fixed overlay pipelines.
    pub fn reserved_srv(&self, index: u32) -> DescriptorSlot {
        debug_assert!(index < RESERVED_SRV_SLOTS);
        DescriptorSlot {
            heap: DescriptorHeapKind::Resource,
            index,
        }
    }

    /// Allocate an SRV slot beyond the reserved region.
    pub fn allocate_srv(&mut self) -> Option<DescriptorSlot> {
        if self.next_dynamic_srv >= SRV_HEAP_CAPACITY {
            error!(capacity = SRV_HEAP_CAPACITY, "SRV descriptor heap exhausted");
            return None;
        }
        let index = self.next_dynamic_srv;
        self.next_dynamic_srv += 1;
        Some(DescriptorSlot {
            heap: DescriptorHeapKind::Resource,
            index,
        })
    }

    pub fn sampler(&self, index: u32) -> DescriptorSlot {
        debug_assert!(index < SAMPLER_HEAP_CAPACITY);
        DescriptorSlot {
            heap: DescriptorHeapKind::Sampler,
            index,
        }
    }

    /// Slot recycling is unsupported; surfaces leak their slots.
    pub fn free(&mut self, slot: DescriptorSlot) {
        warn!(?slot, "descriptor slot freeing not implemented; slot leaked");
    }
}

impl Default for DescriptorAllocator {
    fn default() -> Self {
        Self::new()
    }
}
