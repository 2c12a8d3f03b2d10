//! Cursor allocators for streamed per-draw data.
//!
//! The glyph character buffer is a fixed-capacity GPU buffer that text
//! draws sub-allocate from; the write cursor wraps to zero rather than
//! failing. Overwriting an abandoned region near the end is safe only
//! because the renderer fully flushes the device after every draw.

use tracing::error;

/// Round `value` up to the nearest multiple of `alignment`.
///
/// `alignment` must be > 0.
pub fn align_up(value: u32, alignment: u32) -> u32 {
    debug_assert!(alignment > 0);

    let add = alignment - 1;
    match value.checked_add(add) {
        Some(v) => v / alignment * alignment,
        None => u32::MAX / alignment * alignment,
    }
}

/// Cyclic offset allocator over a fixed capacity, measured in buffer
/// elements (character slots).
///
/// After each reservation the cursor is rounded up to `alignment`
/// elements so every returned offset satisfies the minimum addressable
/// offset granularity of the underlying buffer.
#[derive(Clone, Debug)]
pub struct CharRing {
    capacity: u32,
    alignment: u32,
    cursor: u32,
}

impl CharRing {
    pub fn new(capacity: u32, alignment: u32) -> Self {
        debug_assert!(alignment > 0 && capacity >= alignment);
        Self {
            capacity,
            alignment,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Reserve `count` elements, wrapping to the start of the buffer if
    /// the reservation would run past the end. Returns the element offset
    /// of the reserved region, or `None` if `count` can never fit.
    pub fn reserve(&mut self, count: u32) -> Option<u32> {
        if count > self.capacity {
            error!(count, capacity = self.capacity, "reservation exceeds ring capacity");
            return None;
        }

        let mut offset = self.cursor;
        if offset + count > self.capacity {
            offset = 0;
        }

        self.cursor = align_up(offset + count, self.alignment);
        Some(offset)
    }
}

/// Round-robin index over a small fixed set of per-draw constant
/// buffers, decoupling consecutive draws' transform data even within the
/// same flush.
#[derive(Clone, Debug)]
pub struct ConstantRing {
    len: usize,
    index: usize,
}

impl ConstantRing {
    pub fn new(len: usize) -> Self {
        debug_assert!(len > 0);
        Self { len, index: 0 }
    }

    /// The index to use for the current draw; advances for the next one.
    pub fn advance(&mut self) -> usize {
        let index = self.index;
        self.index = (self.index + 1) % self.len;
        index
    }
}
