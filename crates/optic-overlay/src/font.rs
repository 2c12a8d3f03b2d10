//! Baked font atlas input and the GPU-side font resources.
//!
//! Baking itself (TrueType rasterization) is one-time preprocessing done
//! by the embedder; the overlay only consumes the finished bitmap and
//! per-glyph metrics.

use optic_gpu::{CharRing, ConstantRing, ResourceId};

/// Dimensions the glyph bitmap must have.
pub const FONT_TEX_WIDTH: u32 = 256;
pub const FONT_TEX_HEIGHT: u32 = 128;

/// First character with a glyph; the space itself renders as index 0.
pub const FONT_FIRST_CHAR: u8 = b' ';
const FONT_LAST_CHAR: u8 = 127;

/// Capacity of the streaming character buffer, in glyph slots.
pub const FONT_BUFFER_CHARS: u32 = 4096;
/// Longest single line of text accepted by one draw.
pub const FONT_MAX_CHARS: usize = 256;
/// Each glyph slot is one 16-byte element; offsets must land on 256-byte
/// boundaries, i.e. every 16 elements.
pub const CHAR_RING_ALIGNMENT: u32 = 16;
/// Glyph slot stride in bytes (one vec4 per character).
pub const CHAR_SLOT_BYTES: u64 = 16;

/// Per-draw font constant buffers cycled round-robin.
pub const FONT_CONSTANT_SLOTS: usize = 16;

/// Metrics for one baked glyph, as two vec4s the text shader consumes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphMetrics {
    /// x/y offset within the cell and x/y advance-relative scale.
    pub placement: [f32; 4],
    /// Pixel rectangle in the atlas: x0, y0, x1, y1.
    pub uv_rect: [f32; 4],
}

/// A finished font atlas handed in by the embedder.
#[derive(Clone, Debug)]
pub struct FontAtlas {
    pub width: u32,
    pub height: u32,
    /// Single-channel bitmap, `width * height` bytes.
    pub bitmap: Vec<u8>,
    /// Baked pixel height of a character cell.
    pub char_size: f32,
    /// Advance width divided by `char_size`.
    pub char_aspect: f32,
    /// One entry per printable character starting at `FONT_FIRST_CHAR + 1`.
    pub glyphs: Vec<GlyphMetrics>,
}

impl FontAtlas {
    pub const GLYPH_COUNT: usize = (FONT_LAST_CHAR - FONT_FIRST_CHAR - 1) as usize;

    /// Pack glyph metrics the way the text shader reads them: two vec4s
    /// per glyph with one leading empty pair (index 0 is the space).
    pub fn packed_glyph_data(&self) -> Vec<[f32; 4]> {
        let mut data = vec![[0.0f32; 4]; 2 * (Self::GLYPH_COUNT + 1)];
        for (i, glyph) in self.glyphs.iter().enumerate().take(Self::GLYPH_COUNT) {
            data[(i + 1) * 2] = glyph.placement;
            data[(i + 1) * 2 + 1] = glyph.uv_rect;
        }
        data
    }
}

/// GPU resources backing text rendering, owned by the overlay.
#[derive(Debug)]
pub struct FontResources {
    pub atlas_texture: ResourceId,
    /// Static constant buffer of packed glyph metrics.
    pub glyph_data: ResourceId,
    /// Round-robin per-draw constant buffers.
    pub constants: [ResourceId; FONT_CONSTANT_SLOTS],
    pub constant_ring: ConstantRing,
    /// Streaming glyph-index buffer.
    pub char_buffer: ResourceId,
    pub char_ring: CharRing,
    pub char_size: f32,
    pub char_aspect: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixed_cell_atlas;

    #[test]
    fn packed_glyph_data_leaves_space_slot_empty() {
        let atlas = fixed_cell_atlas();
        let packed = atlas.packed_glyph_data();
        assert_eq!(packed.len(), 2 * (FontAtlas::GLYPH_COUNT + 1));
        assert_eq!(packed[0], [0.0; 4]);
        assert_eq!(packed[1], [0.0; 4]);
        assert_eq!(packed[2], [0.0, 0.0, 1.0, 1.0]);
    }
}
