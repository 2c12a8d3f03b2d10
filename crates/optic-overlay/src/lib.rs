//! Debug overlay runtime for a graphics-API debugger.
//!
//! The overlay draws its UI (checkerboard backdrops, text, and inspected
//! textures) into per-window output surfaces it owns, on top of an
//! opaque host [`optic_gpu::Device`]. Shader bytecode is cached to disk
//! across sessions.
//!
//! Scheduling is deliberately naive: every logical action records one
//! command list, submits it, and waits for the device to go idle before
//! returning. Overlay rendering is a handful of draws per frame, so
//! simplicity wins over pipelining; the flush discipline is also what
//! makes overwriting old glyph-ring regions and reusing the per-draw
//! constant slots safe.

pub mod error;
pub mod font;
pub mod hlsl;
pub mod overlay;
pub mod renderer;
pub mod shader_cache;
pub mod surface;
pub mod testing;

pub use error::OverlayError;
pub use font::{FontAtlas, FontResources, GlyphMetrics, FONT_MAX_CHARS};
pub use overlay::DebugOverlay;
pub use renderer::{DisplayOverlay, TextureDisplay};
pub use shader_cache::{
    shader_hash, CompileFlags, CompileOutput, ShaderCache, ShaderCacheError, ShaderCacheStats,
    ShaderCompiler,
};
pub use surface::{SurfaceHandle, SurfaceManager};
