//! Simulated shader compiler, plus helpers shared by the crate's tests.

use std::collections::HashSet;

use crate::font::{FontAtlas, GlyphMetrics};
use crate::shader_cache::{shader_hash, CompileFlags, CompileOutput, ShaderCompiler};

/// Deterministic stand-in for the external compiler toolchain.
///
/// Produces stable fake bytecode derived from the compile inputs and
/// counts invocations so cache behaviour can be asserted.
#[derive(Debug, Default)]
pub struct SimCompiler {
    pub compile_calls: u32,
    pub fail_entry_points: HashSet<String>,
    pub warn_entry_points: HashSet<String>,
    pub last_flags: Option<CompileFlags>,
}

impl ShaderCompiler for SimCompiler {
    fn compile(
        &mut self,
        source: &str,
        entry_point: &str,
        profile: &str,
        flags: CompileFlags,
    ) -> CompileOutput {
        self.compile_calls += 1;
        self.last_flags = Some(flags);

        if self.fail_entry_points.contains(entry_point) {
            return CompileOutput {
                bytecode: None,
                diagnostics: format!("error X3501: entrypoint '{entry_point}' not found"),
            };
        }

        let diagnostics = if self.warn_entry_points.contains(entry_point) {
            format!("warning X4000: '{entry_point}': something benign")
        } else {
            String::new()
        };

        let hash = shader_hash(source, entry_point, profile, flags);
        let bytecode = format!("SIMBC|{entry_point}|{profile}|{hash:08x}").into_bytes();
        CompileOutput {
            bytecode: Some(bytecode),
            diagnostics,
        }
    }
}

/// A synthetic monospace atlas: every printable glyph maps to the same
/// fixed cell. Good enough for exercising the text path.
pub fn fixed_cell_atlas() -> FontAtlas {
    let width = 256u32;
    let height = 128u32;
    let glyphs = (0..FontAtlas::GLYPH_COUNT)
        .map(|_| GlyphMetrics {
            placement: [0.0, 0.0, 1.0, 1.0],
            uv_rect: [0.0, 0.0, 8.0, 16.0],
        })
        .collect();
    FontAtlas {
        width,
        height,
        bitmap: vec![0u8; (width * height) as usize],
        char_size: 16.0,
        char_aspect: 0.5,
        glyphs,
    }
}
