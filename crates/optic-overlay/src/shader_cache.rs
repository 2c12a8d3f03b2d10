//! Content-addressed shader cache with a persistent backing file.
//!
//! Overlay shaders are tiny but the external compiler is not free;
//! persisting compiled bytecode lets subsequent debugger sessions skip
//! compilation entirely. Entries are keyed by a 32-bit hash over the
//! full compile inputs. Hash collisions are not detected; a colliding
//! pair of compiles would share one cache entry. Bumping
//! [`CACHE_VERSION`] invalidates persisted entries when the key
//! derivation changes.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitflags::bitflags;
use thiserror::Error;
use tracing::{debug, warn};
use xxhash_rust::xxh32::xxh32;

/// Expected magic number at the start of a cache file.
pub const CACHE_MAGIC: u32 = 0x4F50_5443; // "OPTC"
/// Bump when the record layout or hash derivation changes.
pub const CACHE_VERSION: u32 = 1;

/// Longest diagnostic text forwarded to the log.
const MAX_LOGGED_DIAGNOSTICS: usize = 1024;

bitflags! {
    /// Compile-flag bitmask passed through to the external compiler.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CompileFlags: u32 {
        const WARNINGS_ARE_ERRORS = 1 << 0;
        const DEBUG               = 1 << 1;
        const SKIP_OPTIMIZATION   = 1 << 2;
        /// Not supported by the local toolchain; stripped before
        /// invoking the compiler but still part of the cache key.
        const NO_PRESHADER        = 1 << 3;
    }
}

/// Result of one external compile invocation.
#[derive(Clone, Debug)]
pub struct CompileOutput {
    /// `None` on a fatal compile error.
    pub bytecode: Option<Vec<u8>>,
    /// Warning or error text; empty when the compile was clean.
    pub diagnostics: String,
}

/// The shader compiler toolchain, treated as a pure function.
pub trait ShaderCompiler {
    fn compile(
        &mut self,
        source: &str,
        entry_point: &str,
        profile: &str,
        flags: CompileFlags,
    ) -> CompileOutput;
}

/// Combined hash over all four compile inputs.
///
/// Chained xxh32 with the previous digest as seed, then the flag bits
/// folded in.
pub fn shader_hash(source: &str, entry_point: &str, profile: &str, flags: CompileFlags) -> u32 {
    let mut hash = xxh32(source.as_bytes(), 0);
    hash = xxh32(entry_point.as_bytes(), hash);
    hash = xxh32(profile.as_bytes(), hash);
    hash ^ flags.bits()
}

#[derive(Debug, Error)]
pub enum ShaderCacheError {
    #[error("shader cache io: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShaderCacheStats {
    pub memory_hits: u64,
    pub compile_calls: u64,
    pub compile_failures: u64,
    pub loaded_from_disk: u64,
}

/// In-memory cache for the current session, persisted at shutdown.
///
/// The on-disk format is magic, version, then `(hash, byte length, raw
/// bytes)` records with no checksum. A mismatched magic or version is
/// cold-start behaviour, not an error: the file is ignored and the cache
/// marked dirty so it is rewritten on the next persist.
pub struct ShaderCache {
    path: PathBuf,
    entries: HashMap<u32, Arc<[u8]>>,
    dirty: bool,
    caching_enabled: bool,
    stats: ShaderCacheStats,
}

impl ShaderCache {
    /// Open the cache, loading any persisted entries from `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut stats = ShaderCacheStats::default();

        let entries = match load_cache_file(&path) {
            Ok(entries) => {
                stats.loaded_from_disk = entries.len() as u64;
                debug!(count = entries.len(), path = %path.display(), "loaded shader cache");
                Some(entries)
            }
            Err(err) => {
                debug!(path = %path.display(), %err, "shader cache unavailable, starting cold");
                None
            }
        };

        // A failed load forces a rewrite at shutdown.
        let dirty = entries.is_none();

        Self {
            path,
            entries: entries.unwrap_or_default(),
            dirty,
            caching_enabled: false,
            stats,
        }
    }

    /// While enabled, successful compiles are stored; outside the
    /// initialization phase misses are returned without being cached.
    pub fn set_caching_enabled(&mut self, enabled: bool) {
        self.caching_enabled = enabled;
    }

    pub fn stats(&self) -> ShaderCacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up or compile a shader.
    ///
    /// On a hash hit the cached bytecode is returned with empty
    /// diagnostics and no compiler invocation. On a miss the compiler
    /// runs with locally-unsupported flags stripped; fatal errors return
    /// `None` plus the compiler's diagnostic text and are never cached.
    pub fn get_or_compile<C: ShaderCompiler>(
        &mut self,
        compiler: &mut C,
        source: &str,
        entry_point: &str,
        profile: &str,
        flags: CompileFlags,
    ) -> (Option<Arc<[u8]>>, String) {
        let hash = shader_hash(source, entry_point, profile, flags);

        if let Some(blob) = self.entries.get(&hash) {
            self.stats.memory_hits += 1;
            return (Some(Arc::clone(blob)), String::new());
        }

        self.stats.compile_calls += 1;
        let output = compiler.compile(
            source,
            entry_point,
            profile,
            flags - CompileFlags::NO_PRESHADER,
        );

        if !output.diagnostics.is_empty() {
            let mut logged = output.diagnostics.clone();
            if logged.len() > MAX_LOGGED_DIAGNOSTICS {
                logged.truncate(MAX_LOGGED_DIAGNOSTICS);
                logged.push_str("...");
            }
            warn!(entry_point, "shader compile diagnostics:\n{logged}");
        }

        let Some(bytecode) = output.bytecode else {
            self.stats.compile_failures += 1;
            return (None, output.diagnostics);
        };

        let blob: Arc<[u8]> = bytecode.into();
        if self.caching_enabled {
            self.entries.insert(hash, Arc::clone(&blob));
            self.dirty = true;
        }

        (Some(blob), output.diagnostics)
    }

    /// Write the cache file if anything was compiled this session.
    ///
    /// A clean cache leaves the on-disk file untouched.
    pub fn persist(&mut self) -> Result<(), ShaderCacheError> {
        if !self.dirty {
            return Ok(());
        }
        save_cache_file(&self.path, &self.entries)?;
        debug!(count = self.entries.len(), path = %self.path.display(), "persisted shader cache");
        self.dirty = false;
        Ok(())
    }
}

impl Drop for ShaderCache {
    fn drop(&mut self) {
        if let Err(err) = self.persist() {
            warn!(%err, "failed to persist shader cache");
        }
    }
}

fn load_cache_file(path: &Path) -> io::Result<HashMap<u32, Arc<[u8]>>> {
    let mut file = fs::File::open(path)?;

    let magic = read_u32(&mut file)?;
    let version = read_u32(&mut file)?;
    if magic != CACHE_MAGIC || version != CACHE_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("magic/version mismatch ({magic:#x} v{version})"),
        ));
    }

    let mut entries = HashMap::new();
    loop {
        let hash = match read_u32(&mut file) {
            Ok(hash) => hash,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err),
        };
        let len = read_u32(&mut file)? as usize;
        let mut bytes = vec![0u8; len];
        file.read_exact(&mut bytes)?;
        entries.insert(hash, bytes.into());
    }
    Ok(entries)
}

fn save_cache_file(path: &Path, entries: &HashMap<u32, Arc<[u8]>>) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(&CACHE_MAGIC.to_le_bytes())?;
    file.write_all(&CACHE_VERSION.to_le_bytes())?;
    for (hash, blob) in entries {
        file.write_all(&hash.to_le_bytes())?;
        file.write_all(&(blob.len() as u32).to_le_bytes())?;
        file.write_all(blob)?;
    }
    Ok(())
}

fn read_u32(file: &mut fs::File) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    file.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}
