//! Shader cache round-trips across simulated debugger sessions.

use std::fs;

use optic_overlay::shader_cache::{CompileFlags, ShaderCache, CACHE_MAGIC, CACHE_VERSION};
use optic_overlay::testing::SimCompiler;
use pretty_assertions::assert_eq;

const SOURCE: &str = "float4 main() : SV_Target0 { return 0.0f.xxxx; }";

#[test]
fn warm_session_never_invokes_the_compiler() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shaders.cache");

    let first_blob = {
        let mut cache = ShaderCache::open(&path);
        cache.set_caching_enabled(true);
        let mut compiler = SimCompiler::default();
        let (blob, _) =
            cache.get_or_compile(&mut compiler, SOURCE, "main", "ps_5_0", CompileFlags::empty());
        cache.get_or_compile(&mut compiler, SOURCE, "other", "ps_5_0", CompileFlags::empty());
        assert_eq!(compiler.compile_calls, 2);
        blob.unwrap()
        // Dropping the cache persists it.
    };

    let mut cache = ShaderCache::open(&path);
    assert_eq!(cache.stats().loaded_from_disk, 2);

    let mut compiler = SimCompiler::default();
    let (blob, diagnostics) =
        cache.get_or_compile(&mut compiler, SOURCE, "main", "ps_5_0", CompileFlags::empty());
    assert_eq!(compiler.compile_calls, 0);
    assert!(diagnostics.is_empty());
    assert_eq!(blob.unwrap(), first_blob);
}

#[test]
fn corrupt_magic_starts_cold_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shaders.cache");
    fs::write(&path, b"not a cache file at all").unwrap();

    {
        let mut cache = ShaderCache::open(&path);
        assert!(cache.is_empty());

        cache.set_caching_enabled(true);
        let mut compiler = SimCompiler::default();
        cache.get_or_compile(&mut compiler, SOURCE, "main", "ps_5_0", CompileFlags::empty());
    }

    // The corrupt file was replaced with a loadable one.
    let cache = ShaderCache::open(&path);
    assert_eq!(cache.stats().loaded_from_disk, 1);
}

#[test]
fn version_mismatch_is_treated_as_cold() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shaders.cache");

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&CACHE_MAGIC.to_le_bytes());
    bytes.extend_from_slice(&(CACHE_VERSION + 1).to_le_bytes());
    bytes.extend_from_slice(&0x1234_5678u32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.push(0xff);
    fs::write(&path, bytes).unwrap();

    let cache = ShaderCache::open(&path);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().loaded_from_disk, 0);
}

#[test]
fn clean_session_leaves_the_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shaders.cache");

    {
        let mut cache = ShaderCache::open(&path);
        cache.set_caching_enabled(true);
        let mut compiler = SimCompiler::default();
        cache.get_or_compile(&mut compiler, SOURCE, "main", "ps_5_0", CompileFlags::empty());
    }
    let written = fs::read(&path).unwrap();

    {
        // Hits only: nothing marks the cache dirty.
        let mut cache = ShaderCache::open(&path);
        cache.set_caching_enabled(true);
        let mut compiler = SimCompiler::default();
        cache.get_or_compile(&mut compiler, SOURCE, "main", "ps_5_0", CompileFlags::empty());
        assert_eq!(compiler.compile_calls, 0);
    }

    assert_eq!(fs::read(&path).unwrap(), written);
}

#[test]
fn explicit_persist_clears_the_dirty_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shaders.cache");

    let mut cache = ShaderCache::open(&path);
    cache.set_caching_enabled(true);
    let mut compiler = SimCompiler::default();
    cache.get_or_compile(&mut compiler, SOURCE, "main", "ps_5_0", CompileFlags::empty());

    cache.persist().unwrap();
    let written = fs::read(&path).unwrap();

    // A second persist with no new entries rewrites nothing.
    fs::remove_file(&path).unwrap();
    cache.persist().unwrap();
    assert!(!path.exists());

    fs::write(&path, written).unwrap();
    let cache = ShaderCache::open(&path);
    assert_eq!(cache.stats().loaded_from_disk, 1);
}
