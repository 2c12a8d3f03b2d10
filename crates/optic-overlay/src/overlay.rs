//! The overlay context object.
//!
//! [`DebugOverlay`] owns the device, the compiler toolchain, the shader
//! cache, descriptor allocation, the surface table, the fixed pipelines
//! and samplers, and the font resources. Construction is all-or-nothing;
//! once built, rendering never fails fatally.

use std::path::PathBuf;
use std::sync::Arc;

use optic_gpu::cmd::{Barrier, Command, CommandList};
use optic_gpu::{
    CharRing, ConstantRing, DescriptorAllocator, Device, HeapKind, NativeWindow, PipelineDesc,
    PipelineId, PixelFormat, ResourceDesc, ResourceId, ResourceState, RootSignatureKind,
    SamplerDesc, SamplerFilter, FONT_SRV_SLOT, LINEAR_SAMPLER_SLOT, POINT_SAMPLER_SLOT,
};
use tracing::{debug, warn};

use crate::error::OverlayError;
use crate::font::{
    FontAtlas, FontResources, CHAR_RING_ALIGNMENT, CHAR_SLOT_BYTES, FONT_BUFFER_CHARS,
    FONT_CONSTANT_SLOTS, FONT_TEX_HEIGHT, FONT_TEX_WIDTH,
};
use crate::hlsl;
use crate::renderer::DISPLAY_CONSTANT_SLOTS;
use crate::shader_cache::{
    CompileFlags, ShaderCache, ShaderCacheError, ShaderCacheStats, ShaderCompiler,
};
use crate::surface::{SurfaceHandle, SurfaceManager, SWAP_CHAIN_FORMAT};

/// Root signature constant-buffer size; every per-draw constant block
/// fits in one 256-byte slot.
const CONSTANT_BUFFER_BYTES: u64 = 256;

/// Back-buffer formats text can be rendered onto.
const TEXT_PIPELINE_FORMATS: [PixelFormat; 3] = [
    PixelFormat::Bgra8Unorm,
    PixelFormat::Rgba8Unorm,
    PixelFormat::Rgba16Float,
];

/// Debug overlay runtime: surfaces, shader cache, and draw operations.
pub struct DebugOverlay<D: Device, C: ShaderCompiler> {
    pub(crate) device: D,
    pub(crate) compiler: C,
    pub(crate) descriptors: DescriptorAllocator,
    pub(crate) shader_cache: ShaderCache,
    pub(crate) surfaces: SurfaceManager,
    pub(crate) font: FontResources,
    /// Range/channel-mapped texture display, alpha blended.
    pub(crate) display_pipeline: PipelineId,
    /// Raw-output texture display, no blending.
    pub(crate) display_pipeline_opaque: PipelineId,
    pub(crate) checkerboard_pipeline: PipelineId,
    pub(crate) text_pipelines: [(PixelFormat, PipelineId); 3],
    pub(crate) text_format: PixelFormat,
    pub(crate) vertex_constants: [ResourceId; DISPLAY_CONSTANT_SLOTS],
    pub(crate) pixel_constants: [ResourceId; DISPLAY_CONSTANT_SLOTS],
    pub(crate) display_constant_ring: ConstantRing,
}

impl<D: Device, C: ShaderCompiler> DebugOverlay<D, C> {
    /// Build the overlay: compile (or load from cache) every fixed
    /// shader, create the pipelines, samplers, constant buffers, and
    /// upload the font atlas.
    ///
    /// Shader caching to disk is enabled only for the duration of this
    /// call; later compiles through [`Self::compile_shader`] hit the
    /// in-memory entries but are not persisted.
    pub fn new(
        mut device: D,
        mut compiler: C,
        atlas: FontAtlas,
        cache_path: impl Into<PathBuf>,
    ) -> Result<Self, OverlayError> {
        let mut descriptors = DescriptorAllocator::new();
        let mut shader_cache = ShaderCache::open(cache_path);
        shader_cache.set_caching_enabled(true);

        device.create_sampler(
            &SamplerDesc {
                filter: SamplerFilter::Point,
            },
            descriptors.sampler(POINT_SAMPLER_SLOT),
        );
        device.create_sampler(
            &SamplerDesc {
                filter: SamplerFilter::Linear,
            },
            descriptors.sampler(LINEAR_SAMPLER_SLOT),
        );

        let display_vs = compile_required(
            &mut shader_cache,
            &mut compiler,
            hlsl::DISPLAY_SHADER_SOURCE,
            hlsl::DISPLAY_VS_ENTRY,
            hlsl::VS_PROFILE,
        )?;
        let tex_display_ps = compile_required(
            &mut shader_cache,
            &mut compiler,
            hlsl::DISPLAY_SHADER_SOURCE,
            hlsl::TEX_DISPLAY_PS_ENTRY,
            hlsl::PS_PROFILE,
        )?;
        let checkerboard_ps = compile_required(
            &mut shader_cache,
            &mut compiler,
            hlsl::DISPLAY_SHADER_SOURCE,
            hlsl::CHECKERBOARD_PS_ENTRY,
            hlsl::PS_PROFILE,
        )?;
        let text_vs = compile_required(
            &mut shader_cache,
            &mut compiler,
            hlsl::TEXT_SHADER_SOURCE,
            hlsl::TEXT_VS_ENTRY,
            hlsl::VS_PROFILE,
        )?;
        let text_ps = compile_required(
            &mut shader_cache,
            &mut compiler,
            hlsl::TEXT_SHADER_SOURCE,
            hlsl::TEXT_PS_ENTRY,
            hlsl::PS_PROFILE,
        )?;

        shader_cache.set_caching_enabled(false);

        let display_pipeline = create_pipeline(
            &mut device,
            "texture display",
            PipelineDesc {
                label: Some("tex_display".into()),
                root_signature: RootSignatureKind::Display,
                vertex_shader: Arc::clone(&display_vs),
                pixel_shader: Arc::clone(&tex_display_ps),
                blend_enabled: true,
                render_target_format: PixelFormat::Rgba8UnormSrgb,
            },
        )?;
        let display_pipeline_opaque = create_pipeline(
            &mut device,
            "raw texture display",
            PipelineDesc {
                label: Some("tex_display_raw".into()),
                root_signature: RootSignatureKind::Display,
                vertex_shader: Arc::clone(&display_vs),
                pixel_shader: tex_display_ps,
                blend_enabled: false,
                render_target_format: PixelFormat::Rgba8UnormSrgb,
            },
        )?;
        let checkerboard_pipeline = create_pipeline(
            &mut device,
            "checkerboard",
            PipelineDesc {
                label: Some("checkerboard".into()),
                root_signature: RootSignatureKind::Display,
                vertex_shader: display_vs,
                pixel_shader: checkerboard_ps,
                blend_enabled: false,
                render_target_format: PixelFormat::Rgba8UnormSrgb,
            },
        )?;

        let mut text_pipelines = [(PixelFormat::Unknown, PipelineId(0)); 3];
        for (entry, format) in text_pipelines.iter_mut().zip(TEXT_PIPELINE_FORMATS) {
            let pipeline = create_pipeline(
                &mut device,
                "text",
                PipelineDesc {
                    label: Some(format!("text_{format:?}")),
                    root_signature: RootSignatureKind::Text,
                    vertex_shader: Arc::clone(&text_vs),
                    pixel_shader: Arc::clone(&text_ps),
                    blend_enabled: true,
                    render_target_format: format,
                },
            )?;
            *entry = (format, pipeline);
        }

        let font = upload_font(&mut device, &mut descriptors, &atlas)?;

        let vertex_constants: [ResourceId; DISPLAY_CONSTANT_SLOTS] =
            create_constant_buffers(&mut device, "vertex constant buffers")?;
        let pixel_constants: [ResourceId; DISPLAY_CONSTANT_SLOTS] =
            create_constant_buffers(&mut device, "pixel constant buffers")?;

        debug!(
            cached = shader_cache.len(),
            "debug overlay initialized"
        );

        Ok(Self {
            device,
            compiler,
            descriptors,
            shader_cache,
            surfaces: SurfaceManager::new(),
            font,
            display_pipeline,
            display_pipeline_opaque,
            checkerboard_pipeline,
            text_pipelines,
            text_format: SWAP_CHAIN_FORMAT,
            vertex_constants,
            pixel_constants,
            display_constant_ring: ConstantRing::new(DISPLAY_CONSTANT_SLOTS),
        })
    }

    // ---- surface lifecycle ----

    /// Create an output surface for `window`. Returns handle 0 on
    /// failure.
    pub fn create_output_surface(
        &mut self,
        window: Box<dyn NativeWindow>,
        want_depth: bool,
    ) -> SurfaceHandle {
        self.surfaces
            .create(&mut self.device, &mut self.descriptors, window, want_depth)
    }

    /// Select the surface subsequent draws target.
    pub fn bind_output_surface(&mut self, handle: SurfaceHandle) {
        self.surfaces.bind(handle);
    }

    pub fn bound_output_surface(&self) -> SurfaceHandle {
        self.surfaces.current()
    }

    /// Returns true when the surface dimensions changed.
    pub fn check_resize(&mut self, handle: SurfaceHandle) -> bool {
        self.surfaces.check_and_resize(&mut self.device, handle)
    }

    /// Present the surface's color target.
    pub fn flip(&mut self, handle: SurfaceHandle) {
        self.surfaces.flip(&mut self.device, handle);
    }

    pub fn destroy_output_surface(&mut self, handle: SurfaceHandle) {
        self.surfaces
            .destroy(&mut self.device, &mut self.descriptors, handle);
    }

    pub fn surface_dimensions(&self, handle: SurfaceHandle) -> Option<(u32, u32)> {
        self.surfaces.dimensions(handle)
    }

    pub fn is_surface_visible(&self, handle: SurfaceHandle) -> bool {
        self.surfaces.is_visible(handle)
    }

    pub fn clear_color(&mut self, handle: SurfaceHandle, color: [f32; 4]) {
        self.surfaces.clear_color(&mut self.device, handle, color);
    }

    pub fn clear_depth(&mut self, handle: SurfaceHandle, depth: f32, stencil: u8) {
        self.surfaces
            .clear_depth(&mut self.device, handle, depth, stencil);
    }

    // ---- configuration and introspection ----

    /// Select which back-buffer format text draws assume. Returns false
    /// if no text pipeline exists for `format`.
    pub fn set_text_target_format(&mut self, format: PixelFormat) -> bool {
        if self.text_pipeline_for(format).is_none() {
            warn!(?format, "no text pipeline for requested format");
            return false;
        }
        self.text_format = format;
        true
    }

    pub fn text_target_format(&self) -> PixelFormat {
        self.text_format
    }

    pub fn shader_cache_stats(&self) -> ShaderCacheStats {
        self.shader_cache.stats()
    }

    /// Flush the shader cache to disk now rather than at drop.
    pub fn persist_shader_cache(&mut self) -> Result<(), ShaderCacheError> {
        self.shader_cache.persist()
    }

    /// Compile an ad-hoc shader through the cache, e.g. a user-supplied
    /// custom display shader.
    pub fn compile_shader(
        &mut self,
        source: &str,
        entry_point: &str,
        profile: &str,
        flags: CompileFlags,
    ) -> (Option<Arc<[u8]>>, String) {
        self.shader_cache
            .get_or_compile(&mut self.compiler, source, entry_point, profile, flags)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub(crate) fn text_pipeline_for(&self, format: PixelFormat) -> Option<PipelineId> {
        self.text_pipelines
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, pipeline)| *pipeline)
    }
}

fn compile_required<C: ShaderCompiler>(
    cache: &mut ShaderCache,
    compiler: &mut C,
    source: &str,
    entry_point: &'static str,
    profile: &str,
) -> Result<Arc<[u8]>, OverlayError> {
    let (blob, diagnostics) = cache.get_or_compile(
        compiler,
        source,
        entry_point,
        profile,
        CompileFlags::WARNINGS_ARE_ERRORS,
    );
    match blob {
        Some(blob) => Ok(blob),
        None => Err(OverlayError::ShaderCompile {
            entry_point,
            diagnostics,
        }),
    }
}

fn create_pipeline<D: Device>(
    device: &mut D,
    what: &'static str,
    desc: PipelineDesc,
) -> Result<PipelineId, OverlayError> {
    device
        .create_pipeline(&desc)
        .map_err(|source| OverlayError::PipelineCreation { what, source })
}

fn create_constant_buffers<D: Device, const N: usize>(
    device: &mut D,
    what: &'static str,
) -> Result<[ResourceId; N], OverlayError> {
    let mut ids = [ResourceId(0); N];
    for id in &mut ids {
        *id = device
            .create_resource(
                &ResourceDesc::buffer(CONSTANT_BUFFER_BYTES),
                HeapKind::Upload,
                ResourceState::GenericRead,
            )
            .map_err(|source| OverlayError::ResourceCreation { what, source })?;
    }
    Ok(ids)
}

/// Upload the baked glyph atlas and create the font's GPU resources.
fn upload_font<D: Device>(
    device: &mut D,
    descriptors: &mut DescriptorAllocator,
    atlas: &FontAtlas,
) -> Result<FontResources, OverlayError> {
    if atlas.width != FONT_TEX_WIDTH || atlas.height != FONT_TEX_HEIGHT {
        warn!(
            width = atlas.width,
            height = atlas.height,
            "font atlas has unexpected dimensions"
        );
    }

    let atlas_texture = device
        .create_resource(
            &ResourceDesc::texture2d(
                u64::from(atlas.width),
                atlas.height,
                PixelFormat::R8Unorm,
            ),
            HeapKind::Default,
            ResourceState::CopyDest,
        )
        .map_err(|source| OverlayError::ResourceCreation {
            what: "font atlas texture",
            source,
        })?;

    let staging = device
        .create_resource(
            &ResourceDesc::buffer(atlas.bitmap.len() as u64),
            HeapKind::Upload,
            ResourceState::GenericRead,
        )
        .map_err(|source| OverlayError::ResourceCreation {
            what: "font staging buffer",
            source,
        })?;
    device.write_buffer(staging, 0, &atlas.bitmap)?;

    let mut list = CommandList::new("font upload");
    list.commands.push(Command::CopyBufferToTexture {
        dst: atlas_texture,
        src: staging,
        width: atlas.width,
        height: atlas.height,
    });
    list.transition(vec![Barrier {
        resource: atlas_texture,
        subresource: 0,
        before: ResourceState::CopyDest,
        after: ResourceState::PixelShaderResource,
    }]);
    device.submit(list)?;
    device.wait_idle();
    device.destroy_resource(staging);

    device.create_shader_resource_view(atlas_texture, descriptors.reserved_srv(FONT_SRV_SLOT));

    let packed = atlas.packed_glyph_data();
    let packed_bytes: &[u8] = bytemuck::cast_slice(&packed);
    let glyph_data = device
        .create_resource(
            &ResourceDesc::buffer(packed_bytes.len() as u64),
            HeapKind::Upload,
            ResourceState::GenericRead,
        )
        .map_err(|source| OverlayError::ResourceCreation {
            what: "glyph data buffer",
            source,
        })?;
    device.write_buffer(glyph_data, 0, packed_bytes)?;

    let constants: [ResourceId; FONT_CONSTANT_SLOTS] =
        create_constant_buffers(device, "font constant buffers")?;

    let char_buffer = device
        .create_resource(
            &ResourceDesc::buffer(u64::from(FONT_BUFFER_CHARS) * CHAR_SLOT_BYTES),
            HeapKind::Upload,
            ResourceState::GenericRead,
        )
        .map_err(|source| OverlayError::ResourceCreation {
            what: "character buffer",
            source,
        })?;

    Ok(FontResources {
        atlas_texture,
        glyph_data,
        constants,
        constant_ring: ConstantRing::new(FONT_CONSTANT_SLOTS),
        char_buffer,
        char_ring: CharRing::new(FONT_BUFFER_CHARS, CHAR_RING_ALIGNMENT),
        char_size: atlas.char_size,
        char_aspect: atlas.char_aspect,
    })
}
