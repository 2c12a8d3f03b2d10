//! Draw operations on the bound output surface.
//!
//! Every operation records one command list against the surface's color
//! target, submits it, and waits for the device to drain before
//! returning. Draw paths never return errors; a surface that lost its
//! targets or a resource that cannot be displayed degrades to a logged
//! no-op (or `false`).

use bytemuck::{Pod, Zeroable};
use optic_gpu::cmd::{Barrier, CommandList};
use optic_gpu::{
    Device, PixelFormat, ResourceId, ResourceState, TextureDimension, TEX_DISPLAY_SRV_SLOT,
};
use tracing::error;

use crate::font::{CHAR_SLOT_BYTES, FONT_FIRST_CHAR, FONT_MAX_CHARS};
use crate::overlay::DebugOverlay;
use crate::shader_cache::ShaderCompiler;

/// Number of generic per-draw constant buffers cycled round-robin.
pub(crate) const DISPLAY_CONSTANT_SLOTS: usize = 16;

/// Resource-type discriminator in the low bits of the display format
/// word.
pub const RESTYPE_TEX1D: u32 = 1;
pub const RESTYPE_TEX2D: u32 = 2;
pub const RESTYPE_TEX3D: u32 = 3;
pub const RESTYPE_TEX2DMS: u32 = 4;

/// Behaviour flags in the high bits of the display format word.
pub const FLAG_NANS: u32 = 0x10;
pub const FLAG_CLIPPING: u32 = 0x20;
pub const FLAG_UINT: u32 = 0x40;
pub const FLAG_SINT: u32 = 0x80;
pub const FLAG_GAMMA: u32 = 0x100;

/// Last visible character 0x7E; 0x7F has no glyph.
const FONT_LAST_VISIBLE_CHAR: u8 = 0x7e;

/// Vertex-stage constants for the display quad.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct VertexCBuffer {
    pub position: [f32; 2],
    pub screen_aspect: [f32; 2],
    pub texture_resolution: [f32; 2],
    pub scale: f32,
    pub line_strip: u32,
}

/// Pixel-stage constants for texture display and checkerboard fills.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct PixelCBuffer {
    pub channels: [f32; 4],
    pub primary_color: [f32; 4],
    pub secondary_color: [f32; 4],
    pub range_minimum: f32,
    pub inverse_range_size: f32,
    pub mip_level: f32,
    pub scale: f32,
    pub texture_resolution: [f32; 3],
    pub slice: f32,
    pub output_display_format: u32,
    pub sample_index: i32,
    pub raw_output: u32,
    pub flip_y: u32,
}

/// Per-draw constants for the text shaders. Positions are measured in
/// character cells.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct FontCBuffer {
    pub text_position: [f32; 2],
    pub font_screen_aspect: [f32; 2],
    pub character_size: [f32; 2],
    pub text_size: f32,
    pub padding: f32,
}

/// Value-replacing overlay applied on top of the displayed texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayOverlay {
    #[default]
    None,
    /// Highlight NaN (red) and infinity (green) over grayscale.
    NanInf,
    /// Highlight values outside [0, 1] (magenta) over grayscale.
    Clipping,
}

/// Configuration for one texture-display draw.
#[derive(Clone, Copy, Debug)]
pub struct TextureDisplay {
    pub resource: ResourceId,
    /// Top-left placement in output pixels.
    pub offset: [f32; 2],
    /// Texel-to-pixel scale; zero or negative requests an auto-fit that
    /// preserves aspect ratio and centers the image.
    pub scale: f32,
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
    pub range_min: f32,
    pub range_max: f32,
    pub flip_y: bool,
    pub mip: u32,
    pub slice: u32,
    /// Sample to display for multisampled resources; `!0` requests an
    /// average resolve over all samples.
    pub sample_index: u32,
    /// Multiplier handed to custom display shaders; ignored when <= 0.
    pub hdr_multiplier: f32,
    /// Bypass range/channel/gamma mapping entirely.
    pub raw_output: bool,
    pub linear_displayed_as_gamma: bool,
    pub overlay: DisplayOverlay,
}

impl Default for TextureDisplay {
    fn default() -> Self {
        Self {
            resource: ResourceId(0),
            offset: [0.0, 0.0],
            scale: 0.0,
            red: true,
            green: true,
            blue: true,
            alpha: false,
            range_min: 0.0,
            range_max: 1.0,
            flip_y: false,
            mip: 0,
            slice: 0,
            sample_index: 0,
            hdr_multiplier: -1.0,
            raw_output: false,
            linear_displayed_as_gamma: true,
            overlay: DisplayOverlay::None,
        }
    }
}

impl<D: Device, C: ShaderCompiler> DebugOverlay<D, C> {
    /// Fill the bound surface with a two-color checkerboard.
    pub fn render_checkerboard(&mut self, light: [f32; 4], dark: [f32; 4]) {
        let Some(surface) = self.surfaces.bound_surface() else {
            return;
        };
        if !surface.is_usable() {
            return;
        }
        let (width, height) = surface.dimensions();
        let rtv = surface.rtv();
        if width == 0 || height == 0 {
            return;
        }

        // Full-screen quad: NDC origin top-left, unit scale factors.
        let vertex = VertexCBuffer {
            position: [-1.0, 1.0],
            screen_aspect: [1.0, 1.0],
            texture_resolution: [1.0, 1.0],
            scale: 2.0,
            line_strip: 0,
        };
        let pixel = PixelCBuffer {
            primary_color: light,
            secondary_color: dark,
            ..Zeroable::zeroed()
        };
        let Some((vcb, pcb)) = self.write_display_constants(&vertex, &pixel) else {
            return;
        };

        let mut list = CommandList::new("checkerboard");
        list.set_render_target(rtv, None)
            .set_viewport_scissor(width, height)
            .set_pipeline(self.checkerboard_pipeline)
            .set_constant_buffer(0, vcb, 0)
            .set_constant_buffer(1, pcb, 0)
            .draw(4, 1);

        if let Err(err) = self.device.submit(list) {
            error!(%err, "failed to submit checkerboard draw");
            return;
        }
        self.device.wait_idle();
    }

    /// Draw `text` at character-cell position `(x, y)` on the bound
    /// surface. Each newline advances one line height; empty lines only
    /// advance.
    pub fn render_text(&mut self, x: f32, y: f32, text: &str) {
        for (line_index, line) in text.split('\n').enumerate() {
            self.render_text_line(x, y + line_index as f32, line);
        }
    }

    fn render_text_line(&mut self, x: f32, y: f32, line: &str) {
        if line.is_empty() {
            return;
        }
        if line.len() > FONT_MAX_CHARS {
            error!(len = line.len(), max = FONT_MAX_CHARS, "text line too long, dropped");
            return;
        }

        let Some(surface) = self.surfaces.bound_surface() else {
            return;
        };
        if !surface.is_usable() {
            return;
        }
        let (width, height) = surface.dimensions();
        let rtv = surface.rtv();
        if width == 0 || height == 0 {
            return;
        }

        let char_count = line.len() as u32;
        let Some(char_offset) = self.font.char_ring.reserve(char_count) else {
            return;
        };
        for (i, byte) in line.bytes().enumerate() {
            let glyph = u32::from(byte.clamp(FONT_FIRST_CHAR, FONT_LAST_VISIBLE_CHAR) - FONT_FIRST_CHAR);
            let offset = (u64::from(char_offset) + i as u64) * CHAR_SLOT_BYTES;
            if let Err(err) = self
                .device
                .write_buffer(self.font.char_buffer, offset, &glyph.to_le_bytes())
            {
                error!(%err, "failed to write glyph indices");
                return;
            }
        }

        let constants = FontCBuffer {
            text_position: [x, y],
            font_screen_aspect: [1.0 / width as f32, 1.0 / height as f32],
            character_size: [self.font.char_aspect, 1.0],
            text_size: self.font.char_size,
            padding: 0.0,
        };
        let slot = self.font.constant_ring.advance();
        let constant_buffer = self.font.constants[slot];
        if let Err(err) = self
            .device
            .write_buffer(constant_buffer, 0, bytemuck::bytes_of(&constants))
        {
            error!(%err, "failed to write font constants");
            return;
        }

        let Some(pipeline) = self.text_pipeline_for(self.text_format) else {
            error!(format = ?self.text_format, "no text pipeline for format");
            return;
        };

        let mut list = CommandList::new("text");
        list.set_render_target(rtv, None)
            .set_viewport_scissor(width, height)
            .set_pipeline(pipeline)
            .set_constant_buffer(0, constant_buffer, 0)
            .set_constant_buffer(1, self.font.glyph_data, 0)
            .set_constant_buffer(2, self.font.char_buffer, u64::from(char_offset) * CHAR_SLOT_BYTES)
            .draw(4, char_count);

        if let Err(err) = self.device.submit(list) {
            error!(%err, "failed to submit text draw");
            return;
        }
        self.device.wait_idle();
    }

    /// Display a texture on the bound surface.
    ///
    /// Returns `false` without drawing when the surface is unusable, the
    /// resource is unknown, or its format cannot be displayed. Every
    /// subresource is transitioned to `PixelShaderResource` for the draw
    /// and restored to its prior state afterwards.
    pub fn render_texture(&mut self, display: &TextureDisplay) -> bool {
        let Some(surface) = self.surfaces.bound_surface() else {
            return false;
        };
        if !surface.is_usable() {
            return false;
        }
        let (out_width, out_height) = surface.dimensions();
        let rtv = surface.rtv();
        if out_width == 0 || out_height == 0 {
            return false;
        }

        let Some(desc) = self.device.resource_desc(display.resource) else {
            let resource = display.resource;
            error!(resource = ?resource, "texture display of unknown resource");
            return false;
        };
        if desc.format == PixelFormat::Unknown || desc.dimension == TextureDimension::Buffer {
            return false;
        }

        let range_min = display.range_min;
        let mut range_max = display.range_max;
        if range_max <= range_min {
            range_max = range_min + 0.00001;
        }
        let mut inverse_range_size = 1.0 / (range_max - range_min);
        if !inverse_range_size.is_finite() {
            inverse_range_size = f32::MAX;
        }

        let mut channels = [
            display.red as u32 as f32,
            display.green as u32 as f32,
            display.blue as u32 as f32,
            display.alpha as u32 as f32,
        ];
        // Alpha-only formats show their single channel as grayscale
        // rather than an all-black RGB image.
        if desc.format == PixelFormat::A8Unorm
            && display.red
            && display.green
            && display.blue
            && !display.alpha
        {
            channels = [0.0, 0.0, 0.0, 1.0];
        }

        let mip = display.mip.min(u32::from(desc.mip_levels.saturating_sub(1)));
        let tex_width = ((desc.width >> mip).max(1)) as f32;
        let tex_height = ((desc.height >> mip).max(1)) as f32;

        let mut scale = display.scale;
        let mut offset = display.offset;
        if scale <= 0.0 {
            let x_scale = out_width as f32 / tex_width;
            let y_scale = out_height as f32 / tex_height;
            scale = x_scale.min(y_scale);
            offset = [
                (out_width as f32 - tex_width * scale) * 0.5,
                (out_height as f32 - tex_height * scale) * 0.5,
            ];
        }

        let vertex = VertexCBuffer {
            position: [
                offset[0] / out_width as f32 * 2.0 - 1.0,
                1.0 - offset[1] / out_height as f32 * 2.0,
            ],
            screen_aspect: [1.0 / out_width as f32, 1.0 / out_height as f32],
            texture_resolution: [tex_width, tex_height],
            scale: scale * 2.0,
            line_strip: 0,
        };

        let depth_or_layers = u32::from(desc.depth_or_array_size).max(1);
        let slice = if desc.dimension == TextureDimension::Texture3D {
            // Normalized coordinate sampling the center of the slice.
            (display.slice.min(depth_or_layers - 1) as f32 + 0.001) / depth_or_layers as f32
        } else {
            display.slice.min(depth_or_layers - 1) as f32
        };

        let sample_index = if display.sample_index == !0u32 {
            -(desc.sample_count as i32)
        } else {
            display.sample_index.min(desc.sample_count.saturating_sub(1)) as i32
        };

        let mut output_display_format = match desc.dimension {
            TextureDimension::Texture1D => RESTYPE_TEX1D,
            TextureDimension::Texture3D => RESTYPE_TEX3D,
            _ if desc.sample_count > 1 => RESTYPE_TEX2DMS,
            _ => RESTYPE_TEX2D,
        };
        if desc.format.is_uint() {
            output_display_format |= FLAG_UINT;
        }
        if desc.format.is_sint() {
            output_display_format |= FLAG_SINT;
        }
        if !desc.format.is_srgb() && display.linear_displayed_as_gamma {
            output_display_format |= FLAG_GAMMA;
        }
        match display.overlay {
            DisplayOverlay::NanInf => output_display_format |= FLAG_NANS,
            DisplayOverlay::Clipping => output_display_format |= FLAG_CLIPPING,
            DisplayOverlay::None => {}
        }

        let mut primary_color = [0.0f32; 4];
        if display.hdr_multiplier > 0.0 {
            primary_color = [display.hdr_multiplier; 4];
        }
        let pixel = PixelCBuffer {
            channels,
            primary_color,
            secondary_color: [0.0; 4],
            range_minimum: range_min,
            inverse_range_size,
            mip_level: mip as f32,
            scale,
            texture_resolution: [tex_width, tex_height, depth_or_layers as f32],
            slice,
            output_display_format,
            sample_index,
            raw_output: display.raw_output as u32,
            flip_y: display.flip_y as u32,
        };

        let Some((vcb, pcb)) = self.write_display_constants(&vertex, &pixel) else {
            return false;
        };

        let pipeline = if display.raw_output {
            self.display_pipeline_opaque
        } else {
            self.display_pipeline
        };

        self.device
            .create_shader_resource_view(display.resource, self.descriptors.reserved_srv(TEX_DISPLAY_SRV_SLOT));

        let barriers: Vec<Barrier> = self
            .device
            .subresource_states(display.resource)
            .into_iter()
            .enumerate()
            .filter(|(_, state)| *state != ResourceState::PixelShaderResource)
            .map(|(subresource, state)| Barrier {
                resource: display.resource,
                subresource: subresource as u32,
                before: state,
                after: ResourceState::PixelShaderResource,
            })
            .collect();

        let mut list = CommandList::new("texture display");
        list.transition(barriers.clone());
        list.set_render_target(rtv, None)
            .set_viewport_scissor(out_width, out_height)
            .set_pipeline(pipeline)
            .set_constant_buffer(0, vcb, 0)
            .set_constant_buffer(1, pcb, 0)
            .draw(4, 1);
        list.transition(barriers.iter().map(|b| b.reversed()).collect());

        if let Err(err) = self.device.submit(list) {
            error!(%err, "failed to submit texture display draw");
            return false;
        }
        self.device.wait_idle();
        true
    }

    fn write_display_constants(
        &mut self,
        vertex: &VertexCBuffer,
        pixel: &PixelCBuffer,
    ) -> Option<(ResourceId, ResourceId)> {
        let slot = self.display_constant_ring.advance();
        let vcb = self.vertex_constants[slot];
        let pcb = self.pixel_constants[slot];
        if let Err(err) = self.device.write_buffer(vcb, 0, bytemuck::bytes_of(vertex)) {
            error!(%err, "failed to write vertex constants");
            return None;
        }
        if let Err(err) = self.device.write_buffer(pcb, 0, bytemuck::bytes_of(pixel)) {
            error!(%err, "failed to write pixel constants");
            return None;
        }
        Some((vcb, pcb))
    }
}
