//! Embedded shader source for the overlay's fixed pipelines.
//!
//! Sources are compiled through [`crate::shader_cache::ShaderCache`] at
//! startup, so across sessions these strings normally never reach the
//! compiler at all.

pub const VS_PROFILE: &str = "vs_5_0";
pub const PS_PROFILE: &str = "ps_5_0";

pub const DISPLAY_VS_ENTRY: &str = "OverlayVS";
pub const TEX_DISPLAY_PS_ENTRY: &str = "TexDisplayPS";
pub const CHECKERBOARD_PS_ENTRY: &str = "CheckerboardPS";
pub const TEXT_VS_ENTRY: &str = "TextVS";
pub const TEXT_PS_ENTRY: &str = "TextPS";

/// Fullscreen-quad vertex shader plus the texture display and
/// checkerboard pixel shaders.
pub const DISPLAY_SHADER_SOURCE: &str = r#"
// Texture display and checkerboard shaders.

cbuffer VertexCBuffer : register(b0)
{
    float2 Position;
    float2 ScreenAspect;
    float2 TextureResolution;
    float Scale;
    uint LineStrip;
};

cbuffer PixelCBuffer : register(b1)
{
    float4 Channels;
    float4 PrimaryColor;
    float4 SecondaryColor;
    float RangeMinimum;
    float InverseRangeSize;
    float MipLevel;
    float PixelScale;
    float3 PixelTextureResolution;
    float Slice;
    uint OutputDisplayFormat;
    int SampleIndex;
    uint RawOutput;
    uint FlipY;
};

Texture1D<float4> Tex1D : register(t0);
Texture2D<float4> Tex2D : register(t1);
Texture2D<float4> TexDisplay : register(t2);
Texture3D<float4> Tex3D : register(t3);
Texture2DMS<float4> Tex2DMS : register(t4);

SamplerState PointSampler : register(s0);
SamplerState LinearSampler : register(s1);

struct OverlayV2P
{
    float4 pos : SV_Position;
    float2 tex : TEXCOORD0;
};

OverlayV2P OverlayVS(uint vid : SV_VertexID)
{
    float2 positions[4] =
    {
        float2(0.0f, 0.0f), float2(0.0f, -1.0f),
        float2(1.0f, 0.0f), float2(1.0f, -1.0f),
    };

    OverlayV2P o;
    float2 p = positions[vid];
    o.tex = float2(p.x, -p.y);
    if (FlipY != 0)
        o.tex.y = 1.0f - o.tex.y;
    p = Position.xy + p * Scale * ScreenAspect.xy * TextureResolution.xy;
    o.pos = float4(p, 0.0f, 1.0f);
    return o;
}

float4 SampleTextureFloat(float2 uv)
{
    uint restype = OutputDisplayFormat & 0xf;
    if (restype == 1)
        return Tex1D.SampleLevel(PointSampler, uv.x, MipLevel);
    if (restype == 3)
        return Tex3D.SampleLevel(PointSampler, float3(uv, Slice), MipLevel);
    if (restype == 4)
    {
        uint w, h, samples;
        Tex2DMS.GetDimensions(w, h, samples);
        uint2 coord = uint2(uv * float2(w, h));
        if (SampleIndex < 0)
        {
            // Average all samples when asked to resolve.
            float4 sum = 0.0f.xxxx;
            for (uint s = 0; s < samples; s++)
                sum += Tex2DMS.Load(coord, s);
            return sum / float(samples);
        }
        return Tex2DMS.Load(coord, SampleIndex);
    }
    return TexDisplay.SampleLevel(PointSampler, uv, MipLevel);
}

float4 TexDisplayPS(OverlayV2P i) : SV_Target0
{
    float4 col = SampleTextureFloat(i.tex);

    if (RawOutput != 0)
        return col;

    // Nan/inf/clipping overlays replace the value entirely.
    if (OutputDisplayFormat & 0x10)
    {
        if (isnan(col.r) || isnan(col.g) || isnan(col.b) || isnan(col.a))
            return float4(1.0f, 0.0f, 0.0f, 1.0f);
        if (isinf(col.r) || isinf(col.g) || isinf(col.b) || isinf(col.a))
            return float4(0.0f, 1.0f, 0.0f, 1.0f);
        float lum = dot(col.rgb, float3(0.2126f, 0.7152f, 0.0722f));
        return float4(lum.xxx, 1.0f);
    }
    if (OutputDisplayFormat & 0x20)
    {
        if (any(col < 0.0f.xxxx) || any(col > 1.0f.xxxx))
            return float4(1.0f, 0.0f, 1.0f, 1.0f);
        float lum = dot(col.rgb, float3(0.2126f, 0.7152f, 0.0722f));
        return float4(lum.xxx, 1.0f);
    }

    col = (col - RangeMinimum.xxxx) * InverseRangeSize;
    col = lerp(0.0f.xxxx, col, Channels);

    if (Channels.a == 0.0f)
        col.a = 1.0f;

    if (OutputDisplayFormat & 0x100)
        col.rgb = pow(abs(col.rgb), (1.0f / 2.2f).xxx);

    return col;
}

float4 CheckerboardPS(float4 pos : SV_Position) : SV_Target0
{
    float2 t = floor(pos.xy / 64.0f);
    if (frac((t.x + t.y) * 0.5f) == 0.0f)
        return float4(PrimaryColor.rgb, 1.0f);
    return float4(SecondaryColor.rgb, 1.0f);
}
"#;

/// Instanced glyph-quad text shaders.
pub const TEXT_SHADER_SOURCE: &str = r#"
// Overlay text shaders. One instance per character.

cbuffer FontCBuffer : register(b0)
{
    float2 TextPosition;
    float2 FontScreenAspect;
    float2 CharacterSize;
    float TextSize;
    float Padding;
};

cbuffer GlyphData : register(b1)
{
    float4 GlyphPositions[190];
};

cbuffer CharBuffer : register(b2)
{
    uint4 Chars[256];
};

Texture2D<float> FontTexture : register(t0);
SamplerState LinearSampler : register(s1);

struct TextV2P
{
    float4 pos : SV_Position;
    float2 tex : TEXCOORD0;
};

TextV2P TextVS(uint vid : SV_VertexID, uint inst : SV_InstanceID)
{
    float2 corners[4] =
    {
        float2(0.0f, 0.0f), float2(0.0f, 1.0f),
        float2(1.0f, 0.0f), float2(1.0f, 1.0f),
    };

    uint glyph = Chars[inst].x;
    float4 place = GlyphPositions[glyph * 2 + 0];
    float4 uvrect = GlyphPositions[glyph * 2 + 1];

    float2 c = corners[vid];
    float2 pos = TextPosition;
    pos += float2(inst, 0.0f) * CharacterSize * TextSize * FontScreenAspect;
    pos += (c + place.xy) * CharacterSize * TextSize * FontScreenAspect;

    TextV2P o;
    o.pos = float4(pos.x * 2.0f - 1.0f, 1.0f - pos.y * 2.0f, 0.0f, 1.0f);
    o.tex = lerp(uvrect.xy, uvrect.zw, c);
    return o;
}

float4 TextPS(TextV2P i) : SV_Target0
{
    float glyph = FontTexture.SampleLevel(LinearSampler, i.tex, 0.0f);
    return float4(1.0f, 1.0f, 1.0f, glyph);
}
"#;
