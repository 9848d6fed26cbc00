//! Static lookup tables from postfx vocabulary to GL enums.

use postfx_core::{Address, Filter, PixelFormat};

/// Storage format plus the client format/type used for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlFormat {
    pub internal: u32,
    pub format: u32,
    pub ty: u32,
}

const fn f(internal: u32, format: u32, ty: u32) -> GlFormat {
    GlFormat {
        internal,
        format,
        ty,
    }
}

static FORMATS: &[(PixelFormat, GlFormat)] = &[
    (PixelFormat::R8Unorm, f(glow::R8, glow::RED, glow::UNSIGNED_BYTE)),
    (PixelFormat::R8Uint, f(glow::R8UI, glow::RED_INTEGER, glow::UNSIGNED_BYTE)),
    (PixelFormat::R8Sint, f(glow::R8I, glow::RED_INTEGER, glow::BYTE)),
    (PixelFormat::R8G8Unorm, f(glow::RG8, glow::RG, glow::UNSIGNED_BYTE)),
    (PixelFormat::R8G8Uint, f(glow::RG8UI, glow::RG_INTEGER, glow::UNSIGNED_BYTE)),
    (PixelFormat::R8G8Sint, f(glow::RG8I, glow::RG_INTEGER, glow::BYTE)),
    (PixelFormat::R8G8B8A8Unorm, f(glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE)),
    (PixelFormat::R8G8B8A8Uint, f(glow::RGBA8UI, glow::RGBA_INTEGER, glow::UNSIGNED_BYTE)),
    (PixelFormat::R8G8B8A8Sint, f(glow::RGBA8I, glow::RGBA_INTEGER, glow::BYTE)),
    (PixelFormat::R8G8B8A8Srgb, f(glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE)),
    (
        PixelFormat::A2B10G10R10UnormPack32,
        f(glow::RGB10_A2, glow::RGBA, glow::UNSIGNED_INT_2_10_10_10_REV),
    ),
    (
        PixelFormat::A2B10G10R10UintPack32,
        f(glow::RGB10_A2UI, glow::RGBA_INTEGER, glow::UNSIGNED_INT_2_10_10_10_REV),
    ),
    (PixelFormat::R16Uint, f(glow::R16UI, glow::RED_INTEGER, glow::UNSIGNED_SHORT)),
    (PixelFormat::R16Sint, f(glow::R16I, glow::RED_INTEGER, glow::SHORT)),
    (PixelFormat::R16Sfloat, f(glow::R16F, glow::RED, glow::HALF_FLOAT)),
    (PixelFormat::R16G16Uint, f(glow::RG16UI, glow::RG_INTEGER, glow::UNSIGNED_SHORT)),
    (PixelFormat::R16G16Sint, f(glow::RG16I, glow::RG_INTEGER, glow::SHORT)),
    (PixelFormat::R16G16Sfloat, f(glow::RG16F, glow::RG, glow::HALF_FLOAT)),
    (
        PixelFormat::R16G16B16A16Uint,
        f(glow::RGBA16UI, glow::RGBA_INTEGER, glow::UNSIGNED_SHORT),
    ),
    (PixelFormat::R16G16B16A16Sint, f(glow::RGBA16I, glow::RGBA_INTEGER, glow::SHORT)),
    (PixelFormat::R16G16B16A16Sfloat, f(glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT)),
    (PixelFormat::R32Uint, f(glow::R32UI, glow::RED_INTEGER, glow::UNSIGNED_INT)),
    (PixelFormat::R32Sint, f(glow::R32I, glow::RED_INTEGER, glow::INT)),
    (PixelFormat::R32Sfloat, f(glow::R32F, glow::RED, glow::FLOAT)),
    (PixelFormat::R32G32Uint, f(glow::RG32UI, glow::RG_INTEGER, glow::UNSIGNED_INT)),
    (PixelFormat::R32G32Sint, f(glow::RG32I, glow::RG_INTEGER, glow::INT)),
    (PixelFormat::R32G32Sfloat, f(glow::RG32F, glow::RG, glow::FLOAT)),
    (
        PixelFormat::R32G32B32A32Uint,
        f(glow::RGBA32UI, glow::RGBA_INTEGER, glow::UNSIGNED_INT),
    ),
    (PixelFormat::R32G32B32A32Sint, f(glow::RGBA32I, glow::RGBA_INTEGER, glow::INT)),
    (PixelFormat::R32G32B32A32Sfloat, f(glow::RGBA32F, glow::RGBA, glow::FLOAT)),
    (PixelFormat::R5G6B5Unorm, f(glow::RGB565, glow::RGB, glow::UNSIGNED_SHORT_5_6_5)),
];

static ADDRESS: &[(Address, u32)] = &[
    (Address::ClampToEdge, glow::CLAMP_TO_EDGE),
    (Address::ClampToBorder, glow::CLAMP_TO_BORDER),
    (Address::Repeat, glow::REPEAT),
    (Address::MirroredRepeat, glow::MIRRORED_REPEAT),
    (Address::MirrorClampToEdge, glow::MIRROR_CLAMP_TO_EDGE),
];

pub fn gl_format(format: PixelFormat) -> GlFormat {
    FORMATS
        .iter()
        .find(|(p, _)| *p == format)
        .map(|(_, gl)| *gl)
        .unwrap_or(f(glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE))
}

pub fn gl_address(address: Address) -> u32 {
    ADDRESS
        .iter()
        .find(|(a, _)| *a == address)
        .map(|(_, gl)| *gl)
        .unwrap_or(glow::CLAMP_TO_EDGE)
}

pub fn gl_mag_filter(filter: Filter) -> u32 {
    match filter {
        Filter::Nearest => glow::NEAREST,
        Filter::Linear => glow::LINEAR,
    }
}

pub fn gl_min_filter(filter: Filter, mip: Filter) -> u32 {
    match (filter, mip) {
        (Filter::Nearest, Filter::Nearest) => glow::NEAREST_MIPMAP_NEAREST,
        (Filter::Nearest, Filter::Linear) => glow::NEAREST_MIPMAP_LINEAR,
        (Filter::Linear, Filter::Nearest) => glow::LINEAR_MIPMAP_NEAREST,
        (Filter::Linear, Filter::Linear) => glow::LINEAR_MIPMAP_LINEAR,
    }
}
