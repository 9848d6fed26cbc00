use serde::{Deserialize, Serialize};

/// Render target and texture formats.
///
/// Names follow the `#pragma format` spelling used by slang shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    R8Unorm,
    R8Uint,
    R8Sint,
    R8G8Unorm,
    R8G8Uint,
    R8G8Sint,
    R8G8B8A8Unorm,
    R8G8B8A8Uint,
    R8G8B8A8Sint,
    R8G8B8A8Srgb,
    A2B10G10R10UnormPack32,
    A2B10G10R10UintPack32,
    R16Uint,
    R16Sint,
    R16Sfloat,
    R16G16Uint,
    R16G16Sint,
    R16G16Sfloat,
    R16G16B16A16Uint,
    R16G16B16A16Sint,
    R16G16B16A16Sfloat,
    R32Uint,
    R32Sint,
    R32Sfloat,
    R32G32Uint,
    R32G32Sint,
    R32G32Sfloat,
    R32G32B32A32Uint,
    R32G32B32A32Sint,
    R32G32B32A32Sfloat,
    /// Core frames in RGB565; never a pass render target.
    R5G6B5Unorm,
}

const NAMES: &[(PixelFormat, &str)] = &[
    (PixelFormat::R8Unorm, "R8_UNORM"),
    (PixelFormat::R8Uint, "R8_UINT"),
    (PixelFormat::R8Sint, "R8_SINT"),
    (PixelFormat::R8G8Unorm, "R8G8_UNORM"),
    (PixelFormat::R8G8Uint, "R8G8_UINT"),
    (PixelFormat::R8G8Sint, "R8G8_SINT"),
    (PixelFormat::R8G8B8A8Unorm, "R8G8B8A8_UNORM"),
    (PixelFormat::R8G8B8A8Uint, "R8G8B8A8_UINT"),
    (PixelFormat::R8G8B8A8Sint, "R8G8B8A8_SINT"),
    (PixelFormat::R8G8B8A8Srgb, "R8G8B8A8_SRGB"),
    (PixelFormat::A2B10G10R10UnormPack32, "A2B10G10R10_UNORM_PACK32"),
    (PixelFormat::A2B10G10R10UintPack32, "A2B10G10R10_UINT_PACK32"),
    (PixelFormat::R16Uint, "R16_UINT"),
    (PixelFormat::R16Sint, "R16_SINT"),
    (PixelFormat::R16Sfloat, "R16_SFLOAT"),
    (PixelFormat::R16G16Uint, "R16G16_UINT"),
    (PixelFormat::R16G16Sint, "R16G16_SINT"),
    (PixelFormat::R16G16Sfloat, "R16G16_SFLOAT"),
    (PixelFormat::R16G16B16A16Uint, "R16G16B16A16_UINT"),
    (PixelFormat::R16G16B16A16Sint, "R16G16B16A16_SINT"),
    (PixelFormat::R16G16B16A16Sfloat, "R16G16B16A16_SFLOAT"),
    (PixelFormat::R32Uint, "R32_UINT"),
    (PixelFormat::R32Sint, "R32_SINT"),
    (PixelFormat::R32Sfloat, "R32_SFLOAT"),
    (PixelFormat::R32G32Uint, "R32G32_UINT"),
    (PixelFormat::R32G32Sint, "R32G32_SINT"),
    (PixelFormat::R32G32Sfloat, "R32G32_SFLOAT"),
    (PixelFormat::R32G32B32A32Uint, "R32G32B32A32_UINT"),
    (PixelFormat::R32G32B32A32Sint, "R32G32B32A32_SINT"),
    (PixelFormat::R32G32B32A32Sfloat, "R32G32B32A32_SFLOAT"),
    (PixelFormat::R5G6B5Unorm, "R5G6B5_UNORM"),
];

impl PixelFormat {
    pub fn from_name(name: &str) -> Option<PixelFormat> {
        NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(f, _)| *f)
    }

    pub fn name(self) -> &'static str {
        NAMES
            .iter()
            .find(|(f, _)| *f == self)
            .map(|(_, n)| *n)
            .unwrap_or("UNKNOWN")
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, PixelFormat::R8G8B8A8Srgb)
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
