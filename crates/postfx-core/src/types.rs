use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::format::PixelFormat;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size2D {
    pub width: u32,
    pub height: u32,
}

impl Size2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Component-wise maximum.
    pub fn max(self, other: Size2D) -> Size2D {
        Size2D::new(self.width.max(other.width), self.height.max(other.height))
    }

    /// `vec4(w, h, 1/w, 1/h)` as consumed by `*Size` shader uniforms.
    pub fn to_vec4(self) -> [f32; 4] {
        let w = self.width.max(1) as f32;
        let h = self.height.max(1) as f32;
        [w, h, 1.0 / w, 1.0 / h]
    }

    /// Number of mip levels of a full chain for this size.
    pub fn mip_levels(self) -> u32 {
        let largest = self.width.max(self.height).max(1);
        32 - largest.leading_zeros()
    }
}

/// Presentation rectangle inside the window, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn size(&self) -> Size2D {
        Size2D::new(self.width, self.height)
    }
}

/// Texel filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

/// Texture addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Address {
    ClampToEdge,
    #[default]
    ClampToBorder,
    Repeat,
    MirroredRepeat,
    MirrorClampToEdge,
}

impl Address {
    /// Parses a preset `wrap_mode` value. Unknown names fall back to clamp-to-edge.
    pub fn from_wrap_mode(name: &str) -> Address {
        match name {
            "clamp_to_border" => Address::ClampToBorder,
            "clamp_to_edge" => Address::ClampToEdge,
            "repeat" => Address::Repeat,
            "mirrored_repeat" => Address::MirroredRepeat,
            "mirror_clamp_to_edge" => Address::MirrorClampToEdge,
            _ => Address::ClampToEdge,
        }
    }

    pub fn wrap_mode_name(self) -> &'static str {
        match self {
            Address::ClampToBorder => "clamp_to_border",
            Address::ClampToEdge => "clamp_to_edge",
            Address::Repeat => "repeat",
            Address::MirroredRepeat => "mirrored_repeat",
            Address::MirrorClampToEdge => "mirror_clamp_to_edge",
        }
    }
}

/// How one axis of a pass output is sized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalePolicy {
    /// Same as the original frame.
    Original,
    /// Multiple of the previous pass output.
    Source(f32),
    /// Multiple of the final viewport.
    Viewport(f32),
    /// Fixed pixel count.
    Absolute(u32),
}

impl Default for ScalePolicy {
    fn default() -> Self {
        ScalePolicy::Source(1.0)
    }
}

impl ScalePolicy {
    /// Resolves one axis. Results are rounded to nearest and never below 1.
    pub fn apply(self, original: u32, source: u32, viewport: u32) -> u32 {
        let scaled = |base: u32, factor: f32| -> u32 {
            let v = (base as f32 * factor).round();
            if v.is_finite() && v >= 1.0 {
                // Saturating float-to-int cast.
                v as u32
            } else {
                1
            }
        };
        match self {
            ScalePolicy::Original => original.max(1),
            ScalePolicy::Source(f) => scaled(source, f),
            ScalePolicy::Viewport(f) => scaled(viewport, f),
            ScalePolicy::Absolute(n) => n.max(1),
        }
    }

    /// A zero or negative factor can never produce a meaningful target.
    pub fn is_valid(self) -> bool {
        match self {
            ScalePolicy::Original => true,
            ScalePolicy::Source(f) | ScalePolicy::Viewport(f) => f.is_finite() && f > 0.0,
            ScalePolicy::Absolute(n) => n > 0,
        }
    }
}

/// Per-pass configuration fixed at chain build time.
#[derive(Debug, Clone, PartialEq)]
pub struct PassInfo {
    pub scale_x: ScalePolicy,
    pub scale_y: ScalePolicy,
    /// Render target format; `None` selects the swapchain format.
    pub rt_format: Option<PixelFormat>,
    pub source_filter: Filter,
    pub mip_filter: Filter,
    pub address: Address,
    /// Upper bound on the framebuffer mip count. `u32::MAX` is unbounded.
    pub max_levels: u32,
    /// `FrameCount` is reduced modulo this when nonzero.
    pub frame_count_period: u32,
    /// Alias exposing this pass output to later passes.
    pub name: Option<String>,
}

impl Default for PassInfo {
    fn default() -> Self {
        Self {
            scale_x: ScalePolicy::default(),
            scale_y: ScalePolicy::default(),
            rt_format: None,
            source_filter: Filter::Linear,
            mip_filter: Filter::Nearest,
            address: Address::ClampToBorder,
            max_levels: 1,
            frame_count_period: 0,
            name: None,
        }
    }
}

impl PassInfo {
    /// Output size for the given inputs.
    pub fn output_size(&self, original: Size2D, source: Size2D, viewport: Size2D) -> Size2D {
        Size2D::new(
            self.scale_x
                .apply(original.width, source.width, viewport.width),
            self.scale_y
                .apply(original.height, source.height, viewport.height),
        )
    }

    pub fn validate(&self, index: usize) -> Result<(), ChainError> {
        for (axis, policy) in [("x", self.scale_x), ("y", self.scale_y)] {
            if !policy.is_valid() {
                return Err(ChainError::Pass {
                    index,
                    msg: format!("invalid {axis} scale {policy:?}"),
                });
            }
        }
        Ok(())
    }
}
