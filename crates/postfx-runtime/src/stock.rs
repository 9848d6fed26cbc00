//! Built-in shaders, compiled to SPIR-V by `build.rs`.

use postfx_core::{Address, Filter, PassInfo, ScalePolicy};
use postfx_reflect::{BlockKind, RawReflection};

/// An embedded shader with its reflection.
#[derive(Debug)]
pub struct StockShader {
    pub name: &'static str,
    vertex: &'static [u8],
    fragment: &'static [u8],
}

/// Samples `Source` at binding 2 through the quad transformed by `MVP`.
pub static OPAQUE: StockShader = StockShader {
    name: "opaque",
    vertex: include_bytes!(concat!(env!("OUT_DIR"), "/opaque.vert.spv")),
    fragment: include_bytes!(concat!(env!("OUT_DIR"), "/opaque.frag.spv")),
};

impl StockShader {
    pub fn vertex(&self) -> Vec<u32> {
        bytemuck::pod_collect_to_vec(self.vertex)
    }

    pub fn fragment(&self) -> Vec<u32> {
        bytemuck::pod_collect_to_vec(self.fragment)
    }

    pub fn reflection(&self) -> RawReflection {
        RawReflection::new()
            .with_ubo(0, 64)
            .member("MVP", BlockKind::Ubo, 0, 16)
            .texture("Source", 2)
    }
}

/// Final pass that scales its source to the viewport.
pub fn blit_pass_info(filter: Filter) -> PassInfo {
    PassInfo {
        scale_x: ScalePolicy::Viewport(1.0),
        scale_y: ScalePolicy::Viewport(1.0),
        rt_format: None,
        source_filter: filter,
        mip_filter: Filter::Nearest,
        address: Address::ClampToEdge,
        max_levels: 1,
        frame_count_period: 0,
        name: None,
    }
}
