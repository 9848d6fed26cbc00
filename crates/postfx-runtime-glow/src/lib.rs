//! OpenGL 3.3 core backend for the postfx filter chain.
//
// SPIR-V is translated to GLSL 330 with naga at program creation. The
// `GlCoreVideo` driver owns the context-side state: streamed input textures,
// the active chain and the final viewport. Window and swap handling stay
// with the host.
#![allow(clippy::missing_safety_doc)]

mod backend;
mod driver;
mod formats;
mod program;
mod quad;
mod samplers;
mod target;
mod viewport;

pub use backend::GlBackend;
pub use driver::{FrameFormat, GlCoreVideo, VideoFrame, NUM_STREAMED_TEXTURES};
pub use formats::{gl_address, gl_format, gl_mag_filter, gl_min_filter, GlFormat};
pub use program::{translate, GlProgram, PushConstantItem, PushConstantKind, StageSource};
pub use target::{create_render_target, create_texture};
pub use viewport::{compute_viewport, final_pass_mvp, ViewportPolicy};

pub use postfx_core::ChainError;
