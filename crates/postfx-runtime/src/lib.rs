//! Backend-agnostic multi-pass filter chain.
//!
//! A [`FilterChain`] owns its passes, their framebuffers, the input history and the
//! lookup textures. All GPU work goes through a [`GpuBackend`]; the chain never talks
//! to a graphics API directly.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

mod backend;
mod chain;
mod commands;
mod common;
mod framebuffer;
mod history;
mod images;
mod pass;
mod preset_loader;
pub mod stock;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backend::{DrawCall, DrawTarget, GpuBackend, Texture, TextureBinding, UniformUpload};
pub use chain::{ChainCreateInfo, ChainState, FilterChain};
pub use commands::{CommandList, DeferredOp, SyncPools};
pub use common::{CommonResources, FrameInputs, StaticTexture};
pub use framebuffer::Framebuffer;
pub use history::HistoryRing;
pub use images::{FileImageLoader, ImageLoader, RgbaImage};
pub use pass::{Pass, PassShader, IDENTITY_MVP};

pub use postfx_core::ChainError;
