#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

//! postfx shared vocabulary.
//!
//! This crate is contract-only: sizes, sampling state, pixel formats, pass sizing
//! policies and the error type shared by every other crate in the workspace. It holds
//! no GPU handles.

pub mod config;
pub mod error;
pub mod format;
pub mod types;

pub use config::{load_typed_json, VideoConfig};
pub use error::{ChainError, CompileError, PresetError, ReflectError};
pub use format::PixelFormat;
pub use types::{Address, Filter, PassInfo, ScalePolicy, Size2D, Viewport};
