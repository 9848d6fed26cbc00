#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

//! Shader preset model.
//!
//! A preset lists the passes of a filter chain, the lookup textures they sample and
//! user-tweakable parameter overrides. Files use the `key = "value"` format with
//! per-pass numeric suffixes (`shader0`, `scale_type1`, ...).

mod parse;
mod write;

use std::collections::BTreeMap;
use std::path::PathBuf;

use postfx_core::{Address, Filter, ScalePolicy};

pub use parse::parse_bool;

pub const MAX_PASSES: usize = 64;
pub const MAX_TEXTURES: usize = 64;
pub const MAX_PARAMETERS: usize = 128;

/// Parsed preset, plus the parameter list filled in by chain construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderPreset {
    pub passes: Vec<PassConfig>,
    pub textures: Vec<LutConfig>,
    /// Merged `#pragma parameter` declarations of every pass, in first-seen order.
    pub parameters: Vec<ShaderParameter>,
    /// Values listed under `parameters` in the file, by id.
    pub overrides: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassConfig {
    pub source: PathBuf,
    pub alias: Option<String>,
    /// `None` when the preset leaves the choice to the driver.
    pub filter: Option<Filter>,
    pub wrap: Address,
    pub mipmap_input: bool,
    pub frame_count_mod: u32,
    /// Explicit output sizing; `None` means the pass was not given any `scale_type`.
    pub fbo: Option<FboScale>,
    pub float_framebuffer: bool,
    pub srgb_framebuffer: bool,
}

impl PassConfig {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            alias: None,
            filter: None,
            wrap: Address::default(),
            mipmap_input: false,
            frame_count_mod: 0,
            fbo: None,
            float_framebuffer: false,
            srgb_framebuffer: false,
        }
    }
}

/// Declared framebuffer sizing. Never uses [`ScalePolicy::Original`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FboScale {
    pub x: ScalePolicy,
    pub y: ScalePolicy,
}

/// Lookup texture declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct LutConfig {
    pub id: String,
    pub path: PathBuf,
    pub filter: Filter,
    pub wrap: Address,
    pub mipmap: bool,
}

/// A tweakable shader constant shared by id across passes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParameter {
    pub id: String,
    pub desc: String,
    pub initial: f32,
    pub minimum: f32,
    pub maximum: f32,
    pub step: f32,
    pub current: f32,
}

impl ShaderPreset {
    pub fn parameter(&self, id: &str) -> Option<&ShaderParameter> {
        self.parameters.iter().find(|p| p.id == id)
    }

    pub fn parameter_index(&self, id: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.id == id)
    }

    /// Sets `current` of a parameter. Returns false for unknown ids.
    pub fn set_parameter(&mut self, id: &str, value: f32) -> bool {
        match self.parameters.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.current = value;
                true
            }
            None => false,
        }
    }

    /// Applies file overrides onto the merged parameter list.
    pub fn resolve_current_parameters(&mut self) {
        for (id, value) in &self.overrides {
            match self.parameters.iter_mut().find(|p| &p.id == id) {
                Some(p) => p.current = *value,
                None => tracing::warn!(
                    parameter = %id,
                    "parameter is set in the preset, but no shader uses it"
                ),
            }
        }
    }
}
