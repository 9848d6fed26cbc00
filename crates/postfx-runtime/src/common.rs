use std::fmt;

use postfx_preset::ShaderPreset;
use postfx_reflect::{TextureRef, TextureSemantic};

use crate::backend::{GpuBackend, Texture};

/// A lookup texture loaded from the preset.
pub struct StaticTexture<B: GpuBackend> {
    pub id: String,
    pub texture: Texture<B::Image>,
}

impl<B: GpuBackend> fmt::Debug for StaticTexture<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTexture")
            .field("id", &self.id)
            .field("texture", &self.texture)
            .finish()
    }
}

/// The two textures every pass receives besides the shared resources.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<I> {
    pub original: Texture<I>,
    pub source: Texture<I>,
}

/// State shared by all passes of a chain, handed to each pass per call.
pub struct CommonResources<B: GpuBackend> {
    /// `OriginalHistoryN` textures; index 0 mirrors the current frame.
    pub original_history: Vec<Texture<B::Image>>,
    /// Previous-frame output per pass, `None` for passes without feedback.
    pub framebuffer_feedback: Vec<Option<Texture<B::Image>>>,
    /// This frame's outputs, filled as passes execute.
    pub pass_outputs: Vec<Option<Texture<B::Image>>>,
    pub luts: Vec<StaticTexture<B>>,
    pub preset: Option<ShaderPreset>,
}

impl<B: GpuBackend> Default for CommonResources<B> {
    fn default() -> Self {
        Self {
            original_history: Vec::new(),
            framebuffer_feedback: Vec::new(),
            pass_outputs: Vec::new(),
            luts: Vec::new(),
            preset: None,
        }
    }
}

impl<B: GpuBackend> fmt::Debug for CommonResources<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommonResources")
            .field("original_history", &self.original_history.len())
            .field("framebuffer_feedback", &self.framebuffer_feedback)
            .field("pass_outputs", &self.pass_outputs)
            .field("luts", &self.luts)
            .field("preset", &self.preset.is_some())
            .finish()
    }
}

impl<B: GpuBackend> CommonResources<B> {
    /// Current value of merged parameter `index`; 0 when the chain has no such parameter.
    pub fn parameter_value(&self, index: usize) -> f32 {
        self.preset
            .as_ref()
            .and_then(|p| p.parameters.get(index))
            .map(|p| p.current)
            .unwrap_or(0.0)
    }

    pub fn lookup(
        &self,
        inputs: &FrameInputs<B::Image>,
        texture: TextureRef,
    ) -> Option<Texture<B::Image>> {
        let i = texture.index;
        match texture.semantic {
            TextureSemantic::Original => Some(inputs.original),
            TextureSemantic::Source => Some(inputs.source),
            TextureSemantic::OriginalHistory if i == 0 => Some(inputs.original),
            TextureSemantic::OriginalHistory => self.original_history.get(i).copied(),
            TextureSemantic::PassOutput => self.pass_outputs.get(i).copied().flatten(),
            TextureSemantic::PassFeedback => self.framebuffer_feedback.get(i).copied().flatten(),
            TextureSemantic::User => self.luts.get(i).map(|l| l.texture),
        }
    }

    /// Deletes LUT images.
    pub fn destroy(&mut self, backend: &mut B) {
        for lut in self.luts.drain(..) {
            backend.delete_image(lut.texture.image);
        }
        self.original_history.clear();
        self.framebuffer_feedback.clear();
        self.pass_outputs.clear();
    }
}
