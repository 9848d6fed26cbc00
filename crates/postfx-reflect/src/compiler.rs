use std::path::Path;

use postfx_core::{CompileError, PixelFormat};
use serde::{Deserialize, Serialize};

/// Which block a reflected member lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Ubo,
    PushConstant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLayout {
    pub binding: u32,
    /// Size in bytes.
    pub size: usize,
}

/// A uniform block member as declared by the shader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMember {
    pub name: String,
    pub block: BlockKind,
    /// Byte offset inside the block.
    pub offset: usize,
    /// Number of 32-bit scalars (16 for a mat4, 4 for a vec4).
    pub components: u32,
}

/// A combined texture/sampler resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTexture {
    pub name: String,
    pub binding: u32,
}

/// Resources of one pass, merged over its vertex and fragment stages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawReflection {
    #[serde(default)]
    pub ubo: Option<BlockLayout>,
    #[serde(default)]
    pub push_constant_size: Option<usize>,
    #[serde(default)]
    pub members: Vec<RawMember>,
    #[serde(default)]
    pub textures: Vec<RawTexture>,
}

impl RawReflection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ubo(mut self, binding: u32, size: usize) -> Self {
        self.ubo = Some(BlockLayout { binding, size });
        self
    }

    pub fn with_push_constants(mut self, size: usize) -> Self {
        self.push_constant_size = Some(size);
        self
    }

    pub fn member(mut self, name: &str, block: BlockKind, offset: usize, components: u32) -> Self {
        self.members.push(RawMember {
            name: name.to_string(),
            block,
            offset,
            components,
        });
        self
    }

    pub fn texture(mut self, name: &str, binding: u32) -> Self {
        self.textures.push(RawTexture {
            name: name.to_string(),
            binding,
        });
        self
    }
}

/// A `#pragma parameter` declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMeta {
    pub id: String,
    pub desc: String,
    pub initial: f32,
    pub minimum: f32,
    pub maximum: f32,
    pub step: f32,
}

/// Output of the shader front-end for one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShader {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
    pub reflection: RawReflection,
    pub parameters: Vec<ParameterMeta>,
    /// `#pragma format`.
    pub rt_format: Option<PixelFormat>,
    /// `#pragma name`.
    pub name: Option<String>,
}

/// Turns a shader source path into SPIR-V plus reflection.
pub trait ShaderCompiler {
    fn compile(&self, path: &Path) -> Result<CompiledShader, CompileError>;
}
