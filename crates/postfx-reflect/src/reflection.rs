use std::collections::HashSet;

use postfx_core::ReflectError;

use crate::compiler::{BlockKind, BlockLayout, RawReflection};
use crate::semantics::{SemanticMap, TextureRef, TextureSemantic, UniformSemantic};

/// Highest texture/UBO binding a pass may use, exclusive.
pub const MAX_BINDINGS: u32 = 16;

/// Where a value is written: UBO offset, push-constant offset, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemberOffset {
    pub ubo: Option<usize>,
    pub push: Option<usize>,
}

impl MemberOffset {
    fn set(&mut self, block: BlockKind, offset: usize) {
        match block {
            BlockKind::Ubo => self.ubo = Some(offset),
            BlockKind::PushConstant => self.push = Some(offset),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBinding {
    pub semantic: UniformSemantic,
    pub offset: MemberOffset,
}

/// A `vec4` size uniform for a texture semantic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSizeBinding {
    pub texture: TextureRef,
    pub offset: MemberOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    pub texture: TextureRef,
    pub binding: u32,
}

/// Resolved resources of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderReflection {
    pub ubo: Option<BlockLayout>,
    pub push_constant_size: usize,
    pub uniforms: Vec<UniformBinding>,
    pub texture_sizes: Vec<TextureSizeBinding>,
    pub textures: Vec<SamplerBinding>,
}

impl ShaderReflection {
    /// Every texture semantic the pass touches, sampled or size-only.
    pub fn texture_refs(&self) -> impl Iterator<Item = TextureRef> + '_ {
        self.textures
            .iter()
            .map(|t| t.texture)
            .chain(self.texture_sizes.iter().map(|t| t.texture))
    }

    /// Largest index referenced for an array semantic.
    pub fn max_index(&self, semantic: TextureSemantic) -> Option<usize> {
        self.texture_refs()
            .filter(|t| t.semantic == semantic)
            .map(|t| t.index)
            .max()
    }

    pub fn uses(&self, texture: TextureRef) -> bool {
        self.texture_refs().any(|t| t == texture)
    }
}

enum MemberTarget {
    Uniform(UniformSemantic),
    Size(TextureRef),
}

/// Position of the pass being reflected within its chain.
#[derive(Debug, Clone, Copy)]
pub struct ReflectContext {
    pub pass: usize,
    pub pass_count: usize,
    /// Exclusive bound on `OriginalHistoryN`.
    pub max_history: usize,
}

fn check_texture(
    ctx: &ReflectContext,
    map: &SemanticMap,
    texture: TextureRef,
) -> Result<(), ReflectError> {
    let pass = ctx.pass;
    match texture.semantic {
        TextureSemantic::PassOutput if texture.index >= pass => {
            Err(ReflectError::ForwardReference {
                pass,
                referenced: texture.index,
            })
        }
        TextureSemantic::PassFeedback if texture.index >= ctx.pass_count => {
            Err(ReflectError::FeedbackOutOfRange {
                pass,
                referenced: texture.index,
            })
        }
        TextureSemantic::User if texture.index >= map.lut_count() => {
            Err(ReflectError::UserOutOfRange {
                pass,
                index: texture.index,
                count: map.lut_count(),
            })
        }
        TextureSemantic::OriginalHistory if texture.index >= ctx.max_history => {
            Err(ReflectError::HistoryTooDeep {
                pass,
                index: texture.index,
                max: ctx.max_history,
            })
        }
        _ => Ok(()),
    }
}

/// Maps raw shader resources onto chain semantics.
///
/// Every member and texture must resolve. A name present in both blocks gets both
/// offsets.
pub fn reflect(
    raw: &RawReflection,
    map: &SemanticMap,
    ctx: ReflectContext,
) -> Result<ShaderReflection, ReflectError> {
    let pass = ctx.pass;
    let mut out = ShaderReflection {
        ubo: raw.ubo,
        push_constant_size: raw.push_constant_size.unwrap_or(0),
        ..ShaderReflection::default()
    };

    let mut bindings = HashSet::new();
    if let Some(ubo) = raw.ubo {
        if ubo.binding >= MAX_BINDINGS {
            return Err(ReflectError::BindingOutOfRange {
                pass,
                binding: ubo.binding,
                max: MAX_BINDINGS,
            });
        }
        bindings.insert(ubo.binding);
    }

    for member in &raw.members {
        let block_size = match member.block {
            BlockKind::Ubo => raw.ubo.map(|b| b.size).unwrap_or(0),
            BlockKind::PushConstant => raw.push_constant_size.unwrap_or(0),
        };

        let (expected, target) = if let Some(semantic) = map.resolve_uniform(&member.name) {
            (semantic.components(), MemberTarget::Uniform(semantic))
        } else if let Some(texture) = map.resolve_texture_size(&member.name) {
            check_texture(&ctx, map, texture)?;
            (4, MemberTarget::Size(texture))
        } else {
            return Err(ReflectError::UnknownUniform {
                pass,
                name: member.name.clone(),
            });
        };

        if member.components != expected {
            return Err(ReflectError::TypeMismatch {
                pass,
                name: member.name.clone(),
                expected,
                found: member.components,
            });
        }
        if member.offset + expected as usize * 4 > block_size {
            return Err(ReflectError::OffsetOutOfBounds {
                pass,
                name: member.name.clone(),
                offset: member.offset,
                size: block_size,
            });
        }

        match target {
            MemberTarget::Uniform(semantic) => {
                match out.uniforms.iter_mut().find(|u| u.semantic == semantic) {
                    Some(u) => u.offset.set(member.block, member.offset),
                    None => {
                        let mut offset = MemberOffset::default();
                        offset.set(member.block, member.offset);
                        out.uniforms.push(UniformBinding { semantic, offset });
                    }
                }
            }
            MemberTarget::Size(texture) => {
                match out.texture_sizes.iter_mut().find(|t| t.texture == texture) {
                    Some(t) => t.offset.set(member.block, member.offset),
                    None => {
                        let mut offset = MemberOffset::default();
                        offset.set(member.block, member.offset);
                        out.texture_sizes
                            .push(TextureSizeBinding { texture, offset });
                    }
                }
            }
        }
    }

    for tex in &raw.textures {
        let texture =
            map.resolve_texture(&tex.name)
                .ok_or_else(|| ReflectError::UnknownTexture {
                    pass,
                    name: tex.name.clone(),
                })?;
        if tex.binding >= MAX_BINDINGS {
            return Err(ReflectError::BindingOutOfRange {
                pass,
                binding: tex.binding,
                max: MAX_BINDINGS,
            });
        }
        if !bindings.insert(tex.binding) {
            return Err(ReflectError::BindingCollision {
                pass,
                binding: tex.binding,
            });
        }
        check_texture(&ctx, map, texture)?;
        out.textures.push(SamplerBinding {
            texture,
            binding: tex.binding,
        });
    }

    Ok(out)
}
