#![forbid(unsafe_code)]

//! Shader reflection for postfx chains.
//!
//! This crate is contract-only: no GPU handles. It maps the raw resources a compiled
//! shader declares onto chain semantics (`Original`, `PassOutput3`, `MVP`, parameter
//! ids, ...) and analyses the resulting pass graph.
//!
//! The shading-language front-end is a black box behind [`ShaderCompiler`].
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

mod compiler;
mod plan;
mod precompiled;
mod reflection;
mod semantics;

pub use compiler::{
    BlockKind, BlockLayout, CompiledShader, ParameterMeta, RawMember, RawReflection, RawTexture,
    ShaderCompiler,
};
pub use plan::ChainPlan;
pub use precompiled::PrecompiledCompiler;
pub use reflection::{
    reflect, MemberOffset, ReflectContext, SamplerBinding, ShaderReflection, TextureSizeBinding,
    UniformBinding, MAX_BINDINGS,
};
pub use semantics::{SemanticMap, TextureRef, TextureSemantic, UniformSemantic};
