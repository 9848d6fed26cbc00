use std::fs;
use std::path::{Path, PathBuf};

use postfx_core::{CompileError, PixelFormat};
use serde::Deserialize;

use crate::compiler::{CompiledShader, ParameterMeta, RawReflection, ShaderCompiler};

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug, Deserialize)]
struct ShaderMeta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    parameters: Vec<ParameterMeta>,
    reflection: RawReflection,
}

/// Loads shaders compiled offline.
///
/// For `dir/crt.slang` it reads `dir/crt.vert.spv`, `dir/crt.frag.spv` and
/// `dir/crt.meta.json` (reflection, parameters, `name` and `format`).
#[derive(Debug, Default, Clone, Copy)]
pub struct PrecompiledCompiler;

fn source_error(path: &Path, msg: impl Into<String>) -> CompileError {
    CompileError::Source {
        path: path.to_path_buf(),
        msg: msg.into(),
    }
}

fn read_spirv(path: &Path) -> Result<Vec<u32>, CompileError> {
    let bytes = fs::read(path).map_err(|e| source_error(path, e.to_string()))?;
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(source_error(
            path,
            format!("{} bytes is not a whole number of SPIR-V words", bytes.len()),
        ));
    }
    let words: Vec<u32> = bytemuck::pod_collect_to_vec(&bytes);
    if words[0] != SPIRV_MAGIC {
        return Err(source_error(path, format!("bad SPIR-V magic 0x{:08x}", words[0])));
    }
    Ok(words)
}

impl PrecompiledCompiler {
    fn artifact(path: &Path, suffix: &str) -> PathBuf {
        path.with_extension(suffix)
    }
}

impl ShaderCompiler for PrecompiledCompiler {
    fn compile(&self, path: &Path) -> Result<CompiledShader, CompileError> {
        let vertex = read_spirv(&Self::artifact(path, "vert.spv"))?;
        let fragment = read_spirv(&Self::artifact(path, "frag.spv"))?;

        let meta_path = Self::artifact(path, "meta.json");
        let text =
            fs::read_to_string(&meta_path).map_err(|e| source_error(&meta_path, e.to_string()))?;
        let meta: ShaderMeta =
            serde_json::from_str(&text).map_err(|e| source_error(&meta_path, e.to_string()))?;

        let rt_format = match meta.format.as_deref() {
            None => None,
            Some(name) => Some(PixelFormat::from_name(name).ok_or_else(|| {
                source_error(&meta_path, format!("unknown format `{name}`"))
            })?),
        };

        tracing::debug!(
            shader = %path.display(),
            vertex_words = vertex.len(),
            fragment_words = fragment.len(),
            "loaded precompiled shader"
        );

        Ok(CompiledShader {
            vertex,
            fragment,
            reflection: meta.reflection,
            parameters: meta.parameters,
            rt_format,
            name: meta.name,
        })
    }
}
