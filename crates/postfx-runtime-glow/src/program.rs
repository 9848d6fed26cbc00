//! SPIR-V to GLSL cross-compilation and program linking.

use glow::HasContext;
use naga::back::glsl;
use postfx_core::{ChainError, CompileError};

const GLSL_VERSION: glsl::Version = glsl::Version::Desktop(330);

/// GLSL for one stage plus what the GL side has to wire up after linking.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSource {
    pub glsl: String,
    /// Uniform block name and its SPIR-V binding.
    pub blocks: Vec<(String, u32)>,
    /// Sampler uniform name and its SPIR-V binding, used as texture unit.
    pub samplers: Vec<(String, u32)>,
    pub push_constants: Vec<PushConstantItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushConstantKind {
    Float(u8),
    Uint,
    Int,
    Mat4,
}

/// A push-constant member lowered to a plain uniform.
#[derive(Debug, Clone, PartialEq)]
pub struct PushConstantItem {
    pub name: String,
    pub offset: usize,
    pub kind: PushConstantKind,
}

fn push_kind(inner: &naga::TypeInner) -> Option<PushConstantKind> {
    use naga::{ScalarKind, TypeInner, VectorSize};
    match *inner {
        TypeInner::Scalar(s) => match s.kind {
            ScalarKind::Float => Some(PushConstantKind::Float(1)),
            ScalarKind::Uint => Some(PushConstantKind::Uint),
            ScalarKind::Sint => Some(PushConstantKind::Int),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => {
            let n = match size {
                VectorSize::Bi => 2,
                VectorSize::Tri => 3,
                VectorSize::Quad => 4,
            };
            Some(PushConstantKind::Float(n))
        }
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => Some(PushConstantKind::Mat4),
        _ => None,
    }
}

/// Translates one SPIR-V stage to GLSL 330.
pub fn translate(words: &[u32], stage: naga::ShaderStage) -> Result<StageSource, CompileError> {
    let options = naga::front::spv::Options {
        adjust_coordinate_space: false,
        ..Default::default()
    };
    let module = naga::front::spv::parse_u8_slice(bytemuck::cast_slice(words), &options)
        .map_err(|e| CompileError::Translate(e.to_string()))?;
    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| CompileError::Translate(format!("{e:?}")))?;

    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage)
        .map(|ep| ep.name.clone())
        .ok_or_else(|| CompileError::Translate(format!("no {stage:?} entry point")))?;

    let mut glsl_source = String::new();
    let options = glsl::Options {
        version: GLSL_VERSION,
        writer_flags: glsl::WriterFlags::empty(),
        ..Default::default()
    };
    let pipeline = glsl::PipelineOptions {
        shader_stage: stage,
        entry_point,
        multiview: None,
    };
    let mut writer = glsl::Writer::new(
        &mut glsl_source,
        &module,
        &info,
        &options,
        &pipeline,
        naga::proc::BoundsCheckPolicies::default(),
    )
    .map_err(|e| CompileError::Translate(e.to_string()))?;
    let reflection = writer
        .write()
        .map_err(|e| CompileError::Translate(e.to_string()))?;

    let binding_of = |handle: naga::Handle<naga::GlobalVariable>| {
        module.global_variables[handle]
            .binding
            .as_ref()
            .map(|b| b.binding)
    };

    let mut blocks: Vec<(String, u32)> = reflection
        .uniforms
        .iter()
        .filter_map(|(handle, name)| binding_of(*handle).map(|b| (name.clone(), b)))
        .collect();
    blocks.sort();

    let mut samplers: Vec<(String, u32)> = reflection
        .texture_mapping
        .iter()
        .filter_map(|(name, mapping)| binding_of(mapping.texture).map(|b| (name.clone(), b)))
        .collect();
    samplers.sort();

    let push_constants = reflection
        .push_constant_items
        .iter()
        .filter_map(|item| {
            let kind = push_kind(&module.types[item.ty].inner);
            if kind.is_none() {
                tracing::warn!(member = %item.access_path, "unsupported push constant type");
            }
            kind.map(|kind| PushConstantItem {
                name: item.access_path.clone(),
                offset: item.offset as usize,
                kind,
            })
        })
        .collect();

    Ok(StageSource {
        glsl: glsl_source,
        blocks,
        samplers,
        push_constants,
    })
}

/// Compiles and links a vertex/fragment pair.
pub unsafe fn compile_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> Result<glow::NativeProgram, ChainError> {
    let vs = gl
        .create_shader(glow::VERTEX_SHADER)
        .map_err(|e| ChainError::resource(format!("create_shader(VS) failed: {e}")))?;
    gl.shader_source(vs, vert_src);
    gl.compile_shader(vs);
    if !gl.get_shader_compile_status(vs) {
        let log = gl.get_shader_info_log(vs);
        gl.delete_shader(vs);
        return Err(CompileError::Vertex(log).into());
    }

    let fs = match gl.create_shader(glow::FRAGMENT_SHADER) {
        Ok(fs) => fs,
        Err(e) => {
            gl.delete_shader(vs);
            return Err(ChainError::resource(format!("create_shader(FS) failed: {e}")));
        }
    };
    gl.shader_source(fs, frag_src);
    gl.compile_shader(fs);
    if !gl.get_shader_compile_status(fs) {
        let log = gl.get_shader_info_log(fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        return Err(CompileError::Fragment(log).into());
    }

    let program = match gl.create_program() {
        Ok(p) => p,
        Err(e) => {
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(ChainError::resource(format!("create_program failed: {e}")));
        }
    };
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);

    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(CompileError::Link(log).into());
    }

    Ok(program)
}

#[derive(Debug)]
struct PushConstantSlot {
    location: glow::NativeUniformLocation,
    offset: usize,
    kind: PushConstantKind,
}

/// A linked pass program with its push-constant uniforms resolved.
#[derive(Debug)]
pub struct GlProgram {
    pub(crate) program: glow::NativeProgram,
    push_constants: Vec<PushConstantSlot>,
}

impl GlProgram {
    /// Links both stages and binds uniform blocks and samplers to their SPIR-V
    /// binding numbers.
    pub unsafe fn new(
        gl: &glow::Context,
        vertex: &StageSource,
        fragment: &StageSource,
    ) -> Result<Self, ChainError> {
        let program = compile_program(gl, &vertex.glsl, &fragment.glsl)?;

        gl.use_program(Some(program));
        for (name, binding) in vertex.blocks.iter().chain(&fragment.blocks) {
            if let Some(index) = gl.get_uniform_block_index(program, name) {
                gl.uniform_block_binding(program, index, *binding);
            }
        }
        for (name, binding) in vertex.samplers.iter().chain(&fragment.samplers) {
            if let Some(location) = gl.get_uniform_location(program, name) {
                gl.uniform_1_i32(Some(&location), *binding as i32);
            }
        }
        gl.use_program(None);

        let push_constants = vertex
            .push_constants
            .iter()
            .chain(&fragment.push_constants)
            .filter_map(|item| {
                gl.get_uniform_location(program, &item.name)
                    .map(|location| PushConstantSlot {
                        location,
                        offset: item.offset,
                        kind: item.kind,
                    })
            })
            .collect();

        Ok(Self {
            program,
            push_constants,
        })
    }

    /// Uploads the push-constant block. Requires the program to be bound.
    pub unsafe fn upload_push_constants(&self, gl: &glow::Context, data: &[u8]) {
        for slot in &self.push_constants {
            let floats = |n: usize| -> Option<Vec<f32>> {
                let bytes = data.get(slot.offset..slot.offset + n * 4)?;
                Some(bytemuck::pod_collect_to_vec(bytes))
            };
            let location = Some(&slot.location);
            match slot.kind {
                PushConstantKind::Float(n) => {
                    if let Some(v) = floats(usize::from(n)) {
                        match n {
                            1 => gl.uniform_1_f32_slice(location, &v),
                            2 => gl.uniform_2_f32_slice(location, &v),
                            3 => gl.uniform_3_f32_slice(location, &v),
                            _ => gl.uniform_4_f32_slice(location, &v),
                        }
                    }
                }
                PushConstantKind::Mat4 => {
                    if let Some(v) = floats(16) {
                        gl.uniform_matrix_4_f32_slice(location, false, &v);
                    }
                }
                PushConstantKind::Uint => {
                    if let Some(bytes) = data.get(slot.offset..slot.offset + 4) {
                        gl.uniform_1_u32(location, bytemuck::pod_read_unaligned(bytes));
                    }
                }
                PushConstantKind::Int => {
                    if let Some(bytes) = data.get(slot.offset..slot.offset + 4) {
                        gl.uniform_1_i32(location, bytemuck::pod_read_unaligned(bytes));
                    }
                }
            }
        }
    }

    pub unsafe fn destroy(self, gl: &glow::Context) {
        gl.delete_program(self.program);
    }
}
