use std::fmt;

use postfx_core::{ChainError, PassInfo, PixelFormat, Size2D, Viewport};
use postfx_reflect::{
    reflect, MemberOffset, RawReflection, ReflectContext, SemanticMap, ShaderReflection,
    UniformSemantic,
};

use crate::backend::{DrawCall, DrawTarget, GpuBackend, Texture, TextureBinding, UniformUpload};
use crate::commands::{CommandList, DeferredOp};
use crate::common::{CommonResources, FrameInputs};
use crate::framebuffer::Framebuffer;

pub const IDENTITY_MVP: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// SPIR-V and raw reflection for one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassShader {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
    pub reflection: RawReflection,
}

fn write_bytes(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    if let Some(dst) = buf.get_mut(offset..offset + bytes.len()) {
        dst.copy_from_slice(bytes);
    }
}

fn write_member(ubo: &mut [u8], push: &mut [u8], offset: MemberOffset, bytes: &[u8]) {
    if let Some(o) = offset.ubo {
        write_bytes(ubo, o, bytes);
    }
    if let Some(o) = offset.push {
        write_bytes(push, o, bytes);
    }
}

/// One render pass: program, output framebuffer, optional feedback framebuffer and
/// per-sync-index uniform buffers.
pub struct Pass<B: GpuBackend> {
    index: usize,
    final_pass: bool,
    info: PassInfo,
    shader: Option<PassShader>,
    reflection: ShaderReflection,
    program: Option<B::Program>,
    framebuffer: Option<Framebuffer<B>>,
    feedback: Option<Framebuffer<B>>,
    max_size: Size2D,
    current_size: Size2D,
    frame_count: u64,
    ubos: Vec<B::Buffer>,
    sync_index: usize,
    ubo_data: Vec<u8>,
    push_data: Vec<u8>,
    bindings: Vec<TextureBinding<B::Image>>,
}

impl<B: GpuBackend> fmt::Debug for Pass<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("index", &self.index)
            .field("final_pass", &self.final_pass)
            .field("info", &self.info)
            .field("framebuffer", &self.framebuffer)
            .field("feedback", &self.feedback)
            .field("current_size", &self.current_size)
            .finish()
    }
}

impl<B: GpuBackend> Pass<B> {
    pub fn new(index: usize, final_pass: bool) -> Self {
        Self {
            index,
            final_pass,
            info: PassInfo::default(),
            shader: None,
            reflection: ShaderReflection::default(),
            program: None,
            framebuffer: None,
            feedback: None,
            max_size: Size2D::new(1, 1),
            current_size: Size2D::new(1, 1),
            frame_count: 0,
            ubos: Vec::new(),
            sync_index: 0,
            ubo_data: Vec::new(),
            push_data: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn info(&self) -> &PassInfo {
        &self.info
    }

    pub fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    /// Size of the last rendered output.
    pub fn current_size(&self) -> Size2D {
        self.current_size
    }

    pub fn output_size(&self, original: Size2D, source: Size2D, viewport: Size2D) -> Size2D {
        self.info.output_size(original, source, viewport)
    }

    /// Stores the configuration and returns the largest size this pass can render,
    /// which bounds the next pass's source.
    pub fn set_pass_info(
        &mut self,
        max_original: Size2D,
        max_source: Size2D,
        max_viewport: Size2D,
        info: PassInfo,
    ) -> Size2D {
        self.info = info;
        self.max_size = self.output_size(max_original, max_source, max_viewport);
        self.current_size = self.max_size;
        self.max_size
    }

    pub fn set_shader(&mut self, shader: PassShader) {
        self.shader = Some(shader);
    }

    pub fn set_frame_count(&mut self, count: u64) {
        self.frame_count = count;
    }

    pub fn frame_count_value(&self) -> u32 {
        let count = match self.info.frame_count_period {
            0 => self.frame_count,
            period => self.frame_count % u64::from(period),
        };
        count as u32
    }

    pub fn reflect(&mut self, map: &SemanticMap, ctx: ReflectContext) -> Result<(), ChainError> {
        let shader = self.shader.as_ref().ok_or_else(|| ChainError::Pass {
            index: self.index,
            msg: "no shader set".into(),
        })?;
        self.reflection = reflect(&shader.reflection, map, ctx)?;
        Ok(())
    }

    /// Creates the program, output framebuffer and uniform buffers. Partially created
    /// resources stay owned by the pass and are released by [`Pass::destroy`].
    pub fn build(
        &mut self,
        backend: &mut B,
        swapchain_format: PixelFormat,
        num_sync_indices: usize,
    ) -> Result<(), ChainError> {
        self.info.validate(self.index)?;
        let shader = self.shader.as_ref().ok_or_else(|| ChainError::Pass {
            index: self.index,
            msg: "no shader set".into(),
        })?;

        self.program = Some(backend.create_program(
            &shader.vertex,
            &shader.fragment,
            &self.reflection,
        )?);

        if !self.final_pass {
            let format = self.info.rt_format.unwrap_or(swapchain_format);
            self.framebuffer = Some(Framebuffer::new(
                backend,
                self.max_size,
                format,
                self.info.max_levels,
            )?);
        }

        self.ubo_data = vec![0; self.reflection.ubo.map(|u| u.size).unwrap_or(0)];
        self.push_data = vec![0; self.reflection.push_constant_size];
        self.grow_ubos(backend, num_sync_indices.max(1))
    }

    /// Allocates the second framebuffer sampled as `PassFeedbackN`.
    pub fn init_feedback(&mut self, backend: &mut B) -> Result<(), ChainError> {
        if self.final_pass {
            return Err(ChainError::FeedbackOnFinalPass { index: self.index });
        }
        let Some(fb) = &self.framebuffer else {
            return Err(ChainError::Pass {
                index: self.index,
                msg: "feedback requested before build".into(),
            });
        };
        self.feedback = Some(Framebuffer::new(
            backend,
            fb.size(),
            fb.format(),
            self.info.max_levels,
        )?);
        Ok(())
    }

    fn grow_ubos(&mut self, backend: &mut B, count: usize) -> Result<(), ChainError> {
        let Some(ubo) = self.reflection.ubo else {
            return Ok(());
        };
        while self.ubos.len() < count {
            self.ubos.push(backend.create_uniform_buffer(ubo.size)?);
        }
        Ok(())
    }

    /// Surplus buffers may still be read by a frame in flight, so they are queued on
    /// `retired` instead of deleted.
    pub fn set_num_sync_indices(
        &mut self,
        backend: &mut B,
        retired: &mut CommandList<B>,
        count: usize,
    ) -> Result<(), ChainError> {
        let count = count.max(1);
        while self.ubos.len() > count {
            if let Some(buffer) = self.ubos.pop() {
                retired.push(DeferredOp::DeleteUniformBuffer(buffer));
            }
        }
        self.grow_ubos(backend, count)?;
        if self.sync_index >= count {
            self.sync_index = 0;
        }
        Ok(())
    }

    pub fn notify_sync_index(&mut self, index: usize) {
        if !self.ubos.is_empty() {
            self.sync_index = index % self.ubos.len();
        }
    }

    pub fn framebuffer(&self) -> Option<&Framebuffer<B>> {
        self.framebuffer.as_ref()
    }

    pub fn clear_feedback(&self, backend: &mut B) {
        if let Some(fb) = &self.feedback {
            fb.clear(backend);
        }
    }

    fn fill_uniforms(
        &mut self,
        common: &CommonResources<B>,
        inputs: &FrameInputs<B::Image>,
        viewport: Size2D,
        mvp: &[f32; 16],
    ) {
        let frame_count = self.frame_count_value();
        for uniform in &self.reflection.uniforms {
            let (ubo, push) = (&mut self.ubo_data[..], &mut self.push_data[..]);
            match uniform.semantic {
                UniformSemantic::Mvp => {
                    write_member(ubo, push, uniform.offset, bytemuck::cast_slice(mvp))
                }
                UniformSemantic::OutputSize => write_member(
                    ubo,
                    push,
                    uniform.offset,
                    bytemuck::cast_slice(&self.current_size.to_vec4()),
                ),
                UniformSemantic::FinalViewportSize => write_member(
                    ubo,
                    push,
                    uniform.offset,
                    bytemuck::cast_slice(&viewport.to_vec4()),
                ),
                UniformSemantic::FrameCount => {
                    write_member(ubo, push, uniform.offset, bytemuck::bytes_of(&frame_count))
                }
                UniformSemantic::FloatParameter(i) => write_member(
                    ubo,
                    push,
                    uniform.offset,
                    bytemuck::bytes_of(&common.parameter_value(i)),
                ),
            }
        }

        for size in &self.reflection.texture_sizes {
            if let Some(texture) = common.lookup(inputs, size.texture) {
                write_member(
                    &mut self.ubo_data,
                    &mut self.push_data,
                    size.offset,
                    bytemuck::cast_slice(&texture.size.to_vec4()),
                );
            }
        }

        self.bindings.clear();
        for sampler in &self.reflection.textures {
            match common.lookup(inputs, sampler.texture) {
                Some(texture) => self.bindings.push(TextureBinding {
                    binding: sampler.binding,
                    texture,
                }),
                None => tracing::debug!(
                    pass = self.index,
                    texture = ?sampler.texture,
                    "texture not available this frame"
                ),
            }
        }
    }

    /// Renders the pass. Offscreen passes render into their framebuffer with an
    /// identity MVP; the final pass renders into `viewport` using `mvp`.
    pub fn build_commands(
        &mut self,
        backend: &mut B,
        common: &CommonResources<B>,
        retired: &mut CommandList<B>,
        inputs: FrameInputs<B::Image>,
        viewport: Viewport,
        mvp: Option<&[f32; 16]>,
    ) {
        if self.program.is_none() {
            tracing::warn!(pass = self.index, "pass executed before build");
            return;
        }

        let size = self.output_size(inputs.original.size, inputs.source.size, viewport.size());
        self.current_size = size;
        if let Some(fb) = &mut self.framebuffer {
            if let Err(e) = fb.set_size(backend, retired, size, None) {
                tracing::error!(pass = self.index, error = %e, ?size, "failed to resize pass output");
            }
            self.current_size = fb.size();
        }

        let mvp = if self.final_pass {
            mvp.unwrap_or(&IDENTITY_MVP)
        } else {
            &IDENTITY_MVP
        };
        self.fill_uniforms(common, &inputs, viewport.size(), mvp);

        let target = match &self.framebuffer {
            Some(fb) => DrawTarget::Framebuffer {
                target: fb.target(),
                size: fb.size(),
            },
            None => DrawTarget::Viewport(viewport),
        };
        let uniforms = match (self.reflection.ubo, self.ubos.get(self.sync_index)) {
            (Some(layout), Some(buffer)) => Some(UniformUpload {
                buffer: *buffer,
                binding: layout.binding,
                data: &self.ubo_data,
            }),
            _ => None,
        };
        let Some(program) = self.program.as_ref() else {
            return;
        };
        backend.draw(&DrawCall {
            program,
            target,
            uniforms,
            push_constants: &self.push_data,
            textures: &self.bindings,
        });

        if let Some(fb) = &self.framebuffer {
            fb.generate_mips(backend);
        }
    }

    /// This frame's output, sampled the way `consumer` reads its source.
    pub fn output_texture(&self, consumer: &PassInfo) -> Option<Texture<B::Image>> {
        self.framebuffer.as_ref().map(|fb| {
            fb.texture(consumer.source_filter, consumer.mip_filter, consumer.address)
        })
    }

    /// Last frame's output, sampled the way `consumer` reads its source.
    pub fn feedback_texture(&self, consumer: &PassInfo) -> Option<Texture<B::Image>> {
        self.feedback.as_ref().map(|fb| {
            fb.texture(consumer.source_filter, consumer.mip_filter, consumer.address)
        })
    }

    /// Swaps output and feedback so this frame's output becomes next frame's feedback.
    pub fn end_frame(&mut self) {
        if self.feedback.is_some() {
            std::mem::swap(&mut self.framebuffer, &mut self.feedback);
        }
    }

    pub fn destroy(mut self, backend: &mut B) {
        for fb in [self.framebuffer.take(), self.feedback.take()].into_iter().flatten() {
            fb.destroy(backend);
        }
        for buffer in self.ubos.drain(..) {
            backend.delete_uniform_buffer(buffer);
        }
        if let Some(program) = self.program.take() {
            backend.delete_program(program);
        }
    }
}
