use std::collections::HashSet;

use glow::HasContext;
use postfx_core::{ChainError, PixelFormat, Size2D};
use postfx_reflect::ShaderReflection;
use postfx_runtime::{DrawCall, DrawTarget, GpuBackend, RgbaImage, Texture};

use crate::formats::gl_format;
use crate::program::{translate, GlProgram};
use crate::quad::Quads;
use crate::samplers::SamplerCache;
use crate::target::{create_render_target, create_texture};

/// [`GpuBackend`] over an OpenGL 3.3 core context.
pub struct GlBackend {
    gl: glow::Context,
    quads: Quads,
    samplers: SamplerCache,
    /// Scratch read framebuffer for texture copies.
    read_fbo: glow::NativeFramebuffer,
    srgb_targets: HashSet<glow::NativeFramebuffer>,
}

impl std::fmt::Debug for GlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlBackend")
            .field("quads", &self.quads)
            .field("samplers", &self.samplers.len())
            .field("read_fbo", &self.read_fbo)
            .finish()
    }
}

impl GlBackend {
    /// # Safety
    /// `gl` must be current on the calling thread for the lifetime of the backend.
    pub unsafe fn new(gl: glow::Context) -> Result<Self, ChainError> {
        let quads = Quads::new(&gl)?;
        let read_fbo = match gl.create_framebuffer() {
            Ok(fbo) => fbo,
            Err(e) => {
                quads.destroy(&gl);
                return Err(ChainError::resource(format!("create_framebuffer failed: {e}")));
            }
        };
        Ok(Self {
            gl,
            quads,
            samplers: SamplerCache::default(),
            read_fbo,
            srgb_targets: HashSet::new(),
        })
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Releases backend-internal objects and hands the context back.
    pub fn destroy(mut self) -> glow::Context {
        unsafe {
            self.samplers.destroy(&self.gl);
            self.quads.destroy(&self.gl);
            self.gl.delete_framebuffer(self.read_fbo);
        }
        self.gl
    }
}

impl GpuBackend for GlBackend {
    type Image = glow::NativeTexture;
    type Target = glow::NativeFramebuffer;
    type Program = GlProgram;
    type Buffer = glow::NativeBuffer;

    fn create_framebuffer(
        &mut self,
        size: Size2D,
        format: PixelFormat,
        levels: u32,
    ) -> Result<(Self::Image, Self::Target), ChainError> {
        let (tex, fbo) = unsafe { create_render_target(&self.gl, size, format, levels)? };
        if format.is_srgb() {
            self.srgb_targets.insert(fbo);
        }
        Ok((tex, fbo))
    }

    fn delete_framebuffer(&mut self, image: Self::Image, target: Self::Target) {
        self.srgb_targets.remove(&target);
        unsafe {
            self.gl.delete_framebuffer(target);
            self.gl.delete_texture(image);
        }
    }

    fn clear_target(&mut self, target: Self::Target, size: Size2D) {
        let gl = &self.gl;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(target));
            gl.viewport(0, 0, size.width as i32, size.height as i32);
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    fn copy_image(&mut self, src: &Texture<Self::Image>, dst: Self::Target, dst_size: Size2D) {
        let gl = &self.gl;
        let filter = if src.size == dst_size {
            glow::NEAREST
        } else {
            glow::LINEAR
        };
        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(self.read_fbo));
            gl.framebuffer_texture_2d(
                glow::READ_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(src.image),
                0,
            );
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(dst));
            gl.blit_framebuffer(
                0,
                0,
                src.size.width as i32,
                src.size.height as i32,
                0,
                0,
                dst_size.width as i32,
                dst_size.height as i32,
                glow::COLOR_BUFFER_BIT,
                filter,
            );
            gl.framebuffer_texture_2d(
                glow::READ_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        }
    }

    fn generate_mips(&mut self, image: Self::Image) {
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(image));
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn upload_image(&mut self, image: &RgbaImage, levels: u32) -> Result<Self::Image, ChainError> {
        let gl = &self.gl;
        let format = gl_format(PixelFormat::R8G8B8A8Unorm);
        unsafe {
            let tex = create_texture(gl, image.size, PixelFormat::R8G8B8A8Unorm, levels)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                image.size.width as i32,
                image.size.height as i32,
                format.format,
                format.ty,
                glow::PixelUnpackData::Slice(&image.pixels),
            );
            if levels > 1 {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(tex)
        }
    }

    fn delete_image(&mut self, image: Self::Image) {
        unsafe { self.gl.delete_texture(image) }
    }

    fn create_program(
        &mut self,
        vertex: &[u32],
        fragment: &[u32],
        _reflection: &ShaderReflection,
    ) -> Result<Self::Program, ChainError> {
        let vs = translate(vertex, naga::ShaderStage::Vertex)?;
        let fs = translate(fragment, naga::ShaderStage::Fragment)?;
        unsafe { GlProgram::new(&self.gl, &vs, &fs) }
    }

    fn delete_program(&mut self, program: Self::Program) {
        unsafe { program.destroy(&self.gl) }
    }

    fn create_uniform_buffer(&mut self, size: usize) -> Result<Self::Buffer, ChainError> {
        let gl = &self.gl;
        unsafe {
            let buffer = gl
                .create_buffer()
                .map_err(|e| ChainError::resource(format!("create_buffer failed: {e}")))?;
            gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
            gl.buffer_data_size(glow::UNIFORM_BUFFER, size as i32, glow::STREAM_DRAW);
            gl.bind_buffer(glow::UNIFORM_BUFFER, None);
            Ok(buffer)
        }
    }

    fn delete_uniform_buffer(&mut self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) {
        let mut samplers = Vec::with_capacity(call.textures.len());
        for binding in call.textures {
            let t = binding.texture;
            match unsafe { self.samplers.get(&self.gl, t.filter, t.mip_filter, t.address) } {
                Ok(sampler) => samplers.push((binding.binding, t.image, sampler)),
                Err(e) => tracing::error!(error = %e, binding = binding.binding, "no sampler"),
            }
        }

        let gl = &self.gl;
        unsafe {
            let srgb = match call.target {
                DrawTarget::Framebuffer { target, size } => {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(target));
                    gl.viewport(0, 0, size.width as i32, size.height as i32);
                    gl.clear_color(0.0, 0.0, 0.0, 0.0);
                    gl.clear(glow::COLOR_BUFFER_BIT);
                    self.srgb_targets.contains(&target)
                }
                DrawTarget::Viewport(vp) => {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                    gl.viewport(vp.x, vp.y, vp.width as i32, vp.height as i32);
                    false
                }
            };
            if srgb {
                gl.enable(glow::FRAMEBUFFER_SRGB);
            }
            gl.disable(glow::BLEND);

            gl.use_program(Some(call.program.program));
            if let Some(ubo) = call.uniforms {
                gl.bind_buffer(glow::UNIFORM_BUFFER, Some(ubo.buffer));
                gl.buffer_sub_data_u8_slice(glow::UNIFORM_BUFFER, 0, ubo.data);
                gl.bind_buffer(glow::UNIFORM_BUFFER, None);
                gl.bind_buffer_base(glow::UNIFORM_BUFFER, ubo.binding, Some(ubo.buffer));
            }
            call.program.upload_push_constants(gl, call.push_constants);

            for (unit, image, sampler) in &samplers {
                gl.active_texture(glow::TEXTURE0 + unit);
                gl.bind_texture(glow::TEXTURE_2D, Some(*image));
                gl.bind_sampler(*unit, Some(*sampler));
            }

            match call.target {
                DrawTarget::Framebuffer { .. } => self.quads.draw_offscreen(gl),
                DrawTarget::Viewport(_) => self.quads.draw_unit(gl),
            }

            for (unit, _, _) in &samplers {
                gl.active_texture(glow::TEXTURE0 + unit);
                gl.bind_texture(glow::TEXTURE_2D, None);
                gl.bind_sampler(*unit, None);
            }
            gl.active_texture(glow::TEXTURE0);
            gl.use_program(None);
            if srgb {
                gl.disable(glow::FRAMEBUFFER_SRGB);
            }
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }
}
