use std::fmt;

use postfx_core::{Address, ChainError, Filter, PixelFormat, Size2D, Viewport};
use postfx_reflect::ShaderReflection;

use crate::images::RgbaImage;

/// A sampled view of an image: the image handle plus how it is read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Texture<I> {
    pub image: I,
    pub size: Size2D,
    pub format: PixelFormat,
    pub filter: Filter,
    pub mip_filter: Filter,
    pub address: Address,
}

impl<I: Copy> Texture<I> {
    pub fn new(image: I, size: Size2D, format: PixelFormat) -> Self {
        Self {
            image,
            size,
            format,
            filter: Filter::Linear,
            mip_filter: Filter::Nearest,
            address: Address::ClampToEdge,
        }
    }

    /// Same image, sampled differently.
    pub fn with_sampling(self, filter: Filter, mip_filter: Filter, address: Address) -> Self {
        Self {
            filter,
            mip_filter,
            address,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureBinding<I> {
    pub binding: u32,
    pub texture: Texture<I>,
}

/// Where a pass draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawTarget<T> {
    /// Offscreen framebuffer; cleared, then covered by the `[-1, 1]` quad.
    Framebuffer { target: T, size: Size2D },
    /// Presentation surface; the `[0, 1]` quad transformed by the caller's MVP.
    Viewport(Viewport),
}

/// UBO contents for one draw.
#[derive(Debug, Clone, Copy)]
pub struct UniformUpload<'a, Buf> {
    pub buffer: Buf,
    pub binding: u32,
    pub data: &'a [u8],
}

/// Everything a backend needs to record one full-screen pass.
pub struct DrawCall<'a, B: GpuBackend + ?Sized> {
    pub program: &'a B::Program,
    pub target: DrawTarget<B::Target>,
    pub uniforms: Option<UniformUpload<'a, B::Buffer>>,
    pub push_constants: &'a [u8],
    pub textures: &'a [TextureBinding<B::Image>],
}

impl<B: GpuBackend + ?Sized> fmt::Debug for DrawCall<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCall")
            .field("program", self.program)
            .field("target", &self.target)
            .field("uniforms", &self.uniforms)
            .field("push_constants", &self.push_constants.len())
            .field("textures", &self.textures)
            .finish()
    }
}

/// GPU operations the filter chain is built on.
///
/// Implementations own the graphics context. Handles are plain values; the chain
/// decides when they are released, deferring deletion of anything a frame in flight
/// may still read.
pub trait GpuBackend {
    type Image: Copy + PartialEq + fmt::Debug;
    type Target: Copy + PartialEq + fmt::Debug;
    type Program: fmt::Debug;
    type Buffer: Copy + PartialEq + fmt::Debug;

    /// Allocates a renderable image with `levels` mip levels and a target writing level 0.
    fn create_framebuffer(
        &mut self,
        size: Size2D,
        format: PixelFormat,
        levels: u32,
    ) -> Result<(Self::Image, Self::Target), ChainError>;
    fn delete_framebuffer(&mut self, image: Self::Image, target: Self::Target);

    /// Clears to transparent black.
    fn clear_target(&mut self, target: Self::Target, size: Size2D);

    /// Copies level 0 of `src` into `dst`, scaling if sizes differ.
    fn copy_image(&mut self, src: &Texture<Self::Image>, dst: Self::Target, dst_size: Size2D);

    fn generate_mips(&mut self, image: Self::Image);

    /// Uploads an RGBA8 image, generating mips when `levels > 1`.
    fn upload_image(&mut self, image: &RgbaImage, levels: u32) -> Result<Self::Image, ChainError>;
    fn delete_image(&mut self, image: Self::Image);

    /// Builds a native program from SPIR-V.
    fn create_program(
        &mut self,
        vertex: &[u32],
        fragment: &[u32],
        reflection: &ShaderReflection,
    ) -> Result<Self::Program, ChainError>;
    fn delete_program(&mut self, program: Self::Program);

    fn create_uniform_buffer(&mut self, size: usize) -> Result<Self::Buffer, ChainError>;
    fn delete_uniform_buffer(&mut self, buffer: Self::Buffer);

    fn draw(&mut self, call: &DrawCall<'_, Self>);
}
