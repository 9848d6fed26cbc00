//! Recording backend and canned compiler for tests.
//!
//! `MockBackend` hands out `u32` handles and models every image as a single
//! `content` stamp: a draw stamps its target with a fresh serial, a copy forwards the
//! source stamp, a clear resets it to 0. That is enough to observe history, feedback
//! lag and pass ordering without a GPU.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use postfx_core::{ChainError, CompileError, PixelFormat, Size2D, Viewport};
use postfx_reflect::{
    BlockKind, CompiledShader, ParameterMeta, RawReflection, ShaderCompiler, ShaderReflection,
};

use crate::backend::{DrawCall, DrawTarget, GpuBackend, Texture};
use crate::images::{ImageLoader, RgbaImage};

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug, Clone, PartialEq)]
pub struct MockImageInfo {
    pub size: Size2D,
    pub format: PixelFormat,
    pub levels: u32,
    pub content: u64,
    pub mips_generated: u32,
}

/// A bound texture as seen at draw time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundInput {
    pub binding: u32,
    pub texture: Texture<u32>,
    pub content: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub serial: u64,
    pub program: u32,
    pub target: DrawTarget<u32>,
    pub ubo: Option<Vec<u8>>,
    pub push_constants: Vec<u8>,
    pub inputs: Vec<BoundInput>,
}

impl RecordedDraw {
    pub fn input(&self, binding: u32) -> Option<&BoundInput> {
        self.inputs.iter().find(|i| i.binding == binding)
    }

    /// Reads a little-endian `f32` from the uniform block.
    pub fn ubo_f32(&self, offset: usize) -> Option<f32> {
        let bytes = self.ubo.as_ref()?.get(offset..offset + 4)?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn ubo_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.ubo.as_ref()?.get(offset..offset + 4)?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn push_f32(&self, offset: usize) -> Option<f32> {
        let bytes = self.push_constants.get(offset..offset + 4)?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    /// Size of the framebuffer or viewport drawn into.
    pub fn target_size(&self) -> Size2D {
        match self.target {
            DrawTarget::Framebuffer { size, .. } => size,
            DrawTarget::Viewport(vp) => vp.size(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    next_handle: u32,
    serial: u64,
    pub images: HashMap<u32, MockImageInfo>,
    /// Render target -> image it writes.
    pub targets: HashMap<u32, u32>,
    pub programs: HashMap<u32, ShaderReflection>,
    pub buffers: HashMap<u32, Vec<u8>>,
    pub draws: Vec<RecordedDraw>,
    /// Serials of draws into the presentation target.
    pub presented: Vec<u64>,
    pub copies: usize,
    pub clears: usize,
    pub fail_framebuffers: bool,
    pub fail_programs: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    /// A caller-owned input frame stamped with `content`.
    pub fn create_input(&mut self, size: Size2D, content: u64) -> Texture<u32> {
        let image = self.handle();
        self.images.insert(
            image,
            MockImageInfo {
                size,
                format: PixelFormat::R8G8B8A8Unorm,
                levels: 1,
                content,
                mips_generated: 0,
            },
        );
        Texture::new(image, size, PixelFormat::R8G8B8A8Unorm)
    }

    pub fn set_content(&mut self, image: u32, content: u64) {
        if let Some(info) = self.images.get_mut(&image) {
            info.content = content;
        }
    }

    pub fn image(&self, image: u32) -> Option<&MockImageInfo> {
        self.images.get(&image)
    }

    pub fn target_image(&self, target: u32) -> Option<&MockImageInfo> {
        self.targets.get(&target).and_then(|i| self.images.get(i))
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn last_draw(&self) -> Option<&RecordedDraw> {
        self.draws.last()
    }
}

impl GpuBackend for MockBackend {
    type Image = u32;
    type Target = u32;
    type Program = u32;
    type Buffer = u32;

    fn create_framebuffer(
        &mut self,
        size: Size2D,
        format: PixelFormat,
        levels: u32,
    ) -> Result<(u32, u32), ChainError> {
        if self.fail_framebuffers {
            return Err(ChainError::resource("mock framebuffer allocation refused"));
        }
        let image = self.handle();
        let target = self.handle();
        self.images.insert(
            image,
            MockImageInfo {
                size,
                format,
                levels,
                content: 0,
                mips_generated: 0,
            },
        );
        self.targets.insert(target, image);
        Ok((image, target))
    }

    fn delete_framebuffer(&mut self, image: u32, target: u32) {
        self.images.remove(&image);
        self.targets.remove(&target);
    }

    fn clear_target(&mut self, target: u32, _size: Size2D) {
        self.clears += 1;
        if let Some(image) = self.targets.get(&target).copied() {
            self.set_content(image, 0);
        }
    }

    fn copy_image(&mut self, src: &Texture<u32>, dst: u32, _dst_size: Size2D) {
        self.copies += 1;
        let content = self.image(src.image).map(|i| i.content).unwrap_or(0);
        if let Some(image) = self.targets.get(&dst).copied() {
            self.set_content(image, content);
        }
    }

    fn generate_mips(&mut self, image: u32) {
        if let Some(info) = self.images.get_mut(&image) {
            info.mips_generated += 1;
        }
    }

    fn upload_image(&mut self, image: &RgbaImage, levels: u32) -> Result<u32, ChainError> {
        let handle = self.handle();
        self.images.insert(
            handle,
            MockImageInfo {
                size: image.size,
                format: PixelFormat::R8G8B8A8Unorm,
                levels,
                content: image.pixels.first().copied().map(u64::from).unwrap_or(0),
                mips_generated: u32::from(levels > 1),
            },
        );
        Ok(handle)
    }

    fn delete_image(&mut self, image: u32) {
        self.images.remove(&image);
    }

    fn create_program(
        &mut self,
        _vertex: &[u32],
        _fragment: &[u32],
        reflection: &ShaderReflection,
    ) -> Result<u32, ChainError> {
        if self.fail_programs {
            return Err(CompileError::Link("mock program creation refused".into()).into());
        }
        let handle = self.handle();
        self.programs.insert(handle, reflection.clone());
        Ok(handle)
    }

    fn delete_program(&mut self, program: u32) {
        self.programs.remove(&program);
    }

    fn create_uniform_buffer(&mut self, size: usize) -> Result<u32, ChainError> {
        let handle = self.handle();
        self.buffers.insert(handle, vec![0; size]);
        Ok(handle)
    }

    fn delete_uniform_buffer(&mut self, buffer: u32) {
        self.buffers.remove(&buffer);
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) {
        self.serial += 1;
        let serial = self.serial;

        let inputs = call
            .textures
            .iter()
            .map(|t| BoundInput {
                binding: t.binding,
                texture: t.texture,
                content: self.image(t.texture.image).map(|i| i.content).unwrap_or(0),
            })
            .collect();

        let ubo = call.uniforms.map(|u| {
            if let Some(buffer) = self.buffers.get_mut(&u.buffer) {
                let len = buffer.len().min(u.data.len());
                buffer[..len].copy_from_slice(&u.data[..len]);
            }
            u.data.to_vec()
        });

        match call.target {
            DrawTarget::Framebuffer { target, .. } => {
                if let Some(image) = self.targets.get(&target).copied() {
                    self.set_content(image, serial);
                }
            }
            DrawTarget::Viewport(_) => self.presented.push(serial),
        }

        self.draws.push(RecordedDraw {
            serial,
            program: *call.program,
            target: call.target,
            ubo,
            push_constants: call.push_constants.to_vec(),
            inputs,
        });
    }
}

/// UBO at binding 0 with `MVP` at offset 0 and `Source` at binding 2.
pub fn passthrough_reflection() -> RawReflection {
    RawReflection::new()
        .with_ubo(0, 64)
        .member("MVP", BlockKind::Ubo, 0, 16)
        .texture("Source", 2)
}

pub fn fake_shader(reflection: RawReflection) -> CompiledShader {
    CompiledShader {
        vertex: vec![SPIRV_MAGIC, 0x0001_0000],
        fragment: vec![SPIRV_MAGIC, 0x0001_0000],
        reflection,
        parameters: Vec::new(),
        rt_format: None,
        name: None,
    }
}

pub fn parameter(id: &str, initial: f32, minimum: f32, maximum: f32, step: f32) -> ParameterMeta {
    ParameterMeta {
        id: id.to_string(),
        desc: id.to_string(),
        initial,
        minimum,
        maximum,
        step,
    }
}

/// Maps shader file names to canned compiler output.
#[derive(Debug, Default, Clone)]
pub struct FakeCompiler {
    shaders: HashMap<String, CompiledShader>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shader(mut self, file_name: &str, shader: CompiledShader) -> Self {
        self.shaders.insert(file_name.to_string(), shader);
        self
    }
}

impl ShaderCompiler for FakeCompiler {
    fn compile(&self, path: &Path) -> Result<CompiledShader, CompileError> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.shaders.get(n))
            .cloned()
            .ok_or_else(|| CompileError::Source {
                path: path.to_path_buf(),
                msg: "no canned shader for this file".into(),
            })
    }
}

/// Returns a solid image per requested path; unknown paths fail like a missing file.
#[derive(Debug, Default, Clone)]
pub struct MockImageLoader {
    images: HashMap<String, RgbaImage>,
    pub requested: std::cell::RefCell<Vec<PathBuf>>,
}

impl MockImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, file_name: &str, size: Size2D, fill: u8) -> Self {
        let len = size.width as usize * size.height as usize * 4;
        self.images.insert(
            file_name.to_string(),
            RgbaImage {
                size,
                pixels: vec![fill; len],
            },
        );
        self
    }
}

impl ImageLoader for MockImageLoader {
    fn load_rgba8(&self, path: &Path) -> Result<RgbaImage, ChainError> {
        self.requested.borrow_mut().push(path.to_path_buf());
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.images.get(n))
            .cloned()
            .ok_or_else(|| ChainError::Image {
                path: path.to_path_buf(),
                msg: "not found".into(),
            })
    }
}

/// The full-window viewport used by most tests.
pub fn viewport(width: u32, height: u32) -> Viewport {
    Viewport::new(0, 0, width, height)
}
