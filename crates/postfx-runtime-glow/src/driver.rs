use std::path::{Path, PathBuf};

use glow::HasContext;
use postfx_core::{ChainError, Filter, PixelFormat, Size2D, VideoConfig, Viewport};
use postfx_preset::{PassConfig, ShaderPreset};
use postfx_reflect::{PrecompiledCompiler, ShaderCompiler};
use postfx_runtime::{ChainCreateInfo, FileImageLoader, FilterChain, GpuBackend, Texture};

use crate::backend::GlBackend;
use crate::formats::gl_format;
use crate::target::create_texture;
use crate::viewport::{compute_viewport, final_pass_mvp, ViewportPolicy};

/// Core frames rotate through this many upload textures.
pub const NUM_STREAMED_TEXTURES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// 32-bit words, `0x00RRGGBB` in native byte order.
    Xrgb8888,
    Rgb565,
}

impl FrameFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            FrameFormat::Xrgb8888 => 4,
            FrameFormat::Rgb565 => 2,
        }
    }

    fn pixel_format(self) -> PixelFormat {
        match self {
            FrameFormat::Xrgb8888 => PixelFormat::R8G8B8A8Unorm,
            FrameFormat::Rgb565 => PixelFormat::R5G6B5Unorm,
        }
    }
}

/// One frame of core output. `pitch` is in bytes.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub pitch: usize,
    pub format: FrameFormat,
}

impl VideoFrame<'_> {
    pub fn size(&self) -> Size2D {
        Size2D::new(self.width, self.height)
    }

    fn validate(&self) -> Result<(), ChainError> {
        let bpp = self.format.bytes_per_pixel();
        if self.width == 0 || self.height == 0 {
            return Err(ChainError::resource("video frame has zero size"));
        }
        if self.pitch % bpp != 0 || self.pitch < self.width as usize * bpp {
            return Err(ChainError::resource(format!(
                "pitch {} does not fit {} pixels of {} bytes",
                self.pitch, self.width, bpp
            )));
        }
        let needed = required_len(self.width, self.height, self.pitch, bpp);
        if self.data.len() < needed {
            return Err(ChainError::resource(format!(
                "video frame holds {} bytes, {} needed",
                self.data.len(),
                needed
            )));
        }
        Ok(())
    }
}

/// Bytes covered by a frame with the last row trimmed to its visible width.
fn required_len(width: u32, height: u32, pitch: usize, bpp: usize) -> usize {
    pitch * (height as usize - 1) + width as usize * bpp
}

#[derive(Debug, Default)]
struct StreamedTexture {
    texture: Option<glow::NativeTexture>,
    size: Size2D,
    format: Option<FrameFormat>,
}

/// Video driver: streams core frames into textures and presents them
/// through a filter chain onto the default framebuffer.
pub struct GlCoreVideo {
    backend: GlBackend,
    chain: FilterChain<GlBackend>,
    config: VideoConfig,
    compiler: Box<dyn ShaderCompiler>,
    images: FileImageLoader,
    textures: [StreamedTexture; NUM_STREAMED_TEXTURES],
    texture_index: usize,
    frame_count: u64,
    viewport: Viewport,
    mvp: [f32; 16],
    preset_path: Option<PathBuf>,
}

impl std::fmt::Debug for GlCoreVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlCoreVideo")
            .field("backend", &self.backend)
            .field("chain", &self.chain)
            .field("texture_index", &self.texture_index)
            .field("frame_count", &self.frame_count)
            .field("viewport", &self.viewport)
            .field("preset_path", &self.preset_path)
            .finish()
    }
}

impl GlCoreVideo {
    /// Uses [`PrecompiledCompiler`] for shader sources.
    pub fn new(backend: GlBackend, config: VideoConfig, window: Size2D) -> Result<Self, ChainError> {
        Self::with_compiler(backend, config, window, Box::new(PrecompiledCompiler))
    }

    /// Builds the configured preset, or the stock chain when there is none or
    /// it fails to load.
    pub fn with_compiler(
        mut backend: GlBackend,
        config: VideoConfig,
        window: Size2D,
        compiler: Box<dyn ShaderCompiler>,
    ) -> Result<Self, ChainError> {
        let info = ChainCreateInfo {
            max_input_size: config.max_input_size,
            max_viewport_size: window,
            num_sync_indices: config.sync_indices.max(1),
            ..ChainCreateInfo::default()
        };
        let filter = stock_filter(&config);
        let images = FileImageLoader;
        let mut preset_path = config.shader_preset.clone();

        let chain = match build_chain(
            &mut backend,
            compiler.as_ref(),
            &images,
            preset_path.as_deref(),
            filter,
            info.clone(),
        ) {
            Ok(chain) => chain,
            Err(e) if preset_path.is_some() => {
                tracing::error!(error = %e, "failed to load shader preset, using stock chain");
                preset_path = None;
                FilterChain::create_default(&mut backend, filter, info)?
            }
            Err(e) => return Err(e),
        };
        tracing::info!(passes = chain.num_passes(), preset = ?preset_path, "video driver ready");

        let mvp = final_pass_mvp(config.rotation);
        Ok(Self {
            backend,
            chain,
            config,
            compiler,
            images,
            textures: Default::default(),
            texture_index: 0,
            frame_count: 0,
            viewport: Viewport::new(0, 0, window.width, window.height),
            mvp,
            preset_path,
        })
    }

    /// Swaps the active chain. `None` selects the stock chain. On failure the
    /// stock chain takes over and the error is returned.
    pub fn set_shader(&mut self, path: Option<&Path>) -> Result<(), ChainError> {
        let filter = stock_filter(&self.config);
        let info = self.chain.create_info().clone();
        let compiler = self.compiler.as_ref();
        let images = &self.images;
        let result = self
            .chain
            .replace_with(&mut self.backend, filter, |backend| {
                build_chain(backend, compiler, images, path, filter, info)
            });
        self.preset_path = match result {
            Ok(()) => path.map(Path::to_path_buf),
            Err(_) if self.chain.preset().is_none() => None,
            Err(_) => self.preset_path.take(),
        };
        result
    }

    pub fn set_rotation(&mut self, quarter_turns: u32) {
        self.config.rotation = quarter_turns % 4;
        self.mvp = final_pass_mvp(self.config.rotation);
    }

    pub fn set_keep_aspect(&mut self, keep_aspect: bool) {
        self.config.keep_aspect = keep_aspect;
    }

    pub fn set_integer_scale(&mut self, integer_scale: bool) {
        self.config.integer_scale = integer_scale;
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    pub fn current_preset(&self) -> Option<&ShaderPreset> {
        self.chain.preset()
    }

    pub fn current_preset_mut(&mut self) -> Option<&mut ShaderPreset> {
        self.chain.preset_mut()
    }

    pub fn preset_path(&self) -> Option<&Path> {
        self.preset_path.as_deref()
    }

    pub fn chain(&self) -> &FilterChain<GlBackend> {
        &self.chain
    }

    /// Viewport used by the most recent frame.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Uploads `frame` and renders one full chain iteration into the default
    /// framebuffer of a `window`-sized surface. Buffer swapping is left to the caller.
    pub fn frame(&mut self, frame: &VideoFrame<'_>, window: Size2D) -> Result<(), ChainError> {
        frame.validate()?;
        let sync_count = self.chain.create_info().num_sync_indices.max(1);
        let sync_index = (self.frame_count % sync_count as u64) as usize;
        self.chain.notify_sync_index(&mut self.backend, sync_index);

        let input = self.upload(frame)?;

        let policy = ViewportPolicy {
            keep_aspect: self.config.keep_aspect,
            integer_scale: self.config.integer_scale,
            aspect_ratio: self.config.aspect_ratio,
        };
        let frame_size = rotated(frame.size(), self.config.rotation);
        self.viewport = compute_viewport(window, frame_size, &policy);

        self.chain.set_frame_count(self.frame_count);
        self.chain.set_input_texture(input);
        self.chain.build_offscreen_passes(&mut self.backend, self.viewport);

        unsafe {
            let gl = self.backend.gl();
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, window.width as i32, window.height as i32);
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }

        self.chain.build_viewport_pass(&mut self.backend, self.viewport, &self.mvp);
        self.chain.end_frame();

        self.texture_index = (self.texture_index + 1) & (NUM_STREAMED_TEXTURES - 1);
        self.frame_count += 1;
        Ok(())
    }

    fn upload(&mut self, frame: &VideoFrame<'_>) -> Result<Texture<glow::NativeTexture>, ChainError> {
        let size = frame.size();
        let pixel_format = frame.format.pixel_format();
        let slot = &mut self.textures[self.texture_index];
        let gl = self.backend.gl();

        if slot.size != size || slot.format != Some(frame.format) {
            if let Some(old) = slot.texture.take() {
                self.chain.retire_image(old);
            }
            let texture = unsafe { create_texture(gl, size, pixel_format, 1)? };
            if frame.format == FrameFormat::Xrgb8888 {
                unsafe {
                    gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_SWIZZLE_R, glow::BLUE as i32);
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_SWIZZLE_B, glow::RED as i32);
                    gl.bind_texture(glow::TEXTURE_2D, None);
                }
            }
            tracing::debug!(index = self.texture_index, ?size, format = ?frame.format, "allocated streamed texture");
            slot.texture = Some(texture);
            slot.size = size;
            slot.format = Some(frame.format);
        }
        let Some(texture) = slot.texture else {
            return Err(ChainError::resource("streamed texture missing"));
        };

        let bpp = frame.format.bytes_per_pixel();
        let (upload_format, upload_ty) = match frame.format {
            FrameFormat::Xrgb8888 => (glow::RGBA, glow::UNSIGNED_BYTE),
            FrameFormat::Rgb565 => {
                let f = gl_format(pixel_format);
                (f.format, f.ty)
            }
        };
        let len = required_len(frame.width, frame.height, frame.pitch, bpp);
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, bpp as i32);
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, (frame.pitch / bpp) as i32);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                frame.width as i32,
                frame.height as i32,
                upload_format,
                upload_ty,
                glow::PixelUnpackData::Slice(&frame.data[..len]),
            );
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }

        let filter = self.chain.pass_info(0).map(|i| (i.source_filter, i.mip_filter, i.address));
        let texture = Texture::new(texture, size, pixel_format);
        Ok(match filter {
            Some((filter, mip, address)) => texture.with_sampling(filter, mip, address),
            None => texture,
        })
    }

    /// Tears down the chain and streamed textures and returns the context.
    pub fn destroy(mut self) -> glow::Context {
        self.chain.destroy(&mut self.backend);
        for slot in &mut self.textures {
            if let Some(texture) = slot.texture.take() {
                self.backend.delete_image(texture);
            }
        }
        self.backend.destroy()
    }
}

fn stock_filter(config: &VideoConfig) -> Filter {
    if config.smooth {
        Filter::Linear
    } else {
        Filter::Nearest
    }
}

/// Quarter-turn rotations swap the frame's axes for aspect purposes.
fn rotated(size: Size2D, rotation: u32) -> Size2D {
    if rotation % 2 == 1 {
        Size2D::new(size.height, size.width)
    } else {
        size
    }
}

/// `.slangp` loads a preset, `.slang` wraps a single shader in a one-pass preset.
fn build_chain(
    backend: &mut GlBackend,
    compiler: &dyn ShaderCompiler,
    images: &FileImageLoader,
    path: Option<&Path>,
    filter: Filter,
    info: ChainCreateInfo,
) -> Result<FilterChain<GlBackend>, ChainError> {
    let Some(path) = path else {
        return FilterChain::create_default(backend, filter, info);
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("slang") => {
            let preset = ShaderPreset {
                passes: vec![PassConfig::new(path)],
                ..ShaderPreset::default()
            };
            FilterChain::create_from_shader_preset(backend, compiler, images, preset, filter, info)
        }
        _ => FilterChain::create_from_preset(backend, compiler, images, path, filter, info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &[u8], width: u32, height: u32, pitch: usize, format: FrameFormat) -> VideoFrame<'_> {
        VideoFrame { data, width, height, pitch, format }
    }

    #[test]
    fn last_row_may_stop_at_visible_width() {
        assert_eq!(required_len(320, 240, 1280, 4), 1280 * 239 + 1280);
        assert_eq!(required_len(256, 224, 1024, 2), 1024 * 223 + 512);

        let data = vec![0u8; 1024 * 223 + 512];
        assert!(frame(&data, 256, 224, 1024, FrameFormat::Rgb565).validate().is_ok());
    }

    #[test]
    fn short_or_misaligned_frames_are_rejected() {
        let data = vec![0u8; 100];
        assert!(frame(&data, 10, 10, 40, FrameFormat::Xrgb8888).validate().is_err());
        assert!(frame(&data, 4, 2, 18, FrameFormat::Xrgb8888).validate().is_err());
        assert!(frame(&data, 8, 2, 16, FrameFormat::Xrgb8888).validate().is_err());
        assert!(frame(&data, 0, 2, 16, FrameFormat::Rgb565).validate().is_err());
    }

    #[test]
    fn odd_rotations_swap_axes() {
        let size = Size2D::new(256, 224);
        assert_eq!(rotated(size, 0), size);
        assert_eq!(rotated(size, 1), Size2D::new(224, 256));
        assert_eq!(rotated(size, 2), size);
        assert_eq!(rotated(size, 3), Size2D::new(224, 256));
    }

    #[test]
    fn streamed_texture_index_wraps() {
        let mut index = NUM_STREAMED_TEXTURES - 1;
        index = (index + 1) & (NUM_STREAMED_TEXTURES - 1);
        assert_eq!(index, 0);
    }

    #[test]
    fn stock_filter_follows_smooth() {
        let mut config = VideoConfig::default();
        assert_eq!(stock_filter(&config), Filter::Linear);
        config.smooth = false;
        assert_eq!(stock_filter(&config), Filter::Nearest);
    }
}
