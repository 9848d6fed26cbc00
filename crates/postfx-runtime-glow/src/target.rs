use glow::HasContext;
use postfx_core::{ChainError, PixelFormat, Size2D};

use crate::formats::gl_format;

/// Immutable storage with `levels` mip levels.
pub unsafe fn create_texture(
    gl: &glow::Context,
    size: Size2D,
    format: PixelFormat,
    levels: u32,
) -> Result<glow::NativeTexture, ChainError> {
    let tex = gl
        .create_texture()
        .map_err(|e| ChainError::resource(format!("create_texture failed: {e}")))?;
    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
    gl.tex_storage_2d(
        glow::TEXTURE_2D,
        levels.max(1) as i32,
        gl_format(format).internal,
        size.width.max(1) as i32,
        size.height.max(1) as i32,
    );
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAX_LEVEL, levels.max(1) as i32 - 1);
    gl.bind_texture(glow::TEXTURE_2D, None);
    Ok(tex)
}

/// Texture plus an FBO rendering into its level 0.
pub unsafe fn create_render_target(
    gl: &glow::Context,
    size: Size2D,
    format: PixelFormat,
    levels: u32,
) -> Result<(glow::NativeTexture, glow::NativeFramebuffer), ChainError> {
    let fbo = gl
        .create_framebuffer()
        .map_err(|e| ChainError::resource(format!("create_framebuffer failed: {e}")))?;
    let tex = match create_texture(gl, size, format, levels) {
        Ok(tex) => tex,
        Err(e) => {
            gl.delete_framebuffer(fbo);
            return Err(e);
        }
    };

    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
    gl.framebuffer_texture_2d(
        glow::FRAMEBUFFER,
        glow::COLOR_ATTACHMENT0,
        glow::TEXTURE_2D,
        Some(tex),
        0,
    );

    let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
    gl.bind_framebuffer(glow::FRAMEBUFFER, None);
    if status != glow::FRAMEBUFFER_COMPLETE {
        gl.delete_framebuffer(fbo);
        gl.delete_texture(tex);
        return Err(ChainError::resource(format!(
            "framebuffer incomplete for {format} {}x{}: 0x{status:x}",
            size.width, size.height
        )));
    }

    Ok((tex, fbo))
}
