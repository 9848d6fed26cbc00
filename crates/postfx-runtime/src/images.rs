use std::path::Path;

use postfx_core::{ChainError, Size2D};

/// Tightly packed RGBA8 pixels, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub size: Size2D,
    pub pixels: Vec<u8>,
}

/// Decodes lookup textures.
pub trait ImageLoader {
    fn load_rgba8(&self, path: &Path) -> Result<RgbaImage, ChainError>;
}

/// Loads images from disk with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load_rgba8(&self, path: &Path) -> Result<RgbaImage, ChainError> {
        let decoded = image::open(path).map_err(|e| ChainError::Image {
            path: path.to_path_buf(),
            msg: e.to_string(),
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(RgbaImage {
            size: Size2D::new(width, height),
            pixels: rgba.into_raw(),
        })
    }
}
