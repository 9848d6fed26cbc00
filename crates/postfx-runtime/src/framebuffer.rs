use std::fmt;

use postfx_core::{Address, ChainError, Filter, PixelFormat, Size2D};

use crate::backend::{GpuBackend, Texture};
use crate::commands::{CommandList, DeferredOp};

/// An image plus the render target writing into it.
pub struct Framebuffer<B: GpuBackend> {
    image: B::Image,
    target: B::Target,
    size: Size2D,
    format: PixelFormat,
    max_levels: u32,
    levels: u32,
}

impl<B: GpuBackend> fmt::Debug for Framebuffer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("image", &self.image)
            .field("target", &self.target)
            .field("size", &self.size)
            .field("format", &self.format)
            .field("levels", &self.levels)
            .finish()
    }
}

fn level_count(size: Size2D, max_levels: u32) -> u32 {
    size.mip_levels().min(max_levels).max(1)
}

impl<B: GpuBackend> Framebuffer<B> {
    pub fn new(
        backend: &mut B,
        size: Size2D,
        format: PixelFormat,
        max_levels: u32,
    ) -> Result<Self, ChainError> {
        let size = size.max(Size2D::new(1, 1));
        let levels = level_count(size, max_levels);
        let (image, target) = backend.create_framebuffer(size, format, levels)?;
        backend.clear_target(target, size);
        Ok(Self {
            image,
            target,
            size,
            format,
            max_levels,
            levels,
        })
    }

    /// Reallocates when the size or format changes; contents are not preserved.
    ///
    /// The old storage goes into `retired` because a frame in flight may still
    /// sample it. On failure the framebuffer keeps its previous storage.
    pub fn set_size(
        &mut self,
        backend: &mut B,
        retired: &mut CommandList<B>,
        size: Size2D,
        format: Option<PixelFormat>,
    ) -> Result<bool, ChainError> {
        let size = size.max(Size2D::new(1, 1));
        let format = format.unwrap_or(self.format);
        if size == self.size && format == self.format {
            return Ok(false);
        }

        let levels = level_count(size, self.max_levels);
        let (image, target) = backend.create_framebuffer(size, format, levels)?;
        backend.clear_target(target, size);
        retired.push(DeferredOp::DeleteFramebuffer {
            image: self.image,
            target: self.target,
        });
        self.image = image;
        self.target = target;
        self.size = size;
        self.format = format;
        self.levels = levels;
        Ok(true)
    }

    pub fn clear(&self, backend: &mut B) {
        backend.clear_target(self.target, self.size);
    }

    /// Blits `texture` into level 0.
    pub fn copy_from(&self, backend: &mut B, texture: &Texture<B::Image>) {
        backend.copy_image(texture, self.target, self.size);
    }

    pub fn generate_mips(&self, backend: &mut B) {
        if self.levels > 1 {
            backend.generate_mips(self.image);
        }
    }

    pub fn texture(&self, filter: Filter, mip_filter: Filter, address: Address) -> Texture<B::Image> {
        Texture {
            image: self.image,
            size: self.size,
            format: self.format,
            filter,
            mip_filter,
            address,
        }
    }

    pub fn image(&self) -> B::Image {
        self.image
    }

    pub fn target(&self) -> B::Target {
        self.target
    }

    pub fn size(&self) -> Size2D {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn destroy(self, backend: &mut B) {
        backend.delete_framebuffer(self.image, self.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    const RGBA8: PixelFormat = PixelFormat::R8G8B8A8Unorm;

    #[test]
    fn levels_are_capped_by_max_levels() {
        let mut gpu = MockBackend::new();
        let fb = Framebuffer::new(&mut gpu, Size2D::new(256, 240), RGBA8, u32::MAX).expect("fb");
        assert_eq!(fb.levels(), 9);
        let capped = Framebuffer::new(&mut gpu, Size2D::new(256, 240), RGBA8, 1).expect("fb");
        assert_eq!(capped.levels(), 1);

        capped.generate_mips(&mut gpu);
        assert_eq!(gpu.image(capped.image()).map(|i| i.mips_generated), Some(0));
        fb.generate_mips(&mut gpu);
        assert_eq!(gpu.image(fb.image()).map(|i| i.mips_generated), Some(1));
    }

    #[test]
    fn resize_defers_release_of_old_storage() {
        let mut gpu = MockBackend::new();
        let mut retired = CommandList::new();
        let mut fb = Framebuffer::new(&mut gpu, Size2D::new(64, 64), RGBA8, 1).expect("fb");
        let old = fb.image();

        assert!(!fb
            .set_size(&mut gpu, &mut retired, Size2D::new(64, 64), None)
            .expect("same size"));
        assert!(retired.is_empty());

        assert!(fb
            .set_size(&mut gpu, &mut retired, Size2D::new(32, 16), None)
            .expect("resize"));
        assert_ne!(fb.image(), old);
        assert_eq!(fb.size(), Size2D::new(32, 16));
        assert_eq!(gpu.live_images(), 2, "old image still alive until its slot is reused");

        retired.execute(&mut gpu);
        assert_eq!(gpu.live_images(), 1);
    }

    #[test]
    fn format_change_reallocates() {
        let mut gpu = MockBackend::new();
        let mut retired = CommandList::new();
        let mut fb = Framebuffer::new(&mut gpu, Size2D::new(8, 8), RGBA8, 1).expect("fb");
        assert!(fb
            .set_size(
                &mut gpu,
                &mut retired,
                Size2D::new(8, 8),
                Some(PixelFormat::R16G16B16A16Sfloat)
            )
            .expect("reformat"));
        assert_eq!(fb.format(), PixelFormat::R16G16B16A16Sfloat);
        assert_eq!(retired.len(), 1);
    }

    #[test]
    fn failed_resize_keeps_previous_storage() {
        let mut gpu = MockBackend::new();
        let mut retired = CommandList::new();
        let mut fb = Framebuffer::new(&mut gpu, Size2D::new(8, 8), RGBA8, 1).expect("fb");
        gpu.fail_framebuffers = true;
        assert!(fb
            .set_size(&mut gpu, &mut retired, Size2D::new(16, 16), None)
            .is_err());
        assert_eq!(fb.size(), Size2D::new(8, 8));
        assert!(retired.is_empty());
    }
}
