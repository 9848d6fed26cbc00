use std::collections::VecDeque;
use std::fmt;

use postfx_core::{ChainError, PixelFormat, Size2D};

use crate::backend::{GpuBackend, Texture};
use crate::commands::CommandList;
use crate::framebuffer::Framebuffer;

/// GPU ring of the most recent raw input frames.
///
/// Slot 0 is the newest frame. A depth of 1 needs no copies (the current frame is the
/// chain input itself), so no storage is allocated.
pub struct HistoryRing<B: GpuBackend> {
    frames: VecDeque<Framebuffer<B>>,
    depth: usize,
}

impl<B: GpuBackend> fmt::Debug for HistoryRing<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryRing")
            .field("depth", &self.depth)
            .field("frames", &self.frames)
            .finish()
    }
}

impl<B: GpuBackend> HistoryRing<B> {
    pub fn new(
        backend: &mut B,
        depth: usize,
        size: Size2D,
        format: PixelFormat,
    ) -> Result<Self, ChainError> {
        let depth = depth.max(1);
        let mut frames = VecDeque::new();
        if depth > 1 {
            for _ in 0..depth {
                match Framebuffer::new(backend, size, format, 1) {
                    Ok(fb) => frames.push_back(fb),
                    Err(e) => {
                        for fb in frames {
                            fb.destroy(backend);
                        }
                        return Err(e);
                    }
                }
            }
        }
        Ok(Self { frames, depth })
    }

    /// Frames including the current one.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Copies `input` into the slot of the oldest frame and makes it the newest.
    pub fn push(
        &mut self,
        backend: &mut B,
        retired: &mut CommandList<B>,
        input: &Texture<B::Image>,
    ) -> Result<(), ChainError> {
        let Some(mut oldest) = self.frames.pop_back() else {
            return Ok(());
        };
        if let Err(e) = oldest.set_size(backend, retired, input.size, Some(input.format)) {
            self.frames.push_back(oldest);
            return Err(e);
        }
        oldest.copy_from(backend, input);
        self.frames.push_front(oldest);
        Ok(())
    }

    /// `frames_ago = 0` is the newest frame.
    pub fn get(&self, frames_ago: usize) -> Option<&Framebuffer<B>> {
        self.frames.get(frames_ago)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Framebuffer<B>> {
        self.frames.iter()
    }

    pub fn clear(&self, backend: &mut B) {
        for fb in &self.frames {
            fb.clear(backend);
        }
    }

    pub fn destroy(self, backend: &mut B) {
        for fb in self.frames {
            fb.destroy(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    #[test]
    fn depth_one_allocates_nothing() {
        let mut gpu = MockBackend::new();
        let mut retired = CommandList::new();
        let mut ring =
            HistoryRing::new(&mut gpu, 1, Size2D::new(8, 8), PixelFormat::R8G8B8A8Unorm)
                .expect("ring");
        let input = gpu.create_input(Size2D::new(8, 8), 1);
        ring.push(&mut gpu, &mut retired, &input).expect("push");
        assert!(ring.is_empty());
        assert_eq!(ring.depth(), 1);
        assert_eq!(gpu.copies, 0);
    }

    #[test]
    fn evicts_oldest_exactly_after_depth_pushes() {
        const N: usize = 4;
        let mut gpu = MockBackend::new();
        let mut retired = CommandList::new();
        let mut ring =
            HistoryRing::new(&mut gpu, N, Size2D::new(8, 8), PixelFormat::R8G8B8A8Unorm)
                .expect("ring");
        let input = gpu.create_input(Size2D::new(8, 8), 0);

        for frame in 1..=(2 * N as u64 + 1) {
            gpu.set_content(input.image, frame);
            ring.push(&mut gpu, &mut retired, &input).expect("push");

            let contents: Vec<u64> = ring
                .iter()
                .filter_map(|fb| gpu.image(fb.image()).map(|i| i.content))
                .collect();
            let expected: Vec<u64> = (0..N as u64)
                .map(|ago| frame.saturating_sub(ago))
                .collect();
            assert_eq!(contents, expected, "after push {frame}");
            if frame as usize == N + 1 {
                assert!(!contents.contains(&1), "first frame evicted on push N+1");
            }
            if frame as usize == N {
                assert!(contents.contains(&1), "first frame still held after N pushes");
            }
        }
    }

    #[test]
    fn follows_input_size_changes() {
        let mut gpu = MockBackend::new();
        let mut retired = CommandList::new();
        let mut ring =
            HistoryRing::new(&mut gpu, 2, Size2D::new(8, 8), PixelFormat::R8G8B8A8Unorm)
                .expect("ring");
        let input = gpu.create_input(Size2D::new(320, 240), 7);
        ring.push(&mut gpu, &mut retired, &input).expect("push");
        assert_eq!(ring.get(0).map(|f| f.size()), Some(Size2D::new(320, 240)));
        assert_eq!(ring.get(1).map(|f| f.size()), Some(Size2D::new(8, 8)));
        assert_eq!(retired.len(), 1);
    }
}
