use std::fmt;

use crate::backend::GpuBackend;

/// A resource release deferred until its sync slot comes around again.
pub enum DeferredOp<B: GpuBackend> {
    DeleteFramebuffer { image: B::Image, target: B::Target },
    DeleteImage(B::Image),
    DeleteProgram(B::Program),
    DeleteUniformBuffer(B::Buffer),
}

impl<B: GpuBackend> DeferredOp<B> {
    fn execute(self, backend: &mut B) {
        match self {
            DeferredOp::DeleteFramebuffer { image, target } => {
                backend.delete_framebuffer(image, target)
            }
            DeferredOp::DeleteImage(image) => backend.delete_image(image),
            DeferredOp::DeleteProgram(program) => backend.delete_program(program),
            DeferredOp::DeleteUniformBuffer(buffer) => backend.delete_uniform_buffer(buffer),
        }
    }
}

impl<B: GpuBackend> fmt::Debug for DeferredOp<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredOp::DeleteFramebuffer { image, target } => f
                .debug_struct("DeleteFramebuffer")
                .field("image", image)
                .field("target", target)
                .finish(),
            DeferredOp::DeleteImage(image) => f.debug_tuple("DeleteImage").field(image).finish(),
            DeferredOp::DeleteProgram(p) => f.debug_tuple("DeleteProgram").field(p).finish(),
            DeferredOp::DeleteUniformBuffer(b) => {
                f.debug_tuple("DeleteUniformBuffer").field(b).finish()
            }
        }
    }
}

/// Ops queued against one sync index.
pub struct CommandList<B: GpuBackend> {
    ops: Vec<DeferredOp<B>>,
}

impl<B: GpuBackend> Default for CommandList<B> {
    fn default() -> Self {
        Self { ops: Vec::new() }
    }
}

impl<B: GpuBackend> fmt::Debug for CommandList<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.ops).finish()
    }
}

impl<B: GpuBackend> CommandList<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: DeferredOp<B>) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Runs queued ops in submission order and empties the list.
    pub fn execute(&mut self, backend: &mut B) {
        for op in self.ops.drain(..) {
            op.execute(backend);
        }
    }
}

/// One [`CommandList`] per sync index plus the currently selected slot.
pub struct SyncPools<B: GpuBackend> {
    lists: Vec<CommandList<B>>,
    current: usize,
}

impl<B: GpuBackend> fmt::Debug for SyncPools<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncPools")
            .field("lists", &self.lists)
            .field("current", &self.current)
            .finish()
    }
}

impl<B: GpuBackend> SyncPools<B> {
    pub fn new(count: usize) -> Self {
        Self {
            lists: (0..count.max(1)).map(|_| CommandList::new()).collect(),
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_mut(&mut self) -> &mut CommandList<B> {
        &mut self.lists[self.current]
    }

    /// The GPU finished with slot `index`: release what was queued there and make it
    /// the slot for new work.
    pub fn notify(&mut self, backend: &mut B, index: usize) {
        let index = index % self.lists.len();
        self.lists[index].execute(backend);
        self.current = index;
    }

    /// Removed slots are flushed immediately.
    pub fn resize(&mut self, backend: &mut B, count: usize) {
        let count = count.max(1);
        while self.lists.len() > count {
            if let Some(mut list) = self.lists.pop() {
                list.execute(backend);
            }
        }
        while self.lists.len() < count {
            self.lists.push(CommandList::new());
        }
        if self.current >= count {
            self.current = 0;
        }
    }

    pub fn flush_all(&mut self, backend: &mut B) {
        for list in &mut self.lists {
            list.execute(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::GpuBackend as _;
    use postfx_core::{PixelFormat, Size2D};

    #[test]
    fn deletes_run_when_their_slot_is_notified() {
        let mut gpu = MockBackend::new();
        let mut pools: SyncPools<MockBackend> = SyncPools::new(2);
        let (image, target) = gpu
            .create_framebuffer(Size2D::new(4, 4), PixelFormat::R8G8B8A8Unorm, 1)
            .expect("alloc");

        pools.current_mut().push(DeferredOp::DeleteFramebuffer { image, target });
        pools.notify(&mut gpu, 1);
        assert_eq!(gpu.live_images(), 1, "slot 0 not reached yet");

        pools.notify(&mut gpu, 0);
        assert_eq!(gpu.live_images(), 0);
        assert!(pools.current_mut().is_empty());
    }

    #[test]
    fn shrinking_flushes_removed_slots() {
        let mut gpu = MockBackend::new();
        let mut pools: SyncPools<MockBackend> = SyncPools::new(3);
        let image = gpu
            .upload_image(
                &crate::RgbaImage {
                    size: Size2D::new(1, 1),
                    pixels: vec![0; 4],
                },
                1,
            )
            .expect("upload");
        pools.notify(&mut gpu, 2);
        pools.current_mut().push(DeferredOp::DeleteImage(image));

        pools.resize(&mut gpu, 1);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools.current_index(), 0);
        assert_eq!(gpu.live_images(), 0);
    }
}
