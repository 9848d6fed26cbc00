use std::fmt;

use postfx_core::{ChainError, PassInfo, PixelFormat, Size2D, Viewport};
use postfx_preset::ShaderPreset;
use postfx_reflect::{ChainPlan, RawReflection, ReflectContext, SemanticMap, ShaderReflection};

use crate::backend::{GpuBackend, Texture};
use crate::commands::{DeferredOp, SyncPools};
use crate::common::{CommonResources, FrameInputs, StaticTexture};
use crate::history::HistoryRing;
use crate::pass::{Pass, PassShader};

/// Limits and formats fixed for the lifetime of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainCreateInfo {
    /// Largest input frame expected; sizes the initial framebuffers.
    pub max_input_size: Size2D,
    pub max_viewport_size: Size2D,
    /// Format of passes that declare none.
    pub swapchain_format: PixelFormat,
    pub num_sync_indices: usize,
    /// Upper bound for `OriginalHistoryN`.
    pub max_history_depth: usize,
}

impl Default for ChainCreateInfo {
    fn default() -> Self {
        Self {
            max_input_size: Size2D::new(1024, 1024),
            max_viewport_size: Size2D::new(1920, 1080),
            swapchain_format: PixelFormat::R8G8B8A8Unorm,
            num_sync_indices: 2,
            max_history_depth: 64,
        }
    }
}

/// Lifecycle of a [`FilterChain`]. A frame runs
/// `InputSet -> OffscreenRendered -> ViewportRendered` and `end_frame` returns to `Built`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Uninitialized,
    Built,
    InputSet,
    OffscreenRendered,
    ViewportRendered,
    Destroyed,
}

/// A linear multi-pass shader pipeline.
///
/// Configure passes, call [`FilterChain::init`], then per frame:
/// `set_input_texture`, `build_offscreen_passes`, `build_viewport_pass`, `end_frame`.
/// GPU resources are only released by [`FilterChain::destroy`], which needs the
/// backend that created them.
pub struct FilterChain<B: GpuBackend> {
    create_info: ChainCreateInfo,
    state: ChainState,
    passes: Vec<Pass<B>>,
    infos: Vec<PassInfo>,
    common: CommonResources<B>,
    history: Option<HistoryRing<B>>,
    pools: SyncPools<B>,
    plan: Option<ChainPlan>,
    input: Option<Texture<B::Image>>,
    final_source: Option<Texture<B::Image>>,
    require_clear: bool,
}

impl<B: GpuBackend> fmt::Debug for FilterChain<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("state", &self.state)
            .field("create_info", &self.create_info)
            .field("passes", &self.passes)
            .field("common", &self.common)
            .field("history", &self.history)
            .field("pools", &self.pools)
            .finish()
    }
}

impl<B: GpuBackend> FilterChain<B> {
    pub fn new(num_passes: usize, create_info: ChainCreateInfo) -> Self {
        let passes = (0..num_passes)
            .map(|i| Pass::new(i, i + 1 == num_passes))
            .collect();
        let pools = SyncPools::new(create_info.num_sync_indices);
        Self {
            create_info,
            state: ChainState::Uninitialized,
            passes,
            infos: vec![PassInfo::default(); num_passes],
            common: CommonResources::default(),
            history: None,
            pools,
            plan: None,
            input: None,
            final_source: None,
            require_clear: true,
        }
    }

    fn configurable(&mut self, index: usize) -> Result<&mut PassInfo, ChainError> {
        if self.state != ChainState::Uninitialized {
            return Err(ChainError::Pass {
                index,
                msg: "chain is already built".into(),
            });
        }
        let count = self.infos.len();
        self.infos.get_mut(index).ok_or_else(|| ChainError::Pass {
            index,
            msg: format!("chain has {count} passes"),
        })
    }

    pub fn set_pass_info(&mut self, index: usize, info: PassInfo) -> Result<(), ChainError> {
        *self.configurable(index)? = info;
        Ok(())
    }

    pub fn set_shader(
        &mut self,
        index: usize,
        vertex: Vec<u32>,
        fragment: Vec<u32>,
        reflection: RawReflection,
    ) -> Result<(), ChainError> {
        self.configurable(index)?;
        self.passes[index].set_shader(PassShader {
            vertex,
            fragment,
            reflection,
        });
        Ok(())
    }

    pub fn set_frame_count_period(&mut self, index: usize, period: u32) -> Result<(), ChainError> {
        self.configurable(index)?.frame_count_period = period;
        Ok(())
    }

    /// Exposes the pass output to later passes under `name`.
    pub fn set_pass_name(&mut self, index: usize, name: &str) -> Result<(), ChainError> {
        self.configurable(index)?.name = Some(name.to_string());
        Ok(())
    }

    /// Parameters and metadata shared by every pass. Parameter uniforms are resolved
    /// against this preset at `init`, so it cannot be replaced afterwards.
    pub fn set_shader_preset(&mut self, preset: ShaderPreset) -> Result<(), ChainError> {
        if self.state != ChainState::Uninitialized {
            return Err(ChainError::resource("cannot replace the preset of a built chain"));
        }
        self.common.preset = Some(preset);
        Ok(())
    }

    /// Takes ownership of a lookup texture; it is released with the chain.
    pub fn add_static_texture(&mut self, id: &str, texture: Texture<B::Image>) {
        self.common.luts.push(StaticTexture {
            id: id.to_string(),
            texture,
        });
    }

    fn semantic_map(&self) -> Result<SemanticMap, ChainError> {
        let mut map = SemanticMap::new();
        for (i, info) in self.infos.iter().enumerate() {
            if let Some(name) = &info.name {
                map.insert_alias(name, i)?;
            }
        }
        for (i, lut) in self.common.luts.iter().enumerate() {
            map.insert_lut(&lut.id, i)?;
        }
        if let Some(preset) = &self.common.preset {
            for (i, parameter) in preset.parameters.iter().enumerate() {
                map.insert_parameter(&parameter.id, i);
            }
        }
        Ok(map)
    }

    /// Resolves names, reflects and builds every pass, then allocates history and
    /// feedback storage. On error every GPU resource is released and the chain is
    /// left `Destroyed`.
    pub fn init(&mut self, backend: &mut B) -> Result<(), ChainError> {
        match self.state {
            ChainState::Uninitialized => {}
            ChainState::Destroyed => {
                return Err(ChainError::resource("cannot init a destroyed chain"));
            }
            state => {
                tracing::warn!(?state, "init called on a built chain");
                return Ok(());
            }
        }

        let result = self.try_init(backend);
        match result {
            Ok(()) => {
                self.state = ChainState::Built;
                tracing::info!(
                    passes = self.passes.len(),
                    history = self.history_depth(),
                    feedback = ?self.plan.as_ref().map(|p| p.feedback.as_slice()),
                    "filter chain built"
                );
                Ok(())
            }
            Err(e) => {
                self.release(backend);
                Err(e)
            }
        }
    }

    fn try_init(&mut self, backend: &mut B) -> Result<(), ChainError> {
        if self.passes.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        let map = self.semantic_map()?;
        let n = self.passes.len();
        let info = &self.create_info;

        let mut max_source = info.max_input_size;
        for (pass, pass_info) in self.passes.iter_mut().zip(&self.infos) {
            max_source = pass.set_pass_info(
                info.max_input_size,
                max_source,
                info.max_viewport_size,
                pass_info.clone(),
            );
        }

        for (i, pass) in self.passes.iter_mut().enumerate() {
            pass.reflect(
                &map,
                ReflectContext {
                    pass: i,
                    pass_count: n,
                    max_history: info.max_history_depth,
                },
            )?;
        }
        let reflections: Vec<ShaderReflection> =
            self.passes.iter().map(|p| p.reflection().clone()).collect();
        let plan = ChainPlan::analyze(&reflections)?;

        for pass in &mut self.passes {
            pass.build(backend, info.swapchain_format, info.num_sync_indices)?;
            if let Some(fb) = pass.framebuffer() {
                tracing::debug!(
                    pass = pass.index(),
                    format = %fb.format(),
                    size = ?fb.size(),
                    "allocated pass output"
                );
            }
        }
        for (i, pass) in self.passes.iter_mut().enumerate() {
            if plan.needs_feedback(i) {
                pass.init_feedback(backend)?;
            }
        }

        self.history = Some(HistoryRing::new(
            backend,
            plan.history_depth,
            info.max_input_size,
            PixelFormat::R8G8B8A8Unorm,
        )?);
        self.common.pass_outputs = vec![None; n];
        self.common.framebuffer_feedback = vec![None; n];
        self.plan = Some(plan);
        self.refresh_feedback_textures();
        self.require_clear = true;
        Ok(())
    }

    /// Pass `i`'s textures are sampled with the settings of pass `i + 1`.
    fn consumer_info(&self, index: usize) -> &PassInfo {
        self.passes
            .get(index + 1)
            .unwrap_or(&self.passes[index])
            .info()
    }

    fn refresh_feedback_textures(&mut self) {
        for i in 0..self.passes.len() {
            let texture = self.passes[i].feedback_texture(self.consumer_info(i));
            if let Some(slot) = self.common.framebuffer_feedback.get_mut(i) {
                *slot = texture;
            }
        }
    }

    fn is_running(&self) -> bool {
        matches!(
            self.state,
            ChainState::Built
                | ChainState::InputSet
                | ChainState::OffscreenRendered
                | ChainState::ViewportRendered
        )
    }

    /// The core's frame for this iteration; sampled with pass 0's settings.
    pub fn set_input_texture(&mut self, texture: Texture<B::Image>) {
        if !self.is_running() {
            tracing::warn!(state = ?self.state, "set_input_texture on a chain that is not built");
            return;
        }
        let info = self.passes[0].info();
        self.input = Some(texture.with_sampling(info.source_filter, info.mip_filter, info.address));
        self.final_source = None;
        self.state = ChainState::InputSet;
    }

    pub fn input_texture(&self) -> Option<Texture<B::Image>> {
        self.input
    }

    pub fn set_frame_count(&mut self, count: u64) {
        for pass in &mut self.passes {
            pass.set_frame_count(count);
        }
    }

    /// Slot `index` is free again: run its deferred releases and use it for new work.
    pub fn notify_sync_index(&mut self, backend: &mut B, index: usize) {
        self.pools.notify(backend, index);
        for pass in &mut self.passes {
            pass.notify_sync_index(index);
        }
    }

    pub fn set_num_sync_indices(&mut self, backend: &mut B, count: usize) -> Result<(), ChainError> {
        self.pools.resize(backend, count);
        self.create_info.num_sync_indices = count.max(1);
        if self.is_running() {
            for pass in &mut self.passes {
                pass.set_num_sync_indices(backend, self.pools.current_mut(), count)?;
            }
        }
        tracing::info!(count = self.pools.len(), "resized sync pools");
        Ok(())
    }

    /// Updates history and renders every pass except the last.
    pub fn build_offscreen_passes(&mut self, backend: &mut B, viewport: Viewport) {
        if self.state != ChainState::InputSet {
            tracing::warn!(state = ?self.state, "build_offscreen_passes called out of order");
            return;
        }
        let Some(original) = self.input else {
            return;
        };

        if self.require_clear {
            if let Some(history) = &self.history {
                history.clear(backend);
            }
            for pass in &self.passes {
                pass.clear_feedback(backend);
            }
            self.require_clear = false;
        }

        if let Some(history) = &mut self.history {
            if let Err(e) = history.push(backend, self.pools.current_mut(), &original) {
                tracing::error!(error = %e, "failed to update frame history");
            }
            let info = self.passes[0].info();
            self.common.original_history = history
                .iter()
                .map(|fb| fb.texture(info.source_filter, info.mip_filter, info.address))
                .collect();
        }

        let mut source = original;
        let offscreen = self.passes.len() - 1;
        for i in 0..offscreen {
            let (head, tail) = self.passes.split_at_mut(i + 1);
            let pass = &mut head[i];
            pass.build_commands(
                backend,
                &self.common,
                self.pools.current_mut(),
                FrameInputs { original, source },
                viewport,
                None,
            );
            let output = pass.output_texture(tail[0].info());
            self.common.pass_outputs[i] = output;
            if let Some(output) = output {
                source = output;
            }
        }
        self.final_source = Some(source);
        self.state = ChainState::OffscreenRendered;
    }

    /// Renders the last pass into the presentation target at `viewport`.
    pub fn build_viewport_pass(&mut self, backend: &mut B, viewport: Viewport, mvp: &[f32; 16]) {
        if self.state != ChainState::OffscreenRendered {
            tracing::warn!(state = ?self.state, "build_viewport_pass called out of order");
            return;
        }
        let (Some(original), Some(source)) = (self.input, self.final_source) else {
            return;
        };
        if let Some(pass) = self.passes.last_mut() {
            pass.build_commands(
                backend,
                &self.common,
                self.pools.current_mut(),
                FrameInputs { original, source },
                viewport,
                Some(mvp),
            );
        }
        self.state = ChainState::ViewportRendered;
    }

    /// Rotates feedback buffers and drops per-frame inputs. A frame that set an
    /// input but rendered nothing leaves feedback untouched.
    pub fn end_frame(&mut self) {
        match self.state {
            ChainState::OffscreenRendered | ChainState::ViewportRendered => {
                for pass in &mut self.passes {
                    pass.end_frame();
                }
                self.refresh_feedback_textures();
            }
            ChainState::InputSet => tracing::debug!("frame ended without rendering"),
            state => {
                tracing::warn!(?state, "end_frame called out of order");
                return;
            }
        }
        for output in &mut self.common.pass_outputs {
            *output = None;
        }
        self.input = None;
        self.final_source = None;
        self.state = ChainState::Built;
    }

    /// Deletes `image` once the current sync slot comes around again.
    pub fn retire_image(&mut self, image: B::Image) {
        self.pools.current_mut().push(DeferredOp::DeleteImage(image));
    }

    pub fn create_info(&self) -> &ChainCreateInfo {
        &self.create_info
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_info(&self, index: usize) -> Option<&PassInfo> {
        self.infos.get(index)
    }

    /// Size the pass rendered at in the last frame.
    pub fn pass_output_size(&self, index: usize) -> Option<Size2D> {
        self.passes.get(index).map(|p| p.current_size())
    }

    /// Frames kept in history including the current one; 0 before `init`.
    pub fn history_depth(&self) -> usize {
        self.history.as_ref().map(|h| h.depth()).unwrap_or(0)
    }

    /// Passes whose previous output is kept for `PassFeedbackN`.
    pub fn feedback_passes(&self) -> &[usize] {
        self.plan.as_ref().map(|p| p.feedback.as_slice()).unwrap_or(&[])
    }

    pub fn common(&self) -> &CommonResources<B> {
        &self.common
    }

    pub fn preset(&self) -> Option<&ShaderPreset> {
        self.common.preset.as_ref()
    }

    /// Edits to a parameter's `current` are picked up by every pass on the next frame.
    pub fn preset_mut(&mut self) -> Option<&mut ShaderPreset> {
        self.common.preset.as_mut()
    }

    fn release(&mut self, backend: &mut B) {
        self.pools.flush_all(backend);
        for pass in self.passes.drain(..) {
            pass.destroy(backend);
        }
        if let Some(history) = self.history.take() {
            history.destroy(backend);
        }
        self.common.destroy(backend);
        self.input = None;
        self.final_source = None;
        self.state = ChainState::Destroyed;
    }

    /// Releases every GPU resource owned by the chain.
    pub fn destroy(mut self, backend: &mut B) {
        self.release(backend);
    }
}
