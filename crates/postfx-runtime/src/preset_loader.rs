//! Building chains from presets.

use std::path::Path;

use postfx_core::{ChainError, Filter, PassInfo, PixelFormat, PresetError, ScalePolicy};
use postfx_preset::{ShaderParameter, ShaderPreset, MAX_PARAMETERS};
use postfx_reflect::{CompiledShader, ParameterMeta, ShaderCompiler};

use crate::backend::{GpuBackend, Texture};
use crate::chain::{ChainCreateInfo, FilterChain};
use crate::images::ImageLoader;
use crate::stock::{self, OPAQUE};

/// Adds `#pragma parameter` declarations to the chain-wide list. A redeclaration
/// must match the first one exactly.
fn merge_parameters(
    parameters: &mut Vec<ShaderParameter>,
    declared: &[ParameterMeta],
) -> Result<(), ChainError> {
    for meta in declared {
        if let Some(existing) = parameters.iter().find(|p| p.id == meta.id) {
            let same = existing.desc == meta.desc
                && existing.initial == meta.initial
                && existing.minimum == meta.minimum
                && existing.maximum == meta.maximum
                && existing.step == meta.step;
            if !same {
                return Err(ChainError::ParameterMismatch {
                    id: meta.id.clone(),
                });
            }
            continue;
        }
        if parameters.len() >= MAX_PARAMETERS {
            return Err(PresetError::TooManyParameters {
                count: parameters.len() + 1,
                max: MAX_PARAMETERS,
            }
            .into());
        }
        parameters.push(ShaderParameter {
            id: meta.id.clone(),
            desc: meta.desc.clone(),
            initial: meta.initial,
            minimum: meta.minimum,
            maximum: meta.maximum,
            step: meta.step,
            current: meta.initial,
        });
    }
    Ok(())
}

fn shader_format(index: usize, shader: &CompiledShader) -> PixelFormat {
    match shader.rt_format {
        Some(format) => format,
        None => {
            tracing::debug!(pass = index, "no #pragma format, using RGBA8");
            PixelFormat::R8G8B8A8Unorm
        }
    }
}

/// Derives the runtime configuration of preset pass `index`.
fn pass_info(
    preset: &ShaderPreset,
    index: usize,
    shader: &CompiledShader,
    filter: Filter,
) -> PassInfo {
    let pass = &preset.passes[index];
    let last = index + 1 == preset.passes.len();

    let next_mipmapped = preset
        .passes
        .get(index + 1)
        .map(|p| p.mipmap_input)
        .unwrap_or(false);
    let max_levels = if next_mipmapped { u32::MAX } else { 1 };
    let mip_filter = if pass.filter != Some(Filter::Nearest) && max_levels > 1 {
        Filter::Linear
    } else {
        Filter::Nearest
    };

    let (scale_x, scale_y, rt_format) = match pass.fbo {
        None if last => {
            if shader.rt_format.is_some() {
                tracing::warn!(
                    pass = index,
                    "final pass renders to the viewport, ignoring its explicit format"
                );
            }
            (ScalePolicy::Viewport(1.0), ScalePolicy::Viewport(1.0), None)
        }
        None => (
            ScalePolicy::Source(1.0),
            ScalePolicy::Source(1.0),
            Some(shader_format(index, shader)),
        ),
        Some(fbo) => {
            let format = if pass.srgb_framebuffer {
                PixelFormat::R8G8B8A8Srgb
            } else if pass.float_framebuffer {
                PixelFormat::R16G16B16A16Sfloat
            } else {
                shader_format(index, shader)
            };
            (fbo.x, fbo.y, Some(format))
        }
    };
    if let Some(format) = rt_format {
        tracing::info!(pass = index, %format, "render target format");
    }

    PassInfo {
        scale_x,
        scale_y,
        rt_format,
        source_filter: pass.filter.unwrap_or(filter),
        mip_filter,
        address: pass.wrap,
        max_levels,
        frame_count_period: pass.frame_count_mod,
        name: pass.alias.clone().or_else(|| shader.name.clone()),
    }
}

impl<B: GpuBackend> FilterChain<B> {
    /// One viewport-scaled passthrough pass.
    pub fn create_default(
        backend: &mut B,
        filter: Filter,
        info: ChainCreateInfo,
    ) -> Result<Self, ChainError> {
        let mut chain = FilterChain::new(1, info);
        chain.set_pass_info(0, stock::blit_pass_info(filter))?;
        chain.set_shader(0, OPAQUE.vertex(), OPAQUE.fragment(), OPAQUE.reflection())?;
        chain.init(backend)?;
        Ok(chain)
    }

    /// The preset at `preset`, or the stock chain when there is none.
    pub fn create(
        backend: &mut B,
        compiler: &dyn ShaderCompiler,
        images: &dyn ImageLoader,
        preset: Option<&Path>,
        filter: Filter,
        info: ChainCreateInfo,
    ) -> Result<Self, ChainError> {
        match preset {
            Some(path) => Self::create_from_preset(backend, compiler, images, path, filter, info),
            None => Self::create_default(backend, filter, info),
        }
    }

    pub fn create_from_preset(
        backend: &mut B,
        compiler: &dyn ShaderCompiler,
        images: &dyn ImageLoader,
        path: &Path,
        filter: Filter,
        info: ChainCreateInfo,
    ) -> Result<Self, ChainError> {
        let preset = ShaderPreset::from_path(path)?;
        Self::create_from_shader_preset(backend, compiler, images, preset, filter, info)
    }

    /// Compiles every pass, loads lookup textures and builds the chain. `filter` is
    /// used wherever the preset leaves filtering unspecified.
    pub fn create_from_shader_preset(
        backend: &mut B,
        compiler: &dyn ShaderCompiler,
        images: &dyn ImageLoader,
        mut preset: ShaderPreset,
        filter: Filter,
        info: ChainCreateInfo,
    ) -> Result<Self, ChainError> {
        if preset.passes.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        let needs_blit = preset.passes.last().is_some_and(|p| p.fbo.is_some());
        let count = preset.passes.len() + usize::from(needs_blit);

        let mut shaders = Vec::with_capacity(preset.passes.len());
        for pass in &preset.passes {
            let shader = compiler.compile(&pass.source)?;
            merge_parameters(&mut preset.parameters, &shader.parameters)?;
            shaders.push(shader);
        }

        let mut chain = FilterChain::new(count, info);
        for (i, shader) in shaders.into_iter().enumerate() {
            chain.set_pass_info(i, pass_info(&preset, i, &shader, filter))?;
            chain.set_shader(i, shader.vertex, shader.fragment, shader.reflection)?;
        }
        if needs_blit {
            let i = count - 1;
            tracing::debug!(pass = i, "appending blit pass for FBO-scaled final pass");
            chain.set_pass_info(i, stock::blit_pass_info(filter))?;
            chain.set_shader(i, OPAQUE.vertex(), OPAQUE.fragment(), OPAQUE.reflection())?;
        }

        if let Err(e) = load_luts(&mut chain, backend, images, &preset) {
            chain.destroy(backend);
            return Err(e);
        }

        preset.resolve_current_parameters();
        if let Err(e) = chain.set_shader_preset(preset) {
            chain.destroy(backend);
            return Err(e);
        }
        chain.init(backend)?;
        Ok(chain)
    }
}

impl<B: GpuBackend> FilterChain<B> {
    /// Swaps in the chain produced by `build`. If that fails the stock chain is
    /// installed instead and the build error is returned. If the stock chain fails
    /// too, `self` is kept as is. The replaced chain is destroyed only once its
    /// successor exists.
    pub fn replace_with<F>(
        &mut self,
        backend: &mut B,
        fallback_filter: Filter,
        build: F,
    ) -> Result<(), ChainError>
    where
        F: FnOnce(&mut B) -> Result<Self, ChainError>,
    {
        let (next, result) = match build(backend) {
            Ok(chain) => (chain, Ok(())),
            Err(e) => {
                tracing::error!(error = %e, "failed to build filter chain, falling back to stock");
                match Self::create_default(backend, fallback_filter, self.create_info().clone()) {
                    Ok(stock) => (stock, Err(e)),
                    Err(stock_err) => {
                        tracing::error!(error = %stock_err, "stock chain failed, keeping the current chain");
                        return Err(e);
                    }
                }
            }
        };
        let previous = std::mem::replace(self, next);
        previous.destroy(backend);
        result
    }
}

fn load_luts<B: GpuBackend>(
    chain: &mut FilterChain<B>,
    backend: &mut B,
    images: &dyn ImageLoader,
    preset: &ShaderPreset,
) -> Result<(), ChainError> {
    for lut in &preset.textures {
        let image = images.load_rgba8(&lut.path).inspect_err(|e| {
            tracing::error!(id = %lut.id, path = %lut.path.display(), error = %e, "failed to load lookup texture");
        })?;
        let levels = if lut.mipmap { image.size.mip_levels() } else { 1 };
        let handle = backend.upload_image(&image, levels)?;
        let mip_filter = if lut.mipmap && lut.filter == Filter::Linear {
            Filter::Linear
        } else {
            Filter::Nearest
        };
        chain.add_static_texture(
            &lut.id,
            Texture {
                image: handle,
                size: image.size,
                format: PixelFormat::R8G8B8A8Unorm,
                filter: lut.filter,
                mip_filter,
                address: lut.wrap,
            },
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{fake_shader, parameter, passthrough_reflection, FakeCompiler, MockBackend};
    use crate::mock::MockImageLoader;
    use crate::ChainState;
    use postfx_core::{Address, Size2D};
    use postfx_reflect::BlockKind;

    fn parse(text: &str) -> ShaderPreset {
        ShaderPreset::parse_str(text, Path::new("/presets")).expect("preset")
    }

    #[test]
    fn unscaled_passes_follow_source_and_last_follows_viewport() {
        let preset = parse("shaders = 2\nshader0 = a.slang\nshader1 = b.slang\n");
        let shader = fake_shader(passthrough_reflection());
        let first = pass_info(&preset, 0, &shader, Filter::Linear);
        let last = pass_info(&preset, 1, &shader, Filter::Nearest);

        assert_eq!(first.scale_x, ScalePolicy::Source(1.0));
        assert_eq!(first.rt_format, Some(PixelFormat::R8G8B8A8Unorm));
        assert_eq!(last.scale_y, ScalePolicy::Viewport(1.0));
        assert_eq!(last.rt_format, None);
        assert_eq!(last.source_filter, Filter::Nearest);
    }

    #[test]
    fn mipmap_input_unbounds_previous_pass_levels() {
        let preset = parse(
            "shaders = 2\nshader0 = a.slang\nshader1 = b.slang\nmipmap_input1 = true\nfilter_linear0 = false\n",
        );
        let shader = fake_shader(passthrough_reflection());
        let first = pass_info(&preset, 0, &shader, Filter::Linear);
        assert_eq!(first.max_levels, u32::MAX);
        assert_eq!(first.mip_filter, Filter::Nearest, "nearest pass keeps nearest mips");
        assert_eq!(pass_info(&preset, 1, &shader, Filter::Linear).max_levels, 1);
    }

    #[test]
    fn framebuffer_flags_pick_format() {
        let preset = parse(
            "shaders = 3\nshader0 = a.slang\nshader1 = b.slang\nshader2 = c.slang\n\
             scale_type0 = source\nsrgb_framebuffer0 = true\n\
             scale_type1 = source\nfloat_framebuffer1 = true\n",
        );
        let mut shader = fake_shader(passthrough_reflection());
        shader.rt_format = Some(PixelFormat::R8Unorm);
        assert_eq!(
            pass_info(&preset, 0, &shader, Filter::Linear).rt_format,
            Some(PixelFormat::R8G8B8A8Srgb)
        );
        assert_eq!(
            pass_info(&preset, 1, &shader, Filter::Linear).rt_format,
            Some(PixelFormat::R16G16B16A16Sfloat)
        );
    }

    #[test]
    fn alias_overrides_pragma_name() {
        let preset = parse("shaders = 1\nshader0 = a.slang\nalias0 = Pre\n");
        let mut shader = fake_shader(passthrough_reflection());
        shader.name = Some("Named".into());
        assert_eq!(pass_info(&preset, 0, &shader, Filter::Linear).name.as_deref(), Some("Pre"));
    }

    #[test]
    fn parameter_redeclaration_must_match() {
        let mut params = Vec::new();
        let a = parameter("gamma", 2.2, 1.0, 3.0, 0.1);
        merge_parameters(&mut params, &[a.clone()]).expect("first");
        merge_parameters(&mut params, &[a.clone()]).expect("identical duplicate");
        assert_eq!(params.len(), 1);

        let mut changed = a;
        changed.maximum = 4.0;
        assert!(matches!(
            merge_parameters(&mut params, &[changed]),
            Err(ChainError::ParameterMismatch { id }) if id == "gamma"
        ));
    }

    #[test]
    fn too_many_parameters_is_rejected() {
        let declared: Vec<_> = (0..=MAX_PARAMETERS)
            .map(|i| parameter(&format!("p{i}"), 0.0, 0.0, 1.0, 0.1))
            .collect();
        let mut params = Vec::new();
        assert!(matches!(
            merge_parameters(&mut params, &declared),
            Err(ChainError::Preset(PresetError::TooManyParameters { .. }))
        ));
    }

    #[test]
    fn fbo_scaled_last_pass_gets_a_blit_pass() {
        let mut gpu = MockBackend::new();
        let preset = parse("shaders = 1\nshader0 = a.slang\nscale_type0 = source\nscale0 = 2.0\n");
        let compiler = FakeCompiler::new().with_shader("a.slang", fake_shader(passthrough_reflection()));
        let chain = FilterChain::create_from_shader_preset(
            &mut gpu,
            &compiler,
            &MockImageLoader::new(),
            preset,
            Filter::Linear,
            ChainCreateInfo::default(),
        )
        .expect("chain");
        assert_eq!(chain.num_passes(), 2);
        let blit = chain.pass_info(1).expect("blit");
        assert_eq!(blit.scale_x, ScalePolicy::Viewport(1.0));
        assert_eq!(blit.address, Address::ClampToEdge);
        chain.destroy(&mut gpu);
    }

    #[test]
    fn luts_are_uploaded_with_their_sampling() {
        let mut gpu = MockBackend::new();
        let preset = parse(
            "shaders = 1\nshader0 = a.slang\ntextures = Mask\nMask = mask.png\n\
             Mask_linear = true\nMask_mipmap = true\nMask_wrap_mode = repeat\n",
        );
        let reflection = passthrough_reflection().texture("Mask", 3);
        let compiler = FakeCompiler::new().with_shader("a.slang", fake_shader(reflection));
        let images = MockImageLoader::new().with_image("mask.png", Size2D::new(16, 4), 7);
        let chain = FilterChain::create_from_shader_preset(
            &mut gpu,
            &compiler,
            &images,
            preset,
            Filter::Nearest,
            ChainCreateInfo::default(),
        )
        .expect("chain");

        let lut = &chain.common().luts[0];
        assert_eq!(lut.id, "Mask");
        assert_eq!(lut.texture.mip_filter, Filter::Linear);
        assert_eq!(lut.texture.address, Address::Repeat);
        assert_eq!(gpu.image(lut.texture.image).map(|i| i.levels), Some(5));
        assert_eq!(
            images.requested.borrow().as_slice(),
            &[Path::new("/presets/mask.png").to_path_buf()]
        );
        chain.destroy(&mut gpu);
        assert_eq!(gpu.live_images(), 0);
    }

    #[test]
    fn missing_lut_fails_and_releases_earlier_uploads() {
        let mut gpu = MockBackend::new();
        let preset = parse(
            "shaders = 1\nshader0 = a.slang\ntextures = A;B\nA = a.png\nB = b.png\n",
        );
        let compiler = FakeCompiler::new().with_shader("a.slang", fake_shader(passthrough_reflection()));
        let images = MockImageLoader::new().with_image("a.png", Size2D::new(2, 2), 1);
        let err = FilterChain::create_from_shader_preset(
            &mut gpu,
            &compiler,
            &images,
            preset,
            Filter::Linear,
            ChainCreateInfo::default(),
        )
        .expect_err("b.png is missing");
        assert!(matches!(err, ChainError::Image { .. }));
        assert_eq!(gpu.live_images(), 0);
    }

    #[test]
    fn parameters_resolve_from_overrides() {
        let mut gpu = MockBackend::new();
        let preset = parse("shaders = 1\nshader0 = a.slang\nparameters = gamma\ngamma = 1.8\n");
        let mut shader = fake_shader(
            passthrough_reflection()
                .with_push_constants(16)
                .member("gamma", BlockKind::PushConstant, 0, 1),
        );
        shader.parameters = vec![parameter("gamma", 2.2, 1.0, 3.0, 0.1)];
        let compiler = FakeCompiler::new().with_shader("a.slang", shader);
        let chain = FilterChain::create_from_shader_preset(
            &mut gpu,
            &compiler,
            &MockImageLoader::new(),
            preset,
            Filter::Linear,
            ChainCreateInfo::default(),
        )
        .expect("chain");
        let gamma = chain.preset().and_then(|p| p.parameter("gamma")).map(|p| p.current);
        assert_eq!(gamma, Some(1.8));
        chain.destroy(&mut gpu);
    }

    #[test]
    fn failed_replacement_installs_stock_chain() {
        let mut gpu = MockBackend::new();
        let preset = parse("shaders = 2\nshader0 = a.slang\nshader1 = a.slang\n");
        let compiler = FakeCompiler::new().with_shader("a.slang", fake_shader(passthrough_reflection()));
        let mut chain = FilterChain::create_from_shader_preset(
            &mut gpu,
            &compiler,
            &MockImageLoader::new(),
            preset,
            Filter::Linear,
            ChainCreateInfo::default(),
        )
        .expect("chain");
        let programs_before = gpu.live_programs();
        assert_eq!(programs_before, 2);

        let broken = parse("shaders = 1\nshader0 = missing.slang\n");
        let result = chain.replace_with(&mut gpu, Filter::Nearest, |gpu| {
            FilterChain::create_from_shader_preset(
                gpu,
                &compiler,
                &MockImageLoader::new(),
                broken,
                Filter::Linear,
                ChainCreateInfo::default(),
            )
        });
        assert!(matches!(result, Err(ChainError::Compile(_))));
        assert_eq!(chain.num_passes(), 1, "stock chain installed");
        assert_eq!(chain.state(), ChainState::Built);
        assert_eq!(gpu.live_programs(), 1, "previous chain destroyed");
    }

    #[test]
    fn replacement_keeps_current_chain_when_stock_fails_too() {
        let mut gpu = MockBackend::new();
        let mut chain =
            FilterChain::create_default(&mut gpu, Filter::Linear, ChainCreateInfo::default())
                .expect("stock");
        gpu.fail_programs = true;
        let result = chain.replace_with(&mut gpu, Filter::Linear, |_| Err(ChainError::EmptyChain));
        assert!(matches!(result, Err(ChainError::EmptyChain)));
        assert_eq!(chain.state(), ChainState::Built);
        assert_eq!(gpu.live_programs(), 1);
        chain.destroy(&mut gpu);
    }

    #[test]
    fn stock_chain_is_one_viewport_pass() {
        let mut gpu = MockBackend::new();
        let chain =
            FilterChain::create_default(&mut gpu, Filter::Nearest, ChainCreateInfo::default())
                .expect("stock");
        assert_eq!(chain.num_passes(), 1);
        assert_eq!(chain.pass_info(0).map(|i| i.source_filter), Some(Filter::Nearest));
        chain.destroy(&mut gpu);
        assert_eq!(gpu.live_programs(), 0);
    }
}
