#![forbid(unsafe_code)]

#[cfg(test)]
mod support;

#[cfg(test)]
mod tests {
    use postfx_core::{Address, ChainError, Filter, PresetError, ReflectError, ScalePolicy, Size2D};
    use postfx_preset::ShaderPreset;
    use postfx_runtime::mock::{viewport, FakeCompiler, MockBackend};
    use postfx_runtime::{ChainCreateInfo, ChainState, FilterChain};

    use crate::support::*;

    #[test]
    fn golden_crt_preset_builds() {
        let path = write_temp_fixture("crt_two_pass", CRT_TWO_PASS);
        let mut gpu = MockBackend::new();

        let chain = load(&mut gpu, &compiler(), &images(), &path).expect("crt preset should build");
        assert_eq!(chain.num_passes(), 2);
        assert_eq!(chain.state(), ChainState::Built);

        let first = chain.pass_info(0).expect("pass 0");
        assert_eq!(first.scale_x, ScalePolicy::Source(2.0));
        assert_eq!(first.source_filter, Filter::Nearest);
        assert_eq!(first.name.as_deref(), Some("Linearized"));

        let last = chain.pass_info(1).expect("pass 1");
        assert_eq!(last.scale_x, ScalePolicy::Viewport(1.0));
        assert_eq!(last.address, Address::Repeat);

        let preset = chain.preset().expect("preset kept");
        assert_eq!(preset.parameters.len(), 1, "gamma declared twice, stored once");
        assert_eq!(preset.parameter("gamma").map(|p| p.current), Some(2.4));

        chain.destroy(&mut gpu);
        remove_fixture(&path);
    }

    #[test]
    fn alias_and_lut_resolve_to_bound_textures() {
        let path = write_temp_fixture("crt_alias", CRT_TWO_PASS);
        let mut gpu = MockBackend::new();
        let images = images();
        let mut chain = load(&mut gpu, &compiler(), &images, &path).expect("build");

        let draws = run_frame(&mut chain, &mut gpu, Size2D::new(160, 120), 5, viewport(640, 480));
        assert_eq!(draws.len(), 2);
        let (linearize, crt) = (&draws[0], &draws[1]);

        let aliased = crt.input(3).expect("Linearized bound");
        assert_eq!(aliased.content, linearize.serial);
        assert_eq!(aliased.texture.filter, Filter::Linear, "sampled with the consumer's filter");
        assert_eq!(crt.ubo_f32(64), Some(320.0));
        assert_eq!(crt.ubo_f32(68), Some(240.0));

        assert_eq!(crt.input(4).map(|i| i.content), Some(77));
        let requested = images.requested.borrow();
        assert_eq!(requested.len(), 1);
        assert!(requested[0].ends_with("luts/mask.png"));
        drop(requested);

        chain.destroy(&mut gpu);
        remove_fixture(&path);
    }

    #[test]
    fn duplicate_parameter_is_shared_between_passes() {
        let path = write_temp_fixture("crt_shared", CRT_TWO_PASS);
        let mut gpu = MockBackend::new();
        let mut chain = load(&mut gpu, &compiler(), &images(), &path).expect("build");

        let draws = run_frame(&mut chain, &mut gpu, Size2D::new(64, 64), 1, viewport(64, 64));
        assert!(draws.iter().all(|d| d.push_f32(0) == Some(2.4)));

        let preset = chain.preset_mut().expect("preset");
        assert!(preset.set_parameter("gamma", 1.5));
        let draws = run_frame(&mut chain, &mut gpu, Size2D::new(64, 64), 2, viewport(64, 64));
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|d| d.push_f32(0) == Some(1.5)));

        chain.destroy(&mut gpu);
        remove_fixture(&path);
    }

    #[test]
    fn golden_mismatched_parameter_is_rejected() {
        let path = write_temp_fixture("crt_mismatch", CRT_TWO_PASS);
        let mut gpu = MockBackend::new();
        let compiler = compiler().with_shader("crt.slang", crt_shader(1.8));

        let err = load(&mut gpu, &compiler, &images(), &path)
            .expect_err("conflicting gamma declarations must fail");
        assert!(
            matches!(&err, ChainError::ParameterMismatch { id } if id == "gamma"),
            "unexpected err: {err}"
        );
        assert_eq!(gpu.live_programs(), 0);
        assert_eq!(gpu.live_images(), 0);

        remove_fixture(&path);
    }

    #[test]
    fn golden_unknown_semantic_is_rejected() {
        let path = write_temp_fixture("unknown_semantic", UNKNOWN_SEMANTIC);
        let mut gpu = MockBackend::new();

        let err = load(&mut gpu, &compiler(), &images(), &path)
            .expect_err("an unresolvable texture must fail");
        assert!(
            matches!(&err, ChainError::Reflect(ReflectError::UnknownTexture { name, .. }) if name == "Bogus"),
            "unexpected err: {err}"
        );
        remove_fixture(&path);
    }

    #[test]
    fn golden_feedback_on_final_pass_is_rejected() {
        let path = write_temp_fixture("final_feedback", FINAL_FEEDBACK);
        let mut gpu = MockBackend::new();

        let err = load(&mut gpu, &compiler(), &images(), &path)
            .expect_err("final pass feedback must fail");
        assert!(
            matches!(err, ChainError::FeedbackOnFinalPass { index: 0 }),
            "unexpected err: {err}"
        );
        assert_eq!(gpu.live_programs(), 0);
        remove_fixture(&path);
    }

    #[test]
    fn golden_empty_preset_is_rejected() {
        let path = write_temp_fixture("empty", EMPTY);
        let mut gpu = MockBackend::new();

        let err = load(&mut gpu, &compiler(), &images(), &path).expect_err("zero passes must fail");
        assert!(matches!(err, ChainError::EmptyChain), "unexpected err: {err}");
        remove_fixture(&path);
    }

    #[test]
    fn golden_missing_key_is_rejected() {
        let path = write_temp_fixture("missing_key", MISSING_KEY);

        let err = ShaderPreset::from_path(&path).expect_err("missing `shaders` must fail");
        assert!(
            matches!(&err, ChainError::Preset(PresetError::MissingKey { key }) if key == "shaders"),
            "unexpected err: {err}"
        );
        assert!(err.to_string().to_lowercase().contains("missing"));
        remove_fixture(&path);
    }

    #[test]
    fn missing_preset_file_reports_io_error() {
        let mut gpu = MockBackend::new();
        let path = std::env::temp_dir().join("postfx_contract_tests_does_not_exist.slangp");

        let err = load(&mut gpu, &compiler(), &images(), &path).expect_err("no such file");
        assert!(matches!(err, ChainError::Io { .. }), "unexpected err: {err}");
    }

    #[test]
    fn preset_write_then_parse_is_structurally_equal() {
        let path = write_temp_fixture("round_trip", CRT_TWO_PASS);
        let parsed = ShaderPreset::from_path(&path).expect("parse");

        let copy = path.with_file_name("round_trip_copy.slangp");
        parsed.write_to_path(&copy).expect("write");
        let reparsed = ShaderPreset::from_path(&copy).expect("reparse");
        assert_eq!(parsed, reparsed);

        let text = parsed.to_preset_string();
        assert!(text.contains("alias0 = \"Linearized\""));
        remove_fixture(&path);
    }

    #[test]
    fn single_viewport_pass_fills_the_viewport() {
        let path = write_temp_fixture("viewport_single", VIEWPORT_SINGLE);
        let mut gpu = MockBackend::new();
        let mut chain = load(&mut gpu, &compiler(), &images(), &path).expect("build");

        let draws = run_frame(&mut chain, &mut gpu, Size2D::new(256, 240), 1, viewport(1920, 1080));
        assert_eq!(chain.pass_output_size(0), Some(Size2D::new(1920, 1080)));
        let last = draws.last().expect("final draw");
        assert_eq!(last.target_size(), Size2D::new(1920, 1080));
        assert_eq!(gpu.presented, vec![last.serial]);

        chain.destroy(&mut gpu);
        remove_fixture(&path);
    }

    #[test]
    fn failed_preset_falls_back_to_a_valid_chain() {
        let good = write_temp_fixture("fallback_good", CRT_TWO_PASS);
        let bad = write_temp_fixture("fallback_bad", UNKNOWN_SEMANTIC);
        let mut gpu = MockBackend::new();
        let compiler = compiler();
        let images = images();

        let mut chain = load(&mut gpu, &compiler, &images, &good).expect("build");
        let result = chain.replace_with(&mut gpu, Filter::Nearest, |gpu| {
            load(gpu, &compiler, &images, &bad)
        });
        assert!(matches!(result, Err(ChainError::Reflect(_))));
        assert_eq!(chain.num_passes(), 1, "stock chain installed");
        assert!(chain.preset().is_none());

        let draws = run_frame(&mut chain, &mut gpu, Size2D::new(256, 224), 3, viewport(800, 600));
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].input(2).map(|i| i.content), Some(3));
        assert_eq!(draws[0].target_size(), Size2D::new(800, 600));

        chain.destroy(&mut gpu);
        assert_eq!(gpu.live_programs(), 0);
        remove_fixture(&good);
        remove_fixture(&bad);
    }

    #[test]
    fn missing_lut_fails_without_leaking() {
        let path = write_temp_fixture("crt_no_lut", CRT_TWO_PASS);
        let mut gpu = MockBackend::new();
        let no_images = postfx_runtime::mock::MockImageLoader::new();

        let err = load(&mut gpu, &compiler(), &no_images, &path).expect_err("mask is missing");
        assert!(matches!(err, ChainError::Image { .. }), "unexpected err: {err}");
        assert_eq!(gpu.live_images(), 0);
        assert_eq!(gpu.live_programs(), 0);
        assert_eq!(gpu.live_buffers(), 0);
        remove_fixture(&path);
    }

    #[test]
    fn stock_chain_needs_no_compiler() {
        let mut gpu = MockBackend::new();
        let chain = FilterChain::create(
            &mut gpu,
            &FakeCompiler::new(),
            &images(),
            None,
            Filter::Linear,
            ChainCreateInfo::default(),
        )
        .expect("stock chain");
        assert_eq!(chain.num_passes(), 1);
        chain.destroy(&mut gpu);
    }
}

#[cfg(test)]
mod determinism;

#[cfg(test)]
mod frames;
