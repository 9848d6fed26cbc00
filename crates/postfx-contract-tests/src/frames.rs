#[cfg(test)]
mod tests {
    use postfx_core::{PassInfo, ScalePolicy, Size2D};
    use postfx_runtime::mock::{fake_shader, passthrough_reflection, viewport, MockBackend};
    use postfx_runtime::{ChainCreateInfo, FilterChain};
    use proptest::prelude::*;

    use crate::support::*;

    /// Content bound for `OriginalHistoryN` at binding `2 + N`.
    fn history_contents(draw: &postfx_runtime::mock::RecordedDraw, depth: u32) -> Vec<u64> {
        (0..depth)
            .map(|k| draw.input(2 + k).map(|i| i.content).expect("history bound"))
            .collect()
    }

    #[test]
    fn history_depth_is_one_past_the_deepest_reference() {
        let path = write_temp_fixture("history_depth", HISTORY);
        let mut gpu = MockBackend::new();
        let chain = load(&mut gpu, &compiler(), &images(), &path).expect("build");
        assert_eq!(chain.history_depth(), 4);
        chain.destroy(&mut gpu);
        remove_fixture(&path);
    }

    #[test]
    fn history_evicts_the_oldest_frame_on_the_next_push() {
        let path = write_temp_fixture("history_evict", HISTORY);
        let mut gpu = MockBackend::new();
        let mut chain = load(&mut gpu, &compiler(), &images(), &path).expect("build");
        let depth = chain.history_depth() as u64;

        // Frame f carries content f; 2N pushes.
        for f in 1..=2 * depth {
            let draws = run_frame(&mut chain, &mut gpu, Size2D::new(32, 32), f, viewport(32, 32));
            let seen = history_contents(&draws[0], depth as u32);
            let expected: Vec<u64> = (0..depth).map(|k| f.saturating_sub(k)).collect();
            assert_eq!(seen, expected, "frame {f}");

            let first_frame_visible = seen.contains(&1);
            assert_eq!(first_frame_visible, f <= depth, "frame {f}");
        }

        chain.destroy(&mut gpu);
        remove_fixture(&path);
    }

    #[test]
    fn feedback_lags_exactly_one_frame() {
        let path = write_temp_fixture("feedback", FEEDBACK);
        let mut gpu = MockBackend::new();
        let mut chain = load(&mut gpu, &compiler(), &images(), &path).expect("build");
        assert_eq!(chain.feedback_passes(), &[0]);

        let mut previous = 0;
        for f in 1..=5 {
            let draws = run_frame(&mut chain, &mut gpu, Size2D::new(16, 16), f, viewport(16, 16));
            let accumulate = &draws[0];
            let feedback = accumulate.input(3).expect("AccumFeedback bound");
            assert_eq!(feedback.content, previous, "frame {f} sees last frame's output");
            previous = accumulate.serial;
        }

        chain.destroy(&mut gpu);
        remove_fixture(&path);
    }

    #[test]
    fn skipped_frame_does_not_advance_feedback() {
        let path = write_temp_fixture("feedback_skip", FEEDBACK);
        let mut gpu = MockBackend::new();
        let mut chain = load(&mut gpu, &compiler(), &images(), &path).expect("build");

        let first = run_frame(&mut chain, &mut gpu, Size2D::new(16, 16), 1, viewport(16, 16));
        let rendered = first[0].serial;

        let skipped = gpu.create_input(Size2D::new(16, 16), 2);
        chain.set_input_texture(skipped);
        chain.end_frame();

        let third = run_frame(&mut chain, &mut gpu, Size2D::new(16, 16), 3, viewport(16, 16));
        let feedback = third[0].input(3).expect("AccumFeedback bound");
        assert_eq!(feedback.content, rendered, "feedback is the last rendered output");

        chain.destroy(&mut gpu);
        remove_fixture(&path);
    }

    #[test]
    fn absolute_width_overrides_original_width() {
        let path = write_temp_fixture("absolute_width", ABSOLUTE_WIDTH);
        let mut gpu = MockBackend::new();
        let mut chain = load(&mut gpu, &compiler(), &images(), &path).expect("build");

        for (i, size) in [Size2D::new(320, 240), Size2D::new(1000, 10)].into_iter().enumerate() {
            let draws = run_frame(&mut chain, &mut gpu, size, i as u64 + 1, viewport(640, 480));
            assert_eq!(chain.pass_output_size(0), Some(Size2D::new(64, size.height)));
            let sized = &draws[1];
            assert_eq!(sized.ubo_f32(64), Some(64.0));
            assert_eq!(sized.ubo_f32(68), Some(size.height as f32));
        }

        chain.destroy(&mut gpu);
        remove_fixture(&path);
    }

    fn policy() -> impl Strategy<Value = ScalePolicy> {
        prop_oneof![
            Just(ScalePolicy::Original),
            (0.125f32..4.0).prop_map(ScalePolicy::Source),
            (0.125f32..2.0).prop_map(ScalePolicy::Viewport),
            (1u32..2048).prop_map(ScalePolicy::Absolute),
        ]
    }

    fn size() -> impl Strategy<Value = Size2D> {
        (1u32..1024, 1u32..1024).prop_map(|(w, h)| Size2D::new(w, h))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn rendered_offscreen_size_matches_policy(
            x in policy(), y in policy(), input in size(), window in size()
        ) {
            let mut gpu = MockBackend::new();
            let mut chain = FilterChain::new(2, ChainCreateInfo::default());
            let info = PassInfo { scale_x: x, scale_y: y, ..PassInfo::default() };
            chain.set_pass_info(0, info.clone()).expect("info");
            for i in 0..2 {
                let shader = fake_shader(passthrough_reflection());
                chain
                    .set_shader(i, shader.vertex, shader.fragment, shader.reflection)
                    .expect("shader");
            }
            chain.init(&mut gpu).expect("init");

            let vp = viewport(window.width, window.height);
            let draws = run_frame(&mut chain, &mut gpu, input, 1, vp);
            let expected = info.output_size(input, input, window);
            prop_assert!(expected.width >= 1 && expected.height >= 1);
            prop_assert_eq!(chain.pass_output_size(0), Some(expected));
            prop_assert_eq!(draws[0].target_size(), expected);
            prop_assert_eq!(draws[1].target_size(), window);
            chain.destroy(&mut gpu);
        }
    }
}
