#[cfg(test)]
mod tests {
    use postfx_runtime::mock::MockBackend;

    use crate::support::*;

    /// Determinism contract:
    /// loading the same preset twice yields structurally equal chains.
    #[test]
    fn preset_load_is_deterministic_for_same_file() {
        let path = write_temp_fixture("determinism", CRT_TWO_PASS);
        let mut gpu = MockBackend::new();
        let compiler = compiler();
        let images = images();

        let c1 = load(&mut gpu, &compiler, &images, &path).expect("load 1");
        let c2 = load(&mut gpu, &compiler, &images, &path).expect("load 2");

        assert_eq!(c1.num_passes(), c2.num_passes(), "pass count must be stable");
        for i in 0..c1.num_passes() {
            assert_eq!(c1.pass_info(i), c2.pass_info(i), "pass {i} info must be stable");
        }
        assert_eq!(
            c1.preset().map(|p| &p.parameters),
            c2.preset().map(|p| &p.parameters),
            "merged parameters must be stable"
        );
        assert_eq!(c1.history_depth(), c2.history_depth());
        assert_eq!(c1.feedback_passes(), c2.feedback_passes());

        c1.destroy(&mut gpu);
        c2.destroy(&mut gpu);
        remove_fixture(&path);
    }
}
