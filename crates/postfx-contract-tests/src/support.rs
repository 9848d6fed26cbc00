use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use postfx_core::{ChainError, Filter, Size2D, Viewport};
use postfx_reflect::{BlockKind, CompiledShader, RawReflection};
use postfx_runtime::mock::{fake_shader, parameter, FakeCompiler, MockBackend, MockImageLoader, RecordedDraw};
use postfx_runtime::{ChainCreateInfo, FilterChain, IDENTITY_MVP};

// ---- Golden fixtures (slangp contracts) ----
pub const CRT_TWO_PASS: &str = include_str!("../fixtures/crt_two_pass.slangp");
pub const ABSOLUTE_WIDTH: &str = include_str!("../fixtures/absolute_width.slangp");
pub const HISTORY: &str = include_str!("../fixtures/history.slangp");
pub const FEEDBACK: &str = include_str!("../fixtures/feedback.slangp");
pub const FINAL_FEEDBACK: &str = include_str!("../fixtures/final_feedback.slangp");
pub const UNKNOWN_SEMANTIC: &str = include_str!("../fixtures/unknown_semantic.slangp");
pub const VIEWPORT_SINGLE: &str = include_str!("../fixtures/viewport_single.slangp");
pub const EMPTY: &str = include_str!("../fixtures/empty.slangp");
pub const MISSING_KEY: &str = include_str!("../fixtures/missing_key.slangp");

/// Writes `contents` as `<name>.slangp` inside a fresh temp directory.
pub fn write_temp_fixture(name: &str, contents: &str) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "postfx_contract_tests_{name}_{}_{ts}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create fixture dir");
    let path = dir.join(format!("{name}.slangp"));
    fs::write(&path, contents).expect("write fixture");
    path
}

pub fn remove_fixture(path: &Path) {
    if let Some(dir) = path.parent() {
        let _ = fs::remove_dir_all(dir);
    }
}

fn base() -> RawReflection {
    RawReflection::new()
        .with_ubo(0, 80)
        .member("MVP", BlockKind::Ubo, 0, 16)
        .texture("Source", 2)
}

fn gamma(initial: f32) -> postfx_reflect::ParameterMeta {
    parameter("gamma", initial, 1.0, 3.0, 0.1)
}

fn with_gamma(reflection: RawReflection, initial: f32) -> CompiledShader {
    let mut shader = fake_shader(
        reflection
            .with_push_constants(4)
            .member("gamma", BlockKind::PushConstant, 0, 1),
    );
    shader.parameters.push(gamma(initial));
    shader
}

/// Canned output for every shader the fixtures name.
pub fn compiler() -> FakeCompiler {
    FakeCompiler::new()
        .with_shader("linearize.slang", with_gamma(base(), 2.2))
        .with_shader("crt.slang", crt_shader(2.2))
        .with_shader("stage.slang", fake_shader(base()))
        .with_shader(
            "sized.slang",
            fake_shader(base().member("SourceSize", BlockKind::Ubo, 64, 4)),
        )
        .with_shader(
            "motion_blur.slang",
            fake_shader(
                base()
                    .texture("OriginalHistory1", 3)
                    .texture("OriginalHistory2", 4)
                    .texture("OriginalHistory3", 5),
            ),
        )
        .with_shader("accumulate.slang", fake_shader(base().texture("AccumFeedback", 3)))
        .with_shader("present.slang", fake_shader(base()))
        .with_shader("self_feedback.slang", fake_shader(base().texture("PassFeedback0", 3)))
        .with_shader("bogus_texture.slang", fake_shader(base().texture("Bogus", 3)))
}

/// `crt.slang` reads the aliased first pass, its size and the mask LUT.
pub fn crt_shader(gamma_initial: f32) -> CompiledShader {
    with_gamma(
        base()
            .member("LinearizedSize", BlockKind::Ubo, 64, 4)
            .texture("Linearized", 3)
            .texture("mask", 4),
        gamma_initial,
    )
}

pub fn images() -> MockImageLoader {
    MockImageLoader::new().with_image("mask.png", Size2D::new(4, 4), 77)
}

pub fn load(
    gpu: &mut MockBackend,
    compiler: &FakeCompiler,
    images: &MockImageLoader,
    path: &Path,
) -> Result<FilterChain<MockBackend>, ChainError> {
    FilterChain::create_from_preset(
        gpu,
        compiler,
        images,
        path,
        Filter::Linear,
        ChainCreateInfo::default(),
    )
}

/// Runs one frame with a fresh input stamped `content` and returns its draws.
pub fn run_frame(
    chain: &mut FilterChain<MockBackend>,
    gpu: &mut MockBackend,
    size: Size2D,
    content: u64,
    viewport: Viewport,
) -> Vec<RecordedDraw> {
    let first = gpu.draws.len();
    let input = gpu.create_input(size, content);
    chain.set_input_texture(input);
    chain.build_offscreen_passes(gpu, viewport);
    chain.build_viewport_pass(gpu, viewport, &IDENTITY_MVP);
    chain.end_frame();
    gpu.draws[first..].to_vec()
}
