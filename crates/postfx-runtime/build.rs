use std::path::PathBuf;

// Stock shaders are authored in WGSL and embedded as SPIR-V.
const SHADERS: &[(&str, &str, &str)] = &[("opaque", "vs_main", "fs_main")];

fn compile(
    module: &naga::Module,
    info: &naga::valid::ModuleInfo,
    stage: naga::ShaderStage,
    entry_point: &str,
) -> Vec<u32> {
    let options = naga::back::spv::Options {
        flags: naga::back::spv::WriterFlags::LABEL_VARYINGS,
        ..Default::default()
    };
    let pipeline = naga::back::spv::PipelineOptions {
        shader_stage: stage,
        entry_point: entry_point.to_string(),
    };
    naga::back::spv::write_vec(module, info, &options, Some(&pipeline))
        .unwrap_or_else(|e| panic!("SPIR-V generation failed for {entry_point}: {e}"))
}

fn main() {
    let crate_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR"));

    for (name, vs, fs) in SHADERS {
        let src_path = crate_dir.join("shaders").join(format!("{name}.wgsl"));
        println!("cargo:rerun-if-changed={}", src_path.display());

        let source = std::fs::read_to_string(&src_path)
            .unwrap_or_else(|e| panic!("read {}: {e}", src_path.display()));
        let module = naga::front::wgsl::parse_str(&source)
            .unwrap_or_else(|e| panic!("parse {name}.wgsl: {}", e.emit_to_string(&source)));
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        let info = validator
            .validate(&module)
            .unwrap_or_else(|e| panic!("validate {name}.wgsl: {e:?}"));

        for (stage, entry, ext) in [
            (naga::ShaderStage::Vertex, vs, "vert"),
            (naga::ShaderStage::Fragment, fs, "frag"),
        ] {
            let words = compile(&module, &info, stage, entry);
            let out = out_dir.join(format!("{name}.{ext}.spv"));
            std::fs::write(&out, bytemuck::cast_slice::<u32, u8>(&words))
                .unwrap_or_else(|e| panic!("write {}: {e}", out.display()));
        }
    }
}
