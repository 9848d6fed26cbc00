use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use postfx_core::{ChainError, Filter, ScalePolicy};

use crate::ShaderPreset;

fn scale_entries(out: &mut String, axis: &str, pass: usize, policy: ScalePolicy) {
    let (kind, value) = match policy {
        ScalePolicy::Source(f) => ("source", f.to_string()),
        ScalePolicy::Viewport(f) => ("viewport", f.to_string()),
        ScalePolicy::Absolute(n) => ("absolute", n.to_string()),
        // Presets cannot express this; treat as source-relative identity.
        ScalePolicy::Original => ("source", "1".to_string()),
    };
    let _ = writeln!(out, "scale_type_{axis}{pass} = \"{kind}\"");
    let _ = writeln!(out, "scale_{axis}{pass} = \"{value}\"");
}

impl ShaderPreset {
    /// Serializes the preset. Parameters whose `current` differs from `initial` are
    /// written as overrides alongside the overrides read from the file.
    pub fn to_preset_string(&self) -> String {
        self.render(None)
    }

    /// Writes the preset to `path`, making paths below its directory relative.
    pub fn write_to_path(&self, path: &Path) -> Result<(), ChainError> {
        let text = self.render(path.parent());
        fs::write(path, text).map_err(|e| ChainError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn render(&self, base: Option<&Path>) -> String {
        let show = |p: &Path| -> String {
            base.and_then(|b| p.strip_prefix(b).ok())
                .unwrap_or(p)
                .display()
                .to_string()
        };

        let mut out = String::new();
        let _ = writeln!(out, "shaders = \"{}\"", self.passes.len());

        for (i, pass) in self.passes.iter().enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(out, "shader{i} = \"{}\"", show(&pass.source));
            if let Some(filter) = pass.filter {
                let _ = writeln!(out, "filter_linear{i} = \"{}\"", filter == Filter::Linear);
            }
            let _ = writeln!(out, "wrap_mode{i} = \"{}\"", pass.wrap.wrap_mode_name());
            let _ = writeln!(out, "mipmap_input{i} = \"{}\"", pass.mipmap_input);
            if let Some(alias) = &pass.alias {
                let _ = writeln!(out, "alias{i} = \"{alias}\"");
            }
            let _ = writeln!(out, "float_framebuffer{i} = \"{}\"", pass.float_framebuffer);
            let _ = writeln!(out, "srgb_framebuffer{i} = \"{}\"", pass.srgb_framebuffer);
            if pass.frame_count_mod != 0 {
                let _ = writeln!(out, "frame_count_mod{i} = \"{}\"", pass.frame_count_mod);
            }
            if let Some(fbo) = pass.fbo {
                scale_entries(&mut out, "x", i, fbo.x);
                scale_entries(&mut out, "y", i, fbo.y);
            }
        }

        if !self.textures.is_empty() {
            let ids: Vec<&str> = self.textures.iter().map(|t| t.id.as_str()).collect();
            let _ = writeln!(out);
            let _ = writeln!(out, "textures = \"{}\"", ids.join(";"));
            for lut in &self.textures {
                let _ = writeln!(out, "{} = \"{}\"", lut.id, show(&lut.path));
                let _ = writeln!(out, "{}_linear = \"{}\"", lut.id, lut.filter == Filter::Linear);
                let _ = writeln!(out, "{}_wrap_mode = \"{}\"", lut.id, lut.wrap.wrap_mode_name());
                let _ = writeln!(out, "{}_mipmap = \"{}\"", lut.id, lut.mipmap);
            }
        }

        let mut values: BTreeMap<&str, f32> = self
            .overrides
            .iter()
            .map(|(id, v)| (id.as_str(), *v))
            .collect();
        for p in &self.parameters {
            if p.current != p.initial {
                values.insert(p.id.as_str(), p.current);
            }
        }
        if !values.is_empty() {
            let ids: Vec<&str> = values.keys().copied().collect();
            let _ = writeln!(out);
            let _ = writeln!(out, "parameters = \"{}\"", ids.join(";"));
            for (id, v) in values {
                let _ = writeln!(out, "{id} = \"{v}\"");
            }
        }

        out
    }
}
