use std::collections::HashMap;
use std::fs;
use std::path::Path;

use postfx_core::{Address, ChainError, Filter, PresetError, ScalePolicy};

use crate::{
    FboScale, LutConfig, PassConfig, ShaderPreset, MAX_PARAMETERS, MAX_PASSES, MAX_TEXTURES,
};

/// Accepts the spellings preset files use for booleans.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
struct Entry {
    line: usize,
    value: String,
}

/// Flat key/value view of a preset file. Later keys win.
#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Entry>,
}

impl Entries {
    fn parse(text: &str) -> Result<Self, PresetError> {
        let mut map = HashMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('#') {
                if trimmed.starts_with("#include") || trimmed.starts_with("#reference") {
                    tracing::warn!(line, directive = trimmed, "preset directive ignored");
                }
                continue;
            }
            let (key, value) = split_entry(trimmed).ok_or_else(|| PresetError::Malformed {
                line,
                text: trimmed.to_string(),
            })?;
            map.insert(key.to_string(), Entry { line, value });
        }
        Ok(Self { map })
    }

    fn string(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|e| e.value.as_str())
    }

    fn typed<T>(&self, key: &str, conv: impl Fn(&str) -> Option<T>) -> Result<Option<T>, PresetError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(e) => conv(&e.value).map(Some).ok_or_else(|| PresetError::InvalidValue {
                line: e.line,
                key: key.to_string(),
                value: e.value.clone(),
            }),
        }
    }

    fn bool(&self, key: &str) -> Result<Option<bool>, PresetError> {
        self.typed(key, parse_bool)
    }

    fn u32(&self, key: &str) -> Result<Option<u32>, PresetError> {
        self.typed(key, |v| v.trim().parse::<u32>().ok())
    }

    fn f32(&self, key: &str) -> Result<Option<f32>, PresetError> {
        self.typed(key, |v| v.trim().parse::<f32>().ok().filter(|f| f.is_finite()))
    }

    fn required(&self, key: &str) -> Result<&str, PresetError> {
        self.string(key).ok_or_else(|| PresetError::MissingKey {
            key: key.to_string(),
        })
    }
}

/// `key = value`, `key = "value"`; an unquoted value ends at `#`.
fn split_entry(line: &str) -> Option<(&str, String)> {
    let (key, rest) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let value = if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        quoted[..end].to_string()
    } else {
        let end = rest.find('#').unwrap_or(rest.len());
        rest[..end].trim().to_string()
    };
    Some((key, value))
}

#[derive(Debug, Clone, Copy)]
enum ScaleKind {
    Source,
    Viewport,
    Absolute,
}

fn scale_kind(entries: &Entries, key: &str) -> Result<Option<ScaleKind>, PresetError> {
    entries.typed(key, |v| match v.trim() {
        "source" => Some(ScaleKind::Source),
        "viewport" => Some(ScaleKind::Viewport),
        "absolute" => Some(ScaleKind::Absolute),
        _ => None,
    })
}

fn scale_axis(
    entries: &Entries,
    pass: usize,
    axis: &str,
    kind: ScaleKind,
) -> Result<ScalePolicy, PresetError> {
    let shared = format!("scale{pass}");
    let specific = format!("scale_{axis}{pass}");
    match kind {
        ScaleKind::Absolute => {
            let n = match entries.f32(&shared)? {
                Some(n) => Some(n),
                None => entries.f32(&specific)?,
            };
            n.map(|n| ScalePolicy::Absolute((n.round() as u32).max(1)))
                .ok_or(PresetError::MissingKey { key: specific })
        }
        ScaleKind::Source | ScaleKind::Viewport => {
            let f = match entries.f32(&shared)? {
                Some(f) => f,
                None => entries.f32(&specific)?.unwrap_or(1.0),
            };
            Ok(match kind {
                ScaleKind::Viewport => ScalePolicy::Viewport(f),
                _ => ScalePolicy::Source(f),
            })
        }
    }
}

fn parse_fbo(entries: &Entries, pass: usize) -> Result<Option<FboScale>, PresetError> {
    let (kx, ky) = match scale_kind(entries, &format!("scale_type{pass}"))? {
        Some(kind) => (Some(kind), Some(kind)),
        None => (
            scale_kind(entries, &format!("scale_type_x{pass}"))?,
            scale_kind(entries, &format!("scale_type_y{pass}"))?,
        ),
    };
    if kx.is_none() && ky.is_none() {
        return Ok(None);
    }
    Ok(Some(FboScale {
        x: scale_axis(entries, pass, "x", kx.unwrap_or(ScaleKind::Source))?,
        y: scale_axis(entries, pass, "y", ky.unwrap_or(ScaleKind::Source))?,
    }))
}

fn parse_pass(entries: &Entries, pass: usize, base: &Path) -> Result<PassConfig, PresetError> {
    let source = entries.required(&format!("shader{pass}"))?;
    let filter = entries
        .bool(&format!("filter_linear{pass}"))?
        .map(|linear| if linear { Filter::Linear } else { Filter::Nearest });
    let wrap = entries
        .string(&format!("wrap_mode{pass}"))
        .map(Address::from_wrap_mode)
        .unwrap_or_default();

    Ok(PassConfig {
        source: base.join(source),
        alias: entries
            .string(&format!("alias{pass}"))
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        filter,
        wrap,
        mipmap_input: entries.bool(&format!("mipmap_input{pass}"))?.unwrap_or(false),
        frame_count_mod: entries.u32(&format!("frame_count_mod{pass}"))?.unwrap_or(0),
        fbo: parse_fbo(entries, pass)?,
        float_framebuffer: entries
            .bool(&format!("float_framebuffer{pass}"))?
            .unwrap_or(false),
        srgb_framebuffer: entries
            .bool(&format!("srgb_framebuffer{pass}"))?
            .unwrap_or(false),
    })
}

fn split_list(value: &str) -> Vec<&str> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_textures(entries: &Entries, base: &Path) -> Result<Vec<LutConfig>, PresetError> {
    let Some(list) = entries.string("textures") else {
        return Ok(Vec::new());
    };
    let ids = split_list(list);
    if ids.len() > MAX_TEXTURES {
        return Err(PresetError::TooManyTextures {
            count: ids.len(),
            max: MAX_TEXTURES,
        });
    }
    ids.into_iter()
        .map(|id| {
            let path = entries.required(id)?;
            let linear = entries.bool(&format!("{id}_linear"))?.unwrap_or(true);
            Ok(LutConfig {
                id: id.to_string(),
                path: base.join(path),
                filter: if linear { Filter::Linear } else { Filter::Nearest },
                wrap: entries
                    .string(&format!("{id}_wrap_mode"))
                    .map(Address::from_wrap_mode)
                    .unwrap_or_default(),
                mipmap: entries.bool(&format!("{id}_mipmap"))?.unwrap_or(false),
            })
        })
        .collect()
}

impl ShaderPreset {
    /// Reads a preset file; relative paths resolve against its directory.
    pub fn from_path(path: &Path) -> Result<Self, ChainError> {
        let text = fs::read_to_string(path).map_err(|e| ChainError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(Self::parse_str(&text, base)?)
    }

    pub fn parse_str(text: &str, base_dir: &Path) -> Result<Self, PresetError> {
        let entries = Entries::parse(text)?;

        let count = entries
            .u32("shaders")?
            .ok_or_else(|| PresetError::MissingKey {
                key: "shaders".into(),
            })? as usize;
        if count > MAX_PASSES {
            return Err(PresetError::TooManyPasses {
                count,
                max: MAX_PASSES,
            });
        }

        let passes = (0..count)
            .map(|i| parse_pass(&entries, i, base_dir))
            .collect::<Result<Vec<_>, _>>()?;
        let textures = parse_textures(&entries, base_dir)?;

        let mut overrides = std::collections::BTreeMap::new();
        if let Some(list) = entries.string("parameters") {
            let ids = split_list(list);
            if ids.len() > MAX_PARAMETERS {
                return Err(PresetError::TooManyParameters {
                    count: ids.len(),
                    max: MAX_PARAMETERS,
                });
            }
            for id in ids {
                match entries.f32(id)? {
                    Some(v) => {
                        overrides.insert(id.to_string(), v);
                    }
                    None => tracing::warn!(parameter = id, "parameter listed but not set in preset"),
                }
            }
        }

        Ok(ShaderPreset {
            passes,
            textures,
            parameters: Vec::new(),
            overrides,
        })
    }
}
