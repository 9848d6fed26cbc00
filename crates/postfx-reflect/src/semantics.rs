use std::collections::HashMap;

use postfx_core::ChainError;

/// Non-texture uniforms a pass can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSemantic {
    Mvp,
    OutputSize,
    FinalViewportSize,
    FrameCount,
    /// Index into the chain's merged parameter list.
    FloatParameter(usize),
}

impl UniformSemantic {
    /// Expected width in 32-bit scalars.
    pub fn components(self) -> u32 {
        match self {
            UniformSemantic::Mvp => 16,
            UniformSemantic::OutputSize | UniformSemantic::FinalViewportSize => 4,
            UniformSemantic::FrameCount | UniformSemantic::FloatParameter(_) => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSemantic {
    /// The unprocessed core frame.
    Original,
    /// Output of the previous pass (the original for pass 0).
    Source,
    /// `OriginalHistoryN`; index 0 is the current frame.
    OriginalHistory,
    PassOutput,
    PassFeedback,
    /// Lookup texture from the preset.
    User,
}

/// A texture semantic with its array index (0 for `Original` and `Source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef {
    pub semantic: TextureSemantic,
    pub index: usize,
}

impl TextureRef {
    pub const ORIGINAL: TextureRef = TextureRef::new(TextureSemantic::Original, 0);
    pub const SOURCE: TextureRef = TextureRef::new(TextureSemantic::Source, 0);

    pub const fn new(semantic: TextureSemantic, index: usize) -> Self {
        Self { semantic, index }
    }
}

fn indexed(name: &str, prefix: &str) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn builtin_texture(name: &str) -> Option<TextureRef> {
    match name {
        "Original" => return Some(TextureRef::ORIGINAL),
        "Source" => return Some(TextureRef::SOURCE),
        _ => {}
    }
    const ARRAYS: [(&str, TextureSemantic); 4] = [
        ("OriginalHistory", TextureSemantic::OriginalHistory),
        ("PassOutput", TextureSemantic::PassOutput),
        ("PassFeedback", TextureSemantic::PassFeedback),
        ("User", TextureSemantic::User),
    ];
    ARRAYS
        .iter()
        .find_map(|(prefix, sem)| indexed(name, prefix).map(|i| TextureRef::new(*sem, i)))
}

fn builtin_uniform(name: &str) -> Option<UniformSemantic> {
    match name {
        "MVP" => Some(UniformSemantic::Mvp),
        "OutputSize" => Some(UniformSemantic::OutputSize),
        "FinalViewportSize" => Some(UniformSemantic::FinalViewportSize),
        "FrameCount" => Some(UniformSemantic::FrameCount),
        _ => None,
    }
}

/// Name resolution for one chain: built-in names plus pass aliases, lookup texture
/// ids and parameter ids.
#[derive(Debug, Clone, Default)]
pub struct SemanticMap {
    textures: HashMap<String, TextureRef>,
    parameters: HashMap<String, usize>,
    lut_count: usize,
}

impl SemanticMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&mut self, name: &str, texture: TextureRef) -> Result<(), ChainError> {
        let taken = builtin_texture(name).is_some()
            || builtin_uniform(name).is_some()
            || self.textures.contains_key(name);
        if taken {
            return Err(ChainError::DuplicateAlias {
                name: name.to_string(),
            });
        }
        self.textures.insert(name.to_string(), texture);
        Ok(())
    }

    /// Exposes pass `pass` as `name` and its feedback as `nameFeedback`.
    pub fn insert_alias(&mut self, name: &str, pass: usize) -> Result<(), ChainError> {
        self.claim(name, TextureRef::new(TextureSemantic::PassOutput, pass))?;
        self.claim(
            &format!("{name}Feedback"),
            TextureRef::new(TextureSemantic::PassFeedback, pass),
        )
    }

    pub fn insert_lut(&mut self, id: &str, index: usize) -> Result<(), ChainError> {
        self.claim(id, TextureRef::new(TextureSemantic::User, index))?;
        self.lut_count = self.lut_count.max(index + 1);
        Ok(())
    }

    pub fn insert_parameter(&mut self, id: &str, index: usize) {
        self.parameters.insert(id.to_string(), index);
    }

    pub fn lut_count(&self) -> usize {
        self.lut_count
    }

    pub fn resolve_texture(&self, name: &str) -> Option<TextureRef> {
        builtin_texture(name).or_else(|| self.textures.get(name).copied())
    }

    /// `<texture>Size`, e.g. `SourceSize` or `LinearizedFeedbackSize`.
    pub fn resolve_texture_size(&self, name: &str) -> Option<TextureRef> {
        name.strip_suffix("Size")
            .and_then(|base| self.resolve_texture(base))
    }

    pub fn resolve_uniform(&self, name: &str) -> Option<UniformSemantic> {
        builtin_uniform(name).or_else(|| {
            self.parameters
                .get(name)
                .map(|i| UniformSemantic::FloatParameter(*i))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_resolve() {
        let map = SemanticMap::new();
        assert_eq!(map.resolve_texture("Original"), Some(TextureRef::ORIGINAL));
        assert_eq!(
            map.resolve_texture("OriginalHistory12"),
            Some(TextureRef::new(TextureSemantic::OriginalHistory, 12))
        );
        assert_eq!(
            map.resolve_texture_size("PassFeedback0Size"),
            Some(TextureRef::new(TextureSemantic::PassFeedback, 0))
        );
        assert_eq!(map.resolve_texture("PassOutput"), None);
        assert_eq!(map.resolve_texture("User1x"), None);
        assert_eq!(map.resolve_uniform("MVP"), Some(UniformSemantic::Mvp));
        assert_eq!(map.resolve_uniform("gamma"), None);
    }

    #[test]
    fn aliases_expose_output_and_feedback() {
        let mut map = SemanticMap::new();
        map.insert_alias("Blur", 2).expect("alias");
        assert_eq!(
            map.resolve_texture("Blur"),
            Some(TextureRef::new(TextureSemantic::PassOutput, 2))
        );
        assert_eq!(
            map.resolve_texture_size("BlurFeedbackSize"),
            Some(TextureRef::new(TextureSemantic::PassFeedback, 2))
        );
    }

    #[test]
    fn duplicate_and_builtin_aliases_are_rejected() {
        let mut map = SemanticMap::new();
        map.insert_alias("Blur", 0).expect("alias");
        assert!(matches!(
            map.insert_alias("Blur", 1),
            Err(ChainError::DuplicateAlias { .. })
        ));
        assert!(matches!(
            map.insert_lut("Source", 0),
            Err(ChainError::DuplicateAlias { .. })
        ));
        assert!(map.insert_lut("mask", 0).is_ok());
        assert!(matches!(
            map.insert_alias("mask", 1),
            Err(ChainError::DuplicateAlias { .. })
        ));
        assert_eq!(map.lut_count(), 1);
    }

    #[test]
    fn parameters_resolve_to_their_index() {
        let mut map = SemanticMap::new();
        map.insert_parameter("gamma", 3);
        assert_eq!(
            map.resolve_uniform("gamma"),
            Some(UniformSemantic::FloatParameter(3))
        );
    }
}
