use std::path::PathBuf;

/// Errors for the whole postfx SDK.
///
/// Contract rule: this type lives in `postfx-core` and is re-exported by runtimes.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("invalid config at {}: {msg}", .path.display())]
    Config { path: PathBuf, msg: String },

    #[error("pass {index}: {msg}")]
    Pass { index: usize, msg: String },

    #[error("preset error: {0}")]
    Preset(#[from] PresetError),

    #[error("parameter `{id}` is declared with conflicting values")]
    ParameterMismatch { id: String },

    #[error("shader compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("shader reflection error: {0}")]
    Reflect(#[from] ReflectError),

    #[error("backend resource creation failed: {0}")]
    Resource(String),

    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to load image {}: {msg}", .path.display())]
    Image { path: PathBuf, msg: String },

    #[error("json parse error at {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("filter chain has no passes")]
    EmptyChain,

    #[error("pass {index} is the final pass and cannot use feedback")]
    FeedbackOnFinalPass { index: usize },

    #[error("alias `{name}` is used by more than one pass or texture")]
    DuplicateAlias { name: String },
}

impl ChainError {
    pub fn resource<T: Into<String>>(s: T) -> Self {
        ChainError::Resource(s.into())
    }
}

/// Malformed preset files.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PresetError {
    #[error("missing required key `{key}`")]
    MissingKey { key: String },

    #[error("line {line}: invalid value `{value}` for `{key}`")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },

    #[error("line {line}: malformed entry `{text}`")]
    Malformed { line: usize, text: String },

    #[error("{count} passes exceeds the limit of {max}")]
    TooManyPasses { count: usize, max: usize },

    #[error("{count} lookup textures exceeds the limit of {max}")]
    TooManyTextures { count: usize, max: usize },

    #[error("{count} parameters exceeds the limit of {max}")]
    TooManyParameters { count: usize, max: usize },
}

/// Failures of the shader front-end or of native program creation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("{}: {msg}", .path.display())]
    Source { path: PathBuf, msg: String },

    #[error("SPIR-V translation failed: {0}")]
    Translate(String),

    #[error("vertex shader compile error: {0}")]
    Vertex(String),

    #[error("fragment shader compile error: {0}")]
    Fragment(String),

    #[error("program link error: {0}")]
    Link(String),
}

/// Shader resources that cannot be mapped onto chain semantics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReflectError {
    #[error("pass {pass}: unknown uniform `{name}`")]
    UnknownUniform { pass: usize, name: String },

    #[error("pass {pass}: unknown texture `{name}`")]
    UnknownTexture { pass: usize, name: String },

    #[error("pass {pass}: `{name}` has {found} components, expected {expected}")]
    TypeMismatch {
        pass: usize,
        name: String,
        expected: u32,
        found: u32,
    },

    #[error("pass {pass}: `{name}` at offset {offset} overruns its {size}-byte block")]
    OffsetOutOfBounds {
        pass: usize,
        name: String,
        offset: usize,
        size: usize,
    },

    #[error("pass {pass}: binding {binding} is used more than once")]
    BindingCollision { pass: usize, binding: u32 },

    #[error("pass {pass}: binding {binding} exceeds the maximum of {max}")]
    BindingOutOfRange { pass: usize, binding: u32, max: u32 },

    #[error("pass {pass}: references output of pass {referenced}, which does not run earlier")]
    ForwardReference { pass: usize, referenced: usize },

    #[error("pass {pass}: references feedback of pass {referenced}, which does not exist")]
    FeedbackOutOfRange { pass: usize, referenced: usize },

    #[error("pass {pass}: references lookup texture {index}, but only {count} are loaded")]
    UserOutOfRange {
        pass: usize,
        index: usize,
        count: usize,
    },

    #[error("pass {pass}: history index {index} exceeds the configured depth of {max}")]
    HistoryTooDeep { pass: usize, index: usize, max: usize },
}
