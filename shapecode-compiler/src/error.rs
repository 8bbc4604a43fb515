use thiserror::Error;

/// Reasons a shape cannot be compiled
///
/// Compilation of the offending shape is abandoned; no partial chain is
/// produced and chains of other shapes are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Unsupported shape: {kind} `{shape}` has no encode instructions")]
    UnsupportedShape { kind: &'static str, shape: String },

    #[error("Unresolved shape: `{name}` is not registered")]
    UnresolvedShape { name: String },

    #[error("Missing layout: `{shape}` has no static size")]
    MissingLayout { shape: String },

    #[error("Shape nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
}
