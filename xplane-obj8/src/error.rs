use thiserror::Error;

/// Error types for scene collection, transform baking and directive serialization
#[derive(Error, Debug)]
pub enum ExportError {
    /// Malformed hierarchy (nested exportable roots, orphaned animation-only bones).
    /// Fatal to the whole export pass.
    #[error("Structural error: {0}")]
    Structural(String),

    /// A rotation sequence that cannot be represented, or fewer than 2
    /// non-clamping keyframes remain after trimming. The offending dataref is
    /// treated as non-animating and export continues.
    #[error("Animation shape error: {0}")]
    AnimationShape(String),

    /// Higher-layer shape rules on a single payload. Aborts only that payload.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error: a programming-contract violation (e.g. asking for the
    /// pre-animation matrix of the root bone). Aborts the pass immediately.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type using ExportError
pub type Result<T> = std::result::Result<T, ExportError>;
