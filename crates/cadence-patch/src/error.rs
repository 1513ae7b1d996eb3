//! Patch errors
//!
//! Every failure of validation or application is a [`PatchError`]; the engine
//! never catches its own errors and never leaves a partially patched document.

/// Errors from patch validation and application
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// Candidate list does not match the patch grammar
    #[error("invalid patch payload: {}", .errors.join("; "))]
    InvalidPatch { errors: Vec<String> },

    /// Target id does not exist in the current document state
    #[error("patch target block not found: {0}")]
    TargetNotFound(String),

    /// Section target resolved to a non-heading block
    #[error("section target must reference a heading block id: {0}")]
    NotAHeading(String),

    /// Patch would remove the title page
    #[error("patch {patch} cannot remove required titlePage block '{block}'")]
    ProtectedBlock { patch: usize, block: String },

    /// `rename_heading` guard failed; the target is stale
    #[error("expected text mismatch for heading {id}: expected {expected:?}, found {actual:?}")]
    ExpectedTextMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    /// Payload shape does not fit the operation/target combination
    #[error("invalid payload for patch {patch}: {reason}")]
    InvalidPayload { patch: usize, reason: String },
}

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchErrorKind {
    /// Grammar or payload shape
    Validation,
    /// Missing id or non-heading section target
    Reference,
    /// Title page removal
    ProtectedStructure,
    /// Stale `expectedText`
    ConcurrencyGuard,
}

impl PatchError {
    /// Build grammar error from collected messages
    #[inline]
    pub fn invalid(errors: Vec<String>) -> Self {
        Self::InvalidPatch { errors }
    }

    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> PatchErrorKind {
        match self {
            Self::InvalidPatch { .. } | Self::InvalidPayload { .. } => PatchErrorKind::Validation,
            Self::TargetNotFound(_) | Self::NotAHeading(_) => PatchErrorKind::Reference,
            Self::ProtectedBlock { .. } => PatchErrorKind::ProtectedStructure,
            Self::ExpectedTextMismatch { .. } => PatchErrorKind::ConcurrencyGuard,
        }
    }

    /// Individual messages (grammar errors expand to one entry each)
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::InvalidPatch { errors } => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}
