//! Revision errors
//!
//! [`RevisionError`] wraps every failure the orchestrator can surface.
//! [`RevisionError::class`] maps each onto the failure taxonomy recorded in
//! provenance, and [`RevisionError::errors`] gives the message list stored on
//! a failed record.

use crate::provenance::ProvenanceError;
use crate::provider::ProviderError;
use cadence_ir::IrError;
use cadence_patch::{PatchError, PatchErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Failure class of a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed patches or schema-invalid IR
    Validation,
    /// Missing target id, or a non-heading section target
    Reference,
    /// Title page removal
    ProtectedStructure,
    /// Heading skeleton drift
    OutlineInvariant,
    /// Stale `expectedText`
    ConcurrencyGuard,
    /// Generation or repair capability failed
    Provider,
    /// Provenance storage failed
    Storage,
}

/// Where an outline check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineStage {
    /// Right after applying patches
    Patch,
    /// After the patched document went through repair
    PatchAfterRepair,
    /// Locked-outline regeneration, after the single re-prompt
    LockedRegen,
}

impl Display for OutlineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Patch => "patch revision violated outline invariants",
            Self::PatchAfterRepair => "patch revision violated outline invariants after repair",
            Self::LockedRegen => "locked-outline regeneration violated invariants",
        })
    }
}

/// Errors from a revision
#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    /// Patch validation or application failed
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Generation or repair capability failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Document could not be encoded or decoded
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Revision log could not be read or written
    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    /// Output did not validate (and repair, if any, was exhausted)
    #[error("{stage} failed validation: {}", .errors.join("; "))]
    Validation { stage: &'static str, errors: Vec<String> },

    /// `rename_heading` without `[[ALLOW_HEADING_RENAMES]]`
    #[error("rename_heading patches require [[ALLOW_HEADING_RENAMES]]")]
    RenamesNotAllowed,

    /// Two rename patches for one heading in one batch
    #[error("duplicate heading rename patch for id {0}")]
    DuplicateRename(String),

    /// Renamed heading absent from the before or after outline
    #[error("heading rename id not found in outline: {0}")]
    RenameTargetMissing(String),

    /// Heading skeleton drifted
    #[error("{stage}: {}", .violations.join("; "))]
    OutlineViolation {
        stage: OutlineStage,
        violations: Vec<String>,
    },
}

impl RevisionError {
    /// Validation failure for a named stage
    #[inline]
    pub fn validation(stage: &'static str, errors: Vec<String>) -> Self {
        Self::Validation { stage, errors }
    }

    /// Classify this error
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Patch(err) => match err.kind() {
                PatchErrorKind::Validation => ErrorClass::Validation,
                PatchErrorKind::Reference => ErrorClass::Reference,
                PatchErrorKind::ProtectedStructure => ErrorClass::ProtectedStructure,
                PatchErrorKind::ConcurrencyGuard => ErrorClass::ConcurrencyGuard,
            },
            Self::Provider(_) => ErrorClass::Provider,
            Self::Provenance(_) => ErrorClass::Storage,
            Self::Ir(_)
            | Self::Validation { .. }
            | Self::RenamesNotAllowed
            | Self::DuplicateRename(_) => ErrorClass::Validation,
            Self::RenameTargetMissing(_) => ErrorClass::Reference,
            Self::OutlineViolation { .. } => ErrorClass::OutlineInvariant,
        }
    }

    /// Messages to store on a failed revision record
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        match self {
            Self::Patch(err) => err.messages(),
            Self::Validation { errors, .. } => errors.clone(),
            Self::OutlineViolation { violations, .. } => violations.clone(),
            other => vec![other.to_string()],
        }
    }

    /// Whether the repair loop could in principle fix this
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.class() == ErrorClass::Validation
    }
}
