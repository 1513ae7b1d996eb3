//! Revision data types
//!
//! Wire shapes use camelCase field names so that records written here and
//! records read back from an existing project blob share one format.

use cadence_ir::ArtifactIr;
use cadence_patch::{IrPatch, IrTarget};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// How a revision rewrites the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionMode {
    /// Targeted structural patches
    #[default]
    Patch,
    /// Full regeneration with the heading skeleton frozen
    FullRegenLockedOutline,
    /// Full regeneration, outline may change
    FullRegenAllowReflow,
}

impl RevisionMode {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::FullRegenLockedOutline => "full_regen_locked_outline",
            Self::FullRegenAllowReflow => "full_regen_allow_reflow",
        }
    }

    /// Whether the whole document is regenerated
    #[inline]
    #[must_use]
    pub const fn is_full_regen(self) -> bool {
        !matches!(self, Self::Patch)
    }
}

impl Display for RevisionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An approved heading text change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingRename {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// Validation outcome recorded for a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationOutcome {
    Passed,
    Repaired,
    Failed,
}

impl ValidationOutcome {
    /// Outcome of a successful revision
    #[inline]
    #[must_use]
    pub const fn from_repaired(repaired: bool) -> Self {
        if repaired {
            Self::Repaired
        } else {
            Self::Passed
        }
    }
}

/// Output of a successful revision
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionResult {
    /// Accepted document
    pub ir: ArtifactIr,
    /// Patches applied (rename proposals in locked-outline mode)
    pub patches: Vec<IrPatch>,
    /// Whether validate-or-repair needed a repair round
    pub repaired: bool,
    /// Whether the locked-outline re-prompt was needed
    pub outline_repaired: bool,
    pub mode: RevisionMode,
    pub heading_renames: Vec<HeadingRename>,
}

/// Target stored on a record: a patch target, or the whole artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordTarget {
    Target(IrTarget),
    Artifact,
}

impl RecordTarget {
    const ARTIFACT: &'static str = "artifact";

    /// Record target for a revision in `mode`
    #[must_use]
    pub fn for_mode(mode: RevisionMode, target: &IrTarget) -> Self {
        if mode.is_full_regen() {
            Self::Artifact
        } else {
            Self::Target(target.clone())
        }
    }
}

impl Serialize for RecordTarget {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Target(target) => target.serialize(serializer),
            Self::Artifact => serializer.serialize_str(Self::ARTIFACT),
        }
    }
}

impl<'de> Deserialize<'de> for RecordTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) if s == Self::ARTIFACT => Ok(Self::Artifact),
            other => IrTarget::deserialize(other)
                .map(Self::Target)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// One immutable revision log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRecord {
    pub revision_id: String,
    /// RFC 3339
    pub timestamp: String,
    pub mode: RevisionMode,
    pub target: RecordTarget,
    pub instruction: String,
    /// Provider name; kept as free text so records from any provider decode
    pub provider: String,
    pub model: Option<String>,
    pub patch_count: usize,
    pub validation: ValidationOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_renames: Option<Vec<HeadingRename>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub ir_hash_before: String,
    pub ir_hash_after: String,
}

impl RevisionRecord {
    /// Fresh `rev_`-prefixed ULID
    #[must_use]
    pub fn new_id() -> String {
        format!("rev_{}", ulid::Ulid::new().to_string().to_lowercase())
    }

    /// Current UTC time in RFC 3339
    #[must_use]
    pub fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

/// First `limit` characters of `text`
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
