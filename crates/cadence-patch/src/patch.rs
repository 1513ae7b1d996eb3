//! Patch operations
//!
//! An [`IrPatch`] is one structural edit, expressed independently of any
//! particular document. NOT text diffs: every operation replaces, inserts,
//! removes or renames whole blocks.

use crate::error::PatchError;
use crate::target::IrTarget;
use crate::validate::validate_patches;
use cadence_ir::Block;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One structural edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IrPatch {
    /// Swap a block's payload, or a section's body
    Replace { target: IrTarget, value: ReplaceValue },

    /// Insert blocks before the target's first block
    InsertBefore { target: IrTarget, values: Vec<Block> },

    /// Insert blocks after the target's last block
    InsertAfter { target: IrTarget, values: Vec<Block> },

    /// Remove a block, or a heading with its body
    Delete { target: IrTarget },

    /// Change a heading's text, keeping id and level
    RenameHeading {
        target: IrTarget,
        #[serde(rename = "newText")]
        new_text: String,
        #[serde(
            rename = "expectedText",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        expected_text: Option<String>,
    },
}

/// Replacement payload: one block for a block target, a body for a section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplaceValue {
    Body(Vec<Block>),
    Single(Block),
}

impl IrPatch {
    /// Target of this patch
    #[inline]
    #[must_use]
    pub fn target(&self) -> &IrTarget {
        match self {
            Self::Replace { target, .. }
            | Self::InsertBefore { target, .. }
            | Self::InsertAfter { target, .. }
            | Self::Delete { target }
            | Self::RenameHeading { target, .. } => target,
        }
    }

    /// Wire name of the operation
    #[inline]
    #[must_use]
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Replace { .. } => "replace",
            Self::InsertBefore { .. } => "insert_before",
            Self::InsertAfter { .. } => "insert_after",
            Self::Delete { .. } => "delete",
            Self::RenameHeading { .. } => "rename_heading",
        }
    }

    /// Whether this is a `rename_heading` patch
    #[inline]
    #[must_use]
    pub fn is_rename(&self) -> bool {
        matches!(self, Self::RenameHeading { .. })
    }

    /// Rename patch builder
    pub fn rename(
        section_id: impl Into<String>,
        new_text: impl Into<String>,
        expected_text: Option<String>,
    ) -> Self {
        Self::RenameHeading {
            target: IrTarget::section(section_id),
            new_text: new_text.into(),
            expected_text,
        }
    }
}

/// Wire envelope `{ "patches": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchList {
    #[serde(default)]
    pub patches: Vec<IrPatch>,
}

impl PatchList {
    /// Parse generation output: JSON envelope, grammar check, decode
    ///
    /// A missing or `null` `patches` key is an empty list.
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidPatch`] if the text is not JSON, is not an
    /// object, or any patch violates the grammar
    pub fn parse(raw: &str) -> Result<Self, PatchError> {
        let envelope: Value = serde_json::from_str(raw)
            .map_err(|e| PatchError::invalid(vec![format!("/ invalid JSON: {e}")]))?;
        let Value::Object(mut map) = envelope else {
            return Err(PatchError::invalid(vec![
                "/ must be an object with a 'patches' array".to_string(),
            ]));
        };
        let candidate = match map.remove("patches") {
            None | Some(Value::Null) => Value::Array(Vec::new()),
            Some(patches) => patches,
        };
        Ok(Self {
            patches: decode_patches(&candidate)?,
        })
    }
}

/// Validate a candidate list against the grammar, then decode it
///
/// Nothing is decoded if any patch fails validation.
///
/// # Errors
/// Returns [`PatchError::InvalidPatch`] with every violation
pub fn decode_patches(candidate: &Value) -> Result<Vec<IrPatch>, PatchError> {
    validate_patches(candidate)
        .into_result()
        .map_err(PatchError::invalid)?;
    serde_json::from_value(candidate.clone())
        .map_err(|e| PatchError::invalid(vec![format!("/ {e}")]))
}
