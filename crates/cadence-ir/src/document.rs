//! Artifact IR document
//!
//! [`ArtifactIr`] is the canonical structured representation of a generated
//! document: artifact metadata plus an ordered, non-empty list of blocks.

use crate::block::{Block, BlockBody};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered block document
///
/// # Invariants
/// - `blocks` is non-empty; order is reading order
/// - the first block is conventionally a `titlePage`
/// - block ids are unique within the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactIr {
    /// Artifact metadata
    pub artifact: ArtifactMeta,

    /// Ordered content blocks
    pub blocks: Vec<Block>,

    /// Referenced binary assets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<Asset>>,

    /// Opaque style overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Map<String, Value>>,
}

impl ArtifactIr {
    /// Create document from metadata and blocks
    #[inline]
    #[must_use]
    pub fn new(artifact: ArtifactMeta, blocks: Vec<Block>) -> Self {
        Self {
            artifact,
            blocks,
            assets: None,
            styles: None,
        }
    }

    /// Parse from JSON text without schema validation
    ///
    /// # Errors
    /// Returns error if the text is not JSON or does not decode into the IR
    pub fn from_json_str(raw: &str) -> Result<Self, IrError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decode from an already-parsed JSON value
    ///
    /// # Errors
    /// Returns error if the value does not decode into the IR
    pub fn from_value(value: Value) -> Result<Self, IrError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encode as JSON value
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_value(&self) -> Result<Value, IrError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Encode as compact JSON text
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_string(&self) -> Result<String, IrError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Position of the first block with `id`
    #[must_use]
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id() == Some(id))
    }

    /// Block with `id`
    #[must_use]
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id() == Some(id))
    }

    /// Ordered heading skeleton
    #[must_use]
    pub fn outline(&self) -> Vec<HeadingSnapshot> {
        self.blocks
            .iter()
            .filter_map(|block| match &block.body {
                BlockBody::Heading { level, text } => Some(HeadingSnapshot {
                    id: block.id().map(str::to_string),
                    level: *level,
                    text: text.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Artifact metadata header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub title: String,
    pub template: String,
}

impl ArtifactMeta {
    /// Create metadata header
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: ArtifactKind,
        title: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            template: template.into(),
        }
    }
}

/// Document family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Report,
    Prd,
    Deck,
    Memo,
    Custom,
}

impl ArtifactKind {
    /// Every artifact kind
    pub const ALL: [ArtifactKind; 5] = [
        Self::Report,
        Self::Prd,
        Self::Deck,
        Self::Memo,
        Self::Custom,
    ];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Prd => "prd",
            Self::Deck => "deck",
            Self::Memo => "memo",
            Self::Custom => "custom",
        }
    }
}

/// Binary asset reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// One entry of a document outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingSnapshot {
    pub id: Option<String>,
    pub level: u8,
    pub text: String,
}

/// Errors decoding or encoding the IR
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// JSON syntax or shape error
    #[error("artifact IR json error: {0}")]
    Json(#[from] serde_json::Error),
}
