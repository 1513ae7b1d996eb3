//! Typed document blocks
//!
//! A [`Block`] is one unit of document content. The payload is a tagged
//! union ([`BlockBody`]) keyed by the `type` field on the wire; the `id` sits
//! beside it so every variant carries one without repeating the field.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// One unit of document content
///
/// `id` is optional on input: documents produced by the generation service
/// may omit it, and the patch engine assigns stable ids before mutating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Stable identifier, unique within a document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Variant payload
    #[serde(flatten)]
    pub body: BlockBody,
}

impl Block {
    /// Create block with an id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, body: BlockBody) -> Self {
        Self {
            id: Some(id.into()),
            body,
        }
    }

    /// Create block without an id
    #[inline]
    #[must_use]
    pub fn anonymous(body: BlockBody) -> Self {
        Self { id: None, body }
    }

    /// Block id, treating an empty string as absent
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Variant discriminant
    #[inline]
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        self.body.kind()
    }

    /// Heading level and text, if this is a heading
    #[inline]
    #[must_use]
    pub fn as_heading(&self) -> Option<(u8, &str)> {
        match &self.body {
            BlockBody::Heading { level, text } => Some((*level, text.as_str())),
            _ => None,
        }
    }

    /// Whether this block is a heading
    #[inline]
    #[must_use]
    pub fn is_heading(&self) -> bool {
        matches!(self.body, BlockBody::Heading { .. })
    }

    /// Whether this block is the protected title page
    #[inline]
    #[must_use]
    pub fn is_title_page(&self) -> bool {
        matches!(self.body, BlockBody::TitlePage { .. })
    }
}

/// Block payload, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BlockBody {
    /// Cover page; conventionally the first block
    TitlePage {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
    },
    /// Section heading
    Heading { level: u8, text: String },
    /// Body paragraph
    Paragraph { text: String },
    /// Unordered list
    Bullets { items: Vec<String> },
    /// Ordered list
    Numbered { items: Vec<String> },
    /// Table with header row
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Hard page break
    PageBreak {},
}

impl BlockBody {
    /// Discriminant of this payload
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::TitlePage { .. } => BlockKind::TitlePage,
            Self::Heading { .. } => BlockKind::Heading,
            Self::Paragraph { .. } => BlockKind::Paragraph,
            Self::Bullets { .. } => BlockKind::Bullets,
            Self::Numbered { .. } => BlockKind::Numbered,
            Self::Table { .. } => BlockKind::Table,
            Self::PageBreak {} => BlockKind::PageBreak,
        }
    }

    /// Paragraph payload
    #[inline]
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph { text: text.into() }
    }

    /// Heading payload
    #[inline]
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::Heading {
            level,
            text: text.into(),
        }
    }
}

/// Fieldless block discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKind {
    TitlePage,
    Heading,
    Paragraph,
    Bullets,
    Numbered,
    Table,
    PageBreak,
}

impl BlockKind {
    /// Every block kind, in wire order
    pub const ALL: [BlockKind; 7] = [
        Self::TitlePage,
        Self::Heading,
        Self::Paragraph,
        Self::Bullets,
        Self::Numbered,
        Self::Table,
        Self::PageBreak,
    ];

    /// Wire name (`type` discriminant)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TitlePage => "titlePage",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::Bullets => "bullets",
            Self::Numbered => "numbered",
            Self::Table => "table",
            Self::PageBreak => "pageBreak",
        }
    }
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
