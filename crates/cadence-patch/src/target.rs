//! Patch targets
//!
//! An [`IrTarget`] names either one block or a whole section (a heading plus
//! every following block up to the next heading of equal or shallower level).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Addressed region of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IrTarget {
    /// Exactly one block
    Block { id: String },
    /// A heading and its body
    Section { id: String },
}

impl IrTarget {
    /// Block target
    #[inline]
    pub fn block(id: impl Into<String>) -> Self {
        Self::Block { id: id.into() }
    }

    /// Section target
    #[inline]
    pub fn section(id: impl Into<String>) -> Self {
        Self::Section { id: id.into() }
    }

    /// Referenced block id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Block { id } | Self::Section { id } => id,
        }
    }

    /// Whether this targets a section
    #[inline]
    #[must_use]
    pub fn is_section(&self) -> bool {
        matches!(self, Self::Section { .. })
    }

    /// Wire name of the target kind
    #[inline]
    #[must_use]
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Block { .. } => "block",
            Self::Section { .. } => "section",
        }
    }
}

impl Display for IrTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind_str(), self.id())
    }
}

/// Parses the `kind:id` form produced by [`Display`]
impl FromStr for IrTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("target must look like kind:id, got '{s}'"))?;
        if id.is_empty() {
            return Err(format!("target id is empty in '{s}'"));
        }
        match kind {
            "block" => Ok(Self::block(id)),
            "section" => Ok(Self::section(id)),
            other => Err(format!("unknown target kind '{other}'")),
        }
    }
}
