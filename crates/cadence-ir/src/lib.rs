//! Cadence Artifact IR
//!
//! Typed, block-based document representation with schema validation and
//! content addressing.
//!
//! # Core Concepts
//!
//! - [`ArtifactIr`]: Ordered document of typed blocks plus artifact metadata
//! - [`Block`] / [`BlockBody`]: One unit of content, discriminated by `type`
//! - [`validate_artifact`]: Collect every schema violation of a JSON value
//! - [`ContentHash`]: SHA-256 over canonical (key-sorted) JSON
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_ir::{validate_artifact, ir_hash, ArtifactIr};
//!
//! let value: serde_json::Value = serde_json::from_str(raw)?;
//! let report = validate_artifact(&value);
//! if report.valid {
//!     let ir = ArtifactIr::from_value(value)?;
//!     println!("hash: {}", ir_hash(&ir)?);
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod block;
mod document;
mod hash;
pub mod schema;

pub use block::{Block, BlockBody, BlockKind};
pub use document::{ArtifactIr, ArtifactKind, ArtifactMeta, Asset, HeadingSnapshot, IrError};
pub use hash::{canonicalize, ir_hash, ContentHash, HashError};
pub use schema::{validate_artifact, validate_block, ValidationReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
