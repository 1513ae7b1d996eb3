//! Cadence structural patches
//!
//! Block-level edits against an artifact IR: a JSON wire grammar, a validator
//! that checks candidate lists before anything is decoded, and an engine that
//! applies a batch sequentially with target re-resolution.
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_patch::{apply_patches, PatchList};
//!
//! let list = PatchList::parse(&generation_output)?;
//! let revised = apply_patches(&ir, &list.patches)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod engine;
mod error;
mod patch;
mod target;
mod validate;

pub use engine::{apply_patches, ensure_block_ids, find_block, resolve_section, BlockSequence, SectionRange};
pub use error::{PatchError, PatchErrorKind};
pub use patch::{decode_patches, IrPatch, PatchList, ReplaceValue};
pub use target::IrTarget;
pub use validate::{validate_patches, MAX_RENAME_CHARS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use cadence_ir::ArtifactIr;

    const FIXTURE: &str = r#"{
        "artifact": {"id": "art_fixture", "type": "report", "title": "Fixture", "template": "consulting_report_v1"},
        "blocks": [
            {"id": "block_001", "type": "titlePage", "title": "Fixture"},
            {"id": "block_002", "type": "heading", "level": 1, "text": "Executive Summary"},
            {"id": "block_003", "type": "paragraph", "text": "Original paragraph."},
            {"id": "block_004", "type": "bullets", "items": ["one", "two"]}
        ]
    }"#;

    #[test]
    fn parsed_replace_rewrites_one_paragraph() {
        let ir = ArtifactIr::from_json_str(FIXTURE).unwrap();
        let list = PatchList::parse(
            r#"{"patches": [{"op": "replace", "target": {"kind": "block", "id": "block_003"},
                "value": {"type": "paragraph", "text": "Revised via patch fixture."}}]}"#,
        )
        .unwrap();

        let revised = apply_patches(&ir, &list.patches).unwrap();

        assert_eq!(
            revised.blocks[2].body,
            cadence_ir::BlockBody::paragraph("Revised via patch fixture.")
        );
        let before: Vec<_> = ir.blocks.iter().map(|b| b.id.clone()).collect();
        let after: Vec<_> = revised.blocks.iter().map(|b| b.id.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn stale_rename_guard_is_a_concurrency_error() {
        let ir = ArtifactIr::from_json_str(FIXTURE).unwrap();
        let patch = IrPatch::rename("block_002", "Overview", Some("Summary".into()));
        let err = apply_patches(&ir, &[patch]).unwrap_err();
        assert_eq!(err.kind(), PatchErrorKind::ConcurrencyGuard);
    }
}
