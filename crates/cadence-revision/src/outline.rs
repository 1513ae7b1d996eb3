//! Outline invariants
//!
//! Compares the heading skeletons of two documents position by position.
//! Body blocks are never inspected. A text change is accepted only when an
//! approved [`HeadingRename`] for that id matches both texts exactly.

use crate::error::RevisionError;
use crate::types::HeadingRename;
use cadence_ir::{ArtifactIr, HeadingSnapshot};
use cadence_patch::IrPatch;
use std::collections::{HashMap, HashSet};

/// Result of an outline comparison
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutlineReport {
    pub valid: bool,
    pub violations: Vec<String>,
}

/// Compare heading skeletons of `before` and `after`
#[must_use]
pub fn check_outline(before: &ArtifactIr, after: &ArtifactIr, allowed: &[HeadingRename]) -> OutlineReport {
    let original = before.outline();
    let generated = after.outline();
    let mut violations = Vec::new();

    if original.len() != generated.len() {
        violations.push(format!(
            "Heading count changed from {} to {}.",
            original.len(),
            generated.len()
        ));
    }

    for (index, (old, new)) in original.iter().zip(&generated).enumerate() {
        let position = index + 1;
        if old.id != new.id {
            violations.push(format!(
                "Heading {position} id changed from {} to {}.",
                display_id(old),
                display_id(new)
            ));
        }
        if old.level != new.level {
            violations.push(format!(
                "Heading {position} level changed from {} to {}.",
                old.level, new.level
            ));
        }
        if old.text != new.text && !is_approved(old, new, allowed) {
            violations.push(format!(
                "Heading {position} text changed from \"{}\" to \"{}\".",
                old.text, new.text
            ));
        }
    }

    OutlineReport {
        valid: violations.is_empty(),
        violations,
    }
}

fn display_id(heading: &HeadingSnapshot) -> &str {
    heading.id.as_deref().unwrap_or("(none)")
}

fn is_approved(old: &HeadingSnapshot, new: &HeadingSnapshot, allowed: &[HeadingRename]) -> bool {
    let Some(id) = old.id.as_deref() else {
        return false;
    };
    allowed
        .iter()
        .any(|rename| rename.id == id && rename.from == old.text && rename.to == new.text)
}

/// Renames actually performed by `patches` between `before` and `after`
///
/// Non-rename patches are skipped. Renames that left the text unchanged are
/// dropped.
///
/// # Errors
/// [`RevisionError::DuplicateRename`] if one id is renamed twice,
/// [`RevisionError::RenameTargetMissing`] if the id is not a heading in
/// either document
pub fn collect_heading_renames(
    before: &ArtifactIr,
    after: &ArtifactIr,
    patches: &[IrPatch],
) -> Result<Vec<HeadingRename>, RevisionError> {
    let before_text = heading_texts(before);
    let after_text = heading_texts(after);
    let mut seen = HashSet::new();
    let mut renames = Vec::new();

    for patch in patches.iter().filter(|patch| patch.is_rename()) {
        let id = patch.target().id();
        if !seen.insert(id) {
            return Err(RevisionError::DuplicateRename(id.to_string()));
        }
        let (Some(from), Some(to)) = (before_text.get(id), after_text.get(id)) else {
            return Err(RevisionError::RenameTargetMissing(id.to_string()));
        };
        if from != to {
            renames.push(HeadingRename {
                id: id.to_string(),
                from: (*from).to_string(),
                to: (*to).to_string(),
            });
        }
    }
    Ok(renames)
}

fn heading_texts(ir: &ArtifactIr) -> HashMap<&str, &str> {
    ir.blocks
        .iter()
        .filter_map(|block| Some((block.id()?, block.as_heading()?.1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_ir::{ArtifactKind, ArtifactMeta, Block, BlockBody};
    use pretty_assertions::assert_eq;

    fn doc(blocks: Vec<Block>) -> ArtifactIr {
        ArtifactIr::new(ArtifactMeta::new("a", ArtifactKind::Report, "T", "t"), blocks)
    }

    fn base() -> ArtifactIr {
        doc(vec![
            Block::new("t", BlockBody::TitlePage { title: "T".into(), subtitle: None }),
            Block::new("h1", BlockBody::heading(1, "Intro")),
            Block::new("p1", BlockBody::paragraph("body")),
            Block::new("h2", BlockBody::heading(2, "Detail")),
        ])
    }

    fn with_block(mut ir: ArtifactIr, index: usize, block: Block) -> ArtifactIr {
        ir.blocks[index] = block;
        ir
    }

    #[test]
    fn identical_outline_is_valid() {
        let report = check_outline(&base(), &base(), &[]);
        assert!(report.valid);
    }

    #[test]
    fn body_edits_are_ignored() {
        let after = with_block(base(), 2, Block::new("p1", BlockBody::paragraph("rewritten")));
        assert!(check_outline(&base(), &after, &[]).valid);
    }

    #[test]
    fn count_change_detected() {
        let mut after = base();
        after.blocks.push(Block::new("h3", BlockBody::heading(1, "More")));
        let report = check_outline(&base(), &after, &[]);
        assert_eq!(report.violations, vec!["Heading count changed from 2 to 3."]);
    }

    #[test]
    fn id_change_detected() {
        let after = with_block(base(), 1, Block::new("hx", BlockBody::heading(1, "Intro")));
        let report = check_outline(&base(), &after, &[]);
        assert_eq!(report.violations, vec!["Heading 1 id changed from h1 to hx."]);
    }

    #[test]
    fn level_change_detected() {
        let after = with_block(base(), 3, Block::new("h2", BlockBody::heading(1, "Detail")));
        let report = check_outline(&base(), &after, &[]);
        assert_eq!(report.violations, vec!["Heading 2 level changed from 2 to 1."]);
    }

    #[test]
    fn order_change_detected() {
        let mut after = base();
        after.blocks.swap(1, 3);
        let report = check_outline(&base(), &after, &[]);
        assert!(!report.valid);
        assert!(report.violations.iter().any(|v| v.starts_with("Heading 1 id changed")));
    }

    #[test]
    fn approved_rename_passes_and_mismatch_fails() {
        let after = with_block(base(), 1, Block::new("h1", BlockBody::heading(1, "Overview")));
        let approved = HeadingRename {
            id: "h1".into(),
            from: "Intro".into(),
            to: "Overview".into(),
        };
        assert!(check_outline(&base(), &after, &[approved.clone()]).valid);

        let wrong = HeadingRename {
            to: "Summary".into(),
            ..approved
        };
        let report = check_outline(&base(), &after, &[wrong]);
        assert_eq!(
            report.violations,
            vec!["Heading 1 text changed from \"Intro\" to \"Overview\"."]
        );
    }

    #[test]
    fn collects_changed_renames_only() {
        let after = with_block(base(), 1, Block::new("h1", BlockBody::heading(1, "Overview")));
        let patches = vec![
            IrPatch::rename("h1", "Overview", None),
            IrPatch::rename("h2", "Detail", None),
        ];
        let renames = collect_heading_renames(&base(), &after, &patches).unwrap();
        assert_eq!(
            renames,
            vec![HeadingRename {
                id: "h1".into(),
                from: "Intro".into(),
                to: "Overview".into()
            }]
        );
    }

    #[test]
    fn duplicate_rename_rejected() {
        let patches = vec![IrPatch::rename("h1", "A", None), IrPatch::rename("h1", "B", None)];
        let err = collect_heading_renames(&base(), &base(), &patches).unwrap_err();
        assert!(matches!(err, RevisionError::DuplicateRename(id) if id == "h1"));
    }

    #[test]
    fn missing_rename_target_rejected() {
        let patches = vec![IrPatch::rename("ghost", "A", None)];
        let err = collect_heading_renames(&base(), &base(), &patches).unwrap_err();
        assert!(matches!(err, RevisionError::RenameTargetMissing(_)));
    }
}
