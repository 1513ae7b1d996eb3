//! Revision context
//!
//! The slice of a document sent with a patch prompt: the target's blocks, the
//! headings around it, and the full outline. Building it resolves the target,
//! so a missing id or a non-heading section target fails here, before any
//! generation call.

use cadence_ir::{ArtifactIr, Block, HeadingSnapshot};
use cadence_patch::{find_block, resolve_section, IrTarget, PatchError};
use serde::Serialize;

/// Context object for a targeted revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionContext {
    pub target: IrTarget,
    /// The target block, or the whole section
    pub blocks: Vec<Block>,
    /// Closest heading at or before the target
    pub enclosing_heading: Option<HeadingSnapshot>,
    /// Heading before the enclosing one
    pub previous_heading: Option<HeadingSnapshot>,
    /// First heading after the target's extent
    pub next_heading: Option<HeadingSnapshot>,
    pub outline: Vec<HeadingSnapshot>,
}

/// Build the context for `target` in `ir`
///
/// # Errors
/// Returns [`PatchError::TargetNotFound`] or [`PatchError::NotAHeading`]
pub fn build_revision_context(ir: &ArtifactIr, target: &IrTarget) -> Result<RevisionContext, PatchError> {
    let (start, end) = match target {
        IrTarget::Block { id } => {
            let index = find_block(&ir.blocks, id)?;
            (index, index)
        }
        IrTarget::Section { id } => {
            let range = resolve_section(&ir.blocks, id)?;
            (range.start, range.end)
        }
    };

    let enclosing = ir.blocks[..=start].iter().rposition(Block::is_heading);
    let previous = ir.blocks[..enclosing.unwrap_or(start)]
        .iter()
        .rposition(Block::is_heading);
    let next = ir.blocks[end + 1..]
        .iter()
        .position(Block::is_heading)
        .map(|offset| end + 1 + offset);

    Ok(RevisionContext {
        target: target.clone(),
        blocks: ir.blocks[start..=end].to_vec(),
        enclosing_heading: enclosing.and_then(|i| snapshot(&ir.blocks[i])),
        previous_heading: previous.and_then(|i| snapshot(&ir.blocks[i])),
        next_heading: next.and_then(|i| snapshot(&ir.blocks[i])),
        outline: ir.outline(),
    })
}

fn snapshot(block: &Block) -> Option<HeadingSnapshot> {
    let (level, text) = block.as_heading()?;
    Some(HeadingSnapshot {
        id: block.id().map(str::to_string),
        level,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_ir::{ArtifactKind, ArtifactMeta, BlockBody};

    fn sample() -> ArtifactIr {
        ArtifactIr::new(
            ArtifactMeta::new("a", ArtifactKind::Report, "T", "t"),
            vec![
                Block::new("t", BlockBody::TitlePage { title: "T".into(), subtitle: None }),
                Block::new("h1", BlockBody::heading(1, "One")),
                Block::new("p1", BlockBody::paragraph("a")),
                Block::new("h2", BlockBody::heading(1, "Two")),
                Block::new("p2", BlockBody::paragraph("b")),
                Block::new("p3", BlockBody::paragraph("c")),
                Block::new("h3", BlockBody::heading(1, "Three")),
            ],
        )
    }

    fn heading_id(snapshot: &Option<HeadingSnapshot>) -> Option<&str> {
        snapshot.as_ref().and_then(|h| h.id.as_deref())
    }

    #[test]
    fn block_context_has_neighbours() {
        let context = build_revision_context(&sample(), &IrTarget::block("p2")).unwrap();
        assert_eq!(context.blocks.len(), 1);
        assert_eq!(heading_id(&context.enclosing_heading), Some("h2"));
        assert_eq!(heading_id(&context.previous_heading), Some("h1"));
        assert_eq!(heading_id(&context.next_heading), Some("h3"));
        assert_eq!(context.outline.len(), 3);
    }

    #[test]
    fn section_context_carries_whole_section() {
        let context = build_revision_context(&sample(), &IrTarget::section("h2")).unwrap();
        let ids: Vec<_> = context.blocks.iter().filter_map(Block::id).collect();
        assert_eq!(ids, ["h2", "p2", "p3"]);
        assert_eq!(heading_id(&context.enclosing_heading), Some("h2"));
        assert_eq!(heading_id(&context.next_heading), Some("h3"));
    }

    #[test]
    fn edges_have_no_neighbours() {
        let first = build_revision_context(&sample(), &IrTarget::block("t")).unwrap();
        assert!(first.enclosing_heading.is_none());
        assert!(first.previous_heading.is_none());

        let last = build_revision_context(&sample(), &IrTarget::section("h3")).unwrap();
        assert!(last.next_heading.is_none());
    }

    #[test]
    fn bad_targets_fail_before_generation() {
        assert!(matches!(
            build_revision_context(&sample(), &IrTarget::block("nope")),
            Err(PatchError::TargetNotFound(_))
        ));
        assert!(matches!(
            build_revision_context(&sample(), &IrTarget::section("p1")),
            Err(PatchError::NotAHeading(_))
        ));
    }

    #[test]
    fn serializes_camel_case() {
        let context = build_revision_context(&sample(), &IrTarget::block("p1")).unwrap();
        let value = serde_json::to_value(&context).unwrap();
        assert!(value.get("enclosingHeading").is_some());
        assert_eq!(value["target"]["id"], "p1");
    }
}
