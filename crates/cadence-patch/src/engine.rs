//! Patch engine
//!
//! Applies an ordered batch of [`IrPatch`]es to an [`ArtifactIr`]. Patches run
//! sequentially against one mutable [`BlockSequence`]; every patch re-resolves
//! its target by id at the time it runs, so later patches may address blocks
//! inserted by earlier ones. The caller's document is never touched: the
//! engine works on a copy and returns it only if every patch succeeded.

use crate::error::PatchError;
use crate::patch::{IrPatch, ReplaceValue};
use crate::target::IrTarget;
use crate::validate::MAX_RENAME_CHARS;
use cadence_ir::{ArtifactIr, Block};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Inclusive block range of a section: the heading at `start` plus its body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRange {
    /// Index of the heading
    pub start: usize,
    /// Index of the last body block (equals `start` for an empty body)
    pub end: usize,
    /// Heading level
    pub level: u8,
}

impl SectionRange {
    /// Number of blocks in the section, heading included
    #[inline]
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.end - self.start + 1
    }

    /// Whether the section has no body blocks
    #[inline]
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.end > self.start
    }
}

/// Position of the block with `id`
///
/// # Errors
/// Returns [`PatchError::TargetNotFound`] if no block has that id
pub fn find_block(blocks: &[Block], id: &str) -> Result<usize, PatchError> {
    blocks
        .iter()
        .position(|block| block.id() == Some(id))
        .ok_or_else(|| PatchError::TargetNotFound(id.to_string()))
}

/// Resolve the section headed by the block with `id`
///
/// The section ends right before the next heading of equal or shallower
/// level, or at the end of the document.
///
/// # Errors
/// Returns [`PatchError::TargetNotFound`] or [`PatchError::NotAHeading`]
pub fn resolve_section(blocks: &[Block], id: &str) -> Result<SectionRange, PatchError> {
    let start = find_block(blocks, id)?;
    section_at(blocks, start, id)
}

fn section_at(blocks: &[Block], start: usize, id: &str) -> Result<SectionRange, PatchError> {
    let (level, _) = blocks[start]
        .as_heading()
        .ok_or_else(|| PatchError::NotAHeading(id.to_string()))?;
    let end = blocks[start + 1..]
        .iter()
        .position(|block| matches!(block.as_heading(), Some((next, _)) if next <= level))
        .map_or(blocks.len() - 1, |offset| start + offset);
    Ok(SectionRange { start, end, level })
}

/// Assign deterministic ids to blocks that lack one
///
/// Missing ids become `block_<position>` (1-based, three digits), suffixed
/// `_1`, `_2`, … if that id is already taken.
#[must_use]
pub fn ensure_block_ids(blocks: &[Block]) -> Vec<Block> {
    let mut taken: HashSet<String> = blocks.iter().filter_map(Block::id).map(String::from).collect();
    blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            if block.id().is_some() {
                return block.clone();
            }
            let id = unique_id(&format!("block_{:03}", index + 1), &taken);
            taken.insert(id.clone());
            Block {
                id: Some(id),
                body: block.body.clone(),
            }
        })
        .collect()
}

fn unique_id(base: &str, taken: &HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut suffix = 1;
    while taken.contains(&candidate) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    candidate
}

/// Apply `patches` in order, returning the patched document
///
/// Blocks without ids are assigned ids first, so the result always carries
/// an id on every block.
///
/// # Errors
/// Fails on the first patch that references a missing id, targets a
/// non-heading as a section, would remove the title page, fails its
/// `expectedText` guard, or carries a payload unfit for its target
#[instrument(level = "debug", skip_all, fields(artifact = %ir.artifact.id, patches = patches.len()))]
pub fn apply_patches(ir: &ArtifactIr, patches: &[IrPatch]) -> Result<ArtifactIr, PatchError> {
    let mut sequence = BlockSequence::new(ensure_block_ids(&ir.blocks));
    for (index, patch) in patches.iter().enumerate() {
        sequence.apply(index, patch)?;
        debug!(patch = index + 1, op = patch.op_name(), target = %patch.target(), "applied patch");
    }
    let mut patched = ir.clone();
    patched.blocks = sequence.into_blocks();
    Ok(patched)
}

/// Mutable ordered block list with an id index
///
/// The index is rebuilt after every splice. `known_ids` only grows: an id
/// that was ever present during the batch is never handed out again.
#[derive(Debug)]
pub struct BlockSequence {
    blocks: Vec<Block>,
    positions: HashMap<String, usize>,
    known_ids: HashSet<String>,
}

impl BlockSequence {
    /// Wrap an id-complete block list
    #[must_use]
    pub fn new(blocks: Vec<Block>) -> Self {
        let known_ids = blocks.iter().filter_map(Block::id).map(String::from).collect();
        let mut sequence = Self {
            blocks,
            positions: HashMap::new(),
            known_ids,
        };
        sequence.reindex();
        sequence
    }

    /// Current blocks
    #[inline]
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Consume into the block list
    #[inline]
    #[must_use]
    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    fn reindex(&mut self) {
        self.positions.clear();
        for (index, block) in self.blocks.iter().enumerate() {
            if let Some(id) = block.id() {
                // First occurrence wins, matching a linear scan.
                self.positions.entry(id.to_string()).or_insert(index);
            }
        }
    }

    fn locate(&self, id: &str) -> Result<usize, PatchError> {
        self.positions
            .get(id)
            .copied()
            .ok_or_else(|| PatchError::TargetNotFound(id.to_string()))
    }

    fn section(&self, id: &str) -> Result<SectionRange, PatchError> {
        section_at(&self.blocks, self.locate(id)?, id)
    }

    /// Inclusive range covered by a target
    fn range(&self, target: &IrTarget) -> Result<(usize, usize), PatchError> {
        match target {
            IrTarget::Block { id } => self.locate(id).map(|index| (index, index)),
            IrTarget::Section { id } => self.section(id).map(|s| (s.start, s.end)),
        }
    }

    /// Apply one patch; `index` is its 0-based position in the batch
    ///
    /// # Errors
    /// See [`apply_patches`]
    pub fn apply(&mut self, index: usize, patch: &IrPatch) -> Result<(), PatchError> {
        match patch {
            IrPatch::Replace { target, value } => self.replace(index, target, value),
            IrPatch::InsertBefore { target, values } => {
                let (start, _) = self.range(target)?;
                self.insert(index, start, values)
            }
            IrPatch::InsertAfter { target, values } => {
                let (_, end) = self.range(target)?;
                self.insert(index, end + 1, values)
            }
            IrPatch::Delete { target } => self.delete(index, target),
            IrPatch::RenameHeading {
                target,
                new_text,
                expected_text,
            } => self.rename(index, target, new_text, expected_text.as_deref()),
        }
    }

    fn replace(&mut self, index: usize, target: &IrTarget, value: &ReplaceValue) -> Result<(), PatchError> {
        match (target, value) {
            (IrTarget::Block { id }, ReplaceValue::Single(block)) => {
                let position = self.locate(id)?;
                if self.blocks[position].is_title_page() && !block.is_title_page() {
                    return Err(PatchError::ProtectedBlock {
                        patch: index + 1,
                        block: id.clone(),
                    });
                }
                // Payload id is ignored; the block keeps its identity.
                self.blocks[position] = Block {
                    id: Some(id.clone()),
                    body: block.body.clone(),
                };
                Ok(())
            }
            (IrTarget::Section { id }, ReplaceValue::Body(body)) => {
                let section = self.section(id)?;
                self.guard_title_page(index, section.start + 1, section.end)?;
                let replacement = self.normalize(index, section.start + 1, body);
                self.blocks.splice(section.start + 1..=section.end, replacement);
                self.reindex();
                Ok(())
            }
            (IrTarget::Block { .. }, ReplaceValue::Body(_)) => Err(PatchError::InvalidPayload {
                patch: index + 1,
                reason: "block replace expects a single block value".into(),
            }),
            (IrTarget::Section { .. }, ReplaceValue::Single(_)) => Err(PatchError::InvalidPayload {
                patch: index + 1,
                reason: "section replace expects an array of body blocks".into(),
            }),
        }
    }

    fn insert(&mut self, index: usize, at: usize, values: &[Block]) -> Result<(), PatchError> {
        if values.is_empty() {
            return Err(PatchError::InvalidPayload {
                patch: index + 1,
                reason: "insert requires at least one block".into(),
            });
        }
        let inserts = self.normalize(index, at, values);
        self.blocks.splice(at..at, inserts);
        self.reindex();
        Ok(())
    }

    fn delete(&mut self, index: usize, target: &IrTarget) -> Result<(), PatchError> {
        let (start, end) = self.range(target)?;
        self.guard_title_page(index, start, end)?;
        self.blocks.drain(start..=end);
        self.reindex();
        Ok(())
    }

    fn rename(
        &mut self,
        index: usize,
        target: &IrTarget,
        new_text: &str,
        expected_text: Option<&str>,
    ) -> Result<(), PatchError> {
        let IrTarget::Section { id } = target else {
            return Err(PatchError::InvalidPayload {
                patch: index + 1,
                reason: "rename_heading requires a section target".into(),
            });
        };
        let trimmed = new_text.trim();
        let length = trimmed.chars().count();
        if length == 0 || length > MAX_RENAME_CHARS {
            return Err(PatchError::InvalidPayload {
                patch: index + 1,
                reason: format!("newText must be 1-{MAX_RENAME_CHARS} characters after trimming"),
            });
        }

        let position = self.locate(id)?;
        let block = &mut self.blocks[position];
        let cadence_ir::BlockBody::Heading { text, .. } = &mut block.body else {
            return Err(PatchError::NotAHeading(id.clone()));
        };
        if let Some(expected) = expected_text {
            if expected != text.as_str() {
                return Err(PatchError::ExpectedTextMismatch {
                    id: id.clone(),
                    expected: expected.to_string(),
                    actual: text.clone(),
                });
            }
        }
        *text = trimmed.to_string();
        Ok(())
    }

    fn guard_title_page(&self, index: usize, start: usize, end: usize) -> Result<(), PatchError> {
        if start > end {
            return Ok(());
        }
        match self.blocks[start..=end].iter().find(|block| block.is_title_page()) {
            Some(block) => Err(PatchError::ProtectedBlock {
                patch: index + 1,
                block: block.id().unwrap_or("titlePage").to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Give incoming blocks unique ids
    ///
    /// Absent ids default to `patch_<patch>_<position>` (1-based, three
    /// digits), where position counts from the insertion index.
    fn normalize(&mut self, index: usize, at: usize, values: &[Block]) -> Vec<Block> {
        values
            .iter()
            .enumerate()
            .map(|(offset, block)| {
                let base = match block.id() {
                    Some(id) => id.to_string(),
                    None => format!("patch_{:03}_{:03}", index + 1, at + offset + 1),
                };
                let id = unique_id(&base, &self.known_ids);
                self.known_ids.insert(id.clone());
                Block {
                    id: Some(id),
                    body: block.body.clone(),
                }
            })
            .collect()
    }
}
