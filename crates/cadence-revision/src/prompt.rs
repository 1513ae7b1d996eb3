//! Prompt text for generation calls

use crate::context::RevisionContext;
use crate::types::RevisionMode;
use cadence_ir::{ArtifactIr, HeadingSnapshot};
use cadence_patch::IrTarget;

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Prompt asking for a patch list against one target
#[must_use]
pub fn patch_prompt(instruction: &str, target: &IrTarget, context: &RevisionContext) -> String {
    [
        "You are Cadence's IR revision engine.",
        "Return ONLY valid JSON with shape: { patches: IRPatch[] }.",
        "Do NOT regenerate the full artifact. Emit only patches.",
        "",
        "Instruction:",
        instruction,
        "",
        "Target:",
        to_json(target).as_str(),
        "",
        "Context (JSON):",
        to_json(context).as_str(),
    ]
    .join("\n")
}

/// Prompt asking for `rename_heading` patches only
#[must_use]
pub fn rename_prompt(instruction: &str, outline: &[HeadingSnapshot]) -> String {
    [
        "You propose heading renames for Cadence.",
        "Return ONLY valid JSON with shape: { patches: IRPatch[] }.",
        "Only emit patches with op \"rename_heading\" targeting { kind: \"section\", id }.",
        "Do NOT emit insert/delete/replace operations.",
        "Do NOT change heading order, levels, or ids.",
        "Use expectedText to match the current heading text when renaming.",
        "If no renames are needed, return { \"patches\": [] }.",
        "",
        "Instruction:",
        instruction,
        "",
        "Current outline (JSON):",
        to_json(outline).as_str(),
    ]
    .join("\n")
}

/// Prompt asking for a full replacement document
///
/// `violations` is non-empty only on the locked-outline re-prompt.
#[must_use]
pub fn regen_prompt(instruction: &str, base: &ArtifactIr, mode: RevisionMode, violations: &[String]) -> String {
    let mut lines: Vec<String> = vec![
        "You are Cadence's ArtifactIR regeneration engine.".into(),
        "Return ONLY valid JSON that matches the ArtifactIR schema.".into(),
        String::new(),
    ];
    match mode {
        RevisionMode::FullRegenLockedOutline => lines.extend(
            [
                "You MUST preserve the outline exactly:",
                "- Heading count, order, level, text, and id must remain unchanged.",
                "- Only body blocks may change.",
                "",
            ]
            .map(String::from),
        ),
        RevisionMode::FullRegenAllowReflow => lines.extend(
            [
                "You may change the outline structure as needed.",
                "Preserve existing heading IDs when the heading text is identical.",
                "",
            ]
            .map(String::from),
        ),
        RevisionMode::Patch => {}
    }
    if !violations.is_empty() {
        lines.push("Previous output violated outline invariants:".into());
        lines.extend(violations.iter().cloned());
        lines.push(String::new());
    }
    lines.extend([
        "Instruction:".into(),
        instruction.into(),
        String::new(),
        "Current outline (JSON):".into(),
        to_json(&base.outline()),
        String::new(),
        "Current artifact IR (JSON):".into(),
        to_json(base),
    ]);
    lines.join("\n")
}
