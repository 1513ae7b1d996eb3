//! Sentinel tokens in revision instructions
//!
//! Tokens are exact, case-sensitive substrings. Every known token is stripped
//! from the instruction before it becomes a prompt.

use crate::types::RevisionMode;
use serde::Serialize;
use tracing::warn;

/// Request full regeneration with a locked outline
pub const TOKEN_FULL_REGENERATE: &str = "[[FULL_REGENERATE]]";

/// With [`TOKEN_FULL_REGENERATE`], allow the outline to change
pub const TOKEN_ALLOW_REFLOW: &str = "[[ALLOW_FULL_REFLOW]]";

/// Permit `rename_heading` patches
pub const TOKEN_ALLOW_HEADING_RENAMES: &str = "[[ALLOW_HEADING_RENAMES]]";

const REFLOW_IGNORED: &str = "ALLOW_FULL_REFLOW token ignored without FULL_REGENERATE.";

/// Mode and flags derived from an instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenTokens {
    pub mode: RevisionMode,
    /// Instruction with every token removed, trimmed
    pub sanitized_instruction: String,
    pub warnings: Vec<String>,
    pub allow_heading_renames: bool,
}

/// Derive revision mode and flags from sentinel tokens
#[must_use]
pub fn parse_regen_tokens(instruction: &str) -> RegenTokens {
    let has_full = instruction.contains(TOKEN_FULL_REGENERATE);
    let has_reflow = instruction.contains(TOKEN_ALLOW_REFLOW);
    let mut warnings = Vec::new();

    let mode = match (has_full, has_reflow) {
        (true, true) => RevisionMode::FullRegenAllowReflow,
        (true, false) => RevisionMode::FullRegenLockedOutline,
        (false, true) => {
            warn!("{REFLOW_IGNORED}");
            warnings.push(REFLOW_IGNORED.to_string());
            RevisionMode::Patch
        }
        (false, false) => RevisionMode::Patch,
    };

    let sanitized = [TOKEN_FULL_REGENERATE, TOKEN_ALLOW_REFLOW, TOKEN_ALLOW_HEADING_RENAMES]
        .iter()
        .fold(instruction.to_string(), |text, token| text.replace(token, ""));

    RegenTokens {
        mode,
        sanitized_instruction: sanitized.trim().to_string(),
        warnings,
        allow_heading_renames: instruction.contains(TOKEN_ALLOW_HEADING_RENAMES),
    }
}
