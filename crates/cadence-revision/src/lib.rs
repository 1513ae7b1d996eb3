//! Cadence revisions
//!
//! Revises an artifact IR in one of three modes and keeps an auditable log
//! of every attempt.
//!
//! # Core Concepts
//!
//! - [`RevisionOrchestrator`]: Patch or regenerate, validate, repair, and
//!   enforce outline invariants
//! - [`GenerationProvider`] / [`RepairProvider`]: Injected model capabilities
//! - [`check_outline`]: Heading skeleton comparison with approved renames
//! - [`ProvenanceLog`]: Capped, per-scope revision records over a
//!   [`ContextStore`]
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_revision::*;
//!
//! let orchestrator = RevisionOrchestrator::new(Arc::new(MockGenerator), Arc::new(MockRepairer));
//! let log = ProvenanceLog::new(Arc::new(InMemoryContextStore::new()));
//! let request = RevisionRequest::from_instruction(ir, "Tighten the summary", IrTarget::block("block_003"));
//! let result = orchestrator.revise_recorded(&log, "project-1", &request).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod context;
mod error;
mod orchestrator;
mod outline;
mod prompt;
mod provenance;
mod provider;
mod repair;
mod tokens;
mod types;

pub use config::{ConfigError, ProviderKind, RevisionConfig, ENV_MODEL, ENV_PROVIDER};
pub use context::{build_revision_context, RevisionContext};
pub use error::{ErrorClass, OutlineStage, RevisionError};
pub use orchestrator::{RevisionOrchestrator, RevisionRequest};
pub use outline::{check_outline, collect_heading_renames, OutlineReport};
pub use prompt::{patch_prompt, regen_prompt, rename_prompt};
pub use provenance::{
    compute_ir_hash, ContextStore, FsContextStore, InMemoryContextStore, ProvenanceError, ProvenanceLog,
    MAX_RECORDS,
};
pub use provider::{
    GenerateRequest, GenerateResponse, GenerationProvider, MockGenerator, MockRepairer, Phase, ProviderError,
    RepairProvider, RepairRequest,
};
pub use repair::{validate_or_repair, Resolved};
pub use tokens::{
    parse_regen_tokens, RegenTokens, TOKEN_ALLOW_HEADING_RENAMES, TOKEN_ALLOW_REFLOW, TOKEN_FULL_REGENERATE,
};
pub use types::{
    truncate_chars, HeadingRename, RecordTarget, RevisionMode, RevisionRecord, RevisionResult, ValidationOutcome,
};

// Patch-layer types appear in this crate's public signatures.
pub use cadence_patch::{IrPatch, IrTarget, PatchError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
