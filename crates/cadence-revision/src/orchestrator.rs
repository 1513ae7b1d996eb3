//! Revision orchestrator
//!
//! Chooses between incremental patching and full regeneration, drives the
//! generation and repair capabilities, and enforces outline invariants. Every
//! step depends on the previous one's output, so the flow is strictly
//! sequential. Any failure aborts the whole revision; the caller's document is
//! only replaced by a returned [`RevisionResult`].
//!
//! The orchestrator holds no per-document lock. Callers serialize revisions
//! of the same artifact.

use crate::config::RevisionConfig;
use crate::context::build_revision_context;
use crate::error::{OutlineStage, RevisionError};
use crate::outline::{check_outline, collect_heading_renames};
use crate::prompt::{patch_prompt, regen_prompt, rename_prompt};
use crate::provenance::{compute_ir_hash, ProvenanceLog};
use crate::provider::{GenerateRequest, GenerationProvider, Phase, RepairProvider};
use crate::repair::{validate_or_repair, Resolved};
use crate::tokens::parse_regen_tokens;
use crate::types::{
    truncate_chars, HeadingRename, RecordTarget, RevisionMode, RevisionRecord, RevisionResult,
    ValidationOutcome,
};
use cadence_ir::ArtifactIr;
use cadence_patch::{apply_patches, ensure_block_ids, IrPatch, IrTarget, PatchList};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// One revision to perform
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionRequest {
    /// Document to revise
    pub ir: ArtifactIr,
    /// Instruction used in prompts (tokens already stripped)
    pub instruction: String,
    /// Instruction as the user wrote it, for the record
    pub raw_instruction: String,
    /// Block or section the revision is about
    pub target: IrTarget,
    pub mode: RevisionMode,
    pub allow_heading_renames: bool,
}

impl RevisionRequest {
    /// Patch-mode request with renames disallowed
    pub fn new(ir: ArtifactIr, instruction: impl Into<String>, target: IrTarget) -> Self {
        let instruction = instruction.into();
        Self {
            ir,
            raw_instruction: instruction.clone(),
            instruction,
            target,
            mode: RevisionMode::Patch,
            allow_heading_renames: false,
        }
    }

    /// Request whose mode and flags come from sentinel tokens in `instruction`
    #[must_use]
    pub fn from_instruction(ir: ArtifactIr, instruction: &str, target: IrTarget) -> Self {
        let tokens = parse_regen_tokens(instruction);
        Self {
            ir,
            instruction: tokens.sanitized_instruction,
            raw_instruction: instruction.to_string(),
            target,
            mode: tokens.mode,
            allow_heading_renames: tokens.allow_heading_renames,
        }
    }

    /// With revision mode
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: RevisionMode) -> Self {
        self.mode = mode;
        self
    }

    /// With heading renames permitted or not
    #[inline]
    #[must_use]
    pub fn with_heading_renames(mut self, allow: bool) -> Self {
        self.allow_heading_renames = allow;
        self
    }
}

/// Drives revisions against injected generation and repair capabilities
pub struct RevisionOrchestrator {
    generator: Arc<dyn GenerationProvider>,
    repairer: Arc<dyn RepairProvider>,
    config: RevisionConfig,
}

impl RevisionOrchestrator {
    /// Orchestrator with default configuration
    pub fn new(generator: Arc<dyn GenerationProvider>, repairer: Arc<dyn RepairProvider>) -> Self {
        Self::with_config(generator, repairer, RevisionConfig::default())
    }

    pub fn with_config(
        generator: Arc<dyn GenerationProvider>,
        repairer: Arc<dyn RepairProvider>,
        config: RevisionConfig,
    ) -> Self {
        Self {
            generator,
            repairer,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &RevisionConfig {
        &self.config
    }

    /// Run one revision without recording it
    ///
    /// # Errors
    /// Any validation, reference, protected-structure, outline, concurrency
    /// guard or provider failure
    #[instrument(level = "info", skip_all, fields(mode = %request.mode, target = %request.target))]
    pub async fn revise(&self, request: &RevisionRequest) -> Result<RevisionResult, RevisionError> {
        info!(artifact = %request.ir.artifact.id, "revision started");
        // Outline comparisons need every heading to carry its final id.
        let mut base = request.ir.clone();
        base.blocks = ensure_block_ids(&base.blocks);

        let result = match request.mode {
            RevisionMode::Patch => self.revise_patch(request, &base).await,
            RevisionMode::FullRegenLockedOutline => self.revise_locked(request, &base).await,
            RevisionMode::FullRegenAllowReflow => self.revise_reflow(request, &base).await,
        }?;
        info!(
            patches = result.patches.len(),
            repaired = result.repaired,
            outline_repaired = result.outline_repaired,
            "revision finished"
        );
        Ok(result)
    }

    /// Run one revision and append exactly one record to `log` under `scope`
    ///
    /// A failed revision is recorded with `validation: failed` and its
    /// errors before the error is returned. If that write also fails, the
    /// revision error wins and the storage failure is logged.
    ///
    /// # Errors
    /// The revision's own error, or a storage error on the success path
    pub async fn revise_recorded(
        &self,
        log: &ProvenanceLog,
        scope: &str,
        request: &RevisionRequest,
    ) -> Result<RevisionResult, RevisionError> {
        let hash_before = compute_ir_hash(&request.ir)?;
        let mut record = RevisionRecord {
            revision_id: RevisionRecord::new_id(),
            timestamp: RevisionRecord::now(),
            mode: request.mode,
            target: RecordTarget::for_mode(request.mode, &request.target),
            instruction: truncate_chars(&request.raw_instruction, self.config.instruction_limit),
            provider: self.config.provider.as_str().to_string(),
            model: self.config.model.clone(),
            patch_count: 0,
            validation: ValidationOutcome::Failed,
            heading_renames: None,
            errors: None,
            ir_hash_before: hash_before.clone(),
            ir_hash_after: hash_before,
        };

        let outcome = match self.revise(request).await {
            Ok(result) => compute_ir_hash(&result.ir)
                .map(|hash| (result, hash))
                .map_err(RevisionError::from),
            Err(err) => Err(err),
        };

        match outcome {
            Ok((result, hash_after)) => {
                record.patch_count = result.patches.len();
                record.validation = ValidationOutcome::from_repaired(result.repaired);
                record.ir_hash_after = hash_after;
                if !result.heading_renames.is_empty() {
                    record.heading_renames = Some(result.heading_renames.clone());
                }
                log.append(scope, &record).await?;
                Ok(result)
            }
            Err(err) => {
                warn!(class = ?err.class(), error = %err, "revision failed");
                record.errors = Some(err.errors());
                if let Err(log_err) = log.append(scope, &record).await {
                    error!(scope, error = %log_err, "failed to record failed revision");
                }
                Err(err)
            }
        }
    }

    async fn revise_patch(&self, request: &RevisionRequest, base: &ArtifactIr) -> Result<RevisionResult, RevisionError> {
        let context = build_revision_context(base, &request.target)?;
        let prompt = patch_prompt(&request.instruction, &request.target, &context);
        let context = serde_json::to_value(&context).map_err(cadence_ir::IrError::from)?;
        let output = self
            .generator
            .generate(GenerateRequest::new(Phase::Revision, prompt, context))
            .await?;

        let patches = PatchList::parse(&output.output_json)
            .map_err(|e| RevisionError::validation("revision patches", e.messages()))?
            .patches;
        if patches.iter().any(IrPatch::is_rename) && !request.allow_heading_renames {
            return Err(RevisionError::RenamesNotAllowed);
        }

        let patched = apply_patches(base, &patches)?;
        let heading_renames = collect_heading_renames(base, &patched, &patches)?;
        ensure_outline(base, &patched, &heading_renames, OutlineStage::Patch)?;

        let resolved = self.resolve(&patched.to_json_string()?).await?;
        ensure_outline(base, &resolved.ir, &heading_renames, OutlineStage::PatchAfterRepair)?;

        Ok(RevisionResult {
            ir: resolved.ir,
            patches,
            repaired: resolved.repaired,
            outline_repaired: false,
            mode: request.mode,
            heading_renames,
        })
    }

    async fn revise_locked(&self, request: &RevisionRequest, base: &ArtifactIr) -> Result<RevisionResult, RevisionError> {
        let (renamed, rename_patches) = if request.allow_heading_renames {
            let patches = self.propose_renames(&request.instruction, base).await?;
            (apply_patches(base, &patches)?, patches)
        } else {
            (base.clone(), Vec::new())
        };
        let heading_renames = collect_heading_renames(base, &renamed, &rename_patches)?;

        let first = self.regenerate(&request.instruction, &renamed, request.mode, &[]).await?;
        let report = check_outline(&renamed, &first.ir, &heading_renames);
        if report.valid {
            return Ok(RevisionResult {
                ir: first.ir,
                patches: rename_patches,
                repaired: first.repaired,
                outline_repaired: false,
                mode: request.mode,
                heading_renames,
            });
        }

        warn!(violations = report.violations.len(), "locked-outline output drifted, re-prompting once");
        let second = self
            .regenerate(&request.instruction, &renamed, request.mode, &report.violations)
            .await?;
        ensure_outline(&renamed, &second.ir, &heading_renames, OutlineStage::LockedRegen)?;
        Ok(RevisionResult {
            ir: second.ir,
            patches: rename_patches,
            repaired: second.repaired,
            outline_repaired: true,
            mode: request.mode,
            heading_renames,
        })
    }

    async fn revise_reflow(&self, request: &RevisionRequest, base: &ArtifactIr) -> Result<RevisionResult, RevisionError> {
        let regen = self.regenerate(&request.instruction, base, request.mode, &[]).await?;
        Ok(RevisionResult {
            ir: regen.ir,
            patches: Vec::new(),
            repaired: regen.repaired,
            outline_repaired: false,
            mode: request.mode,
            heading_renames: Vec::new(),
        })
    }

    /// Ask for `rename_heading` patches only
    async fn propose_renames(&self, instruction: &str, base: &ArtifactIr) -> Result<Vec<IrPatch>, RevisionError> {
        let outline = base.outline();
        let prompt = rename_prompt(instruction, &outline);
        let request = GenerateRequest::new(Phase::Revision, prompt, json!({ "outline": outline }))
            .with_temperature(self.config.rename_temperature);
        let output = self.generator.generate(request).await?;

        let patches = PatchList::parse(&output.output_json)
            .map_err(|e| RevisionError::validation("heading rename patches", e.messages()))?
            .patches;
        let stray: Vec<String> = patches
            .iter()
            .enumerate()
            .filter(|(_, patch)| !patch.is_rename())
            .map(|(index, _)| format!("rename proposal patch {} must use op \"rename_heading\"", index + 1))
            .collect();
        if !stray.is_empty() {
            return Err(RevisionError::validation("heading rename patches", stray));
        }
        Ok(patches)
    }

    /// Ask for a full document and push it through validate-or-repair
    async fn regenerate(
        &self,
        instruction: &str,
        base: &ArtifactIr,
        mode: RevisionMode,
        violations: &[String],
    ) -> Result<Resolved, RevisionError> {
        let prompt = regen_prompt(instruction, base, mode, violations);
        let request = GenerateRequest::new(Phase::Production, prompt, json!({ "artifact": base.to_value()? }));
        let output = self.generator.generate(request).await?;
        self.resolve(&output.output_json).await
    }

    async fn resolve(&self, raw: &str) -> Result<Resolved, RevisionError> {
        validate_or_repair(raw, self.repairer.as_ref(), self.config.repair_attempts).await
    }
}

fn ensure_outline(
    before: &ArtifactIr,
    after: &ArtifactIr,
    renames: &[HeadingRename],
    stage: OutlineStage,
) -> Result<(), RevisionError> {
    let report = check_outline(before, after, renames);
    if report.valid {
        Ok(())
    } else {
        Err(RevisionError::OutlineViolation {
            stage,
            violations: report.violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{GenerateResponse, MockGenerator, MockRepairer, ProviderError};
    use crate::provenance::InMemoryContextStore;
    use async_trait::async_trait;
    use cadence_ir::{ArtifactKind, ArtifactMeta, Block, BlockBody};
    use std::sync::Mutex;

    fn sample() -> ArtifactIr {
        ArtifactIr::new(
            ArtifactMeta::new("art_1", ArtifactKind::Report, "Report", "consulting_report_v1"),
            vec![
                Block::new("block_001", BlockBody::TitlePage { title: "Report".into(), subtitle: None }),
                Block::new("block_002", BlockBody::heading(1, "Executive Summary")),
                Block::new("block_003", BlockBody::paragraph("Original paragraph.")),
            ],
        )
    }

    /// Returns canned outputs in order and records every request
    struct Canned {
        outputs: Mutex<Vec<String>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl Canned {
        fn new(outputs: Vec<String>) -> Arc<Self> {
            Arc::new(Self {
                outputs: Mutex::new(outputs.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn phases(&self) -> Vec<Phase> {
            self.requests.lock().unwrap().iter().map(|r| r.phase).collect()
        }
    }

    #[async_trait]
    impl GenerationProvider for Canned {
        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.outputs
                .lock()
                .unwrap()
                .pop()
                .map(GenerateResponse::new)
                .ok_or_else(|| ProviderError::request("canned", "no output left"))
        }
    }

    fn orchestrator(generator: Arc<dyn GenerationProvider>) -> RevisionOrchestrator {
        RevisionOrchestrator::new(generator, Arc::new(MockRepairer))
    }

    fn patches(value: serde_json::Value) -> String {
        json!({ "patches": value }).to_string()
    }

    #[tokio::test]
    async fn patch_mode_applies_generated_patch() {
        let generator = Canned::new(vec![patches(json!([{
            "op": "replace",
            "target": {"kind": "block", "id": "block_003"},
            "value": {"type": "paragraph", "text": "Revised via patch fixture."}
        }]))]);
        let request = RevisionRequest::new(sample(), "Rewrite", IrTarget::block("block_003"));
        let result = orchestrator(generator.clone()).revise(&request).await.unwrap();

        assert_eq!(result.ir.blocks[2].body, BlockBody::paragraph("Revised via patch fixture."));
        assert_eq!(result.patches.len(), 1);
        assert!(!result.repaired);
        assert_eq!(generator.phases(), vec![Phase::Revision]);
    }

    #[tokio::test]
    async fn missing_target_fails_before_generation() {
        let generator = Canned::new(vec![]);
        let request = RevisionRequest::new(sample(), "x", IrTarget::block("ghost"));
        let err = orchestrator(generator.clone()).revise(&request).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(generator.phases().is_empty());
    }

    #[tokio::test]
    async fn renames_need_permission_in_patch_mode() {
        let rename = patches(json!([{
            "op": "rename_heading",
            "target": {"kind": "section", "id": "block_002"},
            "newText": "Overview"
        }]));
        let denied = RevisionRequest::new(sample(), "x", IrTarget::section("block_002"));
        let err = orchestrator(Canned::new(vec![rename.clone()]))
            .revise(&denied)
            .await
            .unwrap_err();
        assert!(matches!(err, RevisionError::RenamesNotAllowed));

        let allowed = denied.with_heading_renames(true);
        let result = orchestrator(Canned::new(vec![rename])).revise(&allowed).await.unwrap();
        assert_eq!(result.heading_renames.len(), 1);
        assert_eq!(result.ir.blocks[1].as_heading(), Some((1, "Overview")));
    }

    #[tokio::test]
    async fn patch_mode_rejects_outline_drift() {
        let generator = Canned::new(vec![patches(json!([{
            "op": "insert_after",
            "target": {"kind": "block", "id": "block_003"},
            "values": [{"type": "heading", "level": 1, "text": "Sneaky"}]
        }]))]);
        let request = RevisionRequest::new(sample(), "x", IrTarget::block("block_003"));
        let err = orchestrator(generator).revise(&request).await.unwrap_err();
        assert!(matches!(
            err,
            RevisionError::OutlineViolation { stage: OutlineStage::Patch, .. }
        ));
    }

    #[tokio::test]
    async fn invalid_patch_output_is_a_validation_error() {
        let generator = Canned::new(vec!["not json".into()]);
        let request = RevisionRequest::new(sample(), "x", IrTarget::block("block_003"));
        let err = orchestrator(generator).revise(&request).await.unwrap_err();
        assert!(matches!(err, RevisionError::Validation { stage: "revision patches", .. }));
    }

    #[tokio::test]
    async fn locked_mode_reprompts_once_with_violations() {
        let mut drifted = sample();
        drifted.blocks[1] = Block::new("block_002", BlockBody::heading(2, "Executive Summary"));
        let good = sample().to_json_string().unwrap();
        let generator = Canned::new(vec![drifted.to_json_string().unwrap(), good]);
        let request = RevisionRequest::new(sample(), "x", IrTarget::block("block_003"))
            .with_mode(RevisionMode::FullRegenLockedOutline);

        let result = orchestrator(generator.clone()).revise(&request).await.unwrap();
        assert!(result.outline_repaired);
        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("Heading 1 level changed from 1 to 2."));
    }

    #[tokio::test]
    async fn locked_mode_second_violation_is_fatal() {
        let mut drifted = sample();
        drifted.blocks.remove(1);
        let raw = drifted.to_json_string().unwrap();
        let generator = Canned::new(vec![raw.clone(), raw]);
        let request = RevisionRequest::new(sample(), "x", IrTarget::block("block_003"))
            .with_mode(RevisionMode::FullRegenLockedOutline);
        let err = orchestrator(generator).revise(&request).await.unwrap_err();
        assert!(err.to_string().starts_with("locked-outline regeneration violated invariants"));
    }

    #[tokio::test]
    async fn rename_proposals_must_be_renames_only() {
        let generator = Canned::new(vec![patches(json!([{
            "op": "delete",
            "target": {"kind": "block", "id": "block_003"}
        }]))]);
        let request = RevisionRequest::new(sample(), "x", IrTarget::block("block_003"))
            .with_mode(RevisionMode::FullRegenLockedOutline)
            .with_heading_renames(true);
        let err = orchestrator(generator).revise(&request).await.unwrap_err();
        assert_eq!(
            err.errors(),
            vec!["rename proposal patch 1 must use op \"rename_heading\"".to_string()]
        );
    }

    #[tokio::test]
    async fn reflow_mode_skips_outline_check() {
        let mut restructured = sample();
        restructured.blocks.push(Block::new("new", BlockBody::heading(1, "Appendix")));
        let generator = Canned::new(vec![restructured.to_json_string().unwrap()]);
        let request = RevisionRequest::new(sample(), "x", IrTarget::block("block_003"))
            .with_mode(RevisionMode::FullRegenAllowReflow);
        let result = orchestrator(generator).revise(&request).await.unwrap();
        assert_eq!(result.ir.outline().len(), 2);
        assert!(result.patches.is_empty());
    }

    #[tokio::test]
    async fn recorded_revision_appends_one_record() {
        let store = Arc::new(InMemoryContextStore::new());
        let log = ProvenanceLog::new(store);
        let orchestrator = orchestrator(Arc::new(MockGenerator));
        let request = RevisionRequest::from_instruction(sample(), &"A".repeat(600), IrTarget::block("block_003"));

        orchestrator.revise_recorded(&log, "proj", &request).await.unwrap();

        let records = log.read("proj").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mode, RevisionMode::Patch);
        assert_eq!(records[0].patch_count, 1);
        assert_eq!(records[0].validation, ValidationOutcome::Passed);
        assert_eq!(records[0].instruction.chars().count(), 500);
        assert_ne!(records[0].ir_hash_before, records[0].ir_hash_after);
    }

    #[tokio::test]
    async fn failed_revision_is_still_recorded() {
        let log = ProvenanceLog::new(Arc::new(InMemoryContextStore::new()));
        let request = RevisionRequest::new(sample(), "x", IrTarget::block("ghost"));
        let err = orchestrator(Arc::new(MockGenerator))
            .revise_recorded(&log, "proj", &request)
            .await
            .unwrap_err();

        let records = log.read("proj").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].validation, ValidationOutcome::Failed);
        assert_eq!(records[0].errors, Some(err.errors()));
        assert_eq!(records[0].ir_hash_before, records[0].ir_hash_after);
    }
}
