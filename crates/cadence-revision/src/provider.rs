//! Generation and repair capabilities
//!
//! Both are injected trait objects. The orchestrator treats every call as
//! expensive and never retries one outside the bounded repair loop and the
//! single locked-outline re-prompt.

use async_trait::async_trait;
use cadence_ir::{ArtifactIr, ArtifactKind, ArtifactMeta, Block, BlockBody};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{self, Display, Formatter};
use tracing::debug;

/// Workflow phase a generation call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Patch lists and rename proposals
    Revision,
    /// Full documents
    Production,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Revision => "Revision",
            Self::Production => "Production",
        })
    }
}

/// One generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub phase: Phase,
    pub prompt: String,
    /// Structured context sent alongside the prompt
    pub context: Value,
    pub history: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    /// Request with empty history and default temperature
    pub fn new(phase: Phase, prompt: impl Into<String>, context: Value) -> Self {
        Self {
            phase,
            prompt: prompt.into(),
            context,
            history: Vec::new(),
            temperature: None,
        }
    }

    /// With sampling temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Raw generation output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub output_json: String,
}

impl GenerateResponse {
    #[inline]
    pub fn new(output_json: impl Into<String>) -> Self {
        Self {
            output_json: output_json.into(),
        }
    }
}

/// One repair call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRequest {
    /// Text that failed to parse or validate
    pub raw_json: String,
    /// Every violation found
    pub errors: Vec<String>,
}

/// Capability failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} is not available: {reason}")]
    Unavailable { provider: String, reason: String },
}

impl ProviderError {
    pub fn request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Text-generation capability
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Produce output for one request
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError>;
}

/// Document repair capability
#[async_trait]
pub trait RepairProvider: Send + Sync {
    /// Produce replacement text addressing `request.errors`
    async fn repair(&self, request: RepairRequest) -> Result<String, ProviderError>;
}

/// Offline generator
///
/// Revision phase: one `insert_after` patch against `context.target` when
/// present, otherwise an empty list (rename proposals). Production phase:
/// echoes `context.artifact` unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockGenerator;

impl MockGenerator {
    /// Text of the paragraph the mock inserts
    pub const NOTE: &'static str = "Revision note from mock provider.";
}

#[async_trait]
impl GenerationProvider for MockGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        debug!(phase = %request.phase, "mock generation");
        let output = match request.phase {
            Phase::Revision => match request.context.get("target") {
                Some(target) => json!({
                    "patches": [{
                        "op": "insert_after",
                        "target": target,
                        "values": [{"type": "paragraph", "text": Self::NOTE}]
                    }]
                }),
                None => json!({"patches": []}),
            },
            Phase::Production => request
                .context
                .get("artifact")
                .cloned()
                .ok_or_else(|| ProviderError::request("mock", "production context has no artifact"))?,
        };
        Ok(GenerateResponse::new(output.to_string()))
    }
}

/// Offline repairer returning a fixed schema-valid document
#[derive(Debug, Clone, Copy, Default)]
pub struct MockRepairer;

impl MockRepairer {
    /// The document every repair returns
    #[must_use]
    pub fn fallback_artifact() -> ArtifactIr {
        ArtifactIr::new(
            ArtifactMeta::new(
                "art_mock",
                ArtifactKind::Report,
                "Cadence Mock Artifact",
                "consulting_report_v1",
            ),
            vec![
                Block::anonymous(BlockBody::TitlePage {
                    title: "Cadence Mock Artifact".into(),
                    subtitle: Some("Recovered Draft".into()),
                }),
                Block::anonymous(BlockBody::heading(1, "Overview")),
                Block::anonymous(BlockBody::paragraph(
                    "This artifact was repaired to match the schema.",
                )),
                Block::anonymous(BlockBody::Bullets {
                    items: vec!["Point one".into(), "Point two".into(), "Point three".into()],
                }),
                Block::anonymous(BlockBody::Table {
                    columns: vec!["Item".into(), "Value".into()],
                    rows: vec![vec!["Status".into(), "Recovered".into()]],
                }),
            ],
        )
    }
}

#[async_trait]
impl RepairProvider for MockRepairer {
    async fn repair(&self, request: RepairRequest) -> Result<String, ProviderError> {
        debug!(errors = request.errors.len(), "mock repair");
        serde_json::to_string_pretty(&Self::fallback_artifact())
            .map_err(|e| ProviderError::request("mock", e.to_string()))
    }
}
