//! Testing utilities for the Cadence workspace
//!
//! Shared IR fixtures and scripted providers that record every call.

#![allow(missing_docs)]

use async_trait::async_trait;
use cadence_ir::{ArtifactIr, ArtifactKind, ArtifactMeta, Block, BlockBody};
use cadence_revision::{
    GenerateRequest, GenerateResponse, GenerationProvider, Phase, ProviderError, RepairProvider, RepairRequest,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn meta(id: &str, title: &str) -> ArtifactMeta {
    ArtifactMeta::new(id, ArtifactKind::Report, title, "consulting_report_v1")
}

fn title_page(title: &str, subtitle: &str) -> Block {
    Block::new(
        "block_001",
        BlockBody::TitlePage {
            title: title.into(),
            subtitle: Some(subtitle.into()),
        },
    )
}

/// Title page, one section, a paragraph and a list
///
/// `block_002` is the "Executive Summary" heading and `block_003` its first
/// paragraph.
pub fn report_basic() -> ArtifactIr {
    ArtifactIr::new(
        meta("art_basic", "Quarterly Strategy Review"),
        vec![
            title_page("Quarterly Strategy Review", "Board Draft"),
            Block::new("block_002", BlockBody::heading(1, "Executive Summary")),
            Block::new(
                "block_003",
                BlockBody::paragraph("Revenue grew steadily while margins held flat."),
            ),
            Block::new(
                "block_004",
                BlockBody::Bullets {
                    items: vec![
                        "Expand the enterprise tier".into(),
                        "Reduce onboarding time".into(),
                    ],
                },
            ),
        ],
    )
}

/// Multi-section report with nested headings
///
/// `block_006` is a level-2 section whose body is `block_007`; `block_008`
/// is the next level-1 heading.
pub fn report_long() -> ArtifactIr {
    ArtifactIr::new(
        meta("art_long", "Market Entry Assessment"),
        vec![
            title_page("Market Entry Assessment", "Final"),
            Block::new("block_002", BlockBody::heading(1, "Introduction")),
            Block::new("block_003", BlockBody::paragraph("This report assesses entry options.")),
            Block::new("block_004", BlockBody::heading(1, "Market Context")),
            Block::new("block_005", BlockBody::paragraph("Demand is concentrated in three regions.")),
            Block::new("block_006", BlockBody::heading(2, "Competitive Landscape")),
            Block::new("block_007", BlockBody::paragraph("Two incumbents hold most of the share.")),
            Block::new("block_008", BlockBody::heading(1, "Recommendations")),
            Block::new(
                "block_009",
                BlockBody::Numbered {
                    items: vec!["Pilot in one region".into(), "Partner for distribution".into()],
                },
            ),
        ],
    )
}

/// Title page, a heading and a table at `block_003`
pub fn report_table() -> ArtifactIr {
    ArtifactIr::new(
        meta("art_table", "Financial Summary"),
        vec![
            title_page("Financial Summary", "FY Review"),
            Block::new("block_002", BlockBody::heading(1, "Financials")),
            Block::new(
                "block_003",
                BlockBody::Table {
                    columns: vec!["Metric".into(), "Q1".into(), "Q2".into()],
                    rows: vec![
                        vec!["Revenue".into(), "4.1".into(), "4.6".into()],
                        vec!["Margin".into(), "21%".into(), "22%".into()],
                    ],
                },
            ),
        ],
    )
}

/// Copy of `ir` with heading `id` retitled to `text`
pub fn rename_heading(ir: &ArtifactIr, id: &str, text: &str) -> ArtifactIr {
    let mut renamed = ir.clone();
    for block in &mut renamed.blocks {
        if block.id() == Some(id) {
            if let BlockBody::Heading { text: current, .. } = &mut block.body {
                *current = text.to_string();
            }
        }
    }
    renamed
}

/// `{"patches": [...]}` text around `patches`
pub fn patch_list_json(patches: Value) -> String {
    json!({ "patches": patches }).to_string()
}

/// Generator answering from per-phase scripts
///
/// Each phase replays its outputs in order and repeats the last one once the
/// script runs out. A phase with no script fails the call.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    revision: Mutex<VecDeque<String>>,
    production: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a revision-phase output
    #[must_use]
    pub fn on_revision(self, output: impl Into<String>) -> Self {
        lock(&self.revision).push_back(output.into());
        self
    }

    /// Queue a production-phase output
    #[must_use]
    pub fn on_production(self, output: impl Into<String>) -> Self {
        lock(&self.production).push_back(output.into());
        self
    }

    /// Every request received so far
    pub fn calls(&self) -> Vec<GenerateRequest> {
        lock(&self.calls).clone()
    }

    /// Number of requests received for `phase`
    pub fn call_count(&self, phase: Phase) -> usize {
        lock(&self.calls).iter().filter(|call| call.phase == phase).count()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let script = match request.phase {
            Phase::Revision => &self.revision,
            Phase::Production => &self.production,
        };
        let output = {
            let mut script = lock(script);
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };
        let phase = request.phase;
        lock(&self.calls).push(request);
        output
            .map(GenerateResponse::new)
            .ok_or_else(|| ProviderError::request("scripted", format!("no script for {phase} phase")))
    }
}

/// Repairer replaying fixed replies, failing once they run out
#[derive(Debug, Default)]
pub struct ScriptedRepairer {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<RepairRequest>>,
}

impl ScriptedRepairer {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every repair request received so far
    pub fn calls(&self) -> Vec<RepairRequest> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl RepairProvider for ScriptedRepairer {
    async fn repair(&self, request: RepairRequest) -> Result<String, ProviderError> {
        lock(&self.calls).push(request);
        lock(&self.replies)
            .pop_front()
            .ok_or_else(|| ProviderError::request("scripted", "repair script exhausted"))
    }
}
