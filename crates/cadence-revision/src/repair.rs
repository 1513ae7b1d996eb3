//! Validate-or-repair loop
//!
//! Every document coming out of a generation call passes through
//! [`validate_or_repair`] before it is accepted. `max_attempts` bounds the
//! number of repair rounds; when it is exhausted the last validation errors
//! are returned.

use crate::error::RevisionError;
use crate::provider::{RepairProvider, RepairRequest};
use cadence_ir::{validate_artifact, ArtifactIr};
use serde_json::Value;
use tracing::{debug, warn};

const INVALID_JSON: &str = "Invalid JSON; repair to valid ArtifactIR.";

/// Accepted document and whether repair was needed
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub ir: ArtifactIr,
    pub repaired: bool,
}

/// Parse and validate `raw`, asking `repairer` for fixes up to `max_attempts` times
///
/// # Errors
/// [`RevisionError::Validation`] with the last errors once attempts run out;
/// [`RevisionError::Provider`] if a repair call fails
pub async fn validate_or_repair(
    raw: &str,
    repairer: &dyn RepairProvider,
    max_attempts: usize,
) -> Result<Resolved, RevisionError> {
    let mut current = raw.to_string();
    let mut attempt = 0;
    loop {
        let errors = match check(&current) {
            Ok(ir) => {
                debug!(attempt, "document accepted");
                return Ok(Resolved {
                    ir,
                    repaired: attempt > 0,
                });
            }
            Err(errors) => errors,
        };
        if attempt >= max_attempts {
            return Err(RevisionError::validation("artifact IR", errors));
        }
        attempt += 1;
        warn!(attempt, max_attempts, errors = errors.len(), "document invalid, requesting repair");
        current = repairer
            .repair(RepairRequest {
                raw_json: current,
                errors,
            })
            .await?;
    }
}

fn check(raw: &str) -> Result<ArtifactIr, Vec<String>> {
    let value: Value = serde_json::from_str(raw).map_err(|_| vec![INVALID_JSON.to_string()])?;
    validate_artifact(&value).into_result()?;
    ArtifactIr::from_value(value).map_err(|e| vec![format!("/ {e}")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockRepairer, ProviderError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const VALID: &str = r#"{
        "artifact": {"id": "a", "type": "report", "title": "T", "template": "t"},
        "blocks": [{"type": "titlePage", "title": "T"}]
    }"#;

    /// Replies from a fixed script and records every request
    struct Scripted {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<RepairRequest>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RepairProvider for Scripted {
        async fn repair(&self, request: RepairRequest) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::request("scripted", "script exhausted"))
        }
    }

    #[tokio::test]
    async fn valid_input_needs_no_repair() {
        let repairer = Scripted::new(&[]);
        let resolved = validate_or_repair(VALID, &repairer, 2).await.unwrap();
        assert!(!resolved.repaired);
        assert!(repairer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_json_gets_fixed_message() {
        let repairer = Scripted::new(&[VALID]);
        let resolved = validate_or_repair("{not json", &repairer, 1).await.unwrap();
        assert!(resolved.repaired);
        let seen = repairer.seen.lock().unwrap();
        assert_eq!(seen[0].errors, vec![INVALID_JSON.to_string()]);
        assert_eq!(seen[0].raw_json, "{not json");
    }

    #[tokio::test]
    async fn schema_errors_are_forwarded() {
        let repairer = Scripted::new(&[VALID]);
        let broken = r#"{"artifact": {"id": "a", "type": "report", "title": "T", "template": "t"}, "blocks": []}"#;
        validate_or_repair(broken, &repairer, 2).await.unwrap();
        let seen = repairer.seen.lock().unwrap();
        assert!(seen[0].errors.iter().any(|e| e.starts_with("/blocks")));
    }

    #[tokio::test]
    async fn exhausted_attempts_surface_errors() {
        let repairer = Scripted::new(&["still bad", "worse"]);
        let err = validate_or_repair("bad", &repairer, 2).await.unwrap_err();
        assert!(matches!(err, RevisionError::Validation { .. }));
        assert_eq!(repairer.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_attempts_never_repairs() {
        let repairer = Scripted::new(&[VALID]);
        assert!(validate_or_repair("bad", &repairer, 0).await.is_err());
        assert!(repairer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repair_failure_propagates() {
        let repairer = Scripted::new(&[]);
        let err = validate_or_repair("bad", &repairer, 1).await.unwrap_err();
        assert!(matches!(err, RevisionError::Provider(_)));
    }

    #[tokio::test]
    async fn mock_repairer_recovers_anything() {
        let resolved = validate_or_repair("garbage", &MockRepairer, 1).await.unwrap();
        assert!(resolved.repaired);
        assert_eq!(resolved.ir.artifact.id, "art_mock");
    }
}
