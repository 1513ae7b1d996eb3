//! Artifact IR schema validation
//!
//! The schema is built from [`BlockKind`] and [`ArtifactKind`] with exhaustive
//! matches, so adding a block variant is a single-point change. Validation
//! collects every violation in one pass as `"<path> <message>"` strings;
//! repair prompts address them all at once.

use crate::block::BlockKind;
use crate::document::ArtifactKind;
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;

static ARTIFACT_VALIDATOR: Lazy<CompiledSchema> =
    Lazy::new(|| CompiledSchema::compile("artifact", &artifact_schema()));

static BLOCK_VALIDATOR: Lazy<CompiledSchema> =
    Lazy::new(|| CompiledSchema::compile("block", &block_schema()));

/// Outcome of a validation pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    /// True iff `errors` is empty
    pub valid: bool,
    /// One `"<path> <message>"` entry per violation
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Build report from collected errors
    #[inline]
    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Convert into a `Result`, keeping the error list
    ///
    /// # Errors
    /// Returns the collected errors if the report is invalid
    pub fn into_result(self) -> Result<(), Vec<String>> {
        if self.valid {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Validate a JSON value as a complete artifact IR
#[must_use]
pub fn validate_artifact(value: &Value) -> ValidationReport {
    let mut errors = ARTIFACT_VALIDATOR.check(value);
    errors.extend(duplicate_id_errors(value));
    ValidationReport::from_errors(errors)
}

/// Validate a JSON value as a single block
#[must_use]
pub fn validate_block(value: &Value) -> ValidationReport {
    ValidationReport::from_errors(BLOCK_VALIDATOR.check(value))
}

/// A compiled JSON schema that reports errors as path/message strings
pub struct CompiledSchema {
    name: &'static str,
    inner: Result<JSONSchema, String>,
}

impl CompiledSchema {
    /// Compile `schema` (draft 7)
    #[must_use]
    pub fn compile(name: &'static str, schema: &Value) -> Self {
        let inner = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| e.to_string());
        Self { name, inner }
    }

    /// Collect every violation of `value`
    #[must_use]
    pub fn check(&self, value: &Value) -> Vec<String> {
        let validator = match &self.inner {
            Ok(validator) => validator,
            Err(message) => {
                return vec![format!("/ {} schema failed to compile: {message}", self.name)];
            }
        };
        match validator.validate(value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| format_error(&error.instance_path.to_string(), &error))
                .collect(),
        }
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("name", &self.name)
            .field("compiled", &self.inner.is_ok())
            .finish()
    }
}

fn format_error(path: &str, message: &dyn fmt::Display) -> String {
    if path.is_empty() {
        format!("/ {message}")
    } else {
        format!("{path} {message}")
    }
}

/// Duplicate block ids, reported at the duplicate's path
fn duplicate_id_errors(value: &Value) -> Vec<String> {
    let Some(blocks) = value.get("blocks").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    blocks
        .iter()
        .enumerate()
        .filter_map(|(index, block)| {
            let id = block.get("id").and_then(Value::as_str)?;
            if seen.insert(id) {
                None
            } else {
                Some(format!("/blocks/{index}/id duplicate block id '{id}'"))
            }
        })
        .collect()
}

/// Schema for a complete artifact IR document
#[must_use]
pub fn artifact_schema() -> Value {
    let kinds: Vec<&str> = ArtifactKind::ALL.iter().map(|k| k.as_str()).collect();
    json!({
        "type": "object",
        "required": ["artifact", "blocks"],
        "additionalProperties": false,
        "properties": {
            "artifact": {
                "type": "object",
                "required": ["id", "type", "title", "template"],
                "additionalProperties": false,
                "properties": {
                    "id": {"type": "string"},
                    "type": {"enum": kinds},
                    "title": {"type": "string"},
                    "template": {"type": "string"}
                }
            },
            "blocks": {
                "type": "array",
                "minItems": 1,
                "items": {"$ref": "#/definitions/block"}
            },
            "assets": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "type", "path"],
                    "additionalProperties": false,
                    "properties": {
                        "id": {"type": "string"},
                        "type": {"type": "string"},
                        "path": {"type": "string"},
                        "alt": {"type": "string"}
                    }
                }
            },
            "styles": {"type": "object"}
        },
        "definitions": {"block": block_schema()}
    })
}

/// Schema for one block; variants are selected by `type`
#[must_use]
pub fn block_schema() -> Value {
    let names: Vec<&str> = BlockKind::ALL.iter().map(|k| k.as_str()).collect();
    let variants: Vec<Value> = BlockKind::ALL
        .iter()
        .map(|kind| {
            json!({
                "if": {
                    "properties": {"type": {"const": kind.as_str()}},
                    "required": ["type"]
                },
                "then": variant_schema(*kind)
            })
        })
        .collect();
    json!({
        "type": "object",
        "required": ["type"],
        "properties": {
            "type": {"enum": names},
            "id": {"type": "string", "minLength": 1}
        },
        "allOf": variants
    })
}

fn variant_schema(kind: BlockKind) -> Value {
    let string = json!({"type": "string"});
    let string_list = json!({"type": "array", "items": {"type": "string"}});
    let fields: Vec<(&str, Value, bool)> = match kind {
        BlockKind::TitlePage => vec![("title", string.clone(), true), ("subtitle", string, false)],
        BlockKind::Heading => vec![
            (
                "level",
                json!({"type": "integer", "minimum": 1, "maximum": 6}),
                true,
            ),
            ("text", string, true),
        ],
        BlockKind::Paragraph => vec![("text", string, true)],
        BlockKind::Bullets | BlockKind::Numbered => vec![("items", string_list, true)],
        BlockKind::Table => vec![
            ("columns", string_list.clone(), true),
            ("rows", json!({"type": "array", "items": string_list}), true),
        ],
        BlockKind::PageBreak => Vec::new(),
    };

    let mut properties = Map::new();
    properties.insert("type".into(), json!({}));
    properties.insert("id".into(), json!({}));
    let mut required = Vec::new();
    for (name, schema, is_required) in fields {
        properties.insert(name.into(), schema);
        if is_required {
            required.push(Value::String(name.into()));
        }
    }
    json!({
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid_doc() -> Value {
        json!({
            "artifact": {"id": "art_1", "type": "report", "title": "R", "template": "t"},
            "blocks": [
                {"id": "block_001", "type": "titlePage", "title": "R", "subtitle": "S"},
                {"id": "block_002", "type": "heading", "level": 1, "text": "H"},
                {"id": "block_003", "type": "paragraph", "text": "P"},
                {"id": "block_004", "type": "table", "columns": ["a"], "rows": [["1"]]},
                {"type": "pageBreak"}
            ]
        })
    }

    #[test]
    fn accepts_valid_document() {
        let report = validate_artifact(&valid_doc());
        assert_eq!(report.errors, Vec::<String>::new());
        assert!(report.valid);
    }

    #[test]
    fn rejects_unknown_block_field() {
        let mut doc = valid_doc();
        doc["blocks"][2]["color"] = json!("red");
        let report = validate_artifact(&doc);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.starts_with("/blocks/2")));
    }

    #[test]
    fn rejects_unknown_block_type() {
        let mut doc = valid_doc();
        doc["blocks"][2] = json!({"id": "x", "type": "image", "src": "a.png"});
        let report = validate_artifact(&doc);
        assert!(!report.valid);
        assert!(report.errors.iter().all(|e| e.starts_with('/')));
    }

    #[test]
    fn collects_all_errors_in_one_pass() {
        let mut doc = valid_doc();
        doc["blocks"][1]["level"] = json!("one");
        doc["blocks"][2] = json!({"id": "block_003", "type": "paragraph"});
        let report = validate_artifact(&doc);
        assert!(report.errors.iter().any(|e| e.starts_with("/blocks/1/level")));
        assert!(report.errors.iter().any(|e| e.starts_with("/blocks/2")));
    }

    #[test]
    fn rejects_empty_block_list() {
        let mut doc = valid_doc();
        doc["blocks"] = json!([]);
        assert!(!validate_artifact(&doc).valid);
    }

    #[test]
    fn rejects_missing_artifact_header() {
        let report = validate_artifact(&json!({"blocks": [{"type": "pageBreak"}]}));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.starts_with("/ ")));
    }

    #[test]
    fn reports_duplicate_ids() {
        let mut doc = valid_doc();
        doc["blocks"][3]["id"] = json!("block_002");
        let report = validate_artifact(&doc);
        assert!(report
            .errors
            .contains(&"/blocks/3/id duplicate block id 'block_002'".to_string()));
    }

    #[test]
    fn validates_single_block() {
        assert!(validate_block(&json!({"type": "bullets", "items": ["a", "b"]})).valid);
        assert!(!validate_block(&json!({"type": "bullets", "items": "a"})).valid);
        assert!(!validate_block(&json!(["not", "an", "object"])).valid);
    }

    #[test]
    fn report_into_result() {
        assert!(ValidationReport::from_errors(vec![]).into_result().is_ok());
        let err = ValidationReport::from_errors(vec!["/ bad".into()])
            .into_result()
            .unwrap_err();
        assert_eq!(err, vec!["/ bad".to_string()]);
    }
}
