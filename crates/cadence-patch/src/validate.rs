//! Patch grammar validation
//!
//! Walks a candidate patch list as raw JSON and collects every violation as
//! `"<path> <message>"` strings, in the same format as the IR schema
//! validator. Block payloads are checked against the block schema with their
//! paths prefixed. Runs before anything is decoded or applied.

use cadence_ir::{validate_block, ValidationReport};
use serde_json::{Map, Value};

/// Maximum length of a trimmed `rename_heading` text
pub const MAX_RENAME_CHARS: usize = 140;

const OPS: [&str; 5] = ["replace", "insert_before", "insert_after", "delete", "rename_heading"];

/// Validate a candidate patch list (the value of the `patches` key)
#[must_use]
pub fn validate_patches(candidate: &Value) -> ValidationReport {
    let mut errors = Vec::new();
    match candidate {
        Value::Array(patches) => {
            for (index, patch) in patches.iter().enumerate() {
                check_patch(&format!("/{index}"), patch, &mut errors);
            }
        }
        _ => errors.push("/ patches must be an array".to_string()),
    }
    ValidationReport::from_errors(errors)
}

fn check_patch(path: &str, patch: &Value, errors: &mut Vec<String>) {
    let Value::Object(fields) = patch else {
        errors.push(format!("{path} patch must be an object"));
        return;
    };
    let Some(op) = fields.get("op").and_then(Value::as_str) else {
        errors.push(format!("{path}/op is required and must be a string"));
        return;
    };
    if !OPS.contains(&op) {
        errors.push(format!("{path}/op unknown operation '{op}'"));
        return;
    }

    let allowed: &[&str] = match op {
        "replace" => &["op", "target", "value"],
        "insert_before" | "insert_after" => &["op", "target", "values"],
        "delete" => &["op", "target"],
        _ => &["op", "target", "newText", "expectedText"],
    };
    check_fields(path, fields, allowed, errors);

    let Some(is_section) = check_target(path, fields.get("target"), errors) else {
        return;
    };

    match op {
        "replace" => check_replace(path, fields.get("value"), is_section, errors),
        "insert_before" | "insert_after" => check_values(path, fields.get("values"), errors),
        "delete" => {}
        _ => check_rename(path, fields, is_section, errors),
    }
}

fn check_fields(path: &str, fields: &Map<String, Value>, allowed: &[&str], errors: &mut Vec<String>) {
    for key in fields.keys() {
        if !allowed.contains(&key.as_str()) {
            errors.push(format!("{path}/{key} unexpected field"));
        }
    }
}

/// Returns `Some(is_section)` when the target is well formed
fn check_target(path: &str, target: Option<&Value>, errors: &mut Vec<String>) -> Option<bool> {
    let Some(target) = target else {
        errors.push(format!("{path}/target is required"));
        return None;
    };
    let Value::Object(fields) = target else {
        errors.push(format!("{path}/target must be an object"));
        return None;
    };
    check_fields(&format!("{path}/target"), fields, &["kind", "id"], errors);

    let kind = match fields.get("kind").and_then(Value::as_str) {
        Some("block") => Some(false),
        Some("section") => Some(true),
        _ => {
            errors.push(format!("{path}/target/kind must be 'block' or 'section'"));
            None
        }
    };
    match fields.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => kind,
        _ => {
            errors.push(format!("{path}/target/id must be a non-empty string"));
            None
        }
    }
}

fn check_replace(path: &str, value: Option<&Value>, is_section: bool, errors: &mut Vec<String>) {
    let value_path = format!("{path}/value");
    match (value, is_section) {
        (None, _) => errors.push(format!("{value_path} is required")),
        (Some(Value::Array(blocks)), true) => check_blocks(&value_path, blocks, errors),
        (Some(_), true) => errors.push(format!(
            "{value_path} must be an array of blocks for a section target"
        )),
        (Some(block @ Value::Object(_)), false) => check_block(&value_path, block, errors),
        (Some(_), false) => errors.push(format!(
            "{value_path} must be a single block object for a block target"
        )),
    }
}

fn check_values(path: &str, values: Option<&Value>, errors: &mut Vec<String>) {
    let values_path = format!("{path}/values");
    match values {
        Some(Value::Array(blocks)) if !blocks.is_empty() => {
            check_blocks(&values_path, blocks, errors);
        }
        Some(Value::Array(_)) => errors.push(format!("{values_path} must contain at least one block")),
        Some(_) => errors.push(format!("{values_path} must be an array of blocks")),
        None => errors.push(format!("{values_path} is required")),
    }
}

fn check_rename(path: &str, fields: &Map<String, Value>, is_section: bool, errors: &mut Vec<String>) {
    if !is_section {
        errors.push(format!("{path}/target/kind rename_heading requires a section target"));
    }
    match fields.get("newText").and_then(Value::as_str) {
        Some(text) => {
            let length = text.trim().chars().count();
            if length == 0 || length > MAX_RENAME_CHARS {
                errors.push(format!(
                    "{path}/newText must be 1-{MAX_RENAME_CHARS} characters after trimming"
                ));
            }
        }
        None => errors.push(format!("{path}/newText is required and must be a string")),
    }
    if let Some(expected) = fields.get("expectedText") {
        if !expected.is_string() {
            errors.push(format!("{path}/expectedText must be a string"));
        }
    }
}

fn check_blocks(path: &str, blocks: &[Value], errors: &mut Vec<String>) {
    for (index, block) in blocks.iter().enumerate() {
        check_block(&format!("{path}/{index}"), block, errors);
    }
}

fn check_block(path: &str, block: &Value, errors: &mut Vec<String>) {
    for error in validate_block(block).errors {
        // Block errors are rooted at "/"; re-root them under the payload path.
        match error.strip_prefix("/ ") {
            Some(message) => errors.push(format!("{path} {message}")),
            None => errors.push(format!("{path}{error}")),
        }
    }
}
