//! Content-addressed hashing primitives
//!
//! Provides [`ContentHash`], a 32-byte SHA-256 digest over the
//! canonical JSON encoding of a value. Canonical means object keys are sorted
//! recursively, so field order never affects the digest.

use crate::document::ArtifactIr;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};

/// A 32-byte content hash (SHA-256)
///
/// Displays as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute SHA-256 of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&digest);
        Self(arr)
    }

    /// Hash the canonical JSON encoding of a serializable value
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn of_canonical<T>(value: &T) -> Result<Self, HashError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        let bytes = serde_json::to_vec(&canonicalize(&value))?;
        Ok(Self::compute(&bytes))
    }
}

/// Stable digest of an artifact IR
///
/// # Errors
/// Returns error if the document cannot be serialized
pub fn ir_hash(ir: &ArtifactIr) -> Result<ContentHash, HashError> {
    ContentHash::of_canonical(ir)
}

/// Recursively sort object keys
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        other => other.clone(),
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Hashing failure
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
