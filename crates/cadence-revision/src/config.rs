//! Revision configuration
//!
//! Loaded from TOML, then overlaid from the environment. Every field has a
//! default so an empty file (or no file) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Environment variable selecting the generation provider
pub const ENV_PROVIDER: &str = "CADENCE_LLM_PROVIDER";

/// Environment variable selecting the model name
pub const ENV_MODEL: &str = "CADENCE_LLM_MODEL";

/// Generation provider family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Mock,
    Openai,
    Anthropic,
}

impl ProviderKind {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Parse a provider name, falling back to [`ProviderKind::Mock`]
    #[must_use]
    pub fn parse_or_mock(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(provider = name, "unknown generation provider, using mock");
            Self::Mock
        })
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "openai" => Ok(Self::Openai),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

/// Revision settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionConfig {
    /// Provider family recorded on revision records
    pub provider: ProviderKind,
    /// Model name recorded on revision records
    pub model: Option<String>,
    /// Repair rounds allowed per validate-or-repair call
    pub repair_attempts: usize,
    /// Sampling temperature for rename proposals
    pub rename_temperature: f32,
    /// Characters of instruction kept on a record
    pub instruction_limit: usize,
    /// Records kept per scope
    pub log_capacity: usize,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            model: None,
            repair_attempts: 1,
            rename_temperature: 0.0,
            instruction_limit: 500,
            log_capacity: 200,
        }
    }
}

impl RevisionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With provider
    #[inline]
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// With model name
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// With repair rounds
    #[inline]
    #[must_use]
    pub fn with_repair_attempts(mut self, attempts: usize) -> Self {
        self.repair_attempts = attempts;
        self
    }

    /// With log capacity
    #[inline]
    #[must_use]
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns error on malformed TOML or mistyped fields
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Overlay `CADENCE_LLM_PROVIDER` / `CADENCE_LLM_MODEL`
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_PROVIDER).ok().as_deref(),
            std::env::var(ENV_MODEL).ok().as_deref(),
        )
    }

    /// Overlay explicit provider/model values; empty strings are ignored
    #[must_use]
    pub fn with_overrides(mut self, provider: Option<&str>, model: Option<&str>) -> Self {
        if let Some(name) = provider.filter(|s| !s.trim().is_empty()) {
            self.provider = ProviderKind::parse_or_mock(name);
        }
        if let Some(model) = model.filter(|s| !s.trim().is_empty()) {
            self.model = Some(model.trim().to_string());
        }
        self
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = RevisionConfig::new();
        assert_eq!(config.provider, ProviderKind::Mock);
        assert_eq!(config.repair_attempts, 1);
        assert_eq!(config.instruction_limit, 500);
        assert_eq!(config.log_capacity, 200);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RevisionConfig::from_toml_str(
            r#"
            provider = "anthropic"
            model = "large"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.model.as_deref(), Some("large"));
        assert_eq!(config.log_capacity, 200);
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            RevisionConfig::from_toml_str("repair_attempts = \"many\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "repair_attempts = 3").unwrap();
        let config = RevisionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.repair_attempts, 3);
    }

    #[test]
    fn overrides_apply_and_unknown_provider_falls_back() {
        let config = RevisionConfig::new()
            .with_provider(ProviderKind::Openai)
            .with_overrides(Some("OpenAI"), Some(" gpt "));
        assert_eq!(config.provider, ProviderKind::Openai);
        assert_eq!(config.model.as_deref(), Some("gpt"));

        let fallback = config.with_overrides(Some("llamas"), None);
        assert_eq!(fallback.provider, ProviderKind::Mock);
        assert_eq!(fallback.model.as_deref(), Some("gpt"));
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let config = RevisionConfig::new()
            .with_model("m")
            .with_overrides(Some(""), Some("  "));
        assert_eq!(config.model.as_deref(), Some("m"));
    }
}
