//! Archivist configuration.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default cap on completion calls per run.
pub const DEFAULT_MAX_STEPS: usize = 15;

/// Default number of runs allowed at once.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Errors reading configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Configuration for the archivist.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivistConfig {
    /// Model override; the client default is used when `None`.
    pub model: Option<String>,
    /// Messages API base for proxies and gateways.
    pub api_base_url: Option<String>,
    /// Maximum tokens per completion.
    pub max_tokens: usize,
    /// Completion calls allowed in one run before giving up.
    pub max_steps: usize,
    /// Admission gate size.
    pub concurrency: usize,
    /// Language the answers are written in.
    pub language: String,
    /// Path of the campaign snapshot JSON.
    pub db_path: PathBuf,
    /// OpenAI-compatible embeddings endpoint; the offline hashing embedder is
    /// used when unset.
    pub embedding_url: Option<String>,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
}

impl Default for ArchivistConfig {
    fn default() -> Self {
        Self {
            model: None,
            api_base_url: None,
            max_tokens: 4096,
            max_steps: DEFAULT_MAX_STEPS,
            concurrency: DEFAULT_CONCURRENCY,
            language: "English".to_string(),
            db_path: PathBuf::from("./campaign.json"),
            embedding_url: None,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_api_key: None,
        }
    }
}

impl ArchivistConfig {
    /// Read `ARCHIVIST_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or blank keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(model) = get("ARCHIVIST_MODEL") {
            config.model = Some(model);
        }
        config.api_base_url = get("ARCHIVIST_API_BASE_URL");
        if let Some(value) = get("ARCHIVIST_MAX_TOKENS") {
            config.max_tokens = parse_positive("ARCHIVIST_MAX_TOKENS", &value)?;
        }
        if let Some(value) = get("ARCHIVIST_MAX_STEPS") {
            config.max_steps = parse_positive("ARCHIVIST_MAX_STEPS", &value)?;
        }
        if let Some(value) = get("ARCHIVIST_CONCURRENCY") {
            config.concurrency = parse_positive("ARCHIVIST_CONCURRENCY", &value)?;
        }
        if let Some(language) = get("ARCHIVIST_LANGUAGE") {
            config.language = language;
        }
        if let Some(path) = get("ARCHIVIST_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        config.embedding_url = get("ARCHIVIST_EMBEDDING_URL");
        if let Some(model) = get("ARCHIVIST_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        config.embedding_api_key = get("ARCHIVIST_EMBEDDING_API_KEY");

        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base_url = Some(base_url.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}

fn parse_positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let invalid = |reason: String| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };
    let parsed: T = value.trim().parse().map_err(|e: T::Err| invalid(e.to_string()))?;
    if parsed <= T::default() {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ArchivistConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ArchivistConfig::default());
        assert_eq!(config.max_steps, 15);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.language, "English");
        assert_eq!(config.api_base_url, None);
    }

    #[test]
    fn test_overrides() {
        let config = ArchivistConfig::from_lookup(lookup(&[
            ("ARCHIVIST_MODEL", "claude-haiku"),
            ("ARCHIVIST_MAX_STEPS", " 8 "),
            ("ARCHIVIST_CONCURRENCY", "4"),
            ("ARCHIVIST_LANGUAGE", "French"),
            ("ARCHIVIST_DB_PATH", "/data/campaign.json"),
            ("ARCHIVIST_EMBEDDING_URL", "http://localhost:8080/v1"),
            ("ARCHIVIST_API_BASE_URL", "https://gateway.internal/anthropic/v1"),
        ]))
        .unwrap();
        assert_eq!(config.model.as_deref(), Some("claude-haiku"));
        assert_eq!(config.max_steps, 8);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.language, "French");
        assert_eq!(config.db_path, PathBuf::from("/data/campaign.json"));
        assert_eq!(config.embedding_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(
            config.api_base_url.as_deref(),
            Some("https://gateway.internal/anthropic/v1")
        );
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        let err = ArchivistConfig::from_lookup(lookup(&[("ARCHIVIST_CONCURRENCY", "two")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { ref key, .. } if key == "ARCHIVIST_CONCURRENCY"
        ));

        let err =
            ArchivistConfig::from_lookup(lookup(&[("ARCHIVIST_MAX_STEPS", "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config =
            ArchivistConfig::from_lookup(lookup(&[("ARCHIVIST_LANGUAGE", "  ")])).unwrap();
        assert_eq!(config.language, "English");
    }
}
