//! Configuration (§6)
//!
//! The on-disk configuration document at `.rcae/config.json`: embedding
//! model selection, context budget fractions, and watch/codegraph toggles.
//! Legacy documents (schema versions below [`CONFIG_SCHEMA_VERSION`]) are
//! forward-migrated in place on load, never rejected outright.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current on-disk schema version. Bump whenever a field is added, renamed,
/// or given new semantics, and add a branch to [`migrate_forward`].
pub const CONFIG_SCHEMA_VERSION: u32 = 2;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("config document is from a newer schema version ({found}) than this build supports ({supported})")]
    FutureSchema { found: u32, supported: u32 },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Fractional allocation of the context budget across evidence sections
/// (§4.7). Must sum to 1.0 within a small epsilon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetFractions {
    pub memories: f32,
    pub code: f32,
    pub graph: f32,
    pub reports: f32,
}

impl Default for BudgetFractions {
    fn default() -> Self {
        Self {
            memories: 0.45,
            code: 0.35,
            graph: 0.15,
            reports: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: crate::DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: crate::EMBEDDING_DIMENSIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodegraphConfig {
    pub enabled: bool,
    pub watch: bool,
    pub ignore_globs: Vec<String>,
}

impl Default for CodegraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            watch: false,
            ignore_globs: vec![
                "**/target/**".into(),
                "**/node_modules/**".into(),
                "**/.git/**".into(),
            ],
        }
    }
}

/// Root configuration document, serialized at `.rcae/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub schema_version: u32,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub budget: BudgetFractions,
    #[serde(default)]
    pub codegraph: CodegraphConfig,
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: usize,
    #[serde(default = "default_community_min_size")]
    pub community_min_size: usize,
}

fn default_context_token_budget() -> usize {
    8_000
}

fn default_community_min_size() -> usize {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            embedding: EmbeddingConfig::default(),
            budget: BudgetFractions::default(),
            codegraph: CodegraphConfig::default(),
            context_token_budget: default_context_token_budget(),
            community_min_size: default_community_min_size(),
        }
    }
}

impl Config {
    /// Loads and validates the config at `path`, forward-migrating legacy
    /// schema versions in memory (the caller decides whether to persist the
    /// migrated document back to disk).
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut value: serde_json::Value = serde_json::from_str(&raw)?;
        migrate_forward(&mut value)?;
        let config: Config = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at `path`, or returns the default document when no
    /// file exists yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version > CONFIG_SCHEMA_VERSION {
            return Err(ConfigError::FutureSchema {
                found: self.schema_version,
                supported: CONFIG_SCHEMA_VERSION,
            });
        }
        let sum = self.budget.memories + self.budget.code + self.budget.graph + self.budget.reports;
        if (sum - 1.0).abs() > 0.01 {
            return Err(ConfigError::Invalid(format!(
                "budget fractions must sum to ~1.0, got {sum}"
            )));
        }
        if self.context_token_budget == 0 {
            return Err(ConfigError::Invalid(
                "context_token_budget must be greater than zero".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimensions must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Default path: `<project_root>/.rcae/config.json`.
    pub fn default_path(project_root: &Path) -> PathBuf {
        project_root.join(".rcae").join("config.json")
    }
}

/// Forward-migrates a raw JSON document through every schema version below
/// [`CONFIG_SCHEMA_VERSION`], mutating `value` in place.
fn migrate_forward(value: &mut serde_json::Value) -> Result<()> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| ConfigError::Invalid("config document must be a JSON object".into()))?;

    let mut version = obj
        .get("schema_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(1) as u32;

    if version > CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::FutureSchema {
            found: version,
            supported: CONFIG_SCHEMA_VERSION,
        });
    }

    // v1 -> v2: `embedding_model: String` flattened at the root became the
    // nested `embedding.model` object, to make room for `embedding.dimensions`.
    if version < 2 {
        if let Some(model) = obj.remove("embedding_model") {
            obj.insert(
                "embedding".to_string(),
                serde_json::json!({ "model": model, "dimensions": crate::EMBEDDING_DIMENSIONS }),
            );
        }
        version = 2;
    }

    obj.insert("schema_version".to_string(), serde_json::json!(version));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_budget_fractions_rejected() {
        let mut config = Config::default();
        config.budget.memories = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config::default();
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_migrates_legacy_v1_embedding_model_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"schema_version": 1, "embedding_model": "legacy-model"}"#,
        )
        .unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.embedding.model, "legacy-model");
        assert_eq!(loaded.schema_version, CONFIG_SCHEMA_VERSION);
    }

    #[test]
    fn test_future_schema_version_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"schema_version": 999}"#).unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::FutureSchema { .. })
        ));
    }

    #[test]
    fn test_load_or_default_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config, Config::default());
    }
}
