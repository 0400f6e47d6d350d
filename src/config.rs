//! Engine configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional JSON
//! file, `QUERYCRAFT_*` environment variables (after `.env` is loaded), and
//! whatever the binaries override from their command-line flags.

use crate::error::{QueryCraftError, Result};
use crate::fuzzy_matcher::FuzzyMatcher;
use crate::schema::{NamingConventionInference, SchemaBuilder};
use crate::synthesizer::resolve::EntityResolver;
use crate::synthesizer::SynthesisLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite file to introspect and query (default: sample_ecommerce.db)
    pub database_path: PathBuf,
    /// Address the HTTP server binds to (default: 0.0.0.0:8080)
    pub bind_address: String,
    /// LIMIT for ranking questions without a quantity (default: 10)
    pub top_default_limit: u64,
    /// LIMIT of the fallback query (default: 10)
    pub fallback_limit: u64,
    /// LIMIT for listing questions without a quantity (default: 100)
    pub list_limit: u64,
    /// LIMIT for "recent" questions without a quantity (default: 10)
    pub recent_limit: u64,
    /// Minimum name similarity for a fuzzy match, in (0, 1] (default: 0.88)
    pub similarity_threshold: f64,
    /// Rows returned by the executor before truncating (default: 1000)
    pub max_result_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let limits = SynthesisLimits::default();
        Self {
            database_path: PathBuf::from("sample_ecommerce.db"),
            bind_address: "0.0.0.0:8080".to_string(),
            top_default_limit: limits.top_default,
            fallback_limit: limits.fallback,
            list_limit: limits.list,
            recent_limit: limits.recent,
            similarity_threshold: 0.88,
            max_result_rows: 1000,
        }
    }
}

impl EngineConfig {
    /// Defaults, then `file` if given, then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| QueryCraftError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| QueryCraftError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Override fields from `QUERYCRAFT_*` variables as returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("QUERYCRAFT_DB") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(bind) = lookup("QUERYCRAFT_BIND") {
            self.bind_address = bind;
        }
        override_parsed(&lookup, "QUERYCRAFT_TOP_LIMIT", &mut self.top_default_limit)?;
        override_parsed(&lookup, "QUERYCRAFT_FALLBACK_LIMIT", &mut self.fallback_limit)?;
        override_parsed(&lookup, "QUERYCRAFT_LIST_LIMIT", &mut self.list_limit)?;
        override_parsed(&lookup, "QUERYCRAFT_RECENT_LIMIT", &mut self.recent_limit)?;
        override_parsed(&lookup, "QUERYCRAFT_SIMILARITY_THRESHOLD", &mut self.similarity_threshold)?;
        override_parsed(&lookup, "QUERYCRAFT_MAX_ROWS", &mut self.max_result_rows)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(QueryCraftError::Config(format!(
                "similarity_threshold must be in (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        let limits = [
            ("top_default_limit", self.top_default_limit),
            ("fallback_limit", self.fallback_limit),
            ("list_limit", self.list_limit),
            ("recent_limit", self.recent_limit),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(QueryCraftError::Config(format!("{} must be at least 1", name)));
        }
        if self.max_result_rows == 0 {
            return Err(QueryCraftError::Config("max_result_rows must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn limits(&self) -> SynthesisLimits {
        SynthesisLimits {
            top_default: self.top_default_limit,
            fallback: self.fallback_limit,
            list: self.list_limit,
            recent: self.recent_limit,
        }
    }

    pub fn resolver(&self) -> EntityResolver {
        EntityResolver::new(Arc::new(FuzzyMatcher::new(self.similarity_threshold)), self.similarity_threshold)
    }

    pub fn schema_builder(&self) -> SchemaBuilder {
        SchemaBuilder::new(Box::new(NamingConventionInference::new(
            Arc::new(FuzzyMatcher::new(self.similarity_threshold)),
            self.similarity_threshold,
        )))
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| QueryCraftError::Config(format!("{} has an invalid value: {:?}", key, raw)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.limits(), SynthesisLimits::default());
        assert_eq!(config.similarity_threshold, 0.88);
        assert_eq!(config.max_result_rows, 1000);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_env(env(&[
                ("QUERYCRAFT_DB", "/tmp/shop.db"),
                ("QUERYCRAFT_FALLBACK_LIMIT", "25"),
                ("QUERYCRAFT_SIMILARITY_THRESHOLD", "0.9"),
            ]))
            .expect("overrides");
        assert_eq!(config.database_path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.fallback_limit, 25);
        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.list_limit, 100);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_env(env(&[("QUERYCRAFT_LIST_LIMIT", "lots")]))
            .expect_err("non-numeric");
        assert!(matches!(err, QueryCraftError::Config(_)));

        let config = EngineConfig {
            similarity_threshold: 1.5,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(QueryCraftError::Config(_))));

        let config = EngineConfig {
            fallback_limit: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(QueryCraftError::Config(_))));
    }

    #[test]
    fn test_partial_json_file() {
        let path = std::env::temp_dir().join(format!("querycraft-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"list_limit": 50, "bind_address": "127.0.0.1:9000"}"#).expect("write");
        let config = EngineConfig::from_file(&path).expect("load");
        std::fs::remove_file(&path).ok();
        assert_eq!(config.list_limit, 50);
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.top_default_limit, 10);
    }
}
