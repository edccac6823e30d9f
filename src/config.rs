// Tue Jan 13 2026 - Alex

use crate::memory::access::DEFAULT_STRING_LENGTH;
use crate::pattern::SearchAlgorithm;
use crate::rtti::layout::{MAX_BASE_CLASSES, MAX_NAME_LENGTH};
use crate::utils::LoggingUtils;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub string_max_len: usize,
    pub rtti_name_max_len: usize,
    pub rtti_max_base_classes: i32,
    pub default_algorithm: SearchAlgorithm,
    pub pattern_cache_enabled: bool,
    pub scan_threads: usize,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            string_max_len: DEFAULT_STRING_LENGTH,
            rtti_name_max_len: MAX_NAME_LENGTH,
            rtti_max_base_classes: MAX_BASE_CLASSES,
            default_algorithm: SearchAlgorithm::default(),
            pattern_cache_enabled: true,
            scan_threads: num_cpus::get(),
            log_level: "warn".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn with_string_max_len(mut self, len: usize) -> Self {
        self.string_max_len = len;
        self
    }

    pub fn with_algorithm(mut self, algorithm: SearchAlgorithm) -> Self {
        self.default_algorithm = algorithm;
        self
    }

    pub fn with_pattern_cache(mut self, enabled: bool) -> Self {
        self.pattern_cache_enabled = enabled;
        self
    }

    pub fn with_scan_threads(mut self, threads: usize) -> Self {
        self.scan_threads = threads;
        self
    }

    pub fn with_log_level(mut self, level: &str) -> Self {
        self.log_level = level.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.string_max_len == 0 {
            return Err("string_max_len must be greater than 0".to_string());
        }
        if self.rtti_name_max_len == 0 {
            return Err("rtti_name_max_len must be greater than 0".to_string());
        }
        if self.rtti_max_base_classes <= 0 {
            return Err("rtti_max_base_classes must be greater than 0".to_string());
        }
        if self.scan_threads == 0 {
            return Err("scan_threads must be greater than 0".to_string());
        }
        if LoggingUtils::parse_level(&self.log_level).is_none() {
            return Err(format!("unknown log_level '{}'", self.log_level));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.string_max_len, 512);
        assert_eq!(config.rtti_name_max_len, 60);
        assert_eq!(config.rtti_max_base_classes, 25);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(EngineConfig::new().with_scan_threads(0).validate().is_err());
        assert!(EngineConfig::new().with_log_level("chatty").validate().is_err());
        assert!(EngineConfig::new().with_string_max_len(0).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"default_algorithm":"BoyerMooreHorspool","log_level":"debug"}"#).unwrap();
        assert_eq!(config.default_algorithm, SearchAlgorithm::BoyerMooreHorspool);
        assert_eq!(config.string_max_len, 512);
        assert!(config.pattern_cache_enabled);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("memhook-config-{}.json", std::process::id()));
        let config = EngineConfig::new().with_pattern_cache(false).with_log_level("info");
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(!loaded.pattern_cache_enabled);
        assert_eq!(loaded.log_level, "info");
    }
}
