//! Configuration Loader
//!
//! Environment-aware configuration loading: a base `batchwatch.yaml` merged
//! with an optional `batchwatch.<environment>.yaml` overlay, where the
//! environment comes from `BATCHWATCH_ENV`. Missing files fall back to
//! defaults; a present-but-invalid file is an explicit error, never a silent
//! fallback.

use serde_yaml::Value as YamlValue;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::BatchwatchConfig;
use crate::error::{BatchwatchError, Result};
use crate::logging::detect_environment;

/// Loads and holds the merged configuration for one process.
#[derive(Debug)]
pub struct ConfigManager {
    config: BatchwatchConfig,
    environment: String,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    pub fn load(config_dir: Option<PathBuf>) -> Result<Self> {
        let environment = detect_environment();
        Self::load_with_env(config_dir, &environment)
    }

    /// Load configuration with an explicit environment, useful for tests
    /// that must not mutate process-global environment variables.
    pub fn load_with_env(config_dir: Option<PathBuf>, environment: &str) -> Result<Self> {
        let config_dir = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        let base = Self::read_yaml(&config_dir.join("batchwatch.yaml"))?;
        let overlay = Self::read_yaml(&config_dir.join(format!("batchwatch.{environment}.yaml")))?;

        let merged = match (base, overlay) {
            (Some(base), Some(overlay)) => Self::merge(base, overlay),
            (Some(base), None) => base,
            (None, Some(overlay)) => overlay,
            (None, None) => {
                debug!(
                    environment,
                    config_dir = %config_dir.display(),
                    "no configuration files found, using defaults"
                );
                let config = BatchwatchConfig::default();
                config.validate()?;
                return Ok(Self {
                    config,
                    environment: environment.to_string(),
                });
            }
        };

        let config: BatchwatchConfig = serde_yaml::from_value(merged)?;
        config.validate()?;

        debug!(environment, "configuration loaded");
        Ok(Self {
            config,
            environment: environment.to_string(),
        })
    }

    pub fn config(&self) -> &BatchwatchConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    fn read_yaml(path: &Path) -> Result<Option<YamlValue>> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let value: YamlValue = serde_yaml::from_str(&content).map_err(|e| {
                    BatchwatchError::configuration(format!("{}: {e}", path.display()))
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Recursive mapping merge; overlay scalars and sequences win outright.
    fn merge(base: YamlValue, overlay: YamlValue) -> YamlValue {
        match (base, overlay) {
            (YamlValue::Mapping(mut base_map), YamlValue::Mapping(overlay_map)) => {
                for (key, overlay_value) in overlay_map {
                    let merged = match base_map.remove(&key) {
                        Some(base_value) => Self::merge(base_value, overlay_value),
                        None => overlay_value,
                    };
                    base_map.insert(key, merged);
                }
                YamlValue::Mapping(base_map)
            }
            (_, overlay) => overlay,
        }
    }
}
