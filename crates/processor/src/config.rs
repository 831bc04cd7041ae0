//! Configuration types for the ingest processor
//!
//! Configuration is read from an optional YAML file and then overridden by
//! environment variables prefixed with `INGEST_`; nested keys are separated
//! by a double underscore, e.g. `INGEST_LOGGING__LEVEL=debug`.

use crate::error::{ProcessorError, Result};
use crate::logging::LoggingConfig;
use crate::pipeline::PartitionStrategy;
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main processor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Pipeline name, used in log lines
    pub name: String,

    /// How events are partitioned before per-partition joins
    pub partition: PartitionStrategy,

    /// Collapse temp-basal samples into start/stop events
    pub join_temp_basals: bool,

    /// Sort the merged stream by timestamp before assigning ids
    pub sort_by_time: bool,

    /// Id assignment configuration
    pub idify: IdifyConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            name: "ingest".to_string(),
            partition: PartitionStrategy::default(),
            join_temp_basals: true,
            sort_by_time: true,
            idify: IdifyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("INGEST_").split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document, ignoring the environment
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = Figment::new().merge(Yaml::string(yaml)).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "pipeline name cannot be empty".into(),
            });
        }

        self.idify.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Id assignment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdifyConfig {
    /// Extra recipes by event type; an entry replaces the standard recipe
    pub recipes: BTreeMap<String, Vec<String>>,
}

impl IdifyConfig {
    pub fn validate(&self) -> Result<()> {
        for (event_type, fields) in &self.recipes {
            if event_type.is_empty() {
                return Err(ProcessorError::configuration("recipe event type cannot be empty"));
            }
            if fields.is_empty() {
                return Err(ProcessorError::configuration(format!(
                    "recipe for type '{event_type}' has no fields"
                )));
            }
            if fields.iter().any(String::is_empty) {
                return Err(ProcessorError::configuration(format!(
                    "recipe for type '{event_type}' has an empty field name"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::default();
        assert!(config.join_temp_basals);
        assert!(config.sort_by_time);
        assert_eq!(config.partition, PartitionStrategy::DeviceAndType);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ProcessorConfig::default();
        config.name = String::new();
        assert!(config.validate().is_err());

        config.name = "ingest".to_string();
        config.idify.recipes.insert("food".to_string(), Vec::new());
        assert!(config.validate().is_err());

        config
            .idify
            .recipes
            .insert("food".to_string(), vec!["type".to_string(), String::new()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_str() {
        let config = ProcessorConfig::from_yaml_str(
            r#"
name: carelink
partition: device
sort_by_time: false
idify:
  recipes:
    food: [type, deviceId, ts]
"#,
        )
        .unwrap();

        assert_eq!(config.name, "carelink");
        assert_eq!(config.partition, PartitionStrategy::Device);
        assert!(!config.sort_by_time);
        assert!(config.join_temp_basals);
        assert_eq!(config.idify.recipes["food"], vec!["type", "deviceId", "ts"]);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_strategy() {
        let result = ProcessorConfig::from_yaml_str("partition: round_robin\n");
        assert!(matches!(result, Err(ProcessorError::Configuration { .. })));
    }
}
