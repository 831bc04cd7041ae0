//! Configuration loading tests

use processor::config::ProcessorConfig;
use processor::logging::LogFormat;
use processor::pipeline::{PartitionStrategy, PipelineBuilder};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// Environment variables are process-wide, so every `load` assertion lives in
// this one test.
#[test]
fn test_load_from_file_and_environment() {
    let file = write_config(
        r#"
name: carelink-upload
partition: device
logging:
  level: info
  format: json
idify:
  recipes:
    food: [type, deviceId, ts]
"#,
    );

    let config = ProcessorConfig::load(Some(file.path().to_path_buf())).unwrap();
    assert_eq!(config.name, "carelink-upload");
    assert_eq!(config.partition, PartitionStrategy::Device);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(config.sort_by_time);

    std::env::set_var("INGEST_SORT_BY_TIME", "false");
    std::env::set_var("INGEST_LOGGING__LEVEL", "debug");
    let overridden = ProcessorConfig::load(Some(file.path().to_path_buf()));
    std::env::remove_var("INGEST_SORT_BY_TIME");
    std::env::remove_var("INGEST_LOGGING__LEVEL");

    let overridden = overridden.unwrap();
    assert!(!overridden.sort_by_time);
    assert_eq!(overridden.logging.level, "debug");
    assert_eq!(overridden.name, "carelink-upload");

    let defaults = ProcessorConfig::load(None).unwrap();
    assert_eq!(defaults, ProcessorConfig::default());
}

#[test]
fn test_invalid_recipe_rejected() {
    let result = ProcessorConfig::from_yaml_str(
        r#"
idify:
  recipes:
    food: []
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_loaded_config_builds_pipeline() {
    let config = ProcessorConfig::from_yaml_str(
        r#"
name: meter
join_temp_basals: false
idify:
  recipes:
    food: [type, ts]
"#,
    )
    .unwrap();

    let pipeline = PipelineBuilder::new().with_config(config).build().unwrap();
    assert_eq!(pipeline.name(), "meter");
    assert!(!pipeline.config().join_temp_basals);
    assert!(pipeline.idifier().recipes().get("food").is_some());
}
