//! Event-stream processing core for device data ingest
//!
//! This crate turns streams of decoded device records into an ordered stream
//! of finalized, deterministically identified events. It provides the
//! push-based operator library, the idifier, the temp-basal joiner and the
//! pipeline that composes them.

pub mod config;
pub mod error;
pub mod idify;
pub mod join;
pub mod logging;
pub mod operator;
pub mod pipeline;

// Re-export commonly used types
pub use error::{ProcessorError, Result as ProcessorResult};

pub use config::{IdifyConfig, ProcessorConfig};

pub use logging::{init_logging, LogFormat, LoggingConfig};

pub use operator::{
    keep, link, pass_through, readline, readline_with, sort, split_merge, Emitter, EventStream,
    Flow, Handlers, Observer, OperatorExt, TrailingFragment,
};

pub use idify::{idify_stream, EventId, Idifier, Recipe, RecipeTable};

pub use join::{join_temp_basals, JoinState, TempBasalJoiner};

pub use pipeline::{
    compare_by_time, PartitionKey, PartitionStrategy, Pipeline, PipelineBuilder, PipelineStats,
};
