//! Error types for the stream processor
//!
//! Every operator forwards errors through the stream as `Err` items. An error
//! is terminal: nothing is emitted after it.

use thiserror::Error;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// A mapping-style `split_merge` received a key it has no handler for
    #[error("unknown partition key: {key}")]
    UnknownPartition { key: String },

    /// No id recipe is registered for the event type
    #[error("unknown event type '{event_type}' (ts: {ts})")]
    UnknownEventType { event_type: String, ts: String },

    /// A field required by the id recipe is absent or null
    #[error("unable to compute id for type '{event_type}', missing field '{field}' (ts: {ts})")]
    MissingField {
        event_type: String,
        field: String,
        ts: String,
    },

    /// A framed line was not valid UTF-8
    #[error("invalid UTF-8 in line: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Execution errors
    #[error("execution error: {source}")]
    Execution {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Errors raised by an upstream source such as a vendor decoder
    #[error("upstream error: {source}")]
    Upstream {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessorError {
    /// Build a configuration error from a message
    pub fn configuration(message: impl Into<String>) -> Self {
        let message: String = message.into();
        ProcessorError::Configuration {
            source: message.into(),
        }
    }

    /// Wrap an error raised by an upstream source
    pub fn upstream<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ProcessorError::Upstream {
            source: Box::new(err),
        }
    }
}

/// Result type alias for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Serialization(err.to_string())
    }
}

impl From<figment::Error> for ProcessorError {
    fn from(err: figment::Error) -> Self {
        ProcessorError::Configuration {
            source: Box::new(err),
        }
    }
}

impl From<tokio::task::JoinError> for ProcessorError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProcessorError::Execution {
            source: Box::new(err),
        }
    }
}

impl From<anyhow::Error> for ProcessorError {
    fn from(err: anyhow::Error) -> Self {
        ProcessorError::Upstream { source: err.into() }
    }
}
