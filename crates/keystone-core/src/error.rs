use thiserror::Error;

/// Fatal errors raised while configuring the pipeline.
///
/// Configuration errors surface immediately to the configuring caller;
/// they are never produced on the write path.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a log source named '{0}' already exists")]
    DuplicateSource(String),

    #[error("no log source named '{0}' is configured")]
    UnknownSource(String),

    #[error("no sink named '{0}' is configured")]
    UnknownSink(String),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recoverable, per-sink dispatch errors.
///
/// A sink failure is captured and reported as part of the write outcome;
/// it never aborts dispatch to the remaining sinks and never crashes the
/// caller.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("buffer full after waiting {waited_ms}ms")]
    BufferFull { waited_ms: u64 },

    #[error("sink is shut down")]
    ShutDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for configuration-time operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
