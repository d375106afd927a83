//! Keystone Core
//!
//! Shared types for the Keystone logging pipeline and validation engine:
//! log entries, the sink trait, the error taxonomy, and the TOML
//! configuration model.

pub mod config;
pub mod entry;
pub mod error;
pub mod sink;

// Re-export commonly used types
pub use config::{CategoryFilterMode, Config, OverflowPolicyConfig, RollInterval, SinkConfig};
pub use entry::{LogEntry, Severity, DEFAULT_CATEGORY, UNSET_PRIORITY};
pub use error::{ConfigError, Result, SinkError};
pub use sink::{lock_recovering, MemorySink, Sink};
