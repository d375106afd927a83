//! Keystone Logging
//!
//! The logging pipeline: named log sources with attached sinks, a global
//! filter chain with atomic reconfiguration, and per-write dispatch
//! reporting.

pub mod filters;
pub mod source;
pub mod writer;

// Re-export commonly used types
pub use filters::{Filter, FilterChain};
pub use source::{LogSource, SharedSink, SinkFailure};
pub use writer::{DispatchReport, LogWriter, ShutdownReport, WriteOutcome};
