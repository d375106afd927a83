//! Keystone Sinks
//!
//! Sink implementations for the logging pipeline: console, flat file,
//! rolling flat file, and the asynchronous wrapper, plus the flat-file
//! text format and its parser.

pub mod asynch;
pub mod console;
pub mod flat_file;
pub mod format;
pub mod rolling;

// Re-export commonly used types
pub use asynch::{AsyncOptions, AsyncSink, DrainReport, OverflowPolicy};
pub use console::{ConsoleMode, ConsoleSink};
pub use flat_file::FlatFileSink;
pub use format::{parse_flat_file, pretty_line, render_block, TextFormat};
pub use rolling::{RollOptions, RollingFlatFileSink};
