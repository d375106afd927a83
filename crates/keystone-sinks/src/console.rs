use crate::format::{pretty_line, render_block, TextFormat};
use keystone_core::config::DEFAULT_RULE;
use keystone_core::{LogEntry, Sink, SinkError};
use std::io::Write;

/// Rendering mode for console output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleMode {
    /// One line per entry, human-readable
    Pretty,
    /// Full flat-file blocks using a template
    Template(TextFormat),
}

/// Writes entries to the terminal.
pub struct ConsoleSink {
    name: String,
    mode: ConsoleMode,
    use_stderr: bool,
}

impl ConsoleSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: ConsoleMode::Pretty,
            use_stderr: false,
        }
    }

    pub fn with_mode(mut self, mode: ConsoleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stderr(mut self, use_stderr: bool) -> Self {
        self.use_stderr = use_stderr;
        self
    }

    /// Resolve a configured format name: "pretty" or a template spec.
    pub fn from_format_spec(name: impl Into<String>, spec: &str, use_stderr: bool) -> Self {
        let mode = match spec {
            "pretty" => ConsoleMode::Pretty,
            other => ConsoleMode::Template(TextFormat::from_spec(other)),
        };
        Self::new(name).with_mode(mode).with_stderr(use_stderr)
    }

    fn render(&self, entry: &LogEntry) -> String {
        match &self.mode {
            ConsoleMode::Pretty => {
                let mut line = pretty_line(entry);
                line.push('\n');
                line
            }
            ConsoleMode::Template(format) => render_block(format, DEFAULT_RULE, DEFAULT_RULE, entry),
        }
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&mut self, entry: &LogEntry) -> Result<(), SinkError> {
        let text = self.render(entry);
        if self.use_stderr {
            let mut out = std::io::stderr().lock();
            out.write_all(text.as_bytes())?;
        } else {
            let mut out = std::io::stdout().lock();
            out.write_all(text.as_bytes())?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if self.use_stderr {
            std::io::stderr().lock().flush()?;
        } else {
            std::io::stdout().lock().flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::Severity;

    #[test]
    fn test_pretty_render() {
        let sink = ConsoleSink::new("console");
        let entry = LogEntry::new("Test message").with_severity(Severity::Error);
        let text = sink.render(&entry);
        assert!(text.contains("[Error]"));
        assert!(text.contains("Test message"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_template_render() {
        let sink = ConsoleSink::from_format_spec("console", "brief", false);
        let entry = LogEntry::new("Test message");
        let text = sink.render(&entry);
        assert!(text.starts_with(DEFAULT_RULE));
        assert!(text.contains("Message = Test message"));
    }
}
