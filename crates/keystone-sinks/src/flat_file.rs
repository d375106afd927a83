use crate::format::{render_block, TextFormat};
use keystone_core::config::DEFAULT_RULE;
use keystone_core::{ConfigError, LogEntry, Sink, SinkError};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// How often buffered output is pushed to disk without an explicit flush.
const FLUSH_EVERY: u64 = 100;

/// Writes flat-file entry blocks to a single log file.
///
/// The file is opened at construction time so that an unwritable path is a
/// configuration error, not a write-path surprise.
pub struct FlatFileSink {
    name: String,
    path: PathBuf,
    format: TextFormat,
    header: String,
    footer: String,
    file: BufWriter<File>,
    entries_written: u64,
}

impl FlatFileSink {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        format: TextFormat,
    ) -> Result<Self, ConfigError> {
        let path = path.into();
        let file = open_append(&path)?;
        info!(path = %path.display(), "opened flat file log");
        Ok(Self {
            name: name.into(),
            path,
            format,
            header: DEFAULT_RULE.to_string(),
            footer: DEFAULT_RULE.to_string(),
            file: BufWriter::new(file),
            entries_written: 0,
        })
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }
}

/// Open a file for appending, creating parent directories as needed.
pub(crate) fn open_append(path: &Path) -> Result<File, ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

impl Sink for FlatFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&mut self, entry: &LogEntry) -> Result<(), SinkError> {
        let block = render_block(&self.format, &self.header, &self.footer, entry);
        self.file.write_all(block.as_bytes())?;
        self.entries_written += 1;
        if self.entries_written % FLUSH_EVERY == 0 {
            self.file.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.file.flush()?;
        Ok(())
    }
}

impl Drop for FlatFileSink {
    fn drop(&mut self) {
        if let Err(e) = self.file.flush() {
            warn!(path = %self.path.display(), error = %e, "failed to flush flat file on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::parse_flat_file;
    use keystone_core::Severity;
    use tempfile::TempDir;

    #[test]
    fn test_unwritable_path_fails_at_construction() {
        let result = FlatFileSink::new("disk", "/proc/nope/keystone.log", TextFormat::brief());
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/app.log");
        let sink = FlatFileSink::new("disk", &path, TextFormat::brief()).unwrap();
        assert!(path.parent().unwrap().exists());
        assert_eq!(sink.entries_written(), 0);
    }

    #[test]
    fn test_write_and_reparse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut sink = FlatFileSink::new("disk", &path, TextFormat::brief()).unwrap();

        let entry = LogEntry::new("A flat file entry.")
            .with_category("DiskFiles")
            .with_priority(7)
            .with_event_id(9004)
            .with_severity(Severity::Error)
            .with_title("Examples");
        sink.emit(&entry).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(DEFAULT_RULE));

        let parsed = parse_flat_file(&content);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].message, "A flat file entry.");
        assert_eq!(parsed[0].categories, vec!["DiskFiles"]);
        assert_eq!(parsed[0].priority, 7);
        assert_eq!(parsed[0].event_id, 9004);
        assert_eq!(parsed[0].severity, Severity::Error);
        assert_eq!(parsed[0].title.as_deref(), Some("Examples"));
    }

    #[test]
    fn test_appends_across_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");

        {
            let mut sink = FlatFileSink::new("disk", &path, TextFormat::brief()).unwrap();
            sink.emit(&LogEntry::new("first")).unwrap();
        }
        {
            let mut sink = FlatFileSink::new("disk", &path, TextFormat::brief()).unwrap();
            sink.emit(&LogEntry::new("second")).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed = parse_flat_file(&content);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].message, "first");
        assert_eq!(parsed[1].message, "second");
    }
}
