use crate::flat_file::open_append;
use crate::format::{render_block, TextFormat};
use chrono::{DateTime, Local, Timelike};
use flate2::write::GzEncoder;
use flate2::Compression;
use keystone_core::config::{RollInterval, DEFAULT_RULE};
use keystone_core::{ConfigError, LogEntry, Sink, SinkError};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Roll behavior for [`RollingFlatFileSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollOptions {
    /// Size threshold in kilobytes; the file rolls once it reaches this
    pub roll_size_kb: u64,
    /// Time-based roll trigger, evaluated alongside the size threshold
    pub interval: RollInterval,
    /// Number of archived files to keep; oldest beyond this are removed
    pub max_archives: usize,
    /// Gzip archives after rolling
    pub compress: bool,
}

impl Default for RollOptions {
    fn default() -> Self {
        Self {
            roll_size_kb: 1024,
            interval: RollInterval::None,
            max_archives: 3,
            compress: false,
        }
    }
}

/// Flat-file sink that rolls the active file by size and/or interval.
///
/// Rolled files are renamed with a timestamp suffix next to the active
/// file; when a name is already taken the suffix gains an incrementing
/// counter.
pub struct RollingFlatFileSink {
    name: String,
    path: PathBuf,
    format: TextFormat,
    header: String,
    footer: String,
    options: RollOptions,
    file: Option<BufWriter<File>>,
    current_size: u64,
    last_roll: DateTime<Local>,
    entries_written: u64,
}

impl RollingFlatFileSink {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        format: TextFormat,
        options: RollOptions,
    ) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut sink = Self {
            name: name.into(),
            path,
            format,
            header: DEFAULT_RULE.to_string(),
            footer: DEFAULT_RULE.to_string(),
            options,
            file: None,
            current_size: 0,
            last_roll: Local::now(),
            entries_written: 0,
        };
        sink.open_file()?;
        Ok(sink)
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

    fn open_file(&mut self) -> Result<(), ConfigError> {
        let file = open_append(&self.path)?;
        self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.file = Some(BufWriter::new(file));
        info!(path = %self.path.display(), "opened rolling flat file log");
        Ok(())
    }

    fn needs_roll(&self) -> bool {
        if self.options.roll_size_kb > 0 && self.current_size >= self.options.roll_size_kb * 1024 {
            return true;
        }
        let now = Local::now();
        match self.options.interval {
            RollInterval::None => false,
            RollInterval::Hourly => {
                now.hour() != self.last_roll.hour()
                    || now.date_naive() != self.last_roll.date_naive()
            }
            RollInterval::Daily => now.date_naive() != self.last_roll.date_naive(),
        }
    }

    fn roll(&mut self) -> Result<(), SinkError> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        self.file = None;

        if self.path.exists() {
            let archive = self.archive_path();
            fs::rename(&self.path, &archive)?;
            debug!(
                from = %self.path.display(),
                to = %archive.display(),
                "rolled log file"
            );

            if self.options.compress {
                if let Err(e) = compress_file(&archive) {
                    warn!(path = %archive.display(), error = %e, "failed to compress archive");
                }
            }
        }

        self.prune_archives();
        self.last_roll = Local::now();
        self.current_size = 0;
        self.open_file().map_err(|e| SinkError::Write(e.to_string()))
    }

    /// Next free archive name: `<stem>-<timestamp>[.<n>][.<ext>]`.
    fn archive_path(&self) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let mut counter = 0u32;
        loop {
            let suffix = if counter == 0 {
                timestamp.clone()
            } else {
                format!("{}.{}", timestamp, counter)
            };
            let candidate = insert_suffix(&self.path, &suffix);
            let compressed = candidate.with_extension(format!(
                "{}.gz",
                candidate
                    .extension()
                    .unwrap_or_default()
                    .to_string_lossy()
            ));
            if !candidate.exists() && !compressed.exists() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Remove the oldest archives beyond `max_archives`.
    fn prune_archives(&self) {
        let Some(parent) = self.path.parent() else {
            return;
        };
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let active = self.path.file_name().map(|n| n.to_os_string());

        let Ok(dir) = fs::read_dir(parent) else {
            return;
        };

        let mut archives: Vec<(PathBuf, std::time::SystemTime)> = dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let file_name = entry.file_name();
                if Some(&file_name) == active.as_ref() {
                    return false;
                }
                file_name.to_string_lossy().starts_with(&format!("{}-", stem))
            })
            .filter_map(|entry| {
                entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok().map(|t| (entry.path(), t)))
            })
            .collect();

        archives.sort_by(|a, b| a.1.cmp(&b.1));

        let to_remove = archives.len().saturating_sub(self.options.max_archives);
        for (path, _) in archives.into_iter().take(to_remove) {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove old archive");
            } else {
                debug!(path = %path.display(), "removed old archive");
            }
        }
    }
}

impl Sink for RollingFlatFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&mut self, entry: &LogEntry) -> Result<(), SinkError> {
        if self.needs_roll() {
            self.roll()?;
        }

        let block = render_block(&self.format, &self.header, &self.footer, entry);
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| SinkError::Write("log file not open".to_string()))?;
        file.write_all(block.as_bytes())?;
        self.current_size += block.len() as u64;
        self.entries_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        Ok(())
    }
}

impl Drop for RollingFlatFileSink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "failed to flush rolling file on drop");
        }
    }
}

/// Gzip a file in place, replacing it with `<name>.gz`.
fn compress_file(path: &Path) -> Result<(), SinkError> {
    let gz_path = path.with_extension(format!(
        "{}.gz",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    let input = fs::read(path)?;
    let output = File::create(&gz_path)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    encoder.write_all(&input)?;
    encoder.finish()?;
    fs::remove_file(path)?;
    Ok(())
}

/// Insert a suffix before the extension:
/// `logs/app.log` + `20260807-120000` -> `logs/app-20260807-120000.log`.
fn insert_suffix(base: &Path, suffix: &str) -> PathBuf {
    if let Some(stem) = base.file_stem() {
        if let Some(ext) = base.extension() {
            base.with_file_name(format!(
                "{}-{}.{}",
                stem.to_string_lossy(),
                suffix,
                ext.to_string_lossy()
            ))
        } else {
            base.with_file_name(format!("{}-{}", stem.to_string_lossy(), suffix))
        }
    } else {
        base.with_extension(suffix)
    }
}
