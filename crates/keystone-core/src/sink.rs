use crate::entry::LogEntry;
use crate::error::SinkError;
use std::sync::{Arc, Mutex, MutexGuard};

/// Trait for log entry sinks.
///
/// A sink durably or visibly records an entry (console, file, a wrapped
/// sink behind a buffer). Sinks own any resource handle they need and
/// acquire it at construction time, so that a misconfigured sink fails
/// while the pipeline is being built rather than on the hot write path.
pub trait Sink: Send {
    /// Name of this sink, used in dispatch reports.
    fn name(&self) -> &str;

    /// Record one entry.
    fn emit(&mut self, entry: &LogEntry) -> Result<(), SinkError>;

    /// Flush any buffered data.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Number of accepted entries this sink has discarded, if any.
    ///
    /// Only buffering sinks ever discard entries; everything else reports
    /// zero. Shutdown reporting sums this across sinks so no loss is silent.
    fn dropped_entries(&self) -> u64 {
        0
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub fn lock_recovering<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A sink that collects entries in memory.
///
/// Useful as a test double and for inspecting dispatch behavior; clones
/// share the same backing store, so a clone kept by the caller observes
/// entries delivered to the attached original.
#[derive(Clone)]
pub struct MemorySink {
    label: String,
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        lock_recovering(&self.entries).clone()
    }

    pub fn len(&self) -> usize {
        lock_recovering(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock_recovering(&self.entries).clear();
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.label
    }

    fn emit(&mut self, entry: &LogEntry) -> Result<(), SinkError> {
        lock_recovering(&self.entries).push(entry.clone());
        Ok(())
    }
}
