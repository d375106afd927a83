use keystone_core::{lock_recovering, LogEntry, Severity, Sink, SinkError};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A sink shared between sources.
///
/// The same sink instance may be attached to several sources (the console
/// sink typically is); the mutex gives it single-writer discipline no
/// matter how many sources dispatch to it.
pub type SharedSink = Arc<Mutex<Box<dyn Sink>>>;

/// A named logical channel that entries are routed to by category.
///
/// Sources are created at configuration time and stay mutable for the
/// life of the writer: sinks can be attached and removed, the threshold
/// and enabled flag changed.
pub struct LogSource {
    name: String,
    min_severity: Severity,
    enabled: bool,
    sinks: Vec<(String, SharedSink)>,
}

/// A dispatch failure for one sink, captured without aborting delivery to
/// the remaining sinks.
#[derive(Debug)]
pub struct SinkFailure {
    pub source: String,
    pub sink: String,
    pub error: SinkError,
}

impl LogSource {
    pub fn new(name: impl Into<String>, min_severity: Severity, enabled: bool) -> Self {
        Self {
            name: name.into(),
            min_severity,
            enabled,
            sinks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    pub fn set_min_severity(&mut self, min_severity: Severity) {
        self.min_severity = min_severity;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Attach a sink; attach order is dispatch order.
    pub fn attach(&mut self, sink: Box<dyn Sink>) {
        let name = sink.name().to_string();
        self.sinks.push((name, Arc::new(Mutex::new(sink))));
    }

    /// Attach a sink instance that other sources may share.
    pub fn attach_shared(&mut self, sink: SharedSink) {
        let name = lock_recovering(&sink).name().to_string();
        self.sinks.push((name, sink));
    }

    /// Remove the first sink with the given name. Returns whether one was
    /// removed.
    pub fn detach(&mut self, sink_name: &str) -> bool {
        match self.sinks.iter().position(|(name, _)| name == sink_name) {
            Some(index) => {
                self.sinks.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub(crate) fn shared_sinks(&self) -> impl Iterator<Item = &SharedSink> {
        self.sinks.iter().map(|(_, sink)| sink)
    }

    /// Whether this source accepts the entry at all (enabled and above the
    /// severity threshold).
    pub fn accepts(&self, entry: &LogEntry) -> bool {
        self.enabled && entry.severity >= self.min_severity
    }

    /// Forward the entry to every attached sink, in attach order,
    /// capturing failures instead of propagating them.
    pub(crate) fn dispatch(&self, entry: &LogEntry) -> (usize, Vec<SinkFailure>) {
        let mut delivered = 0;
        let mut failures = Vec::new();

        for (sink_name, sink) in &self.sinks {
            match lock_recovering(sink).emit(entry) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    debug!(
                        source = %self.name,
                        sink = %sink_name,
                        error = %error,
                        "sink write failed"
                    );
                    failures.push(SinkFailure {
                        source: self.name.clone(),
                        sink: sink_name.clone(),
                        error,
                    });
                }
            }
        }

        (delivered, failures)
    }

    /// Flush every attached sink, capturing failures.
    pub(crate) fn flush(&self) -> Vec<SinkFailure> {
        let mut failures = Vec::new();
        for (sink_name, sink) in &self.sinks {
            if let Err(error) = lock_recovering(sink).flush() {
                failures.push(SinkFailure {
                    source: self.name.clone(),
                    sink: sink_name.clone(),
                    error,
                });
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::MemorySink;

    #[test]
    fn test_severity_threshold() {
        let source = LogSource::new("General", Severity::Warning, true);
        assert!(!source.accepts(&LogEntry::new("m")));
        assert!(source.accepts(&LogEntry::new("m").with_severity(Severity::Warning)));
        assert!(source.accepts(&LogEntry::new("m").with_severity(Severity::Critical)));
    }

    #[test]
    fn test_disabled_source_rejects() {
        let source = LogSource::new("General", Severity::Verbose, false);
        assert!(!source.accepts(&LogEntry::new("m").with_severity(Severity::Critical)));
    }

    #[test]
    fn test_dispatch_order_is_attach_order() {
        let mut source = LogSource::new("General", Severity::Verbose, true);
        source.attach(Box::new(MemorySink::new("first")));
        source.attach(Box::new(MemorySink::new("second")));
        assert_eq!(source.sink_names(), vec!["first", "second"]);
    }

    #[test]
    fn test_detach() {
        let mut source = LogSource::new("General", Severity::Verbose, true);
        source.attach(Box::new(MemorySink::new("only")));
        assert!(source.detach("only"));
        assert!(!source.detach("only"));
        assert_eq!(source.sink_count(), 0);
    }

    #[test]
    fn test_dispatch_delivers_to_all_sinks() {
        let first = MemorySink::new("first");
        let second = MemorySink::new("second");
        let (first_view, second_view) = (first.clone(), second.clone());

        let mut source = LogSource::new("General", Severity::Verbose, true);
        source.attach(Box::new(first));
        source.attach(Box::new(second));

        let (delivered, failures) = source.dispatch(&LogEntry::new("hello"));
        assert_eq!(delivered, 2);
        assert!(failures.is_empty());
        assert_eq!(first_view.len(), 1);
        assert_eq!(second_view.len(), 1);
    }
}
