use crate::filters::{Filter, FilterChain};
use crate::source::{LogSource, SharedSink, SinkFailure};
use arc_swap::ArcSwap;
use keystone_core::config::{Config, OverflowPolicyConfig, SinkConfig};
use keystone_core::{lock_recovering, ConfigError, LogEntry, Severity, Sink};
use keystone_sinks::{
    AsyncOptions, AsyncSink, ConsoleSink, FlatFileSink, OverflowPolicy, RollOptions,
    RollingFlatFileSink, TextFormat,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a single `write` call.
///
/// Dispatch problems are reported here rather than raised: logging must
/// never crash the caller.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The entry was routed; the report lists deliveries and any per-sink
    /// failures
    Delivered(DispatchReport),
    /// A global filter rejected the entry before it reached any source
    Filtered,
    /// No category matched a source and no fallback is configured
    NoMatchingSource,
    /// The writer is shutting down and no longer accepts entries
    ShuttingDown,
}

impl WriteOutcome {
    /// Sinks the entry actually reached.
    pub fn delivered(&self) -> usize {
        match self {
            WriteOutcome::Delivered(report) => report.delivered,
            _ => 0,
        }
    }
}

/// Per-write delivery report.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of sinks that accepted the entry
    pub delivered: usize,
    /// Sources skipped because they were disabled or below threshold
    pub rejected_sources: Vec<String>,
    /// Categories that resolved to no source
    pub unmatched_categories: Vec<String>,
    /// Captured per-sink failures; delivery to healthy sinks proceeded
    pub sink_failures: Vec<SinkFailure>,
}

/// Report produced by `shutdown`.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub flush_failures: Vec<SinkFailure>,
    /// Entries that buffering sinks discarded over their lifetime; anything
    /// accepted but not flushed is accounted for here
    pub dropped_entries: u64,
}

#[derive(Default)]
struct Registry {
    sources: HashMap<String, LogSource>,
    /// Fallback source for entries whose categories match nothing
    unprocessed: Option<String>,
    /// Source that receives reports of sink dispatch failures
    errors: Option<String>,
}

/// The logging pipeline: named sources, a global filter chain, and
/// dispatch of entries to the sinks attached to each matching source.
pub struct LogWriter {
    registry: RwLock<Registry>,
    filters: ArcSwap<FilterChain>,
    shutting_down: AtomicBool,
}

impl Default for LogWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogWriter {
    /// Create an empty writer with no sources and no filters.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            filters: ArcSwap::from_pointee(FilterChain::default()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Build a writer, its sinks, sources, and filter chain from
    /// configuration.
    ///
    /// Sink construction is where unwritable paths surface, so a bad
    /// configuration fails here rather than during logging.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut sinks: HashMap<String, SharedSink> = HashMap::new();
        for sink_config in &config.sinks {
            let sink = build_sink(sink_config)?;
            sinks.insert(
                sink_config.name().to_string(),
                Arc::new(Mutex::new(sink)),
            );
        }

        let writer = LogWriter::new();
        {
            let mut registry = write_recovering(&writer.registry);
            for source_config in &config.sources {
                let mut source = LogSource::new(
                    &source_config.name,
                    source_config.min_severity,
                    source_config.enabled,
                );
                for sink_name in &source_config.sinks {
                    let sink = sinks
                        .get(sink_name)
                        .ok_or_else(|| ConfigError::UnknownSink(sink_name.clone()))?;
                    source.attach_shared(Arc::clone(sink));
                }
                info!(
                    source = %source_config.name,
                    sinks = ?source_config.sinks,
                    "configured log source"
                );
                registry
                    .sources
                    .insert(source_config.name.clone(), source);
            }
            registry.unprocessed = config.writer.unprocessed_source.clone();
            registry.errors = config.writer.error_source.clone();
        }

        writer
            .filters
            .store(Arc::new(FilterChain::from_config(&config.filters)));

        Ok(writer)
    }

    /// Register a new source. Fails if the name is taken.
    pub fn add_source(
        &self,
        name: impl Into<String>,
        min_severity: Severity,
        enabled: bool,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        let mut registry = write_recovering(&self.registry);
        if registry.sources.contains_key(&name) {
            return Err(ConfigError::DuplicateSource(name));
        }
        registry
            .sources
            .insert(name.clone(), LogSource::new(name, min_severity, enabled));
        Ok(())
    }

    /// Attach a sink to a source; attach order is dispatch order.
    pub fn attach_sink(
        &self,
        source_name: &str,
        sink: Box<dyn Sink>,
    ) -> Result<(), ConfigError> {
        let mut registry = write_recovering(&self.registry);
        let source = registry
            .sources
            .get_mut(source_name)
            .ok_or_else(|| ConfigError::UnknownSource(source_name.to_string()))?;
        source.attach(sink);
        Ok(())
    }

    /// Attach a sink instance shared with other sources.
    pub fn attach_shared_sink(
        &self,
        source_name: &str,
        sink: SharedSink,
    ) -> Result<(), ConfigError> {
        let mut registry = write_recovering(&self.registry);
        let source = registry
            .sources
            .get_mut(source_name)
            .ok_or_else(|| ConfigError::UnknownSource(source_name.to_string()))?;
        source.attach_shared(sink);
        Ok(())
    }

    /// Remove a sink from a source by name.
    pub fn detach_sink(&self, source_name: &str, sink_name: &str) -> Result<bool, ConfigError> {
        let mut registry = write_recovering(&self.registry);
        let source = registry
            .sources
            .get_mut(source_name)
            .ok_or_else(|| ConfigError::UnknownSource(source_name.to_string()))?;
        Ok(source.detach(sink_name))
    }

    pub fn set_source_enabled(&self, source_name: &str, enabled: bool) -> Result<(), ConfigError> {
        let mut registry = write_recovering(&self.registry);
        let source = registry
            .sources
            .get_mut(source_name)
            .ok_or_else(|| ConfigError::UnknownSource(source_name.to_string()))?;
        source.set_enabled(enabled);
        Ok(())
    }

    pub fn set_source_min_severity(
        &self,
        source_name: &str,
        min_severity: Severity,
    ) -> Result<(), ConfigError> {
        let mut registry = write_recovering(&self.registry);
        let source = registry
            .sources
            .get_mut(source_name)
            .ok_or_else(|| ConfigError::UnknownSource(source_name.to_string()))?;
        source.set_min_severity(min_severity);
        Ok(())
    }

    /// Designate the fallback source for entries matching no category.
    pub fn set_unprocessed_source(&self, source_name: &str) -> Result<(), ConfigError> {
        let mut registry = write_recovering(&self.registry);
        if !registry.sources.contains_key(source_name) {
            return Err(ConfigError::UnknownSource(source_name.to_string()));
        }
        registry.unprocessed = Some(source_name.to_string());
        Ok(())
    }

    /// Designate the source that receives sink-failure reports.
    pub fn set_error_source(&self, source_name: &str) -> Result<(), ConfigError> {
        let mut registry = write_recovering(&self.registry);
        if !registry.sources.contains_key(source_name) {
            return Err(ConfigError::UnknownSource(source_name.to_string()));
        }
        registry.errors = Some(source_name.to_string());
        Ok(())
    }

    /// Append a filter to the global chain.
    pub fn add_filter(&self, filter: Filter) {
        self.filters.rcu(|chain| {
            let mut filters = chain.filters().to_vec();
            filters.push(filter.clone());
            Arc::new(FilterChain::new(filters))
        });
    }

    /// Atomically replace the global filter chain.
    ///
    /// In-flight writes observe either the old or the new chain in full,
    /// never a partial mix.
    pub fn reconfigure_filters(&self, filters: Vec<Filter>) {
        self.filters.store(Arc::new(FilterChain::new(filters)));
        debug!("replaced global filter chain");
    }

    /// Snapshot of the current filter chain.
    pub fn current_filters(&self) -> Arc<FilterChain> {
        self.filters.load_full()
    }

    /// Fast-path check: is any logging possible at all?
    pub fn is_logging_enabled(&self) -> bool {
        if self.shutting_down.load(Ordering::SeqCst) {
            return false;
        }
        if !self.filters.load().logging_enabled() {
            return false;
        }
        let registry = read_recovering(&self.registry);
        registry.sources.values().any(|source| source.is_enabled())
    }

    /// Would this entry reach at least one sink, without dispatching it?
    pub fn should_log(&self, entry: &LogEntry) -> bool {
        if self.shutting_down.load(Ordering::SeqCst) {
            return false;
        }
        if !self.filters.load().accepts(entry) {
            return false;
        }
        let registry = read_recovering(&self.registry);
        resolve(&registry, entry)
            .0
            .iter()
            .any(|name| {
                registry
                    .sources
                    .get(name)
                    .is_some_and(|source| source.accepts(entry) && source.sink_count() > 0)
            })
    }

    /// Names of the sources the entry would route to, in category order.
    pub fn matching_sources(&self, entry: &LogEntry) -> Vec<String> {
        let registry = read_recovering(&self.registry);
        resolve(&registry, entry).0
    }

    /// Route an entry to the sinks of every source matching its
    /// categories.
    pub fn write(&self, entry: &LogEntry) -> WriteOutcome {
        if self.shutting_down.load(Ordering::SeqCst) {
            return WriteOutcome::ShuttingDown;
        }

        let chain = self.filters.load();
        if !chain.accepts(entry) {
            debug!(message = %entry.message, "entry rejected by filter chain");
            return WriteOutcome::Filtered;
        }

        let registry = read_recovering(&self.registry);
        let (matched, unmatched) = resolve(&registry, entry);
        if matched.is_empty() {
            return WriteOutcome::NoMatchingSource;
        }

        let mut report = DispatchReport {
            unmatched_categories: unmatched,
            ..DispatchReport::default()
        };

        for name in &matched {
            let Some(source) = registry.sources.get(name) else {
                continue;
            };
            if !source.accepts(entry) {
                report.rejected_sources.push(source.name().to_string());
                continue;
            }
            let (delivered, failures) = source.dispatch(entry);
            report.delivered += delivered;
            report.sink_failures.extend(failures);
        }

        if !report.sink_failures.is_empty() {
            report_failures(&registry, &report.sink_failures);
        }

        WriteOutcome::Delivered(report)
    }

    /// Flush every attached sink, capturing failures.
    pub fn flush_all(&self) -> Vec<SinkFailure> {
        let registry = read_recovering(&self.registry);
        let mut failures = Vec::new();
        for source in registry.sources.values() {
            failures.extend(source.flush());
        }
        failures
    }

    /// Stop accepting writes, flush everything, and account for every
    /// entry buffering sinks discarded.
    pub fn shutdown(&self) -> ShutdownReport {
        self.shutting_down.store(true, Ordering::SeqCst);
        info!("log writer shutting down");

        let registry = read_recovering(&self.registry);
        let mut report = ShutdownReport::default();
        let mut seen = HashSet::new();

        for source in registry.sources.values() {
            for shared in source.shared_sinks() {
                // Shared sinks are flushed and counted once
                if !seen.insert(Arc::as_ptr(shared) as usize) {
                    continue;
                }
                let mut sink = lock_recovering(shared);
                let sink_name = sink.name().to_string();
                if let Err(error) = sink.flush() {
                    report.flush_failures.push(SinkFailure {
                        source: source.name().to_string(),
                        sink: sink_name,
                        error,
                    });
                }
                report.dropped_entries += sink.dropped_entries();
            }
        }

        report
    }
}

/// Resolve the source names an entry routes to, in category order with
/// duplicates collapsed, falling back to the unprocessed source when
/// nothing matches.
fn resolve(registry: &Registry, entry: &LogEntry) -> (Vec<String>, Vec<String>) {
    let mut matched: Vec<String> = Vec::new();
    let mut unmatched = Vec::new();

    for category in &entry.categories {
        if registry.sources.contains_key(category) {
            if !matched.iter().any(|name| name == category) {
                matched.push(category.clone());
            }
        } else {
            unmatched.push(category.clone());
        }
    }

    if matched.is_empty() {
        if let Some(fallback) = registry
            .unprocessed
            .as_ref()
            .filter(|name| registry.sources.contains_key(*name))
        {
            matched.push(fallback.clone());
        }
    }

    (matched, unmatched)
}

/// Report sink failures to the designated error source, guarding against
/// reporting the error source's own failures to itself.
fn report_failures(registry: &Registry, failures: &[SinkFailure]) {
    let Some(error_source_name) = registry.errors.as_ref() else {
        return;
    };
    let Some(error_source) = registry.sources.get(error_source_name) else {
        return;
    };

    for failure in failures {
        if &failure.source == error_source_name {
            continue;
        }
        let notice = LogEntry::new(format!(
            "failed to deliver entry to sink '{}' on source '{}': {}",
            failure.sink, failure.source, failure.error
        ))
        .with_category(error_source_name.clone())
        .with_severity(Severity::Error);

        let (_, nested) = error_source.dispatch(&notice);
        for nested_failure in nested {
            warn!(
                sink = %nested_failure.sink,
                error = %nested_failure.error,
                "error source sink failed"
            );
        }
    }
}

/// Construct a sink from its configuration, failing fast on bad paths.
fn build_sink(config: &SinkConfig) -> Result<Box<dyn Sink>, ConfigError> {
    match config {
        SinkConfig::Console {
            name,
            format,
            use_stderr,
        } => Ok(Box::new(ConsoleSink::from_format_spec(
            name,
            format,
            *use_stderr,
        ))),
        SinkConfig::FlatFile {
            name,
            path,
            format,
            header,
            footer,
        } => Ok(Box::new(
            FlatFileSink::new(name, path, TextFormat::from_spec(format))?
                .with_header(header.clone())
                .with_footer(footer.clone()),
        )),
        SinkConfig::RollingFlatFile {
            name,
            path,
            format,
            header,
            footer,
            roll_size_kb,
            roll_interval,
            max_archives,
            compress,
        } => Ok(Box::new(
            RollingFlatFileSink::new(
                name,
                path,
                TextFormat::from_spec(format),
                RollOptions {
                    roll_size_kb: *roll_size_kb,
                    interval: *roll_interval,
                    max_archives: *max_archives,
                    compress: *compress,
                },
            )?
            .with_header(header.clone())
            .with_footer(footer.clone()),
        )),
        SinkConfig::Async {
            name,
            wraps,
            buffer_capacity,
            overflow,
            block_timeout_ms,
            flush_timeout_ms,
        } => {
            let inner = build_sink(wraps)?;
            let overflow = match overflow {
                OverflowPolicyConfig::Block => OverflowPolicy::Block {
                    timeout: block_timeout_ms.map(Duration::from_millis),
                },
                OverflowPolicyConfig::DropOldest => OverflowPolicy::DropOldest,
            };
            Ok(Box::new(AsyncSink::new(
                name,
                inner,
                AsyncOptions {
                    capacity: *buffer_capacity,
                    overflow,
                    flush_timeout: flush_timeout_ms.map(Duration::from_millis),
                },
            )))
        }
    }
}

fn read_recovering<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_recovering<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
