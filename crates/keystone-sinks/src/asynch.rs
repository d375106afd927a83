//! Asynchronous sink wrapper.
//!
//! Decouples write latency from the caller: entries are queued onto a
//! bounded buffer drained by a single background worker that writes
//! sequentially to the wrapped sink. The wrapped sink is only ever touched
//! under the wrapper's mutex, so no two workers can write to it
//! concurrently.

use keystone_core::{lock_recovering, LogEntry, Sink, SinkError};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What to do when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Block the caller until space frees up; `timeout` of `None` waits
    /// indefinitely
    Block { timeout: Option<Duration> },
    /// Evict the oldest queued entry to make room; evictions are counted
    /// and reported at shutdown
    DropOldest,
}

/// Construction options for [`AsyncSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncOptions {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
    /// Bound on waiting for the queue to drain during flush and shutdown;
    /// `None` waits indefinitely
    pub flush_timeout: Option<Duration>,
}

impl Default for AsyncOptions {
    fn default() -> Self {
        Self {
            capacity: 30_000,
            overflow: OverflowPolicy::Block { timeout: None },
            flush_timeout: None,
        }
    }
}

struct State {
    queue: VecDeque<LogEntry>,
    capacity: usize,
    overflow: OverflowPolicy,
    shutdown: bool,
    dropped: u64,
    in_flight: bool,
}

struct Shared {
    state: Mutex<State>,
    not_empty: Condvar,
    space_or_idle: Condvar,
    inner: Mutex<Box<dyn Sink>>,
}

/// Report produced when an [`AsyncSink`] is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// Entries evicted by the drop-oldest policy or abandoned when the
    /// drain timed out
    pub dropped: u64,
    /// Whether the queue was fully drained before the worker stopped
    pub drained: bool,
}

/// Wraps a sink behind a bounded buffer and a background worker thread.
pub struct AsyncSink {
    name: String,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    flush_timeout: Option<Duration>,
}

impl AsyncSink {
    pub fn new(name: impl Into<String>, inner: Box<dyn Sink>, options: AsyncOptions) -> Self {
        let mut sink = Self::unstarted(name, inner, options);
        sink.start_worker();
        sink
    }

    fn unstarted(name: impl Into<String>, inner: Box<dyn Sink>, options: AsyncOptions) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                capacity: options.capacity.max(1),
                overflow: options.overflow,
                shutdown: false,
                dropped: 0,
                in_flight: false,
            }),
            not_empty: Condvar::new(),
            space_or_idle: Condvar::new(),
            inner: Mutex::new(inner),
        });
        Self {
            name: name.into(),
            shared,
            worker: None,
            flush_timeout: options.flush_timeout,
        }
    }

    /// Construct without spawning the worker, so queued state can be set up
    /// deterministically before draining begins.
    #[cfg(test)]
    pub(crate) fn paused(name: impl Into<String>, inner: Box<dyn Sink>, options: AsyncOptions) -> Self {
        Self::unstarted(name, inner, options)
    }

    #[cfg(test)]
    pub(crate) fn resume(&mut self) {
        self.start_worker();
    }

    fn start_worker(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let label = self.name.clone();
        self.worker = Some(std::thread::spawn(move || worker_loop(shared, label)));
    }

    /// Wait until every queued entry has been handed to the wrapped sink.
    ///
    /// Returns false if the timeout elapsed first.
    fn wait_drained(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = lock_recovering(&self.shared.state);
        while !state.queue.is_empty() || state.in_flight {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    state = wait_timeout_recovering(
                        &self.shared.space_or_idle,
                        state,
                        deadline - now,
                    );
                }
                None => {
                    state = wait_recovering(&self.shared.space_or_idle, state);
                }
            }
        }
        true
    }

    /// Stop accepting entries, drain the buffer, and release the worker.
    ///
    /// Entries still queued once the flush timeout elapses are counted as
    /// dropped, never lost silently.
    pub fn close(&mut self) -> Result<DrainReport, SinkError> {
        {
            let mut state = lock_recovering(&self.shared.state);
            state.shutdown = true;
        }
        self.shared.not_empty.notify_all();
        self.shared.space_or_idle.notify_all();

        let drained = self.wait_drained(self.flush_timeout);
        if !drained {
            let mut state = lock_recovering(&self.shared.state);
            let abandoned = state.queue.len() as u64;
            state.dropped += abandoned;
            state.queue.clear();
            warn!(
                sink = %self.name,
                abandoned,
                "async drain timed out, abandoning queued entries"
            );
        }
        self.shared.not_empty.notify_all();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        let dropped = lock_recovering(&self.shared.state).dropped;
        lock_recovering(&self.shared.inner).flush()?;
        Ok(DrainReport { dropped, drained })
    }
}

fn worker_loop(shared: Arc<Shared>, label: String) {
    loop {
        let entry = {
            let mut state = lock_recovering(&shared.state);
            loop {
                if let Some(entry) = state.queue.pop_front() {
                    state.in_flight = true;
                    break Some(entry);
                }
                if state.shutdown {
                    break None;
                }
                state = wait_recovering(&shared.not_empty, state);
            }
        };

        let Some(entry) = entry else {
            break;
        };

        if let Err(e) = lock_recovering(&shared.inner).emit(&entry) {
            warn!(sink = %label, error = %e, "async worker failed to write entry");
        }

        let mut state = lock_recovering(&shared.state);
        state.in_flight = false;
        drop(state);
        shared.space_or_idle.notify_all();
    }
    debug!(sink = %label, "async worker stopped");
}

fn wait_recovering<'a, T>(condvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    condvar
        .wait(guard)
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn wait_timeout_recovering<'a, T>(
    condvar: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
) -> MutexGuard<'a, T> {
    condvar
        .wait_timeout(guard, timeout)
        .map(|(guard, _)| guard)
        .unwrap_or_else(|poisoned| poisoned.into_inner().0)
}

impl Sink for AsyncSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&mut self, entry: &LogEntry) -> Result<(), SinkError> {
        let mut state = lock_recovering(&self.shared.state);
        if state.shutdown {
            return Err(SinkError::ShutDown);
        }

        if state.queue.len() >= state.capacity {
            match state.overflow {
                OverflowPolicy::DropOldest => {
                    state.queue.pop_front();
                    state.dropped += 1;
                }
                OverflowPolicy::Block { timeout } => {
                    let started = Instant::now();
                    let deadline = timeout.map(|t| started + t);
                    while state.queue.len() >= state.capacity && !state.shutdown {
                        match deadline {
                            Some(deadline) => {
                                let now = Instant::now();
                                if now >= deadline {
                                    return Err(SinkError::BufferFull {
                                        waited_ms: started.elapsed().as_millis() as u64,
                                    });
                                }
                                state = wait_timeout_recovering(
                                    &self.shared.space_or_idle,
                                    state,
                                    deadline - now,
                                );
                            }
                            None => {
                                state =
                                    wait_recovering(&self.shared.space_or_idle, state);
                            }
                        }
                    }
                    if state.shutdown {
                        return Err(SinkError::ShutDown);
                    }
                }
            }
        }

        state.queue.push_back(entry.clone());
        drop(state);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if !self.wait_drained(self.flush_timeout) {
            let queued = lock_recovering(&self.shared.state).queue.len();
            return Err(SinkError::Write(format!(
                "flush timed out with {} entries queued",
                queued
            )));
        }
        lock_recovering(&self.shared.inner).flush()
    }

    fn dropped_entries(&self) -> u64 {
        lock_recovering(&self.shared.state).dropped
    }
}

impl Drop for AsyncSink {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.close() {
                warn!(sink = %self.name, error = %e, "failed to close async sink");
            }
        }
    }
}
