// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Durable, size-rotated JSONL writer that never fails its caller.
//!
//! # Modes
//!
//! ```text
//!            probe ok                          any I/O error (once)
//! open() ──────────────> filesystem mode ─────────────────────────> fallback mode
//!    │                                                                   ▲
//!    └───────────────────────── probe failed ────────────────────────────┘
//! ```
//!
//! In filesystem mode [`RotatingWriter::write`] only enqueues the line and, if no flush is
//! already scheduled or running, spawns one flush task. Many writes in the same tick share
//! one pass. The pass drains the FIFO queue in batches, rotating before a batch that would
//! push the live file past `max_size`, and keeps going until the queue is empty.
//!
//! Fallback mode is a one-way latch: the failed batch and everything still queued are
//! echoed through the [`FallbackSink`], and every later write is echoed synchronously.
//! The filesystem is never retried for the lifetime of the writer.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::error::WriterError;

pub mod rotation;
pub mod sink;

pub use rotation::backup_path;
pub use sink::{FallbackSink, MemorySink, StdoutSink};

/// Upper bound on lines appended per batch, so rotation is re-evaluated regularly while a
/// large backlog drains.
const MAX_BATCH_LINES: usize = 512;

const PROBE_CONTENT: &[u8] = b"probe";

/// Distinguishes probe files of writers opened concurrently in one process.
static PROBE_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    pub directory: PathBuf,
    pub file_name: String,
    /// Rotation threshold in bytes. `0` disables rotation.
    pub max_size: u64,
    /// Number of `.N` backups kept. `0` deletes the live file on rotation.
    pub max_backups: u32,
    /// Tag prepended to each line echoed in fallback mode.
    pub fallback_prefix: String,
}

impl WriterConfig {
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

#[derive(Debug, Default)]
struct WriterState {
    queue: VecDeque<String>,
    /// Size of the live file as last observed; `None` forces a stat.
    current_size: Option<u64>,
    scheduled: bool,
    in_progress: bool,
    fallback_active: bool,
}

struct Shared {
    path: PathBuf,
    max_size: u64,
    max_backups: u32,
    prefix: String,
    sink: Arc<dyn FallbackSink>,
    state: Mutex<WriterState>,
    idle: Notify,
    runtime: Option<Handle>,
}

/// Handle to a rotating writer. Clones share the same queue and file.
#[derive(Clone)]
pub struct RotatingWriter {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RotatingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingWriter")
            .field("path", &self.shared.path)
            .field("fallback_active", &self.is_fallback_active())
            .finish_non_exhaustive()
    }
}

impl RotatingWriter {
    /// Opens a writer that falls back to standard output.
    ///
    /// # Arguments
    ///
    /// * `config` - Target directory, file name, rotation limits and fallback prefix.
    ///
    /// # Returns
    ///
    /// A writer bound to the current tokio runtime. Opening never fails: an unusable
    /// directory yields a writer that is already in fallback mode.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use span_journal::{RotatingWriter, WriterConfig};
    ///
    /// # async fn run() {
    /// let writer = RotatingWriter::open(WriterConfig {
    ///     directory: "./logs".into(),
    ///     file_name: "requests.jsonl".to_string(),
    ///     max_size: 10 * 1024 * 1024,
    ///     max_backups: 5,
    ///     fallback_prefix: "[telemetry]".to_string(),
    /// })
    /// .await;
    /// writer.write(r#"{"kind":"http.request"}"#);
    /// writer.flush().await;
    /// # }
    /// ```
    pub async fn open(config: WriterConfig) -> Self {
        Self::with_sink(config, Arc::new(StdoutSink)).await
    }

    /// Opens a writer with a custom fallback sink.
    ///
    /// The target directory is created and probed once. If that fails, the writer starts
    /// directly in fallback mode.
    ///
    /// # Arguments
    ///
    /// * `config` - Where and how to write.
    /// * `sink` - Receives every line once the writer is in fallback mode.
    ///
    /// # Returns
    ///
    /// The writer. Without a tokio runtime there is nothing to flush on, so the writer
    /// starts in fallback mode.
    pub async fn with_sink(config: WriterConfig, sink: Arc<dyn FallbackSink>) -> Self {
        let path = config.path();
        let runtime = Handle::try_current().ok();

        let probe = match runtime {
            Some(_) => probe(&config.directory, &config.file_name).await,
            None => Err(WriterError::NoRuntime { path: path.clone() }),
        };
        let fallback_active = match probe {
            Ok(()) => {
                debug!(path = %path.display(), "Telemetry writer ready");
                false
            }
            Err(e) => {
                warn!("{e}, echoing telemetry to fallback sink");
                true
            }
        };

        Self {
            shared: Arc::new(Shared {
                path,
                max_size: config.max_size,
                max_backups: config.max_backups,
                prefix: config.fallback_prefix,
                sink,
                state: Mutex::new(WriterState {
                    fallback_active,
                    ..WriterState::default()
                }),
                idle: Notify::new(),
                runtime,
            }),
        }
    }

    /// Queues one record. Never blocks on I/O and never fails.
    ///
    /// A trailing newline is stripped; the writer terminates every record itself.
    ///
    /// # Arguments
    ///
    /// * `line` - One serialized record, without framing.
    ///
    /// In fallback mode the line is echoed to the sink before this returns. Otherwise it is
    /// queued and a flush task is spawned unless one is already pending. If that task is
    /// dropped before it drains the queue (for example because the runtime shut down), the
    /// writer latches into fallback mode and echoes whatever was left.
    pub fn write(&self, line: impl Into<String>) {
        let mut line = line.into();
        if line.ends_with('\n') {
            line.truncate(line.trim_end_matches('\n').len());
        }

        let mut state = self.shared.state();
        if state.fallback_active {
            self.shared.sink.echo(&self.shared.prefix, &line);
            return;
        }

        state.queue.push_back(line);
        if state.scheduled || state.in_progress {
            return;
        }
        state.scheduled = true;
        drop(state);

        let task = FlushTask::new(Arc::clone(&self.shared));
        match &self.shared.runtime {
            Some(runtime) => {
                runtime.spawn(task.run());
            }
            None => drop(task),
        }
    }

    /// Waits until every queued record has been appended or echoed.
    ///
    /// # Returns
    ///
    /// Once the queue is empty and no flush task is pending. Records written concurrently
    /// with the wait are included.
    pub async fn flush(&self) {
        loop {
            let mut idle = pin!(self.shared.idle.notified());
            idle.as_mut().enable();
            {
                let state = self.shared.state();
                if state.queue.is_empty() && !state.scheduled && !state.in_progress {
                    return;
                }
            }
            idle.await;
        }
    }

    #[must_use]
    pub fn is_fallback_active(&self) -> bool {
        self.shared.state().fallback_active
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }
}

/// Creates the directory and proves a file can really be written, read back and removed.
async fn probe(directory: &Path, file_name: &str) -> Result<(), WriterError> {
    fs::create_dir_all(directory)
        .await
        .map_err(|source| WriterError::CreateDirectory {
            path: directory.to_path_buf(),
            source,
        })?;

    let unusable = |reason: String| WriterError::Unusable {
        path: directory.to_path_buf(),
        reason,
    };

    let probe_path = directory.join(format!(
        ".{file_name}.probe-{}-{}",
        std::process::id(),
        PROBE_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&probe_path, PROBE_CONTENT)
        .await
        .map_err(|e| unusable(format!("probe write failed: {e}")))?;
    let written = fs::read(&probe_path)
        .await
        .map_err(|e| unusable(format!("probe read failed: {e}")))?;
    fs::remove_file(&probe_path)
        .await
        .map_err(|e| unusable(format!("probe cleanup failed: {e}")))?;

    if written != PROBE_CONTENT {
        return Err(unusable("probe content did not persist".to_string()));
    }
    Ok(())
}

/// The single flush worker for a writer.
///
/// Owns the batch being appended. If the task is dropped before it finishes its pass, the
/// writer latches into fallback and the in-flight batch plus the queue are echoed.
struct FlushTask {
    shared: Arc<Shared>,
    in_flight: Vec<String>,
    finished: bool,
}

impl FlushTask {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            in_flight: Vec::new(),
            finished: false,
        }
    }

    /// Runs until the queue is empty or fallback is latched.
    async fn run(mut self) {
        loop {
            let cached_size = {
                let mut state = self.shared.state();
                state.scheduled = false;
                if state.fallback_active || state.queue.is_empty() {
                    state.in_progress = false;
                    self.finished = true;
                    drop(state);
                    self.shared.idle.notify_waiters();
                    return;
                }
                state.in_progress = true;
                let take = state.queue.len().min(MAX_BATCH_LINES);
                self.in_flight = state.queue.drain(..take).collect();
                state.current_size
            };

            match self.shared.append_batch(&self.in_flight, cached_size).await {
                Ok(size) => self.shared.state().current_size = Some(size),
                Err(e) => self.shared.enter_fallback(&self.in_flight, &e),
            }
            self.in_flight.clear();
        }
    }
}

impl Drop for FlushTask {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let cause = WriterError::FlushCancelled {
            path: self.shared.path.clone(),
        };
        self.shared.enter_fallback(&self.in_flight, &cause);
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one batch, rotating first when it would overflow `max_size`.
    /// Returns the new size of the live file.
    async fn append_batch(
        &self,
        batch: &[String],
        cached_size: Option<u64>,
    ) -> Result<u64, WriterError> {
        let mut payload = String::with_capacity(batch.iter().map(|l| l.len() + 1).sum());
        for line in batch {
            payload.push_str(line);
            payload.push('\n');
        }
        let incoming = payload.len() as u64;

        let mut current = match cached_size {
            Some(size) => size,
            None => self.live_size().await?,
        };

        if self.max_size > 0 && current > 0 && current + incoming > self.max_size {
            rotation::rotate(&self.path, self.max_backups)
                .await
                .map_err(|source| WriterError::Rotate {
                    path: self.path.clone(),
                    source,
                })?;
            current = 0;
        }

        let append_error = |source| WriterError::Append {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(append_error)?;
        file.write_all(payload.as_bytes())
            .await
            .map_err(append_error)?;
        file.flush().await.map_err(append_error)?;

        Ok(current + incoming)
    }

    async fn live_size(&self) -> Result<u64, WriterError> {
        match fs::metadata(&self.path).await {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(WriterError::Unusable {
                path: self.path.clone(),
                reason: "not a regular file".to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(source) => Err(WriterError::Append {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Latches fallback mode and echoes the failed batch plus anything still queued.
    fn enter_fallback(&self, failed: &[String], cause: &WriterError) {
        error!("{cause}, switching telemetry to fallback sink");
        {
            let mut state = self.state();
            state.fallback_active = true;
            state.current_size = None;
            state.scheduled = false;
            state.in_progress = false;
            // echo under the lock so concurrent fallback writes stay behind the backlog
            for line in failed.iter().chain(state.queue.iter()) {
                self.sink.echo(&self.prefix, line);
            }
            state.queue.clear();
        }
        self.idle.notify_waiters();
    }
}
