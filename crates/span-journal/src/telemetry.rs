// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single entry point instrumentation uses to record an event.
//!
//! [`Telemetry::emit`] is synchronous, returns nothing and cannot panic into the caller: the
//! enablement check, timestamping, serialization and the hand-off to the writer all run
//! inside one `catch_unwind` boundary, and serialization errors are discarded. No partial
//! line is ever written.

use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::ser::Error as _;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{JournalConfig, ENABLED_ENV};
use crate::writer::RotatingWriter;

/// Decides, per call, whether events are recorded.
pub trait EnablementGuard: Send + Sync {
    fn is_enabled(&self) -> bool;
}

impl<F> EnablementGuard for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_enabled(&self) -> bool {
        self()
    }
}

/// Reads an environment variable on every check so telemetry can be toggled at runtime.
///
/// Unset means enabled; `false`, `0`, `off` and `no` (any case) disable.
#[derive(Debug, Clone)]
pub struct EnvGuard {
    var: String,
}

impl EnvGuard {
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvGuard {
    fn default() -> Self {
        Self::new(ENABLED_ENV)
    }
}

impl EnablementGuard for EnvGuard {
    fn is_enabled(&self) -> bool {
        env::var(&self.var).map_or(true, |val| {
            !matches!(
                val.trim().to_lowercase().as_str(),
                "false" | "0" | "off" | "no"
            )
        })
    }
}

/// Serializes `event` with `timestamp` set to now, replacing any value the event carried.
fn stamp<E: Serialize>(event: &E) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(event)?;
    let Value::Object(fields) = &mut value else {
        return Err(serde_json::Error::custom("telemetry event is not a map"));
    };
    fields.insert(
        "timestamp".to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    serde_json::to_string(&value)
}

/// Cheap to clone; clones share the writer.
#[derive(Clone)]
pub struct Telemetry {
    writer: Option<RotatingWriter>,
    guard: Arc<dyn EnablementGuard>,
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

impl Telemetry {
    pub fn new(writer: RotatingWriter, guard: impl EnablementGuard + 'static) -> Self {
        Self {
            writer: Some(writer),
            guard: Arc::new(guard),
        }
    }

    /// Opens the writer described by `config`, gated by [`EnvGuard`].
    pub async fn from_config(config: &JournalConfig) -> Self {
        let writer = RotatingWriter::open(config.writer_config()).await;
        Self::new(writer, EnvGuard::default())
    }

    /// A facade that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            writer: None,
            guard: Arc::new(|| false),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
            && panic::catch_unwind(AssertUnwindSafe(|| self.guard.is_enabled())).unwrap_or(false)
    }

    /// Records one event with a `timestamp` stamped now.
    ///
    /// `event` must serialize as a map (any struct or tagged enum does); anything else is
    /// dropped like any other serialization failure.
    pub fn emit<E: Serialize>(&self, event: &E) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let Some(writer) = &self.writer else {
                return;
            };
            if !self.guard.is_enabled() {
                return;
            }

            match stamp(event) {
                Ok(line) => writer.write(line),
                Err(e) => debug!("Dropping telemetry event that failed to serialize: {e}"),
            }
        }));
        if outcome.is_err() {
            debug!("Dropping telemetry event after a panic while recording it");
        }
    }

    /// Waits until everything emitted so far has reached the file or the fallback sink.
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    #[must_use]
    pub fn writer(&self) -> Option<&RotatingWriter> {
        self.writer.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde::ser::Error as _;
    use serde::Serializer;
    use serde_json::{json, Value};
    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;
    use crate::writer::WriterConfig;

    async fn open(dir: &TempDir) -> RotatingWriter {
        RotatingWriter::open(WriterConfig {
            directory: dir.path().to_path_buf(),
            file_name: "telemetry.jsonl".to_string(),
            max_size: 0,
            max_backups: 1,
            fallback_prefix: "[telemetry]".to_string(),
        })
        .await
    }

    fn read_lines(writer: &RotatingWriter) -> Vec<Value> {
        std::fs::read_to_string(writer.path())
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cycle detected"))
        }
    }

    struct Exploding;

    impl Serialize for Exploding {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            panic!("serializer blew up")
        }
    }

    #[tokio::test]
    async fn emit_stamps_timestamp() {
        let dir = TempDir::new().unwrap();
        let telemetry = Telemetry::new(open(&dir).await, || true);

        telemetry.emit(&json!({ "kind": "db.query", "traceId": "abc" }));
        telemetry.flush().await;

        let lines = read_lines(telemetry.writer().unwrap());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["kind"], "db.query");
        let timestamp = lines[0]["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert!(timestamp.ends_with('Z'));
        assert_eq!(timestamp.len(), "2025-01-01T00:00:00.000Z".len());
    }

    #[tokio::test]
    async fn emit_replaces_caller_timestamp() {
        let dir = TempDir::new().unwrap();
        let telemetry = Telemetry::new(open(&dir).await, || true);

        telemetry.emit(&json!({ "kind": "db.query", "timestamp": "caller" }));
        telemetry.emit(&json!(["not", "a", "map"]));
        telemetry.flush().await;

        let raw = std::fs::read_to_string(telemetry.writer().unwrap().path()).unwrap();
        assert_eq!(raw.lines().count(), 1);
        assert_eq!(raw.matches("\"timestamp\"").count(), 1);
        let line: Value = serde_json::from_str(raw.trim_end()).unwrap();
        assert_ne!(line["timestamp"], "caller");
        assert!(chrono::DateTime::parse_from_rfc3339(line["timestamp"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn guard_is_checked_on_every_call() {
        let dir = TempDir::new().unwrap();
        let enabled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&enabled);
        let telemetry = Telemetry::new(open(&dir).await, move || flag.load(Ordering::SeqCst));

        telemetry.emit(&json!({ "kind": "job.dispatch", "n": 1 }));
        enabled.store(true, Ordering::SeqCst);
        telemetry.emit(&json!({ "kind": "job.dispatch", "n": 2 }));
        enabled.store(false, Ordering::SeqCst);
        telemetry.emit(&json!({ "kind": "job.dispatch", "n": 3 }));
        telemetry.flush().await;

        let lines = read_lines(telemetry.writer().unwrap());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["n"], 2);
    }

    #[tokio::test]
    async fn disabled_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let telemetry = Telemetry::new(open(&dir).await, || false);

        telemetry.emit(&json!({ "kind": "http.request" }));
        telemetry.flush().await;

        assert!(!telemetry.writer().unwrap().path().exists());
        assert!(!Telemetry::disabled().is_enabled());
        Telemetry::disabled().emit(&json!({ "kind": "http.request" }));
    }

    #[tokio::test]
    async fn never_panics_on_broken_events() {
        let dir = TempDir::new().unwrap();
        let telemetry = Telemetry::new(open(&dir).await, || true);

        telemetry.emit(&json!({ "kind": "db.query", "payload": 1 }));
        telemetry.emit(&Unserializable);
        telemetry.emit(&Exploding);
        telemetry.emit(&"not a map");
        telemetry.emit(&json!({ "kind": "db.query", "payload": 2 }));
        telemetry.flush().await;

        let lines = read_lines(telemetry.writer().unwrap());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["payload"], 2);
    }

    #[tokio::test]
    async fn panicking_guard_counts_as_disabled() {
        let dir = TempDir::new().unwrap();
        let telemetry = Telemetry::new(open(&dir).await, || -> bool { panic!("guard failed") });

        telemetry.emit(&json!({ "kind": "http.request" }));
        telemetry.flush().await;

        assert!(!telemetry.is_enabled());
        assert!(!telemetry.writer().unwrap().path().exists());
    }

    #[test]
    #[serial]
    fn env_guard_reads_variable_each_time() {
        let guard = EnvGuard::new("SPAN_JOURNAL_TEST_ENABLED");

        env::remove_var("SPAN_JOURNAL_TEST_ENABLED");
        assert!(guard.is_enabled());
        env::set_var("SPAN_JOURNAL_TEST_ENABLED", "FALSE");
        assert!(!guard.is_enabled());
        env::set_var("SPAN_JOURNAL_TEST_ENABLED", "0");
        assert!(!guard.is_enabled());
        env::set_var("SPAN_JOURNAL_TEST_ENABLED", "true");
        assert!(guard.is_enabled());
        env::remove_var("SPAN_JOURNAL_TEST_ENABLED");
    }
}
