// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Non-durable sinks used once the filesystem is judged unusable.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for records while the writer is in fallback mode.
///
/// `echo` is called synchronously on the caller's path and must not fail or block for long.
pub trait FallbackSink: Send + Sync {
    fn echo(&self, prefix: &str, line: &str);
}

/// Echoes records to the process's standard output as `{prefix} {line}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl FallbackSink for StdoutSink {
    fn echo(&self, prefix: &str, line: &str) {
        // a closed stdout is not worth failing the host over
        let _ = writeln!(std::io::stdout().lock(), "{prefix} {line}");
    }
}

/// Keeps echoed records in memory; useful for hosts that surface them elsewhere and for
/// tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Echoed records, formatted as they would appear on stdout.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FallbackSink for MemorySink {
    fn echo(&self, prefix: &str, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{prefix} {line}"));
    }
}
