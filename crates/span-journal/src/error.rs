// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::path::PathBuf;

/// Errors raised while loading configuration or installing the diagnostic logger.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to install log subscriber: {0}")]
    Logging(String),
}

/// Filesystem failures inside the rotating writer.
///
/// These never escape [`crate::writer::RotatingWriter::write`]; the first one latches the
/// writer into fallback mode and is logged.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("Failed to create log directory {path}: {source}")]
    CreateDirectory { path: PathBuf, source: io::Error },

    #[error("Log directory {path} is not usable: {reason}")]
    Unusable { path: PathBuf, reason: String },

    #[error("Failed to rotate {path}: {source}")]
    Rotate { path: PathBuf, source: io::Error },

    #[error("Failed to append to {path}: {source}")]
    Append { path: PathBuf, source: io::Error },

    #[error("No async runtime available to flush {path}")]
    NoRuntime { path: PathBuf },

    #[error("Flush of {path} was cancelled before the queue drained")]
    FlushCancelled { path: PathBuf },
}
