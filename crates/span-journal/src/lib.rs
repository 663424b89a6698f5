// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Span Journal
//!
//! Per-process telemetry for traced units of work, persisted as one JSON record per line.
//!
//! ## Overview
//!
//! - [`instrument`]: request, outbound call, query and job spans for boundary adapters
//! - [`telemetry`]: the non-blocking, non-panicking `emit` facade
//! - [`writer`]: size-rotated JSONL writer with a one-way fallback to stdout
//! - [`event`]: the closed set of record shapes
//! - [`entities`]: identifier extraction from paths and payloads
//! - [`config`] / [`logger`]: environment configuration and diagnostic log format
//!
//! Records from different processes are correlated downstream by `traceId`; nothing here
//! aggregates across processes.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]
#![deny(unused_extern_crates)]

pub mod config;
pub mod entities;
pub mod error;
pub mod event;
pub mod instrument;
pub mod logger;
pub mod telemetry;
pub mod writer;

pub use config::JournalConfig;
pub use error::{ConfigError, WriterError};
pub use event::{Status, TelemetryEvent};
pub use telemetry::{EnablementGuard, EnvGuard, Telemetry};
pub use writer::{RotatingWriter, WriterConfig};
