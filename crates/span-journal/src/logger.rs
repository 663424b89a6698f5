// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic log format for the journal's own messages.
//!
//! These are the library's logs (probe failures, fallback transitions, rejected headers),
//! not the telemetry records, which only ever go to the JSONL file or the fallback sink.
//!
//! ```text
//! SPAN_JOURNAL | WARN | Log directory ./logs is not usable: ..., echoing telemetry to fallback sink
//! SPAN_JOURNAL | DEBUG | request{method=GET}: Rotating live file path=./logs/telemetry.jsonl
//! ```

use std::fmt;

use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::JournalConfig;
use crate::error::ConfigError;

/// Prefixes every line with `SPAN_JOURNAL | LEVEL |` and the active span chain.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "SPAN_JOURNAL | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn env_filter(log_level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(log_level)
        .map_err(|e| ConfigError::Logging(format!("could not parse log level '{log_level}': {e}")))
}

/// Installs the process-wide subscriber at the configured level.
///
/// Hosts that already install their own subscriber should skip this and add
/// [`Formatter`] to theirs if they want the prefix.
pub fn init(config: &JournalConfig) -> Result<(), ConfigError> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter(&config.log_level)?)
        .event_format(Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
