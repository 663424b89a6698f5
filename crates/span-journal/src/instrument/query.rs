// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use trace_context::SpanContext;

use super::{child_span, EmitOnce, ABORTED};
use crate::event::{duration_ms, QueryEvent, Status, TelemetryEvent};
use crate::telemetry::Telemetry;

/// Span for one database operation, recorded as a single `db.query` event.
#[derive(Debug)]
pub struct QuerySpan {
    telemetry: Telemetry,
    context: SpanContext,
    provider: String,
    model: String,
    operation: String,
    started: Instant,
    done: EmitOnce,
}

impl QuerySpan {
    /// `provider` is the database system (`postgresql`), `model` the table or model and
    /// `operation` the action (`findMany`, `SELECT`).
    pub fn start(
        telemetry: &Telemetry,
        parent: Option<&SpanContext>,
        provider: impl Into<String>,
        model: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            telemetry: telemetry.clone(),
            context: child_span(parent),
            provider: provider.into(),
            model: model.into(),
            operation: operation.into(),
            started: Instant::now(),
            done: EmitOnce::default(),
        }
    }

    #[must_use]
    pub fn context(&self) -> SpanContext {
        self.context
    }

    pub fn finish(&self) -> bool {
        self.record(Status::Success, None)
    }

    pub fn fail(&self, error: impl Display) -> bool {
        self.record(Status::Error, Some(error.to_string()))
    }

    fn record(&self, status: Status, error: Option<String>) -> bool {
        if !self.done.claim() {
            return false;
        }
        self.telemetry.emit(&TelemetryEvent::Query(QueryEvent {
            trace_id: self.context.trace_id,
            span_id: self.context.span_id,
            parent_span_id: self.context.parent_span_id,
            provider: self.provider.clone(),
            model: self.model.clone(),
            operation: self.operation.clone(),
            duration_ms: duration_ms(self.started.elapsed()),
            status,
            error,
        }));
        true
    }
}

impl Drop for QuerySpan {
    fn drop(&mut self) {
        self.record(Status::Error, Some(ABORTED.to_string()));
    }
}

/// Runs `query` as a child of the task's current context and records it.
/// The query's error is returned unchanged.
pub async fn instrument_query<F, T, E>(
    telemetry: &Telemetry,
    provider: &str,
    model: &str,
    operation: &str,
    query: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let span = QuerySpan::start(telemetry, None, provider, model, operation);
    let result = query.await;
    match &result {
        Ok(_) => span.finish(),
        Err(e) => span.fail(e),
    };
    result
}
