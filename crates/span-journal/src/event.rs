// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telemetry event model.
//!
//! One record is written per unit of work. Every record carries its `kind` discriminant and
//! the `traceId`; span shapes also carry `spanId` / `parentSpanId`, which is enough to
//! rebuild the span tree downstream with nothing more than a filter over the JSONL file.
//!
//! ```json
//! {"kind":"http.request","traceId":"4bf9…","spanId":"a1b2…","parentSpanId":"00f0…",
//!  "method":"GET","path":"/users/…","status":200,"durationMs":12.5,
//!  "timestamp":"2025-01-01T00:00:00.000Z"}
//! ```
//!
//! The `timestamp` field is not part of these types: [`crate::telemetry::Telemetry::emit`]
//! stamps it when the record is written.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use trace_context::{SpanContext, SpanId, TraceId};

use crate::entities::Entities;

/// Outcome of an instrumented operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Closed set of record shapes, discriminated by `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TelemetryEvent {
    #[serde(rename = "http.request")]
    Request(RequestEvent),
    #[serde(rename = "http.outbound")]
    Outbound(OutboundEvent),
    #[serde(rename = "db.query")]
    Query(QueryEvent),
    #[serde(rename = "job.start")]
    JobStart(JobStartEvent),
    #[serde(rename = "job.end")]
    JobEnd(JobEndEvent),
    #[serde(rename = "job.dispatch")]
    JobDispatch(JobDispatchEvent),
}

impl TelemetryEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryEvent::Request(_) => "http.request",
            TelemetryEvent::Outbound(_) => "http.outbound",
            TelemetryEvent::Query(_) => "db.query",
            TelemetryEvent::JobStart(_) => "job.start",
            TelemetryEvent::JobEnd(_) => "job.end",
            TelemetryEvent::JobDispatch(_) => "job.dispatch",
        }
    }

    #[must_use]
    pub fn trace_id(&self) -> TraceId {
        match self {
            TelemetryEvent::Request(e) => e.trace_id,
            TelemetryEvent::Outbound(e) => e.trace_id,
            TelemetryEvent::Query(e) => e.trace_id,
            TelemetryEvent::JobStart(e) => e.trace_id,
            TelemetryEvent::JobEnd(e) => e.trace_id,
            TelemetryEvent::JobDispatch(e) => e.trace_id,
        }
    }
}

/// An inbound request handled by this process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    pub trace_id: TraceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<SpanId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One physical attempt of an outbound HTTP call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEvent {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    /// Destination host (with port when explicit).
    pub target_service: String,
    /// `METHOD /path`.
    pub operation: String,
    pub duration_ms: f64,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEvent {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub provider: String,
    pub model: String,
    pub operation: String,
    pub duration_ms: f64,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartEvent {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub function_id: String,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEndEvent {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub function_id: String,
    pub run_id: String,
    pub duration_ms: f64,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A background job handed to a queue by the current unit of work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDispatchEvent {
    pub trace_id: TraceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<SpanId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
}

/// Milliseconds with sub-millisecond precision, as written in `durationMs`.
#[must_use]
pub fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Span linkage fields shared by the shapes above.
pub(crate) fn linkage(span: &SpanContext) -> (TraceId, SpanId, Option<SpanId>) {
    (span.trace_id, span.span_id, span.parent_span_id)
}
