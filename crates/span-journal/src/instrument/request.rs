// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use trace_context::{start_span_from_header, SpanContext, TRACEPARENT_KEY};

use super::{in_span, EmitOnce, ABORTED};
use crate::entities::{extract_from_path, Entities, EntityPattern};
use crate::event::{duration_ms, RequestEvent, TelemetryEvent};
use crate::telemetry::Telemetry;

/// Status recorded for a request dropped before it completed (client went away).
pub const ABORTED_STATUS: u16 = 499;

/// What an HTTP adapter must expose about an inbound request.
pub trait InboundRequest {
    fn method(&self) -> &str;
    fn path(&self) -> &str;
    /// Header lookup; implementations are expected to be case-insensitive.
    fn header(&self, name: &str) -> Option<&str>;
}

/// Span for one inbound request, from arrival to its single `http.request` event.
///
/// Completion may be signalled from several places (response finished, connection closed);
/// only the first signal is recorded.
#[derive(Debug)]
pub struct RequestSpan {
    telemetry: Telemetry,
    context: SpanContext,
    method: String,
    path: String,
    entities: Option<Entities>,
    started: Instant,
    done: EmitOnce,
}

impl RequestSpan {
    /// Continues the trace from the request's `traceparent` header, or starts a new one.
    pub fn start(
        telemetry: &Telemetry,
        request: &impl InboundRequest,
        patterns: &[EntityPattern],
    ) -> Self {
        let path = request.path().to_string();
        Self {
            telemetry: telemetry.clone(),
            context: start_span_from_header(request.header(TRACEPARENT_KEY)),
            method: request.method().to_string(),
            entities: extract_from_path(&path, patterns),
            path,
            started: Instant::now(),
            done: EmitOnce::default(),
        }
    }

    #[must_use]
    pub fn context(&self) -> SpanContext {
        self.context
    }

    /// Value for the `traceparent` response header.
    #[must_use]
    pub fn response_traceparent(&self) -> String {
        self.context.traceparent()
    }

    /// Merges extra entities (for example from a parsed body) into the event.
    #[must_use]
    pub fn with_entities(mut self, extra: Option<Entities>) -> Self {
        if let Some(extra) = extra {
            self.entities.get_or_insert_with(Entities::new).extend(extra);
        }
        self
    }

    /// Runs the handler with this span as the task's current context.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        in_span(self.context, fut).await
    }

    /// Records a completed response. Returns `false` if the request was already recorded.
    pub fn finish(&self, status: u16) -> bool {
        self.record(status, None)
    }

    /// Records a failed request with an error label.
    pub fn fail(&self, status: u16, error: impl Display) -> bool {
        self.record(status, Some(error.to_string()))
    }

    fn record(&self, status: u16, error: Option<String>) -> bool {
        if !self.done.claim() {
            return false;
        }
        self.telemetry.emit(&TelemetryEvent::Request(RequestEvent {
            trace_id: self.context.trace_id,
            span_id: Some(self.context.span_id),
            parent_span_id: self.context.parent_span_id,
            method: self.method.clone(),
            path: self.path.clone(),
            status,
            duration_ms: duration_ms(self.started.elapsed()),
            entities: self.entities.clone(),
            error,
        }));
        true
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        self.record(ABORTED_STATUS, Some(ABORTED.to_string()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;
    use crate::instrument::current_span;
    use crate::writer::{RotatingWriter, WriterConfig};

    const HEADER: &str = "00-4bf92f3577b86cd56163f2543210c4a0-00f067aa0ba902b7-01";
    const USER: &str = "3f2b8c1e-9d4a-4b6f-8e2a-1c5d7f9b0a3e";

    struct MockRequest {
        method: &'static str,
        path: String,
        headers: HashMap<String, String>,
    }

    impl InboundRequest for MockRequest {
        fn method(&self) -> &str {
            self.method
        }

        fn path(&self) -> &str {
            &self.path
        }

        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }
    }

    fn request(path: &str, traceparent: Option<&str>) -> MockRequest {
        MockRequest {
            method: "GET",
            path: path.to_string(),
            headers: traceparent
                .map(|value| HashMap::from([("Traceparent".to_string(), value.to_string())]))
                .unwrap_or_default(),
        }
    }

    async fn telemetry(dir: &TempDir) -> Telemetry {
        let writer = RotatingWriter::open(WriterConfig {
            directory: dir.path().to_path_buf(),
            file_name: "telemetry.jsonl".to_string(),
            max_size: 0,
            max_backups: 1,
            fallback_prefix: "[telemetry]".to_string(),
        })
        .await;
        Telemetry::new(writer, || true)
    }

    async fn events(telemetry: &Telemetry) -> Vec<Value> {
        telemetry.flush().await;
        std::fs::read_to_string(telemetry.writer().unwrap().path())
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn continues_inbound_trace() {
        let dir = TempDir::new().unwrap();
        let telemetry = telemetry(&dir).await;

        let span = RequestSpan::start(&telemetry, &request("/api/health", Some(HEADER)), &[]);
        let context = span.context();
        assert_eq!(context.trace_id.to_string(), "4bf92f3577b86cd56163f2543210c4a0");
        assert_eq!(context.parent_span_id.unwrap().to_string(), "00f067aa0ba902b7");
        assert_eq!(
            span.response_traceparent(),
            format!("00-4bf92f3577b86cd56163f2543210c4a0-{}-01", context.span_id)
        );

        assert!(span.finish(200));
        drop(span);

        let events = events(&telemetry).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["kind"], "http.request");
        assert_eq!(events[0]["status"], 200);
        assert_eq!(events[0]["parentSpanId"], "00f067aa0ba902b7");
        assert!(events[0].get("error").is_none());
    }

    #[tokio::test]
    async fn only_first_completion_is_recorded() {
        let dir = TempDir::new().unwrap();
        let telemetry = telemetry(&dir).await;

        let span = RequestSpan::start(&telemetry, &request("/", None), &[]);
        assert!(span.fail(500, "handler failed"));
        assert!(!span.finish(200));
        drop(span);

        let events = events(&telemetry).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["status"], 500);
        assert_eq!(events[0]["error"], "handler failed");
        assert!(events[0].get("parentSpanId").is_none());
    }

    #[tokio::test]
    async fn dropped_request_is_recorded_as_aborted() {
        let dir = TempDir::new().unwrap();
        let telemetry = telemetry(&dir).await;

        drop(RequestSpan::start(&telemetry, &request("/slow", Some("garbage")), &[]));

        let events = events(&telemetry).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["status"], ABORTED_STATUS);
        assert_eq!(events[0]["error"], ABORTED);
    }

    #[tokio::test]
    async fn entities_from_path_and_extra_fields() {
        let dir = TempDir::new().unwrap();
        let telemetry = telemetry(&dir).await;
        let patterns = [EntityPattern::new("users", "userId")];

        let inbound = request(&format!("/users/{USER}"), None);
        let extra = Entities::from([("tenantId".to_string(), "acme".to_string())]);
        let span = RequestSpan::start(&telemetry, &inbound, &patterns).with_entities(Some(extra));
        span.finish(204);
        drop(span);

        let events = events(&telemetry).await;
        assert_eq!(events[0]["entities"]["userId"], USER);
        assert_eq!(events[0]["entities"]["tenantId"], "acme");
    }

    #[tokio::test]
    async fn scope_exposes_context_to_handler() {
        let dir = TempDir::new().unwrap();
        let telemetry = telemetry(&dir).await;

        let span = RequestSpan::start(&telemetry, &request("/", Some(HEADER)), &[]);
        let seen = span.scope(async { current_span() }).await;
        assert_eq!(seen, Some(span.context()));
        span.finish(200);
    }
}
