// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use trace_context::carrier::{inject_span, Injector};
use trace_context::SpanContext;
use url::Url;

use super::policy::PropagationPolicy;
use super::{child_span, EmitOnce, ABORTED};
use crate::event::{duration_ms, OutboundEvent, Status, TelemetryEvent};
use crate::telemetry::Telemetry;

/// HTTP status of a successful call result, when it has one.
pub trait ResponseStatus {
    fn http_status(&self) -> Option<u16>;
}

impl ResponseStatus for u16 {
    fn http_status(&self) -> Option<u16> {
        Some(*self)
    }
}

impl ResponseStatus for Option<u16> {
    fn http_status(&self) -> Option<u16> {
        *self
    }
}

impl ResponseStatus for () {
    fn http_status(&self) -> Option<u16> {
        None
    }
}

/// One physical attempt of an outbound HTTP call. Retries start a new `OutboundCall`.
#[derive(Debug)]
pub struct OutboundCall {
    telemetry: Telemetry,
    context: SpanContext,
    target_service: String,
    operation: String,
    propagate: bool,
    started: Instant,
    done: EmitOnce,
}

impl OutboundCall {
    /// Starts a child span of `parent`, or of the task's current context when `None`.
    pub fn start(
        telemetry: &Telemetry,
        parent: Option<&SpanContext>,
        policy: &dyn PropagationPolicy,
        method: &str,
        destination: &Url,
    ) -> Self {
        let target_service = match (destination.host_str(), destination.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => destination.scheme().to_string(),
        };
        Self {
            telemetry: telemetry.clone(),
            context: child_span(parent),
            target_service,
            operation: format!("{} {}", method.to_ascii_uppercase(), destination.path()),
            propagate: policy.allows(destination),
            started: Instant::now(),
            done: EmitOnce::default(),
        }
    }

    #[must_use]
    pub fn context(&self) -> SpanContext {
        self.context
    }

    /// Whether the policy allowed propagating to this destination.
    #[must_use]
    pub fn propagates(&self) -> bool {
        self.propagate
    }

    /// Sets `traceparent` on the outgoing headers if the destination is allowed.
    pub fn inject(&self, headers: &mut dyn Injector) {
        if self.propagate {
            inject_span(&self.context, headers);
        }
    }

    /// Awaits the call and records it. The call's error is returned unchanged.
    pub async fn run<F, T, E>(self, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: ResponseStatus,
        E: Display,
    {
        let result = call.await;
        match &result {
            Ok(response) => self.finish(response.http_status()),
            Err(e) => self.fail(e),
        };
        result
    }

    /// Records a response. 5xx responses are recorded with status `error`.
    pub fn finish(&self, http_status: Option<u16>) -> bool {
        let status = match http_status {
            Some(code) if code >= 500 => Status::Error,
            _ => Status::Success,
        };
        self.record(status, http_status, None)
    }

    /// Records a call that produced no response.
    pub fn fail(&self, error: impl Display) -> bool {
        self.record(Status::Error, None, Some(error.to_string()))
    }

    fn record(&self, status: Status, http_status: Option<u16>, error: Option<String>) -> bool {
        if !self.done.claim() {
            return false;
        }
        self.telemetry.emit(&TelemetryEvent::Outbound(OutboundEvent {
            trace_id: self.context.trace_id,
            span_id: self.context.span_id,
            parent_span_id: self.context.parent_span_id,
            target_service: self.target_service.clone(),
            operation: self.operation.clone(),
            duration_ms: duration_ms(self.started.elapsed()),
            status,
            http_status,
            error,
        }));
        true
    }
}

impl Drop for OutboundCall {
    fn drop(&mut self) {
        self.record(Status::Error, None, Some(ABORTED.to_string()));
    }
}
