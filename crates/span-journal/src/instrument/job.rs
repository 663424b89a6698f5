// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background jobs.
//!
//! A job crosses a serialization boundary, so its context travels as a
//! [`CarriedContext`] inside the job payload instead of an HTTP header:
//!
//! ```text
//! request span S ── record_dispatch ──> dispatch span D (job.dispatch, parent S)
//!                                            │ CarriedContext in payload
//!                                            ▼
//!                         JobRun::start ──> run span R (job.start / job.end, parent D)
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use trace_context::{start_span_from_carried, CarriedContext, SpanContext};

use super::{child_span, in_span, EmitOnce, ABORTED};
use crate::entities::Entities;
use crate::event::{
    duration_ms, JobDispatchEvent, JobEndEvent, JobStartEvent, Status, TelemetryEvent,
};
use crate::telemetry::Telemetry;

/// Records a `job.dispatch` event and returns the context to embed in the job payload.
///
/// The dispatch gets its own span, a child of `parent` or of the task's current context.
pub fn record_dispatch(
    telemetry: &Telemetry,
    parent: Option<&SpanContext>,
    event_name: impl Into<String>,
    entities: Option<Entities>,
) -> CarriedContext {
    let span = child_span(parent);
    telemetry.emit(&TelemetryEvent::JobDispatch(JobDispatchEvent {
        trace_id: span.trace_id,
        span_id: Some(span.span_id),
        parent_span_id: span.parent_span_id,
        event_name: event_name.into(),
        entities,
    }));
    span.to_carried()
}

/// One execution of a job function. Emits `job.start` when created and one `job.end`.
#[derive(Debug)]
pub struct JobRun {
    telemetry: Telemetry,
    context: SpanContext,
    function_id: String,
    run_id: String,
    entities: Option<Entities>,
    started: Instant,
    done: EmitOnce,
}

impl JobRun {
    /// Rehydrates `carried` (when present and valid) as the parent of this run's span.
    pub fn start(
        telemetry: &Telemetry,
        carried: Option<&CarriedContext>,
        function_id: impl Into<String>,
        run_id: impl Into<String>,
        entities: Option<Entities>,
    ) -> Self {
        let run = Self {
            telemetry: telemetry.clone(),
            context: start_span_from_carried(carried),
            function_id: function_id.into(),
            run_id: run_id.into(),
            entities,
            started: Instant::now(),
            done: EmitOnce::default(),
        };
        run.telemetry.emit(&TelemetryEvent::JobStart(JobStartEvent {
            trace_id: run.context.trace_id,
            span_id: run.context.span_id,
            parent_span_id: run.context.parent_span_id,
            function_id: run.function_id.clone(),
            run_id: run.run_id.clone(),
            entities: run.entities.clone(),
        }));
        run
    }

    #[must_use]
    pub fn context(&self) -> SpanContext {
        self.context
    }

    /// Runs the job body with this run as the current context and records its outcome.
    /// The body's error is returned unchanged.
    pub async fn run<F, T, E>(self, body: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let result = in_span(self.context, body).await;
        match &result {
            Ok(_) => self.finish(),
            Err(e) => self.fail(e),
        };
        result
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
        self.telemetry.emit(&TelemetryEvent::JobEnd(JobEndEvent {
            trace_id: self.context.trace_id,
            span_id: self.context.span_id,
            parent_span_id: self.context.parent_span_id,
            function_id: self.function_id.clone(),
            run_id: self.run_id.clone(),
            duration_ms: duration_ms(self.started.elapsed()),
            status,
            entities: self.entities.clone(),
            error,
        }));
        true
    }
}

impl Drop for JobRun {
    fn drop(&mut self) {
        self.record(Status::Error, Some(ABORTED.to_string()));
    }
}
