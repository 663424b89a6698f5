// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span/context algebra.
//!
//! Every unit of work (handler invocation, outbound call, query, job run) starts its own
//! span. Starting a span always mints a new span id; the trace id is either inherited or
//! minted, and the parent pointer is threaded through unchanged. A process never adopts an
//! inbound span id as its own: the inbound span becomes the parent of a locally minted one.
//!
//! ```text
//! inbound traceparent 00-T-P-01
//!   ↓ start_span_from_header
//! SpanContext { trace_id: T, span_id: S (new), parent_span_id: Some(P) }
//!   ↓ child()
//! SpanContext { trace_id: T, span_id: C (new), parent_span_id: Some(S) }
//!   ↓ traceparent()
//! outbound traceparent 00-T-C-01
//! ```

use serde::{Deserialize, Serialize};

use crate::flags::TraceFlags;
use crate::id::{new_span_id, new_trace_id, SpanId, TraceId};
use crate::traceparent::{self, Traceparent};

/// Identity of one span and its position in the trace tree.
///
/// `parent_span_id` is `None` only for the root span of a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::module_name_repetitions)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    #[serde(default)]
    pub trace_flags: TraceFlags,
}

/// Inputs for [`start_span`]. All fields are optional.
#[derive(Clone, Debug, Default)]
pub struct StartSpanOptions<'a> {
    pub trace_id: Option<TraceId>,
    pub parent_span_id: Option<SpanId>,
    /// Raw flags as received; normalized by [`TraceFlags::normalize`].
    pub trace_flags: Option<&'a str>,
}

/// Starts a span: reuses or mints the trace id and always mints a fresh span id.
#[must_use]
pub fn start_span(options: StartSpanOptions<'_>) -> SpanContext {
    SpanContext {
        trace_id: options.trace_id.unwrap_or_else(new_trace_id),
        span_id: new_span_id(),
        parent_span_id: options.parent_span_id,
        trace_flags: TraceFlags::normalize(options.trace_flags),
    }
}

/// Starts a span continuing the trace described by an inbound `traceparent` header.
///
/// A missing or invalid header starts a fresh trace root instead.
#[must_use]
pub fn start_span_from_header(header: Option<&str>) -> SpanContext {
    match traceparent::parse(header) {
        Some(parsed) => start_span_from_traceparent(&parsed),
        None => start_span(StartSpanOptions::default()),
    }
}

/// Starts a child of the span encoded in an already decoded header.
#[must_use]
pub fn start_span_from_traceparent(parsed: &Traceparent) -> SpanContext {
    SpanContext {
        trace_id: parsed.trace_id,
        span_id: new_span_id(),
        parent_span_id: Some(parsed.parent_id),
        trace_flags: parsed.trace_flags,
    }
}

impl SpanContext {
    /// Starts a new span whose parent is this span.
    #[must_use]
    pub fn child(&self) -> SpanContext {
        SpanContext {
            trace_id: self.trace_id,
            span_id: new_span_id(),
            parent_span_id: Some(self.span_id),
            trace_flags: self.trace_flags,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Encodes this span as the `traceparent` value sent to the next hop.
    #[must_use]
    pub fn traceparent(&self) -> String {
        traceparent::format(self.trace_id, self.span_id, self.trace_flags)
    }

    /// Shape suitable for embedding in a dispatch payload (for example a job queue message).
    #[must_use]
    pub fn to_carried(&self) -> CarriedContext {
        CarriedContext {
            trace_id: self.trace_id.to_string(),
            span_id: self.span_id.to_string(),
            trace_flags: self.trace_flags.to_string(),
            traceparent: self.traceparent(),
        }
    }
}

/// Span context serialized across a process boundary that is not an HTTP hop.
///
/// Fields are plain strings so the payload survives any JSON round trip untouched; they are
/// validated again on rehydration by [`start_span_from_carried`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarriedContext {
    pub trace_id: String,
    pub span_id: String,
    pub trace_flags: String,
    pub traceparent: String,
}

/// Rehydrates a carried context in the receiving process as the parent of a new span.
///
/// The `traceparent` field is authoritative; when it is unusable the individual fields are
/// tried, and when those are unusable too a fresh root is started.
#[must_use]
pub fn start_span_from_carried(carried: Option<&CarriedContext>) -> SpanContext {
    let Some(carried) = carried else {
        return start_span(StartSpanOptions::default());
    };

    if let Some(parsed) = traceparent::parse(Some(&carried.traceparent)) {
        return start_span_from_traceparent(&parsed);
    }

    match (
        carried.trace_id.to_ascii_lowercase().parse::<TraceId>(),
        carried.span_id.to_ascii_lowercase().parse::<SpanId>(),
    ) {
        (Ok(trace_id), Ok(parent_span_id)) => start_span(StartSpanOptions {
            trace_id: Some(trace_id),
            parent_span_id: Some(parent_span_id),
            trace_flags: Some(&carried.trace_flags),
        }),
        _ => start_span(StartSpanOptions::default()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const TRACE: &str = "4bf92f3577b86cd56163f2543210c4a0";
    const PARENT: &str = "00f067aa0ba902b7";

    #[test]
    fn start_span_without_options_is_a_sampled_root() {
        let span = start_span(StartSpanOptions::default());
        assert!(span.is_root());
        assert_eq!(span.trace_flags, TraceFlags::SAMPLED);
    }

    #[test]
    fn start_span_reuses_trace_id_and_parent() {
        let trace_id = TRACE.parse().unwrap();
        let parent = PARENT.parse().unwrap();
        let span = start_span(StartSpanOptions {
            trace_id: Some(trace_id),
            parent_span_id: Some(parent),
            trace_flags: Some("00"),
        });

        assert_eq!(span.trace_id, trace_id);
        assert_eq!(span.parent_span_id, Some(parent));
        assert_ne!(span.span_id, parent);
        assert_eq!(span.trace_flags.to_string(), "00");
    }

    #[test]
    fn start_span_normalizes_flags() {
        let upper = start_span(StartSpanOptions {
            trace_flags: Some("0A"),
            ..Default::default()
        });
        assert_eq!(upper.trace_flags.to_string(), "0a");

        let junk = start_span(StartSpanOptions {
            trace_flags: Some("yes"),
            ..Default::default()
        });
        assert_eq!(junk.trace_flags.to_string(), "01");
    }

    #[test]
    fn identical_inputs_never_share_a_span_id() {
        let parent: SpanId = PARENT.parse().unwrap();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let span = start_span(StartSpanOptions {
                trace_id: Some(TRACE.parse().unwrap()),
                parent_span_id: Some(parent),
                trace_flags: None,
            });
            assert_ne!(span.span_id, parent);
            assert!(seen.insert(span.span_id));
        }
    }

    #[test]
    fn header_span_becomes_parent() {
        let span = start_span_from_header(Some(&format!("00-{TRACE}-{PARENT}-01")));

        assert_eq!(span.trace_id.to_string(), TRACE);
        assert_eq!(span.parent_span_id.unwrap().to_string(), PARENT);
        assert_ne!(span.span_id.to_string(), PARENT);
        assert!(!TRACE.contains(&span.span_id.to_string()));
    }

    #[test]
    fn invalid_header_starts_fresh_root() {
        for header in [None, Some(""), Some("garbage"), Some(&*format!("ff-{TRACE}-{PARENT}-01"))] {
            let span = start_span_from_header(header);
            assert!(span.is_root(), "header {header:?}");
            assert_ne!(span.trace_id.to_string(), TRACE);
        }
    }

    #[test]
    fn child_links_to_parent() {
        let parent = start_span(StartSpanOptions::default());
        let child = parent.child();

        assert_eq!(child.trace_id, parent.trace_id);
        assert_eq!(child.parent_span_id, Some(parent.span_id));
        assert_ne!(child.span_id, parent.span_id);
        assert_eq!(child.trace_flags, parent.trace_flags);
    }

    #[test]
    fn traceparent_encodes_own_span_id() {
        let span = start_span_from_header(Some(&format!("00-{TRACE}-{PARENT}-01")));
        assert_eq!(
            span.traceparent(),
            format!("00-{TRACE}-{}-01", span.span_id)
        );
    }

    #[test]
    fn carried_context_survives_json() {
        let dispatcher = start_span(StartSpanOptions::default());
        let payload = serde_json::to_value(dispatcher.to_carried()).unwrap();

        assert_eq!(payload["traceparent"], dispatcher.traceparent());
        assert_eq!(payload["traceId"], dispatcher.trace_id.to_string());

        let carried: CarriedContext = serde_json::from_value(payload).unwrap();
        let worker = start_span_from_carried(Some(&carried));
        assert_eq!(worker.trace_id, dispatcher.trace_id);
        assert_eq!(worker.parent_span_id, Some(dispatcher.span_id));
    }

    #[test]
    fn carried_context_falls_back_to_fields() {
        let carried = CarriedContext {
            trace_id: TRACE.to_uppercase(),
            span_id: PARENT.to_string(),
            trace_flags: String::new(),
            traceparent: "broken".to_string(),
        };
        let worker = start_span_from_carried(Some(&carried));
        assert_eq!(worker.trace_id.to_string(), TRACE);
        assert_eq!(worker.parent_span_id.unwrap().to_string(), PARENT);
        assert_eq!(worker.trace_flags, TraceFlags::SAMPLED);

        assert!(start_span_from_carried(None).is_root());
    }

    #[test]
    fn span_context_serializes_camel_case() {
        let span = start_span_from_header(Some(&format!("00-{TRACE}-{PARENT}-01")));
        let value = serde_json::to_value(span).unwrap();
        assert_eq!(value["traceId"], TRACE);
        assert_eq!(value["parentSpanId"], PARENT);
        assert_eq!(value["traceFlags"], "01");

        let root = serde_json::to_value(start_span(StartSpanOptions::default())).unwrap();
        assert!(root.get("parentSpanId").is_none());
    }
}
