// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Framework-free boundary instrumentation.
//!
//! Adapters for a particular web framework, database client or job queue call into these
//! types at the right moments; nothing here depends on any such framework.
//!
//! ```text
//! RequestSpan::start ── scope(handler) ──────────────────────────── finish / fail / drop
//!                          │                                        (exactly one http.request)
//!                          ├─ OutboundCall::start ─ inject ─ run     (one http.outbound per attempt)
//!                          ├─ instrument_query                       (one db.query)
//!                          └─ record_dispatch ──> CarriedContext ──> JobRun::start (job.start / job.end)
//! ```
//!
//! Each span type records exactly one terminal event. An "already emitted" latch makes racing
//! completion signals harmless, and dropping a span that was never completed records it as
//! aborted.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use trace_context::{start_span, CarriedContext, SpanContext, StartSpanOptions};

pub mod job;
pub mod outbound;
pub mod policy;
pub mod query;
pub mod request;

pub use job::{record_dispatch, JobRun};
pub use outbound::{OutboundCall, ResponseStatus};
pub use policy::{AllowHosts, Always, Never, PropagationPolicy, SameOrigin};
pub use query::{instrument_query, QuerySpan};
pub use request::{InboundRequest, RequestSpan};

/// Error label recorded when a span is dropped without being completed.
pub const ABORTED: &str = "aborted";

tokio::task_local! {
    static CURRENT_SPAN: SpanContext;
}

/// Runs `fut` with `span` as the current context of the task.
///
/// The association ends with the future; nothing outlives the unit of work.
pub async fn in_span<F: Future>(span: SpanContext, fut: F) -> F::Output {
    CURRENT_SPAN.scope(span, fut).await
}

/// Context of the enclosing unit of work, if any.
#[must_use]
pub fn current_span() -> Option<SpanContext> {
    CURRENT_SPAN.try_with(|span| *span).ok()
}

/// Current context shaped for a dispatch payload.
#[must_use]
pub fn current_carried() -> Option<CarriedContext> {
    current_span().map(|span| span.to_carried())
}

/// Child of `parent`, else of the current context, else a fresh root.
fn child_span(parent: Option<&SpanContext>) -> SpanContext {
    match parent.copied().or_else(current_span) {
        Some(parent) => parent.child(),
        None => start_span(StartSpanOptions::default()),
    }
}

#[derive(Debug, Default)]
struct EmitOnce(AtomicBool);

impl EmitOnce {
    /// True for the first caller only.
    fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_context::start_span_from_header;

    #[tokio::test]
    async fn current_span_is_scoped_to_the_future() {
        assert_eq!(current_span(), None);

        let span = start_span_from_header(None);
        let seen = in_span(span, async { current_span() }).await;

        assert_eq!(seen, Some(span));
        assert_eq!(current_span(), None);
    }

    #[tokio::test]
    async fn nested_scopes_shadow_and_restore() {
        let outer = start_span_from_header(None);
        let inner = outer.child();

        in_span(outer, async {
            in_span(inner, async {
                assert_eq!(current_span(), Some(inner));
            })
            .await;
            assert_eq!(current_span(), Some(outer));
            assert_eq!(current_carried(), Some(outer.to_carried()));
        })
        .await;
    }

    #[tokio::test]
    async fn child_span_prefers_explicit_parent() {
        let ambient = start_span_from_header(None);
        let explicit = start_span_from_header(None);

        in_span(ambient, async {
            assert_eq!(child_span(None).parent_span_id, Some(ambient.span_id));
            assert_eq!(
                child_span(Some(&explicit)).parent_span_id,
                Some(explicit.span_id)
            );
        })
        .await;

        assert!(child_span(None).is_root());
    }

    #[test]
    fn emit_once_claims_once() {
        let latch = EmitOnce::default();
        assert!(latch.claim());
        assert!(!latch.claim());
    }
}
