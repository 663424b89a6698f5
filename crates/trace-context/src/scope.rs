// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mutable current context for long-lived hosts.
//!
//! A page or session issues many operations over its lifetime, all belonging to one trace.
//! [`ScopedTrace`] keeps a current parent pointer; [`ScopedTrace::with_span`] moves the
//! pointer to a freshly minted span while a closure runs and restores the previous pointer
//! on every exit path, unwinding included. Nesting is unlimited and reentrant.

use std::cell::Cell;

use crate::flags::TraceFlags;
use crate::id::{new_span_id, new_trace_id, SpanId, TraceId};
use crate::span::SpanContext;
use crate::traceparent;

#[derive(Debug)]
pub struct ScopedTrace {
    trace_id: TraceId,
    trace_flags: TraceFlags,
    /// Span id that the next span started here will use as parent.
    current: Cell<SpanId>,
}

/// Restores the parent pointer when a `with_span` scope ends.
struct Restore<'a> {
    slot: &'a Cell<SpanId>,
    previous: SpanId,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        self.slot.set(self.previous);
    }
}

impl ScopedTrace {
    /// Starts a new trace rooted at a freshly minted span.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trace_id: new_trace_id(),
            trace_flags: TraceFlags::SAMPLED,
            current: Cell::new(new_span_id()),
        }
    }

    /// Continues `span`'s trace; operations started here become its children.
    #[must_use]
    pub fn from_span(span: &SpanContext) -> Self {
        Self {
            trace_id: span.trace_id,
            trace_flags: span.trace_flags,
            current: Cell::new(span.span_id),
        }
    }

    #[must_use]
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    #[must_use]
    pub fn current_span_id(&self) -> SpanId {
        self.current.get()
    }

    /// `traceparent` for an outbound call made at the current position.
    #[must_use]
    pub fn traceparent(&self) -> String {
        traceparent::format(self.trace_id, self.current.get(), self.trace_flags)
    }

    /// Runs `f` inside a new child span of the current position.
    pub fn with_span<R>(&self, f: impl FnOnce(&SpanContext) -> R) -> R {
        let span = SpanContext {
            trace_id: self.trace_id,
            span_id: new_span_id(),
            parent_span_id: Some(self.current.get()),
            trace_flags: self.trace_flags,
        };
        let _restore = Restore {
            slot: &self.current,
            previous: self.current.replace(span.span_id),
        };
        f(&span)
    }
}

impl Default for ScopedTrace {
    fn default() -> Self {
        Self::new()
    }
}
