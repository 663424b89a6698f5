// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Trace Context
//!
//! Propagation of a distributed trace identifier across process boundaries.
//!
//! ## Overview
//!
//! - [`id`]: cryptographically random trace and span identifiers
//! - [`traceparent`]: strict codec for the W3C `traceparent` header
//! - [`span`]: starting spans, continuing inbound traces, dispatch payloads
//! - [`carrier`]: case-insensitive header / payload carriers
//! - [`scope`]: mutable current context with scoped child spans
//!
//! The result of using these primitives at every boundary is a tree of spans sharing one
//! trace id, reconstructable from each record's `(traceId, spanId, parentSpanId)` triple.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]
#![deny(unused_extern_crates)]

pub mod carrier;
pub mod error;
pub mod flags;
pub mod id;
pub mod scope;
pub mod span;
pub mod traceparent;

pub use error::TraceparentError;
pub use flags::TraceFlags;
pub use id::{new_span_id, new_trace_id, SpanId, TraceId};
pub use scope::ScopedTrace;
pub use span::{
    start_span, start_span_from_carried, start_span_from_header, start_span_from_traceparent,
    CarriedContext, SpanContext, StartSpanOptions,
};
pub use traceparent::{Traceparent, TRACEPARENT_KEY};
