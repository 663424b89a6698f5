// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for `traceparent` decoding.
//!
//! These errors never reach callers of the span algebra: a header that fails to decode is
//! logged at `debug` and then treated exactly like a missing header, which starts a fresh
//! trace. They exist so the reason for a rejection is visible in diagnostics and tests.

use thiserror::Error;

/// Reason a `traceparent` value was rejected.
///
/// # Display Format
///
/// Errors are formatted as `"Cannot extract traceparent: {reason}"`.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TraceparentError {
    #[error("Cannot extract traceparent: header is empty")]
    Empty,
    #[error("Cannot extract traceparent: expected 4 `-` delimited segments")]
    SegmentCount,
    #[error("Cannot extract traceparent: malformed version")]
    MalformedVersion,
    #[error("Cannot extract traceparent: `ff` is an invalid version")]
    ReservedVersion,
    #[error("Cannot extract traceparent: malformed trace_id")]
    MalformedTraceId,
    #[error("Cannot extract traceparent: `0` value for trace_id is invalid")]
    ZeroTraceId,
    #[error("Cannot extract traceparent: malformed parent_id")]
    MalformedParentId,
    #[error("Cannot extract traceparent: `0` value for parent_id is invalid")]
    ZeroParentId,
    #[error("Cannot extract traceparent: malformed trace_flags")]
    MalformedFlags,
}
