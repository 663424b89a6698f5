// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Codec for the W3C `traceparent` propagation header.
//!
//! # Format
//!
//! ```text
//! traceparent: 00-4bf92f3577b86cd56163f2543210c4a0-00f067aa0ba902b7-01
//!              │  │                                │                └ trace-flags (2 hex)
//!              │  │                                └ parent-id (16 hex)
//!              │  └ trace-id (32 hex)
//!              └ version (2 hex)
//! ```
//!
//! Decoding is strict: the value is trimmed and lowercased, then must match the four
//! segments exactly. Wrong lengths, non-hex characters, an all-zero trace id or parent id,
//! or the reserved version `ff` reject the whole header. There is no partial context.
//!
//! Encoding always emits version `00`.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::error::TraceparentError;
use crate::flags::TraceFlags;
use crate::id::{SpanId, TraceId};

/// HTTP header key carrying the encoded span context.
pub const TRACEPARENT_KEY: &str = "traceparent";

/// The only version this codec emits.
pub const TRACEPARENT_VERSION: u8 = 0x00;

const RESERVED_VERSION: &str = "ff";

lazy_static! {
    /// `version-traceId-parentId-flags`, already lowercased by the caller.
    static ref TRACEPARENT_REGEX: Regex =
        Regex::new(r"^([a-f0-9]{2})-([a-f0-9]{32})-([a-f0-9]{16})-([a-f0-9]{2})$")
            .expect("failed creating regex");
}

/// Decoded `traceparent` header.
///
/// `parent_id` is the span id of the sender; the receiver makes it the parent of the span it
/// starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Traceparent {
    pub version: u8,
    pub trace_id: TraceId,
    pub parent_id: SpanId,
    pub trace_flags: TraceFlags,
}

impl Traceparent {
    #[must_use]
    pub fn new(trace_id: TraceId, parent_id: SpanId, trace_flags: TraceFlags) -> Self {
        Self {
            version: TRACEPARENT_VERSION,
            trace_id,
            parent_id,
            trace_flags,
        }
    }
}

impl FromStr for Traceparent {
    type Err = TraceparentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(TraceparentError::Empty);
        }

        let captures = TRACEPARENT_REGEX
            .captures(&normalized)
            .ok_or_else(|| classify_mismatch(&normalized))?;

        let version = &captures[1];
        if version == RESERVED_VERSION {
            return Err(TraceparentError::ReservedVersion);
        }
        let version =
            u8::from_str_radix(version, 16).map_err(|_| TraceparentError::MalformedVersion)?;

        Ok(Self {
            version,
            trace_id: captures[2].parse()?,
            parent_id: captures[3].parse()?,
            trace_flags: captures[4].parse()?,
        })
    }
}

/// Picks the most specific reason for a value that did not match the header shape.
fn classify_mismatch(value: &str) -> TraceparentError {
    let segments: Vec<&str> = value.split('-').collect();
    let [version, trace_id, parent_id, flags] = segments.as_slice() else {
        return TraceparentError::SegmentCount;
    };

    if TraceFlags::from_str(version).is_err() {
        TraceparentError::MalformedVersion
    } else if let Err(e) = TraceId::from_str(trace_id) {
        e
    } else if let Err(e) = SpanId::from_str(parent_id) {
        e
    } else {
        debug_assert!(TraceFlags::from_str(flags).is_err());
        TraceparentError::MalformedFlags
    }
}

impl fmt::Display for Traceparent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}-{}-{}-{}",
            self.version, self.trace_id, self.parent_id, self.trace_flags
        )
    }
}

/// Decodes a header value; any defect, or no value at all, yields `None`.
#[must_use]
pub fn parse(header: Option<&str>) -> Option<Traceparent> {
    match header?.parse::<Traceparent>() {
        Ok(traceparent) => Some(traceparent),
        Err(e) => {
            debug!("{e}");
            None
        }
    }
}

/// Encodes a span for the next hop, always as version `00`.
#[must_use]
pub fn format(trace_id: TraceId, span_id: SpanId, flags: TraceFlags) -> String {
    Traceparent::new(trace_id, span_id, flags).to_string()
}
