// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace and span identifiers.
//!
//! Identifiers are drawn from the thread-local CSPRNG (`rand::rng()`, ChaCha based and
//! reseeded from the OS) and rendered as fixed-width lowercase hexadecimal:
//!
//! ```text
//! trace id: 4bf92f3577b86cd56163f2543210c4a0   (128 bits, 32 hex chars)
//! span id:  00f067aa0ba902b7                   (64 bits, 16 hex chars)
//! ```
//!
//! The all-zero value is reserved by the `traceparent` wire format to mean "absent", so the
//! generators redraw on zero and the parsers reject it.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TraceparentError;

/// 128-bit identifier shared by every span of one logical operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

/// 64-bit identifier of a single unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

/// Mints a fresh random trace id.
#[must_use]
pub fn new_trace_id() -> TraceId {
    let mut rng = rand::rng();
    loop {
        let value: u128 = rng.random();
        if value != 0 {
            return TraceId(value);
        }
    }
}

/// Mints a fresh random span id.
#[must_use]
pub fn new_span_id() -> SpanId {
    let mut rng = rand::rng();
    loop {
        let value: u64 = rng.random();
        if value != 0 {
            return SpanId(value);
        }
    }
}

impl TraceId {
    /// Builds a trace id from its numeric value, rejecting zero.
    #[must_use]
    pub fn from_u128(value: u128) -> Option<Self> {
        (value != 0).then_some(Self(value))
    }

    #[must_use]
    pub fn to_u128(self) -> u128 {
        self.0
    }
}

impl SpanId {
    /// Builds a span id from its numeric value, rejecting zero.
    #[must_use]
    pub fn from_u64(value: u64) -> Option<Self> {
        (value != 0).then_some(Self(value))
    }

    #[must_use]
    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Parses exactly `width` hex characters, case-insensitively.
fn parse_hex(value: &str, width: usize) -> Option<u128> {
    if value.len() != width || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u128::from_str_radix(value, 16).ok()
}

impl FromStr for TraceId {
    type Err = TraceparentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = parse_hex(s, 32).ok_or(TraceparentError::MalformedTraceId)?;
        Self::from_u128(value).ok_or(TraceparentError::ZeroTraceId)
    }
}

impl FromStr for SpanId {
    type Err = TraceparentError;

    #[allow(clippy::cast_possible_truncation)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // 16 hex chars always fit in 64 bits
        let value = parse_hex(s, 16).ok_or(TraceparentError::MalformedParentId)? as u64;
        Self::from_u64(value).ok_or(TraceparentError::ZeroParentId)
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for SpanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TraceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for SpanId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
