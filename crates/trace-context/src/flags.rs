// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TraceparentError;

/// The `trace-flags` byte of a `traceparent` header.
///
/// Flags are carried for wire compatibility only; nothing here makes sampling decisions.
/// The default is `01` (sampled).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraceFlags(u8);

impl TraceFlags {
    pub const SAMPLED: Self = Self(0x01);

    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_sampled(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// Normalizes caller-supplied flags: anything that is not exactly two hex characters
    /// (including `None`) becomes `01`.
    #[must_use]
    pub fn normalize(raw: Option<&str>) -> Self {
        raw.and_then(|raw| raw.parse().ok()).unwrap_or_default()
    }
}

impl Default for TraceFlags {
    fn default() -> Self {
        Self::SAMPLED
    }
}

impl fmt::Display for TraceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl FromStr for TraceFlags {
    type Err = TraceparentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TraceparentError::MalformedFlags);
        }
        u8::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| TraceparentError::MalformedFlags)
    }
}

impl Serialize for TraceFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TraceFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_defaults_to_sampled() {
        assert_eq!(TraceFlags::normalize(None), TraceFlags::SAMPLED);
        assert_eq!(TraceFlags::normalize(Some("")), TraceFlags::SAMPLED);
        assert_eq!(TraceFlags::normalize(Some("1")), TraceFlags::SAMPLED);
        assert_eq!(TraceFlags::normalize(Some("001")), TraceFlags::SAMPLED);
        assert_eq!(TraceFlags::normalize(Some("zz")), TraceFlags::SAMPLED);
        assert_eq!(TraceFlags::normalize(Some("+1")), TraceFlags::SAMPLED);
    }

    #[test]
    fn normalize_keeps_valid_flags_lowercased() {
        assert_eq!(TraceFlags::normalize(Some("00")).to_string(), "00");
        assert_eq!(TraceFlags::normalize(Some("AB")).to_string(), "ab");
        assert!(!TraceFlags::normalize(Some("00")).is_sampled());
    }
}
