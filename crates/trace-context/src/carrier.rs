// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Carrier traits for trace context propagation.
//!
//! Carriers abstract over the transport used to move a `traceparent` value between hops:
//! HTTP header maps, message metadata, or a JSON job payload. Boundary code reads the
//! inbound value through an [`Extractor`] and writes the outbound value through an
//! [`Injector`] without depending on any framework's header type.
//!
//! All carrier implementations are case-insensitive to tolerate HTTP header normalization
//! (`Traceparent` vs `traceparent`).

use std::collections::HashMap;

use serde_json::Value;

use crate::span::{start_span_from_header, SpanContext};
use crate::traceparent::TRACEPARENT_KEY;

/// Writes propagation values into a carrier.
///
/// Implement this for a framework's outbound header type to let [`inject_span`] write into
/// it directly.
pub trait Injector {
    /// Stores `value` under `key`, lowercasing the key.
    ///
    /// # Arguments
    ///
    /// * `key` - Propagation key, for example `traceparent`.
    /// * `value` - Encoded value; replaces any previous value for the key.
    fn set(&mut self, key: &str, value: String);
}

/// Reads propagation values from a carrier, case-insensitively.
pub trait Extractor {
    /// Looks up `key` regardless of the casing the sender used.
    ///
    /// # Returns
    ///
    /// The value, or `None` when the key is absent or not a string.
    fn get(&self, key: &str) -> Option<&str>;
}

/// Continues the trace found in the carrier, or starts a fresh root when there is none.
///
/// # Arguments
///
/// * `carrier` - Inbound headers or payload.
///
/// # Returns
///
/// A new span. When the carrier held a valid `traceparent` it shares that trace and its
/// parent is the sender's span; a missing or malformed value yields a root span.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
///
/// use trace_context::carrier::extract_span;
///
/// let headers = HashMap::from([(
///     "Traceparent".to_string(),
///     "00-4bf92f3577b86cd56163f2543210c4a0-00f067aa0ba902b7-01".to_string(),
/// )]);
/// let span = extract_span(&headers);
/// assert_eq!(span.trace_id.to_string(), "4bf92f3577b86cd56163f2543210c4a0");
/// assert_eq!(span.parent_span_id.unwrap().to_string(), "00f067aa0ba902b7");
/// ```
pub fn extract_span(carrier: &dyn Extractor) -> SpanContext {
    start_span_from_header(carrier.get(TRACEPARENT_KEY))
}

/// Writes `span` into the carrier as a `traceparent` value.
///
/// # Arguments
///
/// * `span` - The span the next hop should continue from.
/// * `carrier` - Outbound headers or payload.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
///
/// use trace_context::carrier::{extract_span, inject_span};
///
/// let span = extract_span(&HashMap::<String, String>::new());
/// let mut headers: HashMap<String, String> = HashMap::new();
/// inject_span(&span, &mut headers);
/// assert_eq!(headers["traceparent"], span.traceparent());
/// ```
pub fn inject_span(span: &SpanContext, carrier: &mut dyn Injector) {
    carrier.set(TRACEPARENT_KEY, span.traceparent());
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<&str> {
        let lowered = key.to_lowercase();
        if let Some(value) = HashMap::get(self, &lowered) {
            return Some(value.as_str());
        }
        // maps built without `Injector::set` may keep the sender's casing
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&lowered))
            .map(|(_, v)| v.as_str())
    }
}

/// Only `Value::Object` carries anything; other variants are ignored.
impl Injector for Value {
    fn set(&mut self, key: &str, value: String) {
        if let Value::Object(map) = self {
            map.insert(key.to_lowercase(), Value::String(value));
        }
    }
}

impl Extractor for Value {
    fn get(&self, key: &str) -> Option<&str> {
        if let Value::Object(map) = self {
            let lowered = key.to_lowercase();
            map.get(&lowered)
                .or_else(|| {
                    map.iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(&lowered))
                        .map(|(_, v)| v)
                })
                .and_then(|v| v.as_str())
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;

    #[test]
    fn hash_map_get() {
        let mut carrier = HashMap::new();
        carrier.set("headerName", "value".to_string());

        assert_eq!(
            Extractor::get(&carrier, "HEADERNAME"),
            Some("value"),
            "case insensitive extraction"
        );
    }

    #[test]
    fn hash_map_get_with_original_casing() {
        let carrier = HashMap::from([("TraceParent".to_string(), "value".to_string())]);
        assert_eq!(Extractor::get(&carrier, "traceparent"), Some("value"));
    }

    #[test]
    fn hash_map_set_lowercases_and_replaces() {
        let mut carrier = HashMap::new();
        carrier.set("TraceParent", "first".to_string());
        carrier.set("traceparent", "second".to_string());

        assert_eq!(carrier.len(), 1);
        assert_eq!(carrier["traceparent"], "second");
    }

    #[test]
    fn serde_value_get() {
        let mut carrier = Value::Object(serde_json::Map::new());
        carrier.set("headerName", "value".to_string());

        assert_eq!(
            Extractor::get(&carrier, "HEADERNAME"),
            Some("value"),
            "case insensitive extraction"
        );
        assert_eq!(Extractor::get(&Value::Null, "headername"), None);
    }

    #[test]
    fn inject_then_extract_continues_trace() {
        let upstream = extract_span(&HashMap::<String, String>::new());
        assert!(upstream.is_root());

        let mut headers = HashMap::new();
        inject_span(&upstream, &mut headers);

        let downstream = extract_span(&headers);
        assert_eq!(downstream.trace_id, upstream.trace_id);
        assert_eq!(downstream.parent_span_id, Some(upstream.span_id));
    }

    #[test]
    fn json_payload_carries_traceparent() {
        let upstream = extract_span(&Value::Null);
        let mut payload = serde_json::json!({ "event": "user.created" });
        inject_span(&upstream, &mut payload);

        assert_eq!(payload["traceparent"], upstream.traceparent());
        let downstream = extract_span(&payload);
        assert_eq!(downstream.parent_span_id, Some(upstream.span_id));
    }
}
