// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entity extraction for correlating events with business identifiers.
//!
//! Both extractors return `None` when nothing matched, never an empty map, so callers can
//! skip enrichment entirely instead of attaching `"entities": {}` to every record.

use std::collections::BTreeMap;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Entity name to identifier. Ordered so records serialize deterministically.
pub type Entities = BTreeMap<String, String>;

lazy_static! {
    /// 8-4-4-4-12 hex groups.
    static ref UUID_REGEX: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .expect("failed creating regex");
}

/// A path segment after which an identifier is expected, and the entity name to record
/// it under. `{segment: "users", key: "userId"}` maps `/users/<uuid>` to `userId`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPattern {
    pub segment: String,
    pub key: String,
}

impl EntityPattern {
    #[must_use]
    pub fn new(segment: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            key: key.into(),
        }
    }
}

/// Parses `segment:key` (the form used in `SPAN_JOURNAL_ENTITY_PATTERNS`).
impl FromStr for EntityPattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((segment, key)) if !segment.trim().is_empty() && !key.trim().is_empty() => {
                Ok(Self::new(segment.trim(), key.trim()))
            }
            _ => Err(ConfigError::Invalid(format!(
                "Invalid entity pattern '{s}'. Expected 'segment:key'"
            ))),
        }
    }
}

#[must_use]
pub fn is_uuid(value: &str) -> bool {
    UUID_REGEX.is_match(value)
}

/// Pulls UUIDs that directly follow a pattern's segment out of a URL path.
///
/// The query string and fragment are ignored.
#[must_use]
pub fn extract_from_path(path: &str, patterns: &[EntityPattern]) -> Option<Entities> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').collect();

    let mut entities = Entities::new();
    for pair in segments.windows(2) {
        let [segment, candidate] = pair else {
            continue;
        };
        if !is_uuid(candidate) {
            continue;
        }
        for pattern in patterns.iter().filter(|p| p.segment == *segment) {
            entities.insert(pattern.key.clone(), (*candidate).to_string());
        }
    }

    (!entities.is_empty()).then_some(entities)
}

/// Copies the string-valued `keys` of a JSON object.
#[must_use]
pub fn extract_from_fields(data: &Value, keys: &[&str]) -> Option<Entities> {
    let entities: Entities = keys
        .iter()
        .filter_map(|key| {
            data.get(*key)
                .and_then(Value::as_str)
                .map(|value| ((*key).to_string(), value.to_string()))
        })
        .collect();

    (!entities.is_empty()).then_some(entities)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const USER: &str = "3f2b8c1e-9d4a-4b6f-8e2a-1c5d7f9b0a3e";
    const ORDER: &str = "A1B2C3D4-E5F6-4789-ABCD-0123456789EF";

    fn patterns() -> Vec<EntityPattern> {
        vec![
            EntityPattern::new("users", "userId"),
            EntityPattern::new("orders", "orderId"),
        ]
    }

    #[test]
    fn extracts_multiple_entities() {
        let entities =
            extract_from_path(&format!("/api/users/{USER}/orders/{ORDER}"), &patterns()).unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities["userId"], USER);
        assert_eq!(entities["orderId"], ORDER);
    }

    #[test]
    fn no_match_is_none_not_empty() {
        assert_eq!(extract_from_path("/api/health", &patterns()), None);
        assert_eq!(extract_from_path("", &patterns()), None);
        assert_eq!(extract_from_path(&format!("/users/{USER}"), &[]), None);
    }

    #[test]
    fn segment_must_be_followed_by_uuid() {
        assert_eq!(extract_from_path("/api/users/42", &patterns()), None);
        assert_eq!(extract_from_path(&format!("/api/{USER}/users"), &patterns()), None);
        assert_eq!(
            extract_from_path(&format!("/users/{USER}x"), &patterns()),
            None
        );
    }

    #[test]
    fn query_string_is_ignored() {
        let entities =
            extract_from_path(&format!("/users/{USER}?expand=orders"), &patterns()).unwrap();
        assert_eq!(entities["userId"], USER);
    }

    #[test]
    fn extracts_string_fields_only() {
        let data = json!({ "userId": USER, "count": 3, "orderId": null, "region": "eu" });

        let entities =
            extract_from_fields(&data, &["userId", "count", "orderId", "region"]).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities["userId"], USER);
        assert_eq!(entities["region"], "eu");

        assert_eq!(extract_from_fields(&data, &["count", "missing"]), None);
        assert_eq!(extract_from_fields(&json!("not an object"), &["userId"]), None);
    }

    #[test]
    fn pattern_from_str() {
        assert_eq!(
            "users:userId".parse::<EntityPattern>().unwrap(),
            EntityPattern::new("users", "userId")
        );
        assert!("users".parse::<EntityPattern>().is_err());
        assert!(":userId".parse::<EntityPattern>().is_err());
    }
}
