// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Which destinations receive a `traceparent` header.
//!
//! Sending trace identifiers to third parties leaks correlation data, so the default is to
//! propagate only to the service's own origin.

use url::{Origin, Url};

pub trait PropagationPolicy: Send + Sync {
    fn allows(&self, destination: &Url) -> bool;
}

impl<F> PropagationPolicy for F
where
    F: Fn(&Url) -> bool + Send + Sync,
{
    fn allows(&self, destination: &Url) -> bool {
        self(destination)
    }
}

/// Propagates only to destinations with the same scheme, host and port as `origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SameOrigin {
    origin: Origin,
}

impl SameOrigin {
    #[must_use]
    pub fn new(origin: &Url) -> Self {
        Self {
            origin: origin.origin(),
        }
    }
}

impl PropagationPolicy for SameOrigin {
    fn allows(&self, destination: &Url) -> bool {
        // opaque origins never compare equal, so data: or file: URLs are never allowed
        destination.origin() == self.origin
    }
}

/// Propagates to an explicit list of hosts (exact, case-insensitive, port ignored).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowHosts {
    hosts: Vec<String>,
}

impl AllowHosts {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| host.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl PropagationPolicy for AllowHosts {
    fn allows(&self, destination: &Url) -> bool {
        destination
            .host_str()
            .is_some_and(|host| self.hosts.iter().any(|allowed| allowed == host))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl PropagationPolicy for Always {
    fn allows(&self, _: &Url) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl PropagationPolicy for Never {
    fn allows(&self, _: &Url) -> bool {
        false
    }
}
