//! Issuer registry: exact and wildcard issuer matching.
//!
//! Exact registrations always win. Among wildcard patterns the longest
//! non-wildcard prefix wins, with ties broken by registration order.
//! `*` matches one or more characters other than `/`; every other
//! character matches itself. A pattern like
//! `https://oidc.eks.*.amazonaws.com/id/*` therefore matches any region
//! and any cluster id, but never an extra path segment.

use std::collections::HashMap;

use beacon_core::IssuerDescriptor;

use crate::error::{OidcError, Result};

/// Immutable snapshot of the configured issuers.
///
/// Replaced wholesale on config reload; in-flight requests keep the
/// snapshot they captured at entry.
#[derive(Debug, Default)]
pub struct IssuerRegistry {
    exact: HashMap<String, IssuerDescriptor>,
    patterns: Vec<IssuerDescriptor>,
}

impl IssuerRegistry {
    /// Build a registry from exact and wildcard descriptors.
    ///
    /// Each descriptor's `issuer_url` must be unique within its group;
    /// duplicates are configuration errors.
    pub fn new(
        exact: Vec<IssuerDescriptor>,
        patterns: Vec<IssuerDescriptor>,
    ) -> Result<Self> {
        let mut exact_map = HashMap::with_capacity(exact.len());
        for descriptor in exact {
            let url = descriptor.issuer_url.clone();
            if exact_map.insert(url.clone(), descriptor).is_some() {
                return Err(OidcError::DuplicateIssuer(url));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for descriptor in &patterns {
            if !seen.insert(descriptor.issuer_url.clone()) {
                return Err(OidcError::DuplicateIssuer(descriptor.issuer_url.clone()));
            }
        }
        Ok(Self {
            exact: exact_map,
            patterns,
        })
    }

    /// Resolve the descriptor for an issuer URL, if any.
    pub fn lookup(&self, issuer_url: &str) -> Option<&IssuerDescriptor> {
        if let Some(descriptor) = self.exact.get(issuer_url) {
            return Some(descriptor);
        }

        // longest non-wildcard prefix wins; scan order breaks ties, so a
        // strictly-greater comparison keeps the first registration
        let mut best: Option<(usize, &IssuerDescriptor)> = None;
        for descriptor in &self.patterns {
            if !glob_match(&descriptor.issuer_url, issuer_url) {
                continue;
            }
            let specificity = literal_prefix_len(&descriptor.issuer_url);
            if best.map_or(true, |(len, _)| specificity > len) {
                best = Some((specificity, descriptor));
            }
        }
        best.map(|(_, d)| d)
    }

    /// Number of registered issuers (exact + patterns)
    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }
}

fn literal_prefix_len(pattern: &str) -> usize {
    pattern.find('*').unwrap_or(pattern.len())
}

/// Glob match where `*` consumes one or more non-`/` bytes.
fn glob_match(pattern: &str, input: &str) -> bool {
    fn matches(pattern: &[u8], input: &[u8]) -> bool {
        match pattern.first() {
            None => input.is_empty(),
            Some(b'*') => {
                let rest = &pattern[1..];
                let mut consumed = 0;
                while consumed < input.len() && input[consumed] != b'/' {
                    consumed += 1;
                    if matches(rest, &input[consumed..]) {
                        return true;
                    }
                }
                false
            }
            Some(&literal) => {
                input.first() == Some(&literal) && matches(&pattern[1..], &input[1..])
            }
        }
    }
    matches(pattern.as_bytes(), input.as_bytes())
}
