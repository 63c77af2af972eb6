//! Legacy-path redirect policy.
//!
//! # Responsibilities
//! - Map retired entry paths to their canonical replacements
//! - Match the source path exactly, trailing slash insensitive
//!
//! # Design Decisions
//! - Exact match only: "/grafana/dashboards" is not redirected, it falls
//!   through to the route table like any other path
//! - Permanent (301) redirects, so browsers cache the move
//! - Chain safety is proven at startup by config validation, not here

use std::collections::HashMap;

use crate::config::schema::RedirectConfig;
use crate::routing::table::normalize_prefix;

/// Compiled redirect rules, keyed by normalized source path.
#[derive(Debug, Default)]
pub struct RedirectPolicy {
    rules: HashMap<String, String>,
}

impl RedirectPolicy {
    pub fn new(redirects: &[RedirectConfig]) -> Self {
        let rules = redirects
            .iter()
            .map(|r| (normalize_prefix(&r.from).to_string(), r.to.clone()))
            .collect();
        Self { rules }
    }

    /// Redirect target for `path`, if a rule matches it exactly.
    /// "/grafana" and "/grafana/" hit the same rule.
    pub fn check(&self, path: &str) -> Option<&str> {
        self.rules.get(normalize_prefix(path)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
