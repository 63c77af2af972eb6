//! Route table: compiled path-prefix routing.
//!
//! # Responsibilities
//! - Store compiled routes, longest prefix first
//! - Look up the matching route for a request path
//! - Detect paths that are one slash short of a route prefix
//! - Compute the upstream-facing path (strip / rewrite)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan (acceptable for typical route counts)
//! - Longest configured prefix always wins, independent of config order
//! - Matching is pure prefix comparison: no regex, no segment splitting

use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::{BufferConfig, RouteConfig, TimeoutConfig};

/// A single compiled route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix as configured.
    pub prefix: String,

    /// Logical upstream name, resolved per request.
    pub upstream: String,

    /// Remove the matched prefix before forwarding.
    pub strip_prefix: bool,

    /// Replacement root for the stripped prefix.
    pub rewrite_to: Option<String>,

    /// Relay WebSocket upgrades instead of plain forwarding.
    pub websocket: bool,

    /// Timeout profile for upstream exchanges.
    pub timeouts: TimeoutConfig,

    /// Response buffering profile.
    pub buffering: BufferConfig,

    /// Headers injected into every forwarded request.
    pub extra_headers: Vec<(HeaderName, HeaderValue)>,
}

impl RouteEntry {
    fn from_config(config: &RouteConfig) -> Self {
        // Unparseable headers are dropped here; validation reports them,
        // so a config carrying one never reaches the serving path.
        let extra_headers: Vec<(HeaderName, HeaderValue)> = config
            .headers
            .iter()
            .filter_map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
                let value = HeaderValue::from_str(value).ok()?;
                Some((name, value))
            })
            .collect();

        Self {
            name: config.name.clone(),
            prefix: config.path_prefix.clone(),
            upstream: config.upstream.clone(),
            strip_prefix: config.strip_prefix,
            rewrite_to: config.rewrite_to.clone(),
            websocket: config.websocket,
            timeouts: config.timeouts,
            buffering: config.buffering,
            extra_headers,
        }
    }

    /// Path forwarded to the upstream for a request path under this prefix.
    ///
    /// With `strip_prefix` the matched prefix is replaced by `rewrite_to`
    /// (default "/"); otherwise the path passes through untouched. The query
    /// string is not part of the path and is carried over by the caller.
    pub fn target_path(&self, path: &str) -> String {
        if !self.strip_prefix {
            return path.to_string();
        }
        let remainder = &path[self.prefix.len()..];
        let root = self.rewrite_to.as_deref().unwrap_or("/");
        join_path(root, remainder)
    }
}

/// Join a rewrite root and the path remainder without doubling slashes.
fn join_path(root: &str, remainder: &str) -> String {
    match (root.ends_with('/'), remainder.starts_with('/')) {
        (true, true) => format!("{}{}", &root[..root.len() - 1], remainder),
        (true, false) | (false, true) => format!("{}{}", root, remainder),
        (false, false) => {
            if remainder.is_empty() {
                root.to_string()
            } else {
                format!("{}/{}", root, remainder)
            }
        }
    }
}

/// A prefix with its trailing slash removed, so "/x" and "/x/" compare
/// equal. The root prefix "/" is left alone.
pub fn normalize_prefix(prefix: &str) -> &str {
    if prefix.len() > 1 {
        prefix.strip_suffix('/').unwrap_or(prefix)
    } else {
        prefix
    }
}

/// Result of matching a request path against the table.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    /// Path belongs to this route.
    Forward(&'a RouteEntry),

    /// Path equals a route prefix minus its trailing slash and must be
    /// answered with a permanent redirect appending the slash.
    CanonicalSlash,
}

/// Immutable, longest-prefix-first route table.
#[derive(Debug)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Compile routes into a table. Assumes the config already validated.
    pub fn new(routes: &[RouteConfig]) -> Self {
        let mut entries: Vec<RouteEntry> = routes.iter().map(RouteEntry::from_config).collect();
        // Stable sort keeps config order among equal-length prefixes.
        entries.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { entries }
    }

    /// Match a request path.
    ///
    /// The slash-canonicalization check runs at the position of the longer
    /// prefix, so "/pgadmin" redirects to "/pgadmin/" even when a shorter
    /// route (such as "/") would otherwise swallow it.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        for entry in &self.entries {
            if path.starts_with(entry.prefix.as_str()) {
                return Some(RouteMatch::Forward(entry));
            }
            if entry.prefix.len() > 1
                && entry.prefix.ends_with('/')
                && path == &entry.prefix[..entry.prefix.len() - 1]
            {
                return Some(RouteMatch::CanonicalSlash);
            }
        }
        None
    }

    /// All compiled entries, longest prefix first.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}
