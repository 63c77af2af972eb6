//! Semantic checks on a parsed configuration.
//!
//! # Responsibilities
//! - Check referential integrity (routes reference existing upstreams)
//! - Validate value ranges (timeouts > 0, buffer budgets > 0)
//! - Detect conflicting route prefixes
//! - Prove every redirect chain terminates at a route within the hop limit
//!
//! # Design Decisions
//! - Collects every violation instead of stopping at the first
//! - Pure function over GatewayConfig; nothing is mutated or defaulted here
//! - Runs once at startup; a config that fails validation never serves
//! - Redirect chains are walked with the same matching logic the request
//!   path uses at runtime, so a config that validates cannot loop in prod

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::table::normalize_prefix;
use crate::routing::{RedirectPolicy, RouteMatch, RouteTable};

/// Longest redirect chain a client may be sent through before landing on
/// a route. The canonical trailing-slash redirect counts as a hop.
pub const MAX_REDIRECT_HOPS: usize = 2;

/// Errors produced by semantic validation of a [`GatewayConfig`].
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Listener bind address is not a valid socket address.
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),

    /// No routes are defined; the gateway would reject every request.
    #[error("no routes defined")]
    NoRoutes,

    /// Two upstreams share a name.
    #[error("duplicate upstream name: {0}")]
    DuplicateUpstream(String),

    /// Upstream URL failed to parse.
    #[error("upstream {name}: invalid url: {reason}")]
    InvalidUpstreamUrl { name: String, reason: String },

    /// Upstream URL uses a scheme the gateway cannot dial.
    #[error("upstream {name}: unsupported scheme {scheme:?}, only http is supported")]
    UnsupportedScheme { name: String, scheme: String },

    /// Two routes share a name.
    #[error("duplicate route name: {0}")]
    DuplicateRouteName(String),

    /// Route path prefix does not start with '/'.
    #[error("route {route}: path prefix {prefix:?} must start with '/'")]
    InvalidPrefix { route: String, prefix: String },

    /// Two routes collapse to the same prefix ("/x" and "/x/" conflict).
    #[error("route {route}: prefix {prefix:?} conflicts with an existing route")]
    DuplicatePrefix { route: String, prefix: String },

    /// Route references an upstream that is not defined.
    #[error("route {route}: unknown upstream {upstream:?}")]
    UnknownUpstream { route: String, upstream: String },

    /// rewrite_to is set but strip_prefix is false, so it would never apply.
    #[error("route {route}: rewrite_to requires strip_prefix")]
    RewriteWithoutStrip { route: String },

    /// rewrite_to does not start with '/'.
    #[error("route {route}: rewrite_to {rewrite:?} must start with '/'")]
    InvalidRewrite { route: String, rewrite: String },

    /// A timeout value is zero.
    #[error("route {route}: {field} must be greater than zero")]
    InvalidTimeout { route: String, field: &'static str },

    /// Buffering is enabled with an empty budget.
    #[error("route {route}: buffering enabled with zero buffer budget")]
    InvalidBuffering { route: String },

    /// An injected header has an invalid name or value.
    #[error("route {route}: invalid header {header:?}")]
    InvalidHeader { route: String, header: String },

    /// Redirect paths must be absolute.
    #[error("redirect {from:?} -> {to:?}: paths must start with '/'")]
    InvalidRedirectPath { from: String, to: String },

    /// Two redirect rules match the same source path.
    #[error("duplicate redirect source: {0}")]
    DuplicateRedirect(String),

    /// Following a redirect never reaches a route.
    #[error("redirect from {from:?} leads to {dead_end:?} which matches no route")]
    DeadEndRedirect { from: String, dead_end: String },

    /// Redirect rules form a cycle.
    #[error("redirect from {from:?} loops back to {repeated:?}")]
    RedirectLoop { from: String, repeated: String },

    /// A client would need more than [`MAX_REDIRECT_HOPS`] redirects.
    #[error("redirect from {from:?} chains through more than {MAX_REDIRECT_HOPS} hops")]
    RedirectChainTooLong { from: String },
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    validate_upstreams(config, &mut errors);
    validate_routes(config, &mut errors);
    validate_redirects(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_upstreams(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();

    for upstream in &config.upstreams {
        if !seen.insert(upstream.name.as_str()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.name.clone()));
        }

        match Url::parse(&upstream.url) {
            Ok(url) => {
                if url.scheme() != "http" {
                    errors.push(ValidationError::UnsupportedScheme {
                        name: upstream.name.clone(),
                        scheme: url.scheme().to_string(),
                    });
                }
                if url.host_str().is_none() {
                    errors.push(ValidationError::InvalidUpstreamUrl {
                        name: upstream.name.clone(),
                        reason: "missing host".to_string(),
                    });
                }
            }
            Err(e) => {
                errors.push(ValidationError::InvalidUpstreamUrl {
                    name: upstream.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn validate_routes(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    let upstream_names: HashSet<&str> =
        config.upstreams.iter().map(|u| u.name.as_str()).collect();
    let mut route_names = HashSet::new();
    let mut prefixes = HashSet::new();

    for route in &config.routes {
        if !route_names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRouteName(route.name.clone()));
        }

        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix {
                route: route.name.clone(),
                prefix: route.path_prefix.clone(),
            });
        } else if !prefixes.insert(normalize_prefix(&route.path_prefix).to_string()) {
            errors.push(ValidationError::DuplicatePrefix {
                route: route.name.clone(),
                prefix: route.path_prefix.clone(),
            });
        }

        if !upstream_names.contains(route.upstream.as_str()) {
            errors.push(ValidationError::UnknownUpstream {
                route: route.name.clone(),
                upstream: route.upstream.clone(),
            });
        }

        if let Some(rewrite) = &route.rewrite_to {
            if !route.strip_prefix {
                errors.push(ValidationError::RewriteWithoutStrip {
                    route: route.name.clone(),
                });
            }
            if !rewrite.starts_with('/') {
                errors.push(ValidationError::InvalidRewrite {
                    route: route.name.clone(),
                    rewrite: rewrite.clone(),
                });
            }
        }

        for (field, value) in [
            ("connect_secs", route.timeouts.connect_secs),
            ("send_secs", route.timeouts.send_secs),
            ("read_secs", route.timeouts.read_secs),
        ] {
            if value == 0 {
                errors.push(ValidationError::InvalidTimeout {
                    route: route.name.clone(),
                    field,
                });
            }
        }

        if route.buffering.enabled && route.buffering.max_bytes() == 0 {
            errors.push(ValidationError::InvalidBuffering {
                route: route.name.clone(),
            });
        }

        for (name, value) in &route.headers {
            let name_ok = HeaderName::from_bytes(name.as_bytes()).is_ok();
            let value_ok = HeaderValue::from_str(value).is_ok();
            if !name_ok || !value_ok {
                errors.push(ValidationError::InvalidHeader {
                    route: route.name.clone(),
                    header: name.clone(),
                });
            }
        }
    }
}

/// Walk every redirect chain with the runtime matching rules and reject
/// configs that loop, dead-end, or exceed the hop limit.
fn validate_redirects(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut sources = HashSet::new();
    let mut malformed = false;

    for rule in &config.redirects {
        if !rule.from.starts_with('/') || !rule.to.starts_with('/') {
            errors.push(ValidationError::InvalidRedirectPath {
                from: rule.from.clone(),
                to: rule.to.clone(),
            });
            malformed = true;
            continue;
        }
        if !sources.insert(normalize_prefix(&rule.from).to_string()) {
            errors.push(ValidationError::DuplicateRedirect(rule.from.clone()));
        }
    }

    // Chains cannot be walked while some rule paths are malformed.
    if malformed {
        return;
    }

    let table = RouteTable::new(&config.routes);
    let policy = RedirectPolicy::new(&config.redirects);

    for rule in &config.redirects {
        walk_chain(&rule.from, &table, &policy, errors);
    }
}

fn walk_chain(
    from: &str,
    table: &RouteTable,
    policy: &RedirectPolicy,
    errors: &mut Vec<ValidationError>,
) {
    let mut path = from.to_string();
    let mut visited = vec![path.clone()];
    let mut hops = 0;

    loop {
        let next = if let Some(target) = policy.check(&path) {
            target.to_string()
        } else {
            match table.match_path(&path) {
                Some(RouteMatch::Forward(_)) => return,
                Some(RouteMatch::CanonicalSlash) => format!("{}/", path),
                None => {
                    errors.push(ValidationError::DeadEndRedirect {
                        from: from.to_string(),
                        dead_end: path,
                    });
                    return;
                }
            }
        };

        hops += 1;
        if hops > MAX_REDIRECT_HOPS {
            errors.push(ValidationError::RedirectChainTooLong {
                from: from.to_string(),
            });
            return;
        }
        if visited.contains(&next) {
            errors.push(ValidationError::RedirectLoop {
                from: from.to_string(),
                repeated: next,
            });
            return;
        }
        visited.push(next.clone());
        path = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RedirectConfig, RouteConfig, UpstreamConfig};
    use std::collections::HashMap;

    fn upstream(name: &str, url: &str) -> UpstreamConfig {
        UpstreamConfig {
            name: name.to_string(),
            url: url.to_string(),
            resolve_ttl_secs: 10,
            ipv6: false,
        }
    }

    fn route(name: &str, prefix: &str, upstream: &str) -> RouteConfig {
        RouteConfig {
            name: name.to_string(),
            path_prefix: prefix.to_string(),
            upstream: upstream.to_string(),
            strip_prefix: false,
            rewrite_to: None,
            websocket: false,
            timeouts: Default::default(),
            buffering: Default::default(),
            headers: HashMap::new(),
        }
    }

    fn redirect(from: &str, to: &str) -> RedirectConfig {
        RedirectConfig {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn config(
        routes: Vec<RouteConfig>,
        upstreams: Vec<UpstreamConfig>,
        redirects: Vec<RedirectConfig>,
    ) -> GatewayConfig {
        GatewayConfig {
            routes,
            upstreams,
            redirects,
            ..Default::default()
        }
    }

    fn errors_of(cfg: &GatewayConfig) -> Vec<ValidationError> {
        validate_config(cfg).expect_err("expected validation errors")
    }

    #[test]
    fn valid_config_passes() {
        let cfg = config(
            vec![
                route("frontend", "/", "frontend"),
                route("grafana", "/monitoring/grafana/", "grafana"),
            ],
            vec![
                upstream("frontend", "http://frontend:3000"),
                upstream("grafana", "http://grafana:3000"),
            ],
            vec![redirect("/grafana", "/monitoring/grafana/")],
        );
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn empty_routes_rejected() {
        let cfg = config(vec![], vec![], vec![]);
        let errors = errors_of(&cfg);
        assert!(matches!(errors[0], ValidationError::NoRoutes));
    }

    #[test]
    fn duplicate_prefix_with_and_without_slash_rejected() {
        let cfg = config(
            vec![
                route("a", "/pgadmin/", "svc"),
                route("b", "/pgadmin", "svc"),
            ],
            vec![upstream("svc", "http://svc:80")],
            vec![],
        );
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicatePrefix { .. })));
    }

    #[test]
    fn unknown_upstream_rejected() {
        let cfg = config(vec![route("a", "/", "ghost")], vec![], vec![]);
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownUpstream { .. })));
    }

    #[test]
    fn https_upstream_rejected() {
        let cfg = config(
            vec![route("a", "/", "svc")],
            vec![upstream("svc", "https://svc:443")],
            vec![],
        );
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnsupportedScheme { .. })));
    }

    #[test]
    fn rewrite_without_strip_rejected() {
        let mut bad = route("a", "/loki/", "svc");
        bad.rewrite_to = Some("/other".to_string());
        let cfg = config(vec![bad], vec![upstream("svc", "http://svc:80")], vec![]);
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::RewriteWithoutStrip { .. })));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut bad = route("a", "/", "svc");
        bad.timeouts.read_secs = 0;
        let cfg = config(vec![bad], vec![upstream("svc", "http://svc:80")], vec![]);
        let errors = errors_of(&cfg);
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidTimeout {
                field: "read_secs",
                ..
            }
        )));
    }

    #[test]
    fn zero_buffer_budget_rejected() {
        let mut bad = route("a", "/", "svc");
        bad.buffering.buffer_count = 0;
        let cfg = config(vec![bad], vec![upstream("svc", "http://svc:80")], vec![]);
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidBuffering { .. })));
    }

    #[test]
    fn invalid_injected_header_rejected() {
        let mut bad = route("a", "/", "svc");
        bad.headers
            .insert("bad header".to_string(), "value".to_string());
        let cfg = config(vec![bad], vec![upstream("svc", "http://svc:80")], vec![]);
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidHeader { .. })));
    }

    #[test]
    fn invalid_header_does_not_stop_redirect_validation() {
        // The chain walker compiles the not-yet-valid routes; a bad header
        // must land in the report alongside the redirect findings, not
        // abort validation.
        let mut bad = route("app", "/app/", "svc");
        bad.headers
            .insert("bad header".to_string(), "value".to_string());
        let cfg = config(
            vec![bad],
            vec![upstream("svc", "http://svc:80")],
            vec![redirect("/legacy", "/app/"), redirect("/gone", "/nowhere")],
        );
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidHeader { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DeadEndRedirect { .. })));
    }

    #[test]
    fn redirect_loop_rejected() {
        let cfg = config(
            vec![route("root", "/", "svc")],
            vec![upstream("svc", "http://svc:80")],
            vec![redirect("/a", "/b"), redirect("/b", "/a")],
        );
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::RedirectLoop { .. })));
    }

    #[test]
    fn redirect_chain_over_limit_rejected() {
        // /a -> /b -> /c -> route is three hops from /a.
        let cfg = config(
            vec![route("svc", "/c/", "svc")],
            vec![upstream("svc", "http://svc:80")],
            vec![
                redirect("/a", "/b"),
                redirect("/b", "/c/"),
                redirect("/c", "/c/"),
            ],
        );
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::RedirectChainTooLong { from, .. } if from == "/a")));
    }

    #[test]
    fn canonical_slash_hop_is_counted() {
        // /legacy -> /pgadmin needs the add-slash hop to reach /pgadmin/,
        // which keeps it exactly at the limit.
        let cfg = config(
            vec![route("pgadmin", "/pgadmin/", "svc")],
            vec![upstream("svc", "http://svc:80")],
            vec![redirect("/legacy", "/pgadmin")],
        );
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn dead_end_redirect_rejected() {
        let cfg = config(
            vec![route("grafana", "/monitoring/grafana/", "svc")],
            vec![upstream("svc", "http://svc:80")],
            vec![redirect("/grafana", "/nowhere")],
        );
        let errors = errors_of(&cfg);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DeadEndRedirect { .. })));
    }

    #[test]
    fn collects_multiple_errors() {
        let mut bad = route("a", "no-slash", "ghost");
        bad.timeouts.connect_secs = 0;
        let cfg = config(vec![bad], vec![], vec![]);
        let errors = errors_of(&cfg);
        assert!(errors.len() >= 3);
    }
}
