//! Configuration schema for the gateway.
//!
//! The types mirror the TOML layout of the config file one to one. Every
//! section carries serde defaults so a minimal file only has to name its
//! upstreams and routes.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream service definitions (resolvable names).
    pub upstreams: Vec<UpstreamConfig>,

    /// Route definitions mapping path prefixes to upstreams.
    pub routes: Vec<RouteConfig>,

    /// Legacy-path redirect rules.
    pub redirects: Vec<RedirectConfig>,

    /// Gzip compression of responses.
    #[serde(default = "default_true")]
    pub gzip: bool,

    /// Metrics exporter settings.
    pub observability: ObservabilityConfig,

    /// Security headers and body limits.
    pub security: SecurityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            upstreams: Vec::new(),
            routes: Vec::new(),
            redirects: Vec::new(),
            gzip: true,
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Socket address the gateway accepts connections on.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream service configuration.
///
/// The host component of `url` is a logical name resolved at request time,
/// not at startup, so upstream containers can change address while the
/// gateway keeps running.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique upstream identifier, referenced by routes.
    pub name: String,

    /// Base URL of the upstream (e.g., "http://grafana:3000").
    pub url: String,

    /// How long a resolved address stays fresh, in seconds.
    /// Zero disables caching and re-resolves on every request.
    #[serde(default = "default_resolve_ttl")]
    pub resolve_ttl_secs: u64,

    /// Whether IPv6 address records may be used.
    #[serde(default)]
    pub ipv6: bool,
}

impl UpstreamConfig {
    pub fn resolve_ttl(&self) -> Duration {
        Duration::from_secs(self.resolve_ttl_secs)
    }
}

fn default_resolve_ttl() -> u64 {
    10
}

/// Route configuration mapping a path prefix to an upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route name used in logs and metric labels.
    pub name: String,

    /// Path prefix to match (e.g., "/monitoring/grafana/").
    pub path_prefix: String,

    /// Upstream name to forward to.
    pub upstream: String,

    /// Remove the matched prefix before forwarding.
    #[serde(default)]
    pub strip_prefix: bool,

    /// Replacement root for the stripped prefix (defaults to "/").
    /// Only meaningful together with `strip_prefix`.
    #[serde(default)]
    pub rewrite_to: Option<String>,

    /// Relay WebSocket upgrade requests on this route.
    #[serde(default)]
    pub websocket: bool,

    /// Per-route timeout profile.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Per-route response buffering profile.
    #[serde(default)]
    pub buffering: BufferConfig,

    /// Extra headers injected into every forwarded request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Timeout profile applied to upstream exchanges on a route.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TCP connect timeout in seconds.
    pub connect_secs: u64,

    /// Timeout for sending the request to the upstream, in seconds.
    pub send_secs: u64,

    /// Timeout for reading the response from the upstream, in seconds.
    /// Applies to the response head and to each subsequent body frame.
    pub read_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            send_secs: 60,
            read_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    /// Upper bound on the send-request-and-await-head phase.
    pub fn exchange(&self) -> Duration {
        Duration::from_secs(self.send_secs + self.read_secs)
    }
}

/// Response buffering profile for a route.
///
/// While the buffer budget (`buffer_bytes * buffer_count`) is not exceeded,
/// the response body is collected in memory and sent downstream as a whole.
/// Larger bodies switch to streaming once the budget overflows.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Whether the response body is buffered at all.
    pub enabled: bool,

    /// Size of a single buffer in bytes.
    pub buffer_bytes: usize,

    /// Number of buffers in the budget.
    pub buffer_count: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_bytes: 16 * 1024,
            buffer_count: 8,
        }
    }
}

impl BufferConfig {
    /// Total in-memory budget before the body switches to streaming.
    pub fn max_bytes(&self) -> usize {
        self.buffer_bytes.saturating_mul(self.buffer_count)
    }
}

/// Redirect rule for a legacy path.
///
/// Matches `from` exactly, with or without a trailing slash, and answers
/// with a permanent redirect to `to`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedirectConfig {
    /// Legacy path (e.g., "/grafana").
    pub from: String,

    /// Canonical replacement path (e.g., "/monitoring/grafana/").
    pub to: String,
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Whether the Prometheus metrics exporter is started.
    pub metrics_enabled: bool,

    /// Bind address for the metrics exporter.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security-related settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Add standard security headers to every response.
    pub enable_headers: bool,

    /// Maximum accepted request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 100 * 1024 * 1024,
        }
    }
}

fn default_true() -> bool {
    true
}
