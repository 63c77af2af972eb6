//! Per-upstream resolution state.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

/// Static parts of an upstream, parsed from its configured URL.
#[derive(Debug, Clone)]
pub struct UpstreamSpec {
    /// Hostname handed to the lookup.
    pub host: String,

    /// Port applied to every resolved address.
    pub port: u16,

    /// Freshness window; zero disables caching.
    pub ttl: Duration,

    /// Whether IPv6 address records may be used.
    pub ipv6: bool,
}

/// Mutable resolution state shared by every request to one upstream.
///
/// Bindings are created on first use and live for the rest of the
/// process; in particular the last successfully resolved address is
/// never discarded, only replaced.
#[derive(Debug)]
pub struct UpstreamBinding {
    /// Logical name from the config.
    pub name: String,

    /// Static lookup parameters.
    pub spec: UpstreamSpec,

    state: Mutex<BindingState>,

    /// Serializes lookups so concurrent stale hits trigger one resolution.
    pub(crate) flight: AsyncMutex<()>,

    lookups: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Default)]
struct BindingState {
    addr: Option<SocketAddr>,
    resolved_at: Option<Instant>,
}

impl UpstreamBinding {
    pub(crate) fn new(name: impl Into<String>, spec: UpstreamSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            state: Mutex::new(BindingState::default()),
            flight: AsyncMutex::new(()),
            lookups: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Resolved address still inside its freshness window, if any.
    pub fn fresh(&self) -> Option<SocketAddr> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match (state.addr, state.resolved_at) {
            (Some(addr), Some(at)) if !self.spec.ttl.is_zero() && at.elapsed() <= self.spec.ttl => {
                Some(addr)
            }
            _ => None,
        }
    }

    /// Last successfully resolved address, regardless of age.
    pub fn last_known(&self) -> Option<SocketAddr> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.addr
    }

    /// Record a successful resolution, resetting the freshness window.
    pub(crate) fn store(&self, addr: SocketAddr) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.addr = Some(addr);
        state.resolved_at = Some(Instant::now());
    }

    pub(crate) fn count_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of lookups actually issued (cache hits excluded).
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of lookups that failed.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
