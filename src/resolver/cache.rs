//! TTL-cached, single-flight upstream resolution.
//!
//! # Responsibilities
//! - Map logical upstream names to socket addresses at request time
//! - Cache each address for the upstream's TTL
//! - Collapse concurrent lookups for the same name into one
//! - Fall back to the last known address when resolution fails
//!
//! # Design Decisions
//! - TTL of zero disables caching entirely (resolve on every request)
//! - A lookup failure is only fatal if the name has never resolved;
//!   otherwise the stale address is served and the failure logged
//! - Falling back does not refresh the freshness window, so every
//!   subsequent request keeps retrying resolution until one succeeds
//! - Bindings are created lazily and never removed

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use url::Url;

use crate::config::schema::UpstreamConfig;
use crate::observability::metrics;
use crate::resolver::binding::{UpstreamBinding, UpstreamSpec};
use crate::resolver::lookup::{DnsLookup, Resolve};

/// Errors surfaced to the request path by [`Resolver::resolve`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No upstream with that name is configured.
    #[error("unknown upstream {0:?}")]
    UnknownUpstream(String),

    /// Resolution failed and no address has ever been cached.
    #[error("upstream {name:?} has never resolved")]
    NeverResolved {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Request-time name resolver with one binding per upstream.
pub struct Resolver {
    lookup: Arc<dyn Resolve>,
    specs: HashMap<String, UpstreamSpec>,
    bindings: DashMap<String, Arc<UpstreamBinding>>,
}

impl Resolver {
    /// Build a resolver over validated upstream configs.
    pub fn new(upstreams: &[UpstreamConfig], lookup: Arc<dyn Resolve>) -> Self {
        let specs = upstreams
            .iter()
            .filter_map(|u| {
                // Validation guarantees these parse; skip defensively anyway.
                let url = Url::parse(&u.url).ok()?;
                let host = url.host_str()?.to_string();
                let port = url.port_or_known_default().unwrap_or(80);
                Some((
                    u.name.clone(),
                    UpstreamSpec {
                        host,
                        port,
                        ttl: u.resolve_ttl(),
                        ipv6: u.ipv6,
                    },
                ))
            })
            .collect();

        Self {
            lookup,
            specs,
            bindings: DashMap::new(),
        }
    }

    /// Build a resolver using the operating system resolver.
    pub fn with_dns(upstreams: &[UpstreamConfig]) -> Self {
        Self::new(upstreams, Arc::new(DnsLookup))
    }

    /// Resolve an upstream name into a socket address.
    pub async fn resolve(&self, name: &str) -> Result<SocketAddr, ResolveError> {
        let binding = self.binding(name)?;

        if let Some(addr) = binding.fresh() {
            metrics::record_resolution(name, "cached");
            return Ok(addr);
        }

        // Whoever enters first refreshes the binding; everyone queued
        // behind the lock re-checks freshness instead of looking up again.
        let _flight = binding.flight.lock().await;
        if let Some(addr) = binding.fresh() {
            metrics::record_resolution(name, "cached");
            return Ok(addr);
        }

        binding.count_lookup();
        match self.lookup.lookup(&binding.spec.host, binding.spec.port).await {
            Ok(addrs) => match pick_address(&addrs, binding.spec.ipv6) {
                Some(addr) => {
                    binding.store(addr);
                    metrics::record_resolution(name, "fresh");
                    tracing::debug!(
                        upstream = %name,
                        address = %addr,
                        "Resolved upstream"
                    );
                    Ok(addr)
                }
                None => self.fall_back(
                    &binding,
                    io::Error::new(io::ErrorKind::NotFound, "no usable address records"),
                ),
            },
            Err(e) => self.fall_back(&binding, e),
        }
    }

    /// Number of lookups issued for an upstream (cache hits excluded).
    pub fn lookup_count(&self, name: &str) -> u64 {
        self.bindings
            .get(name)
            .map(|b| b.lookup_count())
            .unwrap_or(0)
    }

    /// Number of issued lookups that failed.
    pub fn failure_count(&self, name: &str) -> u64 {
        self.bindings
            .get(name)
            .map(|b| b.failure_count())
            .unwrap_or(0)
    }

    fn binding(&self, name: &str) -> Result<Arc<UpstreamBinding>, ResolveError> {
        if let Some(binding) = self.bindings.get(name) {
            return Ok(binding.clone());
        }
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| ResolveError::UnknownUpstream(name.to_string()))?;
        let binding = self
            .bindings
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(UpstreamBinding::new(name, spec.clone())))
            .clone();
        Ok(binding)
    }

    fn fall_back(
        &self,
        binding: &UpstreamBinding,
        error: io::Error,
    ) -> Result<SocketAddr, ResolveError> {
        binding.count_failure();
        if let Some(addr) = binding.last_known() {
            metrics::record_resolution(&binding.name, "stale");
            tracing::warn!(
                upstream = %binding.name,
                address = %addr,
                error = %error,
                "Resolution failed, serving last known address"
            );
            Ok(addr)
        } else {
            metrics::record_resolution(&binding.name, "failed");
            tracing::error!(
                upstream = %binding.name,
                error = %error,
                "Resolution failed with no known address"
            );
            Err(ResolveError::NeverResolved {
                name: binding.name.clone(),
                source: error,
            })
        }
    }
}

/// First address allowed by the family policy.
fn pick_address(addrs: &[SocketAddr], ipv6: bool) -> Option<SocketAddr> {
    addrs.iter().copied().find(|a| ipv6 || a.is_ipv4())
}
