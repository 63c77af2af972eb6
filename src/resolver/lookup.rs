//! Address lookup behind a trait, so resolution can be scripted in tests.

use std::io;
use std::net::SocketAddr;

use futures_util::future::BoxFuture;

/// Source of address records for a hostname.
pub trait Resolve: Send + Sync + 'static {
    /// Resolve `host:port` into candidate socket addresses.
    fn lookup<'a>(&'a self, host: &'a str, port: u16)
        -> BoxFuture<'a, io::Result<Vec<SocketAddr>>>;
}

/// Production lookup backed by the operating system resolver.
///
/// Container platforms point /etc/resolv.conf at their embedded DNS
/// server, so going through getaddrinfo tracks upstream containers as
/// they are recreated, with no resolver configuration of our own.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsLookup;

impl Resolve for DnsLookup {
    fn lookup<'a>(
        &'a self,
        host: &'a str,
        port: u16,
    ) -> BoxFuture<'a, io::Result<Vec<SocketAddr>>> {
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((host, port)).await?;
            Ok(addrs.collect())
        })
    }
}
