//! Upstream name resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Request needs upstream "grafana"
//!     → cache.rs (fresh address within TTL? → done)
//!     → single-flight lock per binding
//!     → lookup.rs (OS resolver / scripted in tests)
//!     → success: cache address, stamp freshness
//!     → failure: serve last known address, or 503 if there is none
//! ```
//!
//! # Design Decisions
//! - Resolution happens at request time, never at startup, so the
//!   gateway boots and stays up while upstreams are down
//! - One binding per upstream name, created lazily, never removed
//! - The last good address survives resolver outages

pub mod binding;
pub mod cache;
pub mod lookup;

pub use binding::UpstreamBinding;
pub use cache::{ResolveError, Resolver};
pub use lookup::{DnsLookup, Resolve};
