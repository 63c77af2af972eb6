//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (request IDs, resolution outcomes, relay ends)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout via the fmt subscriber)
//!     → Prometheus text endpoint (scraped)
//! ```
//!
//! # Design Decisions
//! - Logging goes through `tracing`; the binary installs the env-filtered
//!   fmt subscriber, the library only emits events
//! - The x-request-id header ties the events of one request together
//! - Metrics are cheap (no-ops until a recorder is installed)

pub mod metrics;
