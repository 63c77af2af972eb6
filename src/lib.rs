//! Portal Gateway: the HTTP entry point for a self-hosted service portal.
//!
//! A single listener fronts every service in the deployment (frontend,
//! identity provider, dashboards, object storage, admin tools). Requests
//! are matched by path prefix, rewritten, and forwarded to upstreams whose
//! addresses are re-resolved at runtime so containers can move without a
//! gateway restart.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                 PORTAL GATEWAY                │
//!                        │                                               │
//!     Client Request     │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!     ───────────────────┼─▶│  proxy  │──▶│ redirect │──▶│  routing  │  │
//!                        │  │ server  │   │  policy  │   │   table   │  │
//!                        │  └─────────┘   └──────────┘   └─────┬─────┘  │
//!                        │                                     │        │
//!                        │                                     ▼        │
//!                        │                              ┌───────────┐   │
//!                        │                              │ resolver  │   │
//!                        │                              │ TTL cache │   │
//!                        │                              └─────┬─────┘   │
//!                        │                                    │         │
//!     Client Response    │  ┌──────────┐   ┌───────────┐   ┌──┴──────┐  │
//!     ◀──────────────────┼──│ response │◀──│ forwarder │◀──│ upstream│◀─┼── Backend
//!                        │  │ policy   │   │ / relay   │   │ connect │  │   Service
//!                        │  └──────────┘   └───────────┘   └─────────┘  │
//!                        │                                               │
//!                        │  ┌─────────────────────────────────────────┐  │
//!                        │  │          Cross-Cutting Concerns          │  │
//!                        │  │  config   health   observability         │  │
//!                        │  │  lifecycle (startup / shutdown)          │  │
//!                        │  └─────────────────────────────────────────┘  │
//!                        └───────────────────────────────────────────────┘
//! ```

// Request path
pub mod proxy;
pub mod resolver;
pub mod routing;

// Configuration and cross-cutting support
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use lifecycle::Shutdown;
pub use proxy::HttpServer;
