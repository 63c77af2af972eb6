//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read file, deserialize)
//!     → validation.rs (cross-reference checks)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into RouteTable / RedirectPolicy / Resolver at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Defaults on every section keep a minimal file small
//! - serde owns syntax, validation.rs owns semantics
//! - A config that validates cannot produce a redirect loop at runtime

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::GatewayConfig;
pub use schema::RedirectConfig;
pub use schema::RouteConfig;
pub use schema::UpstreamConfig;
