//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Initialize subsystems → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl-C → broadcast trigger → stop accepting → drain in-flight → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then the listener
//! - Shutdown fans out over a broadcast channel; in-flight requests drain
//!   before the server future resolves

pub mod shutdown;

pub use shutdown::Shutdown;
