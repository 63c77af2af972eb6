//! Proxy subsystem: the request path from listener to upstream and back.
//!
//! # Data Flow
//! ```text
//! listener → server.rs (middleware, dispatch)
//!              → headers.rs (forwarding header policy)
//!              → forward.rs (resolve, exchange, deadline)
//!                  → websocket.rs (upgrade relay)
//!                  → response.rs (read deadline, buffering)
//!              → error.rs (failure taxonomy → status codes)
//! ```

pub mod error;
pub mod forward;
pub mod headers;
pub mod response;
pub mod server;
pub mod websocket;

pub use error::GatewayError;
pub use server::HttpServer;
