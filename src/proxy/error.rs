//! Gateway error taxonomy.
//!
//! # Responsibilities
//! - Classify upstream failures into stable status codes
//! - Keep addresses and error chains in the logs, not in response bodies
//!
//! # Design Decisions
//! - Resolution failure is 503: the gateway is up, the name is not
//! - Connect failures are 502, deadline misses are 504
//! - A connector timeout is a timeout, not a connect error, even though
//!   the client library reports both through the same path

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::resolver::ResolveError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure classes surfaced by the forwarding path.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Upstream name has no usable address.
    #[error("resolution failed for upstream {name:?}")]
    Resolve {
        name: String,
        #[source]
        source: ResolveError,
    },

    /// TCP connection to the upstream could not be established.
    #[error("connect to upstream {name:?} at {addr} failed")]
    Connect {
        name: String,
        addr: SocketAddr,
        #[source]
        source: BoxError,
    },

    /// The upstream missed one of the route's deadlines.
    #[error("upstream {name:?} timed out after {after:?} during {phase}")]
    Timeout {
        name: String,
        phase: &'static str,
        after: Duration,
    },

    /// The upstream answered with something that is not usable HTTP.
    #[error("protocol error from upstream {name:?}")]
    Protocol {
        name: String,
        #[source]
        source: BoxError,
    },
}

impl GatewayError {
    /// Status code presented to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Resolve { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Connect { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Protocol { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Generic body for the client; detail stays in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::Resolve { .. } => "Upstream unavailable",
            GatewayError::Connect { .. } => "Upstream connection failed",
            GatewayError::Timeout { .. } => "Upstream timed out",
            GatewayError::Protocol { .. } => "Invalid upstream response",
        }
    }

    /// Label for the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Resolve { .. } => "resolve",
            GatewayError::Connect { .. } => "connect",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::Protocol { .. } => "protocol",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}

/// Map a legacy client error onto the taxonomy.
///
/// The connector reports refused connections and connect timeouts through
/// the same `is_connect` path; the io error kind tells them apart.
pub(crate) fn classify_client_error(
    name: &str,
    addr: SocketAddr,
    error: hyper_util::client::legacy::Error,
    connect_timeout: Duration,
) -> GatewayError {
    if error.is_connect() {
        if source_is_timeout(&error) {
            GatewayError::Timeout {
                name: name.to_string(),
                phase: "connect",
                after: connect_timeout,
            }
        } else {
            GatewayError::Connect {
                name: name.to_string(),
                addr,
                source: Box::new(error),
            }
        }
    } else {
        GatewayError::Protocol {
            name: name.to_string(),
            source: Box::new(error),
        }
    }
}

fn source_is_timeout(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = error.source();
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = e.source();
    }
    false
}
