//! Gateway liveness endpoint.
//!
//! # Responsibilities
//! - Answer `/health` with a fixed 200 regardless of upstream state
//!
//! # Design Decisions
//! - No dependency on the resolver, the route table, or any upstream:
//!   this reports that the gateway process accepts connections, nothing
//!   more, so orchestrators never restart the gateway because a backend
//!   is down

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Fixed liveness answer, any method.
pub async fn handler() -> Response {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        "OK",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_ok() {
        let res = handler().await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
