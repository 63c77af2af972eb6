//! Plain HTTP forwarding to resolved upstreams.
//!
//! # Responsibilities
//! - Resolve the route's upstream name to an address
//! - Rebuild the request URI against that address
//! - Apply the forwarding header policy
//! - Enforce the route's exchange deadline
//! - Apply the response policy (hop-by-hop strip, buffering, read deadline)
//!
//! # Design Decisions
//! - One pooled client per distinct connect timeout; the connector is
//!   the only place a connect deadline can live
//! - Outbound requests are always HTTP/1.1, whatever the client spoke
//! - Request bodies stream through untouched; response bodies follow
//!   the route's buffering profile

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::Scheme;
use axum::http::{Request, Response, Uri, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::proxy::error::{classify_client_error, GatewayError};
use crate::proxy::headers::{original_host, prepare_request_headers, sanitize_response_headers};
use crate::proxy::{response, websocket};
use crate::resolver::Resolver;
use crate::routing::RouteEntry;

/// Upstream exchange engine shared by every request.
pub struct Forwarder {
    resolver: Arc<Resolver>,
    /// Pooled clients keyed by connect timeout in seconds.
    clients: HashMap<u64, Client<HttpConnector, Body>>,
    default_client: Client<HttpConnector, Body>,
}

impl Forwarder {
    pub fn new(resolver: Arc<Resolver>, entries: &[RouteEntry]) -> Self {
        let mut clients = HashMap::new();
        for entry in entries {
            clients
                .entry(entry.timeouts.connect_secs)
                .or_insert_with(|| build_client(entry.timeouts.connect()));
        }
        let default_client = build_client(crate::config::schema::TimeoutConfig::default().connect());

        Self {
            resolver,
            clients,
            default_client,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn client(&self, entry: &RouteEntry) -> &Client<HttpConnector, Body> {
        self.clients
            .get(&entry.timeouts.connect_secs)
            .unwrap_or(&self.default_client)
    }

    /// Forward a request as plain HTTP and return the policied response.
    pub async fn forward(
        &self,
        entry: &RouteEntry,
        client_ip: IpAddr,
        req: Request<Body>,
        target_path: String,
    ) -> Result<Response<Body>, GatewayError> {
        let addr = self
            .resolver
            .resolve(&entry.upstream)
            .await
            .map_err(|source| GatewayError::Resolve {
                name: entry.upstream.clone(),
                source,
            })?;

        let (parts, body) = req.into_parts();

        let uri = Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(addr.to_string())
            .path_and_query(join_query(&target_path, parts.uri.query()))
            .build()
            .map_err(|e| GatewayError::Protocol {
                name: entry.upstream.clone(),
                source: Box::new(e),
            })?;

        let host = original_host(&parts);
        let headers = prepare_request_headers(&parts.headers, client_ip, host.as_ref(), entry);

        let mut upstream_req = Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .version(Version::HTTP_11)
            .body(body)
            .map_err(|e| GatewayError::Protocol {
                name: entry.upstream.clone(),
                source: Box::new(e),
            })?;
        *upstream_req.headers_mut() = headers;

        // One deadline covers sending the request and awaiting the head.
        let exchange = entry.timeouts.exchange();
        let upstream_res =
            match tokio::time::timeout(exchange, self.client(entry).request(upstream_req)).await {
                Ok(Ok(res)) => res,
                Ok(Err(e)) => {
                    return Err(classify_client_error(
                        &entry.upstream,
                        addr,
                        e,
                        entry.timeouts.connect(),
                    ))
                }
                Err(_) => {
                    return Err(GatewayError::Timeout {
                        name: entry.upstream.clone(),
                        phase: "response head",
                        after: exchange,
                    })
                }
            };

        let (mut res_parts, res_body) = upstream_res.into_parts();
        sanitize_response_headers(&mut res_parts.headers);

        let read = entry.timeouts.read();
        let body = if entry.buffering.enabled {
            response::apply_buffering(
                res_body,
                entry.buffering.max_bytes(),
                read,
                &entry.upstream,
            )
            .await?
        } else {
            response::streamed(res_body, read)
        };

        Ok(Response::from_parts(res_parts, body))
    }

    /// Relay a WebSocket upgrade through a dedicated upstream connection.
    pub async fn upgrade(
        &self,
        entry: &RouteEntry,
        client_ip: IpAddr,
        req: Request<Body>,
        target_path: String,
    ) -> Result<Response<Body>, GatewayError> {
        let addr = self
            .resolver
            .resolve(&entry.upstream)
            .await
            .map_err(|source| GatewayError::Resolve {
                name: entry.upstream.clone(),
                source,
            })?;

        websocket::relay(entry, addr, client_ip, req, target_path).await
    }
}

fn build_client(connect_timeout: Duration) -> Client<HttpConnector, Body> {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Re-attach the original query string to a rewritten path.
pub(crate) fn join_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) => format!("{}?{}", path, q),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_reattached() {
        assert_eq!(join_query("/api", Some("a=1&b=2")), "/api?a=1&b=2");
        assert_eq!(join_query("/api", None), "/api");
        assert_eq!(join_query("/", Some("redirect=/pgadmin/")), "/?redirect=/pgadmin/");
    }
}
