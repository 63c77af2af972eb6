//! Shared utilities for gateway integration tests.
//!
//! Mock backends bind to port 0 and report their actual address, so tests
//! never collide on ports.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use portal_gateway::config::schema::{GatewayConfig, RouteConfig, UpstreamConfig};
use portal_gateway::lifecycle::Shutdown;
use portal_gateway::proxy::HttpServer;

/// Start the gateway on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = HttpServer::new(config);
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    wait_until_listening(addr).await;
    (addr, shutdown)
}

async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway did not start listening on {addr}");
}

/// Config with metrics disabled so tests never bind the exporter port.
pub fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.observability.metrics_enabled = false;
    config
}

pub fn upstream(name: &str, addr: SocketAddr) -> UpstreamConfig {
    UpstreamConfig {
        name: name.to_string(),
        url: format!("http://{}", addr),
        resolve_ttl_secs: 10,
        ipv6: false,
    }
}

/// Upstream whose host can never resolve.
pub fn unresolvable_upstream(name: &str) -> UpstreamConfig {
    UpstreamConfig {
        name: name.to_string(),
        url: "http://no-such-host.invalid:9".to_string(),
        resolve_ttl_secs: 10,
        ipv6: false,
    }
}

pub fn route(name: &str, prefix: &str, upstream: &str) -> RouteConfig {
    RouteConfig {
        name: name.to_string(),
        path_prefix: prefix.to_string(),
        upstream: upstream.to_string(),
        strip_prefix: false,
        rewrite_to: None,
        websocket: false,
        timeouts: Default::default(),
        buffering: Default::default(),
        headers: Default::default(),
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Client that surfaces 301s instead of following them.
pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// Start a backend that answers every request with a JSON echo of what it
/// saw: path, query, method and the forwarding headers under test.
pub async fn start_echo_backend() -> SocketAddr {
    use axum::{body::Body, extract::Request, response::Json, Router};

    async fn echo(req: Request<Body>) -> Json<serde_json::Value> {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .unwrap_or_default();
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(serde_json::json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "host": header("host"),
            "x_real_ip": header("x-real-ip"),
            "x_forwarded_for": header("x-forwarded-for"),
            "x_forwarded_proto": header("x-forwarded-proto"),
            "x_forwarded_host": header("x-forwarded-host"),
            "x_request_id": header("x-request-id"),
            "x_script_name": header("x-script-name"),
            "connection": header("connection"),
            "upgrade": header("upgrade"),
            "body_len": body.len(),
        }))
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let app = Router::new().fallback(echo);
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that returns a fixed 200 body.
pub async fn start_fixed_backend(body: String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let body = body.clone();
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a backend that accepts connections but never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });
    addr
}

/// Start a backend that sends a 200 head and part of the promised body,
/// then stalls with the connection open.
pub async fn start_stalling_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial";
                let _ = socket.write_all(head.as_bytes()).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });
    addr
}

/// Start a WebSocket backend that echoes every text and binary message.
pub async fn start_ws_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_close() {
                        break;
                    }
                    if (msg.is_text() || msg.is_binary()) && ws.send(msg).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

async fn read_request_head(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() > 64 * 1024 {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}
