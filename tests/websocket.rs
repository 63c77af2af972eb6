//! WebSocket relay tests: upgrade handshake through the gateway, frame
//! piping in both directions, and the fallbacks when a route or upstream
//! does not speak WebSocket.

mod common;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

#[tokio::test]
async fn frames_relay_in_both_directions() {
    let backend = common::start_ws_echo_backend().await;
    let mut config = common::base_config();
    config.upstreams = vec![common::upstream("storage", backend)];
    let mut route = common::route("storage", "/storage/", "storage");
    route.strip_prefix = true;
    route.websocket = true;
    config.routes = vec![route];
    let (gateway, shutdown) = common::spawn_gateway(config).await;

    let (mut ws, response) = tokio_tungstenite::connect_async(format!("ws://{gateway}/storage/events"))
        .await
        .expect("websocket handshake through the gateway failed");
    assert_eq!(response.status().as_u16(), 101);

    ws.send(Message::text("ping-1")).await.unwrap();
    let echoed = ws
        .next()
        .await
        .expect("stream closed before the echo")
        .unwrap();
    assert_eq!(echoed.into_text().unwrap().as_str(), "ping-1");

    ws.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    let echoed = ws.next().await.expect("stream closed").unwrap();
    match echoed {
        Message::Binary(bytes) => assert_eq!(&bytes[..], &[1u8, 2, 3]),
        other => panic!("expected a binary echo, got {other:?}"),
    }

    ws.close(None).await.unwrap();
    shutdown.trigger();
}

#[tokio::test]
async fn plain_requests_on_a_websocket_route_forward_normally() {
    let backend = common::start_fixed_backend("ok".to_string()).await;
    let mut config = common::base_config();
    config.upstreams = vec![common::upstream("storage", backend)];
    let mut route = common::route("storage", "/storage/", "storage");
    route.strip_prefix = true;
    route.websocket = true;
    config.routes = vec![route];
    let (gateway, shutdown) = common::spawn_gateway(config).await;

    let res = common::client()
        .get(format!("http://{gateway}/storage/index.html"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "ok");
    shutdown.trigger();
}

#[tokio::test]
async fn upgrade_on_a_plain_route_gets_a_plain_response() {
    let backend = common::start_echo_backend().await;
    let mut config = common::base_config();
    config.upstreams = vec![common::upstream("api", backend)];
    config.routes = vec![common::route("api", "/", "api")];
    let (gateway, shutdown) = common::spawn_gateway(config).await;

    // The route does not allow upgrades, so the gateway forwards the
    // request as ordinary HTTP and the backend's 200 fails the handshake.
    let err = tokio_tungstenite::connect_async(format!("ws://{gateway}/events"))
        .await
        .expect_err("handshake should fail on a non-websocket route");

    match err {
        WsError::Http(response) => assert_eq!(response.status().as_u16(), 200),
        other => panic!("expected an HTTP response error, got {other:?}"),
    }
    shutdown.trigger();
}

#[tokio::test]
async fn websocket_to_a_dead_upstream_fails_with_502() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let mut config = common::base_config();
    config.upstreams = vec![common::upstream("storage", dead)];
    let mut route = common::route("storage", "/storage/", "storage");
    route.strip_prefix = true;
    route.websocket = true;
    config.routes = vec![route];
    let (gateway, shutdown) = common::spawn_gateway(config).await;

    let err = tokio_tungstenite::connect_async(format!("ws://{gateway}/storage/events"))
        .await
        .expect_err("handshake should fail when the upstream is down");

    match err {
        WsError::Http(response) => assert_eq!(response.status().as_u16(), 502),
        other => panic!("expected an HTTP response error, got {other:?}"),
    }
    shutdown.trigger();
}
