//! End-to-end tests: real server on an ephemeral port, real WebSocket
//! clients.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use notify_hub::config::HubConfig;
use notify_hub::domain::{Body, Envelope, Topic};
use notify_hub::hub::HubHandle;
use notify_hub::server::{self, RunningServer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_with(config: HubConfig) -> RunningServer {
    let config = HubConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        ..config
    };
    match server::start(config).await {
        Ok(running) => running,
        Err(e) => panic!("server failed to start: {e}"),
    }
}

async fn start() -> RunningServer {
    start_with(HubConfig {
        max_message_size: 4096,
        ..HubConfig::default()
    })
    .await
}

async fn connect(addr: SocketAddr, query: &str) -> Client {
    let url = format!("ws://{addr}/ws{query}");
    match tokio_tungstenite::connect_async(url).await {
        Ok((client, _)) => client,
        Err(e) => panic!("connect failed: {e}"),
    }
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(client: &mut Client) -> Value {
    let read = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<Value>(text.as_str())
                        .unwrap_or_else(|e| panic!("server sent invalid json: {e}"));
                }
                Some(Ok(Message::Close(_))) | None => panic!("connection closed"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("read failed: {e}"),
            }
        }
    };
    match tokio::time::timeout(WAIT, read).await {
        Ok(value) => value,
        Err(_) => panic!("timed out waiting for a frame"),
    }
}

async fn send_json(client: &mut Client, value: Value) {
    if let Err(e) = client.send(Message::text(value.to_string())).await {
        panic!("send failed: {e}");
    }
}

async fn connect_welcomed(addr: SocketAddr) -> (Client, String) {
    let mut client = connect(addr, "").await;
    let welcome = next_json(&mut client).await;
    let Some(id) = welcome["payload"]["session_id"].as_str() else {
        panic!("welcome without session_id: {welcome}");
    };
    let id = id.to_string();
    (client, id)
}

async fn subscribe(client: &mut Client, topic: &str) {
    send_json(client, json!({"kind": "subscribe", "payload": {"topic": topic}})).await;
    let ack = next_json(client).await;
    assert_eq!(ack["kind"], "subscription");
    assert_eq!(ack["action"], "subscribed");
    assert_eq!(ack["payload"], json!({ "topic": topic }));
}

async fn wait_for_sessions(hub: &HubHandle, expected: usize) {
    let poll = async {
        loop {
            match hub.stats().await {
                Ok(stats) if stats.sessions == expected => return,
                Ok(_) => tokio::time::sleep(Duration::from_millis(20)).await,
                Err(e) => panic!("hub stopped: {e}"),
            }
        }
    };
    if tokio::time::timeout(WAIT, poll).await.is_err() {
        panic!("hub never reached {expected} sessions");
    }
}

fn topic(name: &str) -> Topic {
    Topic::parse(name).unwrap_or_else(|e| panic!("{e}"))
}

fn order_update(id: &str) -> Envelope {
    Envelope::new(Body::OrderUpdate(json!({"order_id": id, "status": "filled"})))
}

fn market_tick(n: u64) -> Envelope {
    Envelope::new(Body::MarketData(json!({"figi": "BBG004730N88", "seq": n})))
}

#[tokio::test]
async fn welcome_carries_session_and_user() {
    let server = start().await;
    let mut client = connect(server.local_addr, "?user_id=alice").await;

    let welcome = next_json(&mut client).await;
    assert_eq!(welcome["kind"], "system");
    assert_eq!(welcome["action"], "connected");
    assert_eq!(welcome["payload"]["user_id"], "alice");
    let id = welcome["payload"]["session_id"].as_str().unwrap_or_default();
    assert!(!id.is_empty());
    assert_eq!(welcome["session_id"], id);

    let (_anon, _) = connect_welcomed(server.local_addr).await;
    let Ok(sessions) = server.hub.sessions().await else {
        panic!("hub should be running");
    };
    assert!(sessions.iter().any(|s| s.user_id == "anonymous"));
    assert!(sessions.iter().any(|s| s.user_id == "alice" && s.session_id == id));

    server.stop(WAIT).await;
}

#[tokio::test]
async fn welcome_precedes_replies_to_eager_client() {
    let server = start().await;
    let mut client = connect(server.local_addr, "").await;

    send_json(&mut client, json!({"kind": "ping"})).await;

    let first = next_json(&mut client).await;
    assert_eq!(first["kind"], "system");
    assert_eq!(first["action"], "connected");
    assert_eq!(next_json(&mut client).await["kind"], "pong");

    server.stop(WAIT).await;
}

#[tokio::test]
async fn topic_publish_reaches_only_subscribers() {
    let server = start().await;
    let (mut subscriber, _) = connect_welcomed(server.local_addr).await;
    let (mut bystander, _) = connect_welcomed(server.local_addr).await;

    subscribe(&mut subscriber, "orders").await;

    let update = order_update("o-1");
    let Ok(Some(expected_payload)) = update.body.payload() else {
        panic!("order update must have a payload");
    };
    assert!(
        server
            .hub
            .publish_to_topic(topic("orders"), update)
            .await
            .is_ok()
    );
    assert!(server.hub.publish(market_tick(1)).await.is_ok());

    let received = next_json(&mut subscriber).await;
    assert_eq!(received["kind"], "order_update");
    assert_eq!(received["payload"], expected_payload);

    // The bystander's first frame after its welcome is the global tick.
    let first = next_json(&mut bystander).await;
    assert_eq!(first["kind"], "market_data");

    server.stop(WAIT).await;
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let server = start().await;
    let (mut client, _) = connect_welcomed(server.local_addr).await;

    subscribe(&mut client, "orders").await;
    send_json(
        &mut client,
        json!({"kind": "unsubscribe", "payload": {"topic": "orders"}}),
    )
    .await;
    let ack = next_json(&mut client).await;
    assert_eq!(ack["kind"], "subscription");
    assert_eq!(ack["action"], "unsubscribed");

    assert!(
        server
            .hub
            .publish_to_topic(topic("orders"), order_update("o-2"))
            .await
            .is_ok()
    );
    assert!(server.hub.publish(market_tick(2)).await.is_ok());
    assert_eq!(next_json(&mut client).await["kind"], "market_data");

    server.stop(WAIT).await;
}

#[tokio::test]
async fn bad_frames_are_answered_and_session_survives() {
    let server = start().await;
    let (mut client, _) = connect_welcomed(server.local_addr).await;

    if let Err(e) = client.send(Message::text("{not json")).await {
        panic!("send failed: {e}");
    }
    let err = next_json(&mut client).await;
    assert_eq!(err["kind"], "error");
    assert!(
        err["error"]
            .as_str()
            .unwrap_or_default()
            .starts_with("invalid message format")
    );
    assert!(err.get("payload").is_none());

    send_json(&mut client, json!({"kind": "teleport"})).await;
    let err = next_json(&mut client).await;
    assert_eq!(err["error"], "unknown message kind: teleport");

    send_json(&mut client, json!({"kind": "ping"})).await;
    let pong = next_json(&mut client).await;
    assert_eq!(pong["kind"], "pong");
    assert_eq!(pong["action"], "ping_response");

    server.stop(WAIT).await;
}

#[tokio::test]
async fn scoped_publish_respects_filters() {
    let server = start().await;
    let (mut client, _) = connect_welcomed(server.local_addr).await;

    send_json(
        &mut client,
        json!({"kind": "subscribe", "payload": {"topic": "market_data", "instruments": ["SBER"]}}),
    )
    .await;
    let ack = next_json(&mut client).await;
    assert_eq!(ack["payload"]["instruments"], json!(["SBER"]));

    let scope = |instrument: &str| notify_hub::domain::Scope {
        instrument: Some(instrument.to_string()),
        account_id: None,
    };
    assert!(
        server
            .hub
            .publish_scoped(topic("market_data"), scope("GAZP"), market_tick(10))
            .await
            .is_ok()
    );
    assert!(
        server
            .hub
            .publish_scoped(topic("market_data"), scope("SBER"), market_tick(11))
            .await
            .is_ok()
    );

    let received = next_json(&mut client).await;
    assert_eq!(received["payload"]["seq"], 11);

    server.stop(WAIT).await;
}

#[tokio::test]
async fn rest_publish_and_health() {
    let server = start().await;
    let (mut client, _) = connect_welcomed(server.local_addr).await;
    subscribe(&mut client, "orders").await;

    let http = reqwest::Client::new();
    let base = format!("http://{}", server.local_addr);

    let Ok(resp) = http
        .post(format!("{base}/api/v1/topics/orders/publish"))
        .json(&json!({"kind": "order_update", "action": "filled", "payload": {"order_id": "o-9"}}))
        .send()
        .await
    else {
        panic!("publish request failed");
    };
    assert_eq!(resp.status().as_u16(), 202);

    let received = next_json(&mut client).await;
    assert_eq!(received["kind"], "order_update");
    assert_eq!(received["action"], "filled");
    assert_eq!(received["payload"]["order_id"], "o-9");

    let Ok(resp) = http
        .post(format!("{base}/api/v1/publish"))
        .json(&json!({"kind": "system", "payload": {}}))
        .send()
        .await
    else {
        panic!("publish request failed");
    };
    assert_eq!(resp.status().as_u16(), 400);

    let Ok(resp) = http.get(format!("{base}/health")).send().await else {
        panic!("health request failed");
    };
    assert_eq!(resp.status().as_u16(), 200);
    let Ok(health) = resp.json::<Value>().await else {
        panic!("health body is not json");
    };
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["websocket_hub"]["sessions"], 1);

    server.stop(WAIT).await;
}

#[tokio::test]
async fn silent_client_is_evicted() {
    let server = start_with(HubConfig {
        heartbeat_timeout: Duration::from_millis(400),
        ..HubConfig::default()
    })
    .await;
    let (_silent, _) = connect_welcomed(server.local_addr).await;
    wait_for_sessions(&server.hub, 1).await;

    // Never reading means never answering the server's ping.
    wait_for_sessions(&server.hub, 0).await;

    server.stop(WAIT).await;
}

#[tokio::test]
async fn chatty_client_outlives_the_deadline() {
    let server = start_with(HubConfig {
        heartbeat_timeout: Duration::from_millis(400),
        ..HubConfig::default()
    })
    .await;
    let (mut client, _) = connect_welcomed(server.local_addr).await;

    for _ in 0..12 {
        send_json(&mut client, json!({"kind": "ping"})).await;
        assert_eq!(next_json(&mut client).await["kind"], "pong");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let Ok(stats) = server.hub.stats().await else {
        panic!("hub should be running");
    };
    assert_eq!(stats.sessions, 1);

    server.stop(WAIT).await;
}

#[tokio::test]
async fn disconnect_unregisters_session() {
    let server = start().await;
    let (mut client, _) = connect_welcomed(server.local_addr).await;
    wait_for_sessions(&server.hub, 1).await;

    if let Err(e) = client.close(None).await {
        panic!("close failed: {e}");
    }
    wait_for_sessions(&server.hub, 0).await;

    server.stop(WAIT).await;
}

#[tokio::test]
async fn shutdown_closes_connections() {
    let server = start().await;
    let (mut client, _) = connect_welcomed(server.local_addr).await;

    server.stop(WAIT).await;

    let ended = tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "client was not disconnected on shutdown");
}
