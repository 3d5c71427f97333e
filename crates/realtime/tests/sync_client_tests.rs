use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use skillforge_rust_realtime::{ClientCommand, ConnectionState, SyncClient, SyncClientOptions};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Mock push server: accepts one websocket connection, reports every
/// received command frame, and forwards frames it is told to push.
async fn start_mock_server() -> (
    std::net::SocketAddr,
    mpsc::Receiver<serde_json::Value>,
    mpsc::Sender<serde_json::Value>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().expect("local_addr failed");
    let (seen_tx, seen_rx) = mpsc::channel::<serde_json::Value>(32);
    let (push_tx, mut push_rx) = mpsc::channel::<serde_json::Value>(32);

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        loop {
            tokio::select! {
                inbound = ws.next() => {
                    match inbound {
                        Some(Ok(msg)) if msg.is_text() => {
                            let value: serde_json::Value =
                                serde_json::from_str(msg.to_text().unwrap()).unwrap();
                            if value["event"] == "ping" {
                                let pong = json!({"event": "pong"});
                                if ws.send(pong.to_string().into()).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                            let _ = seen_tx.send(value).await;
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    }
                }
                outbound = push_rx.recv() => {
                    match outbound {
                        Some(frame) => {
                            if ws.send(frame.to_string().into()).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    });

    (addr, seen_rx, push_tx)
}

#[tokio::test]
async fn connect_then_disconnect_walks_connection_states() {
    let (addr, _seen, _push) = start_mock_server().await;
    let client = SyncClient::new(&format!("ws://{addr}"));
    let mut states = client.on_state_change();

    client.connect().await.expect("connect failed");
    assert_eq!(states.recv().await.unwrap(), ConnectionState::Connecting);
    assert_eq!(states.recv().await.unwrap(), ConnectionState::Connected);

    client.disconnect().await.expect("disconnect failed");
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn connect_to_dead_endpoint_fails_inline() {
    // Bind and drop so the port is very likely unoccupied.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = SyncClient::new(&format!("ws://{addr}"));
    assert!(client.connect().await.is_err());
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn join_room_sends_tagged_command_frame() {
    let (addr, mut seen, _push) = start_mock_server().await;
    let client = SyncClient::new(&format!("ws://{addr}"));
    client.connect().await.expect("connect failed");
    wait_for_connected(&client).await;

    client.join_room("course:c1").await.expect("join failed");
    let frame = timeout(Duration::from_secs(2), seen.recv())
        .await
        .expect("timed out waiting for join frame")
        .unwrap();
    assert_eq!(
        frame,
        json!({"event": "join_room", "payload": {"room": "course:c1"}})
    );

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn pushed_events_reach_the_consumer_and_pongs_do_not() {
    let (addr, _seen, push) = start_mock_server().await;
    let client = SyncClient::new(&format!("ws://{addr}"));
    let mut events = client.events().await.expect("first events() call");
    client.connect().await.expect("connect failed");
    wait_for_connected(&client).await;

    let frame = json!({
        "event": "notification_pushed",
        "payload": {
            "id": "n1",
            "kind": "system",
            "title": "hello",
            "body": "",
            "isRead": false,
            "createdAt": "2026-08-30T10:00:00Z",
            "updatedAt": "2026-08-30T10:00:00Z"
        }
    });
    push.send(frame.clone()).await.unwrap();

    let received = timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for pushed event")
        .unwrap();
    assert_eq!(received, frame);

    // The receiver is single-take.
    assert!(client.events().await.is_none());
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn commands_while_disconnected_report_not_connected() {
    let client = SyncClient::new("ws://127.0.0.1:1");
    let err = client
        .send_command(&ClientCommand::MarkAllNotificationsRead)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        skillforge_rust_realtime::SyncError::NotConnected
    ));
    // Room joins are deferred instead of failing.
    client.join_room("course:c1").await.expect("join defers");
}

#[tokio::test]
async fn reconnect_rejoins_tracked_rooms() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen) = mpsc::channel::<serde_json::Value>(32);

    // First connection: accept, swallow the join, then drop the socket.
    // Second connection: report every frame.
    tokio::spawn(async move {
        for session in 0..2 {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            if session == 0 {
                // Wait for the first join, then kill the connection.
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_text() {
                        break;
                    }
                }
                let _ = ws.close(None).await;
                continue;
            }
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_text() {
                    let value: serde_json::Value =
                        serde_json::from_str(msg.to_text().unwrap()).unwrap();
                    if value["event"] != "ping" {
                        let _ = seen_tx.send(value).await;
                    }
                }
            }
        }
    });

    let options = SyncClientOptions {
        reconnect_interval: 50,
        max_reconnect_interval: 200,
        ..Default::default()
    };
    let client = SyncClient::new_with_options(&format!("ws://{addr}"), options);
    client.connect().await.expect("connect failed");
    wait_for_connected(&client).await;
    client.join_room("course:c1").await.expect("join failed");

    // The server drops the first session; the client must come back and
    // re-join on its own.
    let rejoin = timeout(Duration::from_secs(5), seen.recv())
        .await
        .expect("timed out waiting for automatic re-join")
        .unwrap();
    assert_eq!(
        rejoin,
        json!({"event": "join_room", "payload": {"room": "course:c1"}})
    );

    client.disconnect().await.unwrap();
}

async fn wait_for_connected(client: &SyncClient) {
    timeout(Duration::from_secs(2), async {
        loop {
            if client.connection_state().await == ConnectionState::Connected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client never reached Connected");
}
