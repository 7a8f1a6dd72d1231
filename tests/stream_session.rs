//! End-to-end stream session tests against a local WebSocket server.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use companion_link::infrastructure::stream::{
    DeviceCommand, StatusMessage, StreamConfig, StreamObserver, StreamSession, StreamStatus,
};
use companion_link::ConnectionState;

#[derive(Debug)]
enum Event {
    Connection(bool),
    Status(StatusMessage),
    Frame(Bytes),
    Text(String),
}

struct ChannelObserver {
    tx: mpsc::UnboundedSender<Event>,
}

impl StreamObserver for ChannelObserver {
    fn on_connection_change(&mut self, connected: bool) {
        let _ = self.tx.send(Event::Connection(connected));
    }

    fn on_status(&mut self, status: StatusMessage) {
        let _ = self.tx.send(Event::Status(status));
    }

    fn on_frame(&mut self, frame: Bytes) {
        let _ = self.tx.send(Event::Frame(frame));
    }

    fn on_text(&mut self, text: String) {
        let _ = self.tx.send(Event::Text(text));
    }
}

fn observer() -> (ChannelObserver, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelObserver { tx }, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("observer channel closed")
}

async fn wait_for_state(
    rx: &mut watch::Receiver<StreamStatus>,
    wanted: ConnectionState,
) -> StreamStatus {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let status = rx.borrow_and_update();
                if status.state == wanted {
                    return status.clone();
                }
            }
            rx.changed().await.expect("status channel closed");
        }
    })
    .await
    .expect("timed out waiting for state")
}

const STATUS_JSON: &str = r#"{"batteryLevel":80,"isCharging":false,"network":{"signalDBM":-70,"channel":6},"uptime":120.5,"firmwareVersion":"1.2.0"}"#;

#[tokio::test]
async fn full_session_against_local_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (command_tx, command_rx) = oneshot::channel::<String>();

    // Scripted device: greet with status and a chunked frame, then echo back
    // whatever command arrives.
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();

        ws.send(Message::text(STATUS_JSON)).await.unwrap();
        ws.send(Message::text("hello")).await.unwrap();

        // One JPEG frame split across three binary messages
        ws.send(Message::binary(vec![0xFF, 0xD8, 0x01])).await.unwrap();
        ws.send(Message::binary(vec![0x02, 0x03])).await.unwrap();
        ws.send(Message::binary(vec![0x04, 0xFF, 0xD9])).await.unwrap();

        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let _ = command_tx.send(text.to_string());
                break;
            }
        }
    });

    let stream = StreamSession::spawn(StreamConfig::default());
    let (obs, mut events) = observer();
    stream.connect(&format!("ws://{addr}"), obs).unwrap();

    let mut status_rx = stream.watch_status();
    let status = wait_for_state(&mut status_rx, ConnectionState::Connected).await;
    assert_eq!(status.last_error, None);
    assert_eq!(status.reconnect_attempts, 0);

    assert!(matches!(next_event(&mut events).await, Event::Connection(true)));

    match next_event(&mut events).await {
        Event::Status(status) => {
            assert_eq!(status.battery_level, 80);
            assert_eq!(status.network.signal_dbm, -70);
        }
        other => panic!("expected status, got {other:?}"),
    }

    // Undecodable text degrades to a plain message, not an error
    match next_event(&mut events).await {
        Event::Text(text) => assert_eq!(text, "hello"),
        other => panic!("expected text, got {other:?}"),
    }
    assert_eq!(stream.status().last_error, None);

    match next_event(&mut events).await {
        Event::Frame(frame) => {
            assert_eq!(&frame[..], &[0xFF, 0xD8, 0x01, 0x02, 0x03, 0x04, 0xFF, 0xD9]);
        }
        other => panic!("expected frame, got {other:?}"),
    }

    stream
        .send_command(DeviceCommand::set_resolution(1280, 720))
        .unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), command_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, r#"{"action":"set_res","height":720,"width":1280}"#);

    stream.disconnect();
    assert!(matches!(
        next_event(&mut events).await,
        Event::Connection(false)
    ));
    assert_eq!(stream.status().state, ConnectionState::Disconnected);
    stream.shutdown();
}

#[tokio::test]
async fn dropped_transport_records_error_and_schedules_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();
        // Close immediately after the handshake
        ws.close(None).await.unwrap();
    });

    let stream = StreamSession::spawn(StreamConfig::default());
    let (obs, mut events) = observer();
    stream.connect(&format!("ws://{addr}"), obs).unwrap();

    let mut status_rx = stream.watch_status();
    wait_for_state(&mut status_rx, ConnectionState::Connected).await;
    assert!(matches!(next_event(&mut events).await, Event::Connection(true)));

    let status = wait_for_state(&mut status_rx, ConnectionState::Disconnected).await;
    assert!(status.last_error.is_some(), "drop reason must be recorded");
    assert_eq!(status.reconnect_attempts, 1);
    assert!(matches!(
        next_event(&mut events).await,
        Event::Connection(false)
    ));

    stream.shutdown();
}

#[tokio::test]
async fn connect_replaces_previous_observer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            // Hold the socket open until the client goes away
            while ws.next().await.is_some() {}
        }
    });

    let stream = StreamSession::spawn(StreamConfig::default());
    let (first, mut first_events) = observer();
    stream.connect(&format!("ws://{addr}"), first).unwrap();

    let mut status_rx = stream.watch_status();
    wait_for_state(&mut status_rx, ConnectionState::Connected).await;
    assert!(matches!(
        next_event(&mut first_events).await,
        Event::Connection(true)
    ));

    let (second, mut second_events) = observer();
    stream.connect(&format!("ws://{addr}"), second).unwrap();
    wait_for_state(&mut status_rx, ConnectionState::Connected).await;

    // Only the replacement observer hears from the new transport
    assert!(matches!(
        next_event(&mut second_events).await,
        Event::Connection(true)
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        first_events.try_recv().is_err(),
        "replaced observer must go silent"
    );

    stream.shutdown();
}
