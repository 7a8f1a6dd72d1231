//! WebSocket session for the camera device.
//!
//! One actor task owns the socket, the frame reassembler and the reconnect
//! policy. Commands arrive over mpsc; socket messages are handled on the same
//! task, so all state mutation is serialized. Observable status is published
//! through a `watch` channel and is safe to snapshot from any thread.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::domain::models::ConnectionState;
use crate::domain::settings::Settings;
use crate::infrastructure::stream::frame::FrameReassembler;
use crate::infrastructure::stream::protocol::{
    DeviceCommand, StatusMessage, FRAME_END, FRAME_START,
};
use crate::infrastructure::stream::reconnect::ReconnectPolicy;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Single subscriber for stream events. Registered on `connect`, replaced by
/// any later `connect`, cleared on `disconnect`.
pub trait StreamObserver: Send + 'static {
    fn on_connection_change(&mut self, connected: bool);
    fn on_status(&mut self, status: StatusMessage);
    /// A complete frame, JPEG markers included.
    fn on_frame(&mut self, frame: Bytes);
    /// Text that did not decode as a status message.
    fn on_text(&mut self, text: String);
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream URL `{0}`")]
    InvalidUrl(String),
    #[error("not connected")]
    NotConnected,
    #[error("session closed")]
    SessionClosed,
}

/// How binary payloads are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryMode {
    /// Concatenated JPEG stream; frames are reassembled across reads.
    #[default]
    Mjpeg,
    /// Each binary message carries one whole image.
    Whole,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub connect_timeout: Duration,
    pub mode: BinaryMode,
    pub max_reconnect_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            mode: BinaryMode::Mjpeg,
            max_reconnect_attempts: ReconnectPolicy::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl From<&Settings> for StreamConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            connect_timeout: Duration::from_millis(settings.stream_connect_timeout_ms),
            mode: BinaryMode::default(),
            max_reconnect_attempts: settings.reconnect_max_attempts,
        }
    }
}

/// Observable session status. Written only from the session task.
#[derive(Debug, Clone, Default)]
pub struct StreamStatus {
    pub state: ConnectionState,
    /// Replaced on each new error, cleared on successful connect.
    pub last_error: Option<String>,
    pub reconnect_attempts: u32,
}

enum StreamCommand {
    Connect {
        url: Url,
        observer: Box<dyn StreamObserver>,
    },
    Disconnect,
    Send(DeviceCommand),
}

/// Cloneable handle to a running [`StreamSession`] task.
#[derive(Clone)]
pub struct StreamSessionHandle {
    cmd_tx: mpsc::UnboundedSender<StreamCommand>,
    status_rx: watch::Receiver<StreamStatus>,
    cancel: CancellationToken,
}

impl StreamSessionHandle {
    /// Validates the URL and begins connecting. Any existing transport is
    /// torn down first; `observer` replaces any prior observer and the
    /// reconnect budget is restored.
    pub fn connect(
        &self,
        url: &str,
        observer: impl StreamObserver,
    ) -> Result<(), StreamError> {
        let parsed =
            Url::parse(url).map_err(|_| StreamError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(StreamError::InvalidUrl(url.to_string()));
        }
        self.cmd_tx
            .send(StreamCommand::Connect {
                url: parsed,
                observer: Box::new(observer),
            })
            .map_err(|_| StreamError::SessionClosed)
    }

    /// Tears down the transport and clears the observer. Idempotent.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(StreamCommand::Disconnect);
    }

    /// Fails fast when not connected -- commands are never queued for later.
    pub fn send_command(&self, command: DeviceCommand) -> Result<(), StreamError> {
        if self.status_rx.borrow().state != ConnectionState::Connected {
            return Err(StreamError::NotConnected);
        }
        self.cmd_tx
            .send(StreamCommand::Send(command))
            .map_err(|_| StreamError::SessionClosed)
    }

    pub fn status(&self) -> StreamStatus {
        self.status_rx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<StreamStatus> {
        self.status_rx.clone()
    }

    /// Stops the session task. The handle is unusable afterwards.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

pub struct StreamSession {
    config: StreamConfig,
    cmd_rx: mpsc::UnboundedReceiver<StreamCommand>,
    status_tx: watch::Sender<StreamStatus>,
    cancel: CancellationToken,
    observer: Option<Box<dyn StreamObserver>>,
    reconnect: ReconnectPolicy,
    reassembler: FrameReassembler,
    socket: Option<WsStream>,
    url: Option<Url>,
    reconnect_at: Option<Instant>,
}

impl StreamSession {
    pub fn spawn(config: StreamConfig) -> StreamSessionHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(StreamStatus::default());
        let cancel = CancellationToken::new();

        let session = Self {
            reconnect: ReconnectPolicy::new(config.max_reconnect_attempts),
            config,
            cmd_rx,
            status_tx,
            cancel: cancel.clone(),
            observer: None,
            reassembler: FrameReassembler::new(),
            socket: None,
            url: None,
            reconnect_at: None,
        };
        tokio::spawn(session.run());

        StreamSessionHandle {
            cmd_tx,
            status_rx,
            cancel,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(StreamCommand::Connect { url, observer }) => {
                        self.handle_connect(url, observer).await;
                    }
                    Some(StreamCommand::Disconnect) => self.handle_disconnect().await,
                    Some(StreamCommand::Send(command)) => self.handle_send(command).await,
                    None => break,
                },
                message = next_message(&mut self.socket) => self.handle_message(message),
                _ = tokio::time::sleep_until(self.reconnect_at.unwrap_or_else(Instant::now)),
                    if self.reconnect_at.is_some() =>
                {
                    self.reconnect_at = None;
                    self.try_connect().await;
                }
            }
        }

        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        debug!("Stream session task exiting");
    }

    async fn handle_connect(&mut self, url: Url, observer: Box<dyn StreamObserver>) {
        // At most one live transport per session
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        self.observer = Some(observer);
        self.url = Some(url);
        self.reconnect.reset();
        self.reconnect_at = None;
        self.reassembler = FrameReassembler::new();
        self.try_connect().await;
    }

    async fn handle_disconnect(&mut self) {
        self.reconnect_at = None;
        self.url = None;
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        let was_connected = self.status_tx.borrow().state == ConnectionState::Connected;
        if was_connected {
            if let Some(observer) = self.observer.as_mut() {
                observer.on_connection_change(false);
            }
        }
        self.observer = None;
        self.reconnect.reset();
        self.status_tx.send_modify(|s| {
            s.state = ConnectionState::Disconnected;
            s.reconnect_attempts = 0;
        });
        info!("Stream disconnected by request");
    }

    async fn handle_send(&mut self, command: DeviceCommand) {
        if self.socket.is_none()
            || self.status_tx.borrow().state != ConnectionState::Connected
        {
            self.set_error("Can't send command: not connected");
            return;
        }

        // Declaration order keeps the serialized keys sorted
        let json = match serde_json::to_string(&command) {
            Ok(json) => json,
            Err(e) => {
                self.set_error(format!("Encode failed: {e}"));
                return;
            }
        };

        if let Some(socket) = self.socket.as_mut() {
            debug!(%json, "Sending command");
            if let Err(e) = socket.send(Message::text(json)).await {
                self.connection_lost(format!("Send failed: {e}"));
            }
        }
    }

    async fn try_connect(&mut self) {
        let Some(url) = self.url.clone() else {
            return;
        };
        self.status_tx
            .send_modify(|s| s.state = ConnectionState::Connecting);
        info!(%url, "Connecting to device stream");

        match tokio::time::timeout(self.config.connect_timeout, connect_async(url.as_str()))
            .await
        {
            Ok(Ok((socket, _response))) => {
                self.socket = Some(socket);
                self.reconnect.reset();
                self.status_tx.send_replace(StreamStatus {
                    state: ConnectionState::Connected,
                    last_error: None,
                    reconnect_attempts: 0,
                });
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_connection_change(true);
                }
                info!("Device stream connected");
            }
            Ok(Err(e)) => self.connection_lost(format!("Connect failed: {e}")),
            Err(_) => self.connection_lost(format!(
                "Connect timed out after {:?}",
                self.config.connect_timeout
            )),
        }
    }

    fn handle_message(&mut self, message: Option<Result<Message, tungstenite::Error>>) {
        match message {
            Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
            Some(Ok(Message::Binary(data))) => self.handle_binary(data),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // tungstenite answers pings itself
                trace!("Stream ping/pong");
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(f) => format!("Disconnected ({}: {})", f.code, f.reason),
                    None => "Disconnected (no close frame payload)".to_string(),
                };
                self.connection_lost(reason);
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => self.connection_lost(format!("Stream error: {e}")),
            None => self.connection_lost("Stream ended".to_string()),
        }
    }

    fn handle_text(&mut self, text: &str) {
        let Some(observer) = self.observer.as_mut() else {
            return;
        };
        match serde_json::from_str::<StatusMessage>(text) {
            Ok(status) => {
                debug!(battery = status.battery_level, "Status message received");
                observer.on_status(status);
            }
            // Not a status payload; degrade to plain text rather than error
            Err(_) => observer.on_text(text.to_string()),
        }
    }

    fn handle_binary(&mut self, data: Bytes) {
        match self.config.mode {
            BinaryMode::Mjpeg => {
                self.reassembler.append(&data);
                while let Some(frame) = self.reassembler.extract_frame() {
                    trace!(len = frame.len(), "Frame reassembled");
                    if let Some(observer) = self.observer.as_mut() {
                        observer.on_frame(frame);
                    }
                }
            }
            BinaryMode::Whole => {
                let looks_like_jpeg = data.len() >= 4
                    && data[..2] == FRAME_START
                    && data[data.len() - 2..] == FRAME_END;
                if looks_like_jpeg {
                    if let Some(observer) = self.observer.as_mut() {
                        observer.on_frame(data);
                    }
                } else {
                    self.set_error("Invalid image data received");
                }
            }
        }
    }

    /// Transport dropped out from under us: record the reason and drive the
    /// reconnect policy. Only this path schedules reconnects.
    fn connection_lost(&mut self, reason: String) {
        let was_connected = self.status_tx.borrow().state == ConnectionState::Connected;
        self.socket = None;
        if was_connected {
            if let Some(observer) = self.observer.as_mut() {
                observer.on_connection_change(false);
            }
        }

        match self.reconnect.record_failure() {
            Some(delay) => {
                info!(reason, delay_secs = delay.as_secs(), "Scheduling reconnect");
                self.reconnect_at = Some(Instant::now() + delay);
            }
            None => {
                warn!(reason, "Reconnect attempts exhausted; waiting for explicit connect");
                self.reconnect_at = None;
            }
        }

        let attempts = self.reconnect.attempts();
        self.status_tx.send_replace(StreamStatus {
            state: ConnectionState::Disconnected,
            last_error: Some(reason),
            reconnect_attempts: attempts,
        });
    }

    fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "Stream error");
        self.status_tx
            .send_modify(|s| s.last_error = Some(message));
    }
}

async fn next_message(
    socket: &mut Option<WsStream>,
) -> Option<Result<Message, tungstenite::Error>> {
    match socket.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullObserver;

    impl StreamObserver for NullObserver {
        fn on_connection_change(&mut self, _connected: bool) {}
        fn on_status(&mut self, _status: StatusMessage) {}
        fn on_frame(&mut self, _frame: Bytes) {}
        fn on_text(&mut self, _text: String) {}
    }

    #[tokio::test]
    async fn connect_rejects_malformed_urls() {
        let handle = StreamSession::spawn(StreamConfig::default());
        assert!(matches!(
            handle.connect("not a url", NullObserver),
            Err(StreamError::InvalidUrl(_))
        ));
        assert!(matches!(
            handle.connect("http://example.com", NullObserver),
            Err(StreamError::InvalidUrl(_))
        ));
        handle.shutdown();
    }

    #[tokio::test]
    async fn send_command_fails_fast_when_disconnected() {
        let handle = StreamSession::spawn(StreamConfig::default());
        assert!(matches!(
            handle.send_command(DeviceCommand::request_status()),
            Err(StreamError::NotConnected)
        ));
        handle.shutdown();
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let handle = StreamSession::spawn(StreamConfig::default());
        handle.disconnect();
        handle.disconnect();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.status().state, ConnectionState::Disconnected);
        handle.shutdown();
    }
}
