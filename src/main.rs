use bytes::Bytes;
use tracing::{info, warn};

use companion_link::infrastructure::logging;
use companion_link::infrastructure::stream::{
    DeviceCommand, StatusMessage, StreamConfig, StreamObserver, StreamSession,
};
use companion_link::SettingsService;

/// Logs everything the stream delivers. Stands in for a UI layer.
struct ConsoleObserver;

impl StreamObserver for ConsoleObserver {
    fn on_connection_change(&mut self, connected: bool) {
        info!(connected, "Stream connection changed");
    }

    fn on_status(&mut self, status: StatusMessage) {
        info!(
            battery = status.battery_level,
            charging = status.is_charging,
            signal_dbm = status.network.signal_dbm,
            firmware = %status.firmware_version,
            "Device status"
        );
    }

    fn on_frame(&mut self, frame: Bytes) {
        info!(len = frame.len(), "Video frame");
    }

    fn on_text(&mut self, text: String) {
        info!(%text, "Device message");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();
    let _guard = logging::init_logger(&settings.log_settings)?;

    info!("Starting Companion Link");

    let stream = StreamSession::spawn(StreamConfig::from(&settings));
    stream.connect(&settings.stream_url, ConsoleObserver)?;

    // Poke the device once the link is up, then run until interrupted.
    let mut status_rx = stream.watch_status();
    tokio::spawn({
        let stream = stream.clone();
        async move {
            while status_rx.changed().await.is_ok() {
                let status = status_rx.borrow_and_update().clone();
                if status.state == companion_link::ConnectionState::Connected {
                    if let Err(e) = stream.send_command(DeviceCommand::request_status()) {
                        warn!(error = %e, "Status request failed");
                    }
                    break;
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    stream.disconnect();
    stream.shutdown();
    Ok(())
}
