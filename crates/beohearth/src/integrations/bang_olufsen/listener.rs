//! Push notifications from the speaker's WebSocket endpoint.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::dispatcher::DeviceNotification;
use super::dispatcher::Notification;
use super::dto::BatteryState;
use super::dto::SoundSettings;
use super::error::Result;
use crate::config::BangOlufsenDeviceConfig;

/// Envelope of every frame the device pushes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    event_type: String,
    #[serde(default)]
    event_data: serde_json::Value,
}

/// Decode a text frame into a notification
///
/// Returns `Ok(None)` for event types beohearth does not consume.
pub fn decode_notification(text: &str) -> Result<Option<Notification>> {
    let envelope: Envelope = serde_json::from_str(text)?;

    let notification = match envelope.event_type.as_str() {
        "WebSocketEventSoundSettings" => {
            Notification::SoundSettings(serde_json::from_value::<SoundSettings>(envelope.event_data)?)
        }
        "WebSocketEventBattery" => {
            Notification::Battery(serde_json::from_value::<BatteryState>(envelope.event_data)?)
        }
        other => {
            debug!("Ignoring notification type: {}", other);
            return Ok(None);
        }
    };

    Ok(Some(notification))
}

/// Keeps a WebSocket connection to one speaker and forwards its notifications
pub struct WebSocketListener {
    serial: String,
    url: String,
    reconnect_interval: Duration,
}

impl WebSocketListener {
    pub fn new(config: &BangOlufsenDeviceConfig) -> Self {
        Self {
            serial: config.serial.clone(),
            url: format!("ws://{}:{}/", config.host, config.websocket_port),
            reconnect_interval: Duration::from_secs(config.reconnect_interval_secs),
        }
    }

    /// Run until the receiving side of `tx` is dropped
    ///
    /// Publishes connection status on every connect and disconnect and
    /// reconnects after the configured interval.
    pub async fn run(self, tx: mpsc::Sender<DeviceNotification>) {
        loop {
            match self.listen(&tx).await {
                Ok(true) => info!("[{}] Notification stream closed", self.serial),
                Ok(false) => break,
                Err(e) => warn!("[{}] Notification stream error: {}", self.serial, e),
            }

            if !self.forward(&tx, Notification::ConnectionStatus(false)).await {
                break;
            }

            tokio::time::sleep(self.reconnect_interval).await;
        }

        debug!("[{}] Notification listener exiting", self.serial);
    }

    /// One connection's lifetime. `Ok(false)` means the receiver is gone.
    async fn listen(&self, tx: &mpsc::Sender<DeviceNotification>) -> Result<bool> {
        let (mut stream, _response) = connect_async(self.url.as_str()).await?;
        info!("[{}] Connected to {}", self.serial, self.url);

        if !self.forward(tx, Notification::ConnectionStatus(true)).await {
            return Ok(false);
        }

        while let Some(message) = stream.next().await {
            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            match decode_notification(&text) {
                Ok(Some(notification)) => {
                    if !self.forward(tx, notification).await {
                        return Ok(false);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("[{}] Skipping malformed notification: {}", self.serial, e),
            }
        }

        Ok(true)
    }

    async fn forward(&self, tx: &mpsc::Sender<DeviceNotification>, notification: Notification) -> bool {
        tx.send(DeviceNotification {
            serial: self.serial.clone(),
            notification,
        })
        .await
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::bang_olufsen::test_device_config;

    #[test]
    fn test_decode_sound_settings() {
        let text = r#"{
            "eventType": "WebSocketEventSoundSettings",
            "eventData": {"adjustments": {"bass": 2, "treble": -1}}
        }"#;

        let Some(Notification::SoundSettings(settings)) = decode_notification(text).unwrap() else {
            panic!("expected sound settings");
        };
        let adjustments = settings.adjustments.unwrap();
        assert_eq!(adjustments.bass, Some(2));
        assert_eq!(adjustments.treble, Some(-1));
    }

    #[test]
    fn test_decode_battery() {
        let text = r#"{
            "eventType": "WebSocketEventBattery",
            "eventData": {"batteryLevel": 64, "remainingPlayingTimeMinutes": 300}
        }"#;

        let notification = decode_notification(text).unwrap();
        assert_eq!(
            notification,
            Some(Notification::Battery(BatteryState {
                battery_level: Some(64),
                remaining_playing_time_minutes: Some(300),
                ..Default::default()
            }))
        );
    }

    #[test]
    fn test_decode_ignores_other_events() {
        let text = r#"{"eventType": "WebSocketEventVolume", "eventData": {"level": 30}}"#;
        assert_eq!(decode_notification(text).unwrap(), None);
    }

    #[test]
    fn test_decode_malformed() {
        assert!(decode_notification("not json").is_err());

        let wrong_shape = r#"{"eventType": "WebSocketEventBattery", "eventData": {"batteryLevel": "full"}}"#;
        assert!(decode_notification(wrong_shape).is_err());
    }

    #[test]
    fn test_listener_url() {
        let listener = WebSocketListener::new(&test_device_config());
        assert_eq!(listener.url, "ws://192.0.2.10:9339/");
        assert_eq!(listener.reconnect_interval, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unreachable_device_reports_disconnected() {
        let mut config = test_device_config();
        // Nothing listens on the discard port
        config.host = "127.0.0.1".to_string();
        config.websocket_port = 9;
        config.reconnect_interval_secs = 3600;

        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(WebSocketListener::new(&config).run(tx));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.serial, "1234");
        assert_eq!(first.notification, Notification::ConnectionStatus(false));

        task.abort();
    }
}
