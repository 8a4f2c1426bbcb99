use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::client::MozartClient;
use super::dispatcher::DeviceNotification;
use super::listener::WebSocketListener;
use super::platform::BangOlufsenPlatform;
use super::platform::device_entities;
use crate::config::BangOlufsenDeviceConfig;
use crate::engine::CommandError;
use crate::engine::EntityState;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;

/// Capacity for the listener→integration notification channel
const NOTIFICATION_CHANNEL_SIZE: usize = 64;

/// A configured speaker: its settings, its API client and its push listener
pub struct BangOlufsenDevice {
    pub config: BangOlufsenDeviceConfig,
    pub client: Arc<dyn MozartClient>,
    /// Devices without a listener only receive injected notifications
    pub listener: Option<WebSocketListener>,
}

/// Bang & Olufsen Integration for beohearth
///
/// Exposes bass/treble numbers and battery sensors for Mozart platform
/// speakers, mirroring pushed notifications into entity state.
pub struct BangOlufsenIntegration {
    name: String,
    devices: Vec<BangOlufsenDevice>,
    platform: Arc<Mutex<BangOlufsenPlatform>>,
    to_engine: Option<FromIntegrationSender>,
    notifications: Option<mpsc::Sender<DeviceNotification>>,
    /// Notification processing and listener tasks
    tasks: Vec<JoinHandle<()>>,
}

impl BangOlufsenIntegration {
    pub fn new(name: String, devices: Vec<BangOlufsenDevice>) -> Self {
        Self {
            name,
            devices,
            platform: Arc::new(Mutex::new(BangOlufsenPlatform::new())),
            to_engine: None,
            notifications: None,
            tasks: Vec::new(),
        }
    }

    /// Sender feeding the notification router; `None` before setup
    pub fn notification_sender(&self) -> Option<mpsc::Sender<DeviceNotification>> {
        self.notifications.clone()
    }

    /// Route notifications to entities and publish what changed
    ///
    /// This is spawned as a separate tokio task in setup() so that
    /// handle_message() can process commands concurrently.
    async fn process_notifications_task(
        platform: Arc<Mutex<BangOlufsenPlatform>>,
        mut rx: mpsc::Receiver<DeviceNotification>,
        to_engine: FromIntegrationSender,
    ) {
        while let Some(notification) = rx.recv().await {
            debug!(
                "Notification from {}: {:?}",
                notification.serial,
                notification.notification.kind()
            );

            let changed = {
                let mut platform = platform.lock().await;
                platform.dispatch(&notification, Utc::now())
            };

            for (entity_id, state) in changed {
                Self::report_state_change_static(entity_id, state, &to_engine).await;
            }
        }
    }

    /// Report a state change to the engine (static version)
    async fn report_state_change_static(
        entity_id: String,
        state: EntityState,
        to_engine: &FromIntegrationSender,
    ) {
        let msg = FromIntegrationMessage::EntityStateChanged { entity_id, state };
        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send EntityStateChanged message: {}", e);
        }
    }

    /// Validate a write, then send it to the device
    ///
    /// The platform lock is released before the device call is awaited.
    async fn set_number(&self, entity_id: &str, value: f64) -> super::error::Result<()> {
        let (client, request) = {
            let platform = self.platform.lock().await;
            platform.write_request(entity_id, value)?
        };

        request.send(client.as_ref()).await?;
        info!("Sent {:?} for {}", request, entity_id);
        Ok(())
    }
}

#[async_trait]
impl Integration for BangOlufsenIntegration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        self.to_engine = Some(tx.clone());

        // Attach every entity and register it with the engine
        for device in &self.devices {
            info!(
                "[{}] Setting up {} ({})",
                self.name, device.config.name, device.config.serial
            );

            for entity in device_entities(&device.config, device.client.clone()) {
                let attached = self.platform.lock().await.add_entity(entity);
                let entity_id = attached.info.entity_id.clone();

                let discovered = FromIntegrationMessage::EntityDiscovered {
                    entity_id: entity_id.clone(),
                    integration_name: self.name.clone(),
                    info: attached.info,
                    device: attached.device,
                };
                if let Err(e) = tx.send(discovered).await {
                    warn!("Failed to send EntityDiscovered message: {}", e);
                    continue;
                }

                Self::report_state_change_static(entity_id, attached.state, &tx).await;
            }
        }

        {
            let platform = self.platform.lock().await;
            if platform.is_empty() {
                warn!("[{}] No devices configured", self.name);
            }
            info!(
                "[{}] {} entities attached with {} subscriptions",
                self.name,
                platform.len(),
                platform.dispatcher().len()
            );
        }

        // Spawn background task to route notifications
        let (notifications_tx, notifications_rx) = mpsc::channel(NOTIFICATION_CHANNEL_SIZE);
        let platform = self.platform.clone();
        self.tasks.push(tokio::spawn(Self::process_notifications_task(
            platform,
            notifications_rx,
            tx,
        )));

        for device in &mut self.devices {
            if let Some(listener) = device.listener.take() {
                self.tasks.push(tokio::spawn(listener.run(notifications_tx.clone())));
            }
        }
        self.notifications = Some(notifications_tx);

        info!("[{}] Integration ready to handle commands", self.name);
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::SetNumber {
                entity_id,
                value,
                reply,
            } => {
                info!("Handling set value for {}: {}", entity_id, value);
                let outcome = self
                    .set_number(&entity_id, value)
                    .await
                    .map_err(CommandError::from);

                let _ = reply.send(outcome.clone());
                outcome.map_err(|e| Box::new(e) as Box<dyn Error + Send>)
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("[{}] Integration shutting down", self.name);

        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.notifications = None;

        let removed = self.platform.lock().await.remove_all();
        if let Some(tx) = &self.to_engine {
            for entity_id in removed {
                if let Err(e) = tx.send(FromIntegrationMessage::EntityRemoved { entity_id }).await {
                    warn!("Failed to send EntityRemoved message: {}", e);
                }
            }
        }

        Ok(())
    }
}
