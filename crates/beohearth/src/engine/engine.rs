use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::IntegrationContext;
use super::integration::ToIntegrationSender;
use super::message::CommandError;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::EntityRecord;
use super::state::State;

/// beohearth engine
///
/// This structure handles the flow of events, sending commands to the
/// correct integration, and maintaining a view of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> integration name for routing messages
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every factory in the integration registry; factories return
    /// `None` when their section of the config is absent.
    pub fn register_integrations_from_config(&mut self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&mut self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        if let Ok(channels) = self.integration_channels.get_mut() {
            channels.insert(name.clone(), to_integration_tx);
        }

        // Spawn integration task
        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        if let Ok(handles) = self.integration_handles.get_mut() {
            handles.push(handle);
        }
    }

    /// Send a command to an integration
    ///
    /// Routes the command to the appropriate integration based on entity_id
    /// and returns the name of that integration.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<String, CommandError> {
        let entity_id = msg.entity_id().to_string();

        // Route to the integration that owns this entity
        let integration_name = self
            .entity_integration_map
            .lock()
            .ok()
            .and_then(|map| map.get(&entity_id).cloned())
            .ok_or_else(|| CommandError::UnknownEntity(entity_id.clone()))?;

        let channels = self
            .integration_channels
            .lock()
            .map_err(|_| CommandError::IntegrationUnavailable(integration_name.clone()))?;

        let tx = channels
            .get(&integration_name)
            .ok_or_else(|| CommandError::IntegrationUnavailable(integration_name.clone()))?;

        tx.send(msg)
            .map_err(|_| CommandError::IntegrationUnavailable(integration_name.clone()))?;

        Ok(integration_name)
    }

    /// Set the value of a number entity and wait for the integration's verdict
    ///
    /// Success means the device accepted the write; the displayed value
    /// follows once the device reports the new setting back.
    pub async fn set_number_value(&self, entity_id: &str, value: f64) -> Result<(), CommandError> {
        let (reply, outcome) = oneshot::channel();
        let integration_name = self.send_command(ToIntegrationMessage::SetNumber {
            entity_id: entity_id.to_string(),
            value,
            reply,
        })?;

        outcome
            .await
            .map_err(|_| CommandError::IntegrationUnavailable(integration_name))?
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Close every command channel and wait for the integrations to shut down
    ///
    /// `run()` must still be polled while this is awaited so that the
    /// removals reported during shutdown are consumed.
    pub async fn shutdown(&self) {
        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.clear();
        }

        let handles = match self.integration_handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => Vec::new(),
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task ended abnormally: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Handle an event from an integration
    fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                integration_name,
                info,
                device,
            } => {
                info!(
                    "Entity discovered: {} (from {})",
                    entity_id, integration_name
                );

                {
                    let mut state = State::clone(&self.state.load());
                    state
                        .devices
                        .entry(device.id.clone())
                        .or_insert(device)
                        .add_entity(entity_id.clone());
                    // State is not populated until the first state-change message arrives.
                    state
                        .entities
                        .insert(entity_id.clone(), EntityRecord { info, state: None });
                    self.state.store(Arc::new(state));
                }

                // Record which integration owns this entity for command routing.
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.insert(entity_id, integration_name);
                }
            }
            FromIntegrationMessage::EntityRemoved { entity_id } => {
                info!("Entity removed: {}", entity_id);

                {
                    let mut state = State::clone(&self.state.load());
                    if let Some(record) = state.entities.remove(&entity_id) {
                        let device_id = record.info.device_id;
                        let now_empty = match state.devices.get_mut(&device_id) {
                            Some(device) => {
                                device.remove_entity(&entity_id);
                                device.entity_ids.is_empty()
                            }
                            None => false,
                        };
                        if now_empty {
                            state.devices.remove(&device_id);
                        }
                    }
                    self.state.store(Arc::new(state));
                }

                // Remove from routing map
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.remove(&entity_id);
                }
            }
            FromIntegrationMessage::EntityStateChanged { entity_id, state: entity_state } => {
                debug!(
                    "Entity state changed: {} -> available={}, value={:?}",
                    entity_id, entity_state.available, entity_state.value
                );

                let mut state = State::clone(&self.state.load());
                match state.entities.get_mut(&entity_id) {
                    Some(record) => {
                        record.state = Some(entity_state);
                        self.state.store(Arc::new(state));
                    }
                    None => warn!("State change for unknown entity: {}", entity_id),
                }
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::engine::device::Device;
    use crate::engine::state::EntityInfo;
    use crate::engine::state::EntityState;
    use crate::engine::state::EntityValue;
    use crate::engine::state::Platform;

    fn info(entity_id: &str) -> EntityInfo {
        EntityInfo {
            entity_id: entity_id.to_string(),
            unique_id: "1234-bass".to_string(),
            name: "Kitchen Bass".to_string(),
            platform: Platform::Number,
            device_id: "1234".to_string(),
            icon: Some("mdi:equalizer"),
            device_class: None,
            state_class: None,
            entity_category: None,
            unit_of_measurement: None,
            enabled_by_default: true,
            number: None,
        }
    }

    fn discovered(entity_id: &str, integration_name: &str) -> FromIntegrationMessage {
        FromIntegrationMessage::EntityDiscovered {
            entity_id: entity_id.to_string(),
            integration_name: integration_name.to_string(),
            info: info(entity_id),
            device: Device::new("1234".to_string(), "Kitchen".to_string()),
        }
    }

    /// Integration that answers every SetNumber with a fixed result
    struct EchoIntegration {
        outcome: Result<(), CommandError>,
    }

    #[async_trait]
    impl Integration for EchoIntegration {
        fn name(&self) -> &str {
            "echo"
        }

        async fn setup(&mut self, _tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }

        async fn handle_message(
            &mut self,
            msg: ToIntegrationMessage,
        ) -> Result<(), Box<dyn Error + Send>> {
            match msg {
                ToIntegrationMessage::SetNumber { reply, .. } => {
                    let _ = reply.send(self.outcome.clone());
                }
            }
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }
    }

    #[test]
    fn test_discovery_then_state_change() {
        let engine = Engine::new();
        engine.handle_event(discovered("number.1234_bass", "bang_olufsen"));

        let snapshot = engine.state_snapshot();
        let record = snapshot.entity("number.1234_bass").unwrap();
        assert_eq!(record.state, None);
        assert_eq!(
            snapshot.devices["1234"].entity_ids,
            vec!["number.1234_bass".to_string()]
        );

        engine.handle_event(FromIntegrationMessage::EntityStateChanged {
            entity_id: "number.1234_bass".to_string(),
            state: EntityState {
                available: true,
                value: EntityValue::Number(3.0),
            },
        });

        let snapshot = engine.state_snapshot();
        let state = snapshot.entity("number.1234_bass").unwrap().state.clone();
        assert_eq!(
            state,
            Some(EntityState {
                available: true,
                value: EntityValue::Number(3.0)
            })
        );
    }

    #[test]
    fn test_state_change_for_unknown_entity_is_ignored() {
        let engine = Engine::new();
        engine.handle_event(FromIntegrationMessage::EntityStateChanged {
            entity_id: "number.missing".to_string(),
            state: EntityState {
                available: false,
                value: EntityValue::Unknown,
            },
        });
        assert!(engine.state_snapshot().entities.is_empty());
    }

    #[test]
    fn test_entity_removed_drops_device_when_empty() {
        let engine = Engine::new();
        engine.handle_event(discovered("number.1234_bass", "bang_olufsen"));
        engine.handle_event(FromIntegrationMessage::EntityRemoved {
            entity_id: "number.1234_bass".to_string(),
        });

        let snapshot = engine.state_snapshot();
        assert!(snapshot.entities.is_empty());
        assert!(snapshot.devices.is_empty());

        let (reply, _rx) = oneshot::channel();
        let err = engine
            .send_command(ToIntegrationMessage::SetNumber {
                entity_id: "number.1234_bass".to_string(),
                value: 1.0,
                reply,
            })
            .unwrap_err();
        assert_eq!(err, CommandError::UnknownEntity("number.1234_bass".to_string()));
    }

    #[tokio::test]
    async fn test_set_number_value_unknown_entity() {
        let engine = Engine::new();
        let err = engine.set_number_value("number.nope", 1.0).await.unwrap_err();
        assert_eq!(err, CommandError::UnknownEntity("number.nope".to_string()));
    }

    #[tokio::test]
    async fn test_set_number_value_routes_to_owner() {
        let mut engine = Engine::new();
        engine.register_integration("echo".to_string(), Box::new(EchoIntegration { outcome: Ok(()) }));
        engine.handle_event(discovered("number.1234_bass", "echo"));

        engine.set_number_value("number.1234_bass", 2.0).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_number_value_surfaces_integration_error() {
        let mut engine = Engine::new();
        engine.register_integration(
            "echo".to_string(),
            Box::new(EchoIntegration {
                outcome: Err(CommandError::Device("timeout".to_string())),
            }),
        );
        engine.handle_event(discovered("number.1234_bass", "echo"));

        let err = engine
            .set_number_value("number.1234_bass", 2.0)
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::Device("timeout".to_string()));
    }

    #[tokio::test]
    async fn test_shutdown_closes_channels() {
        let mut engine = Engine::new();
        engine.register_integration("echo".to_string(), Box::new(EchoIntegration { outcome: Ok(()) }));
        engine.handle_event(discovered("number.1234_bass", "echo"));

        engine.shutdown().await;

        let err = engine
            .set_number_value("number.1234_bass", 2.0)
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::IntegrationUnavailable("echo".to_string()));
    }
}
