use std::sync::Arc;

use super::DOMAIN;
use super::client::MozartClient;
use super::dispatcher::Dispatcher;
use super::dispatcher::NotificationKind;
use super::dispatcher::SubscriptionId;
use super::dispatcher::Topic;
use crate::config::BangOlufsenDeviceConfig;
use crate::engine::Device;

const MANUFACTURER: &str = "Bang & Olufsen";

/// Per-entity view of the speaker it belongs to
///
/// Holds the device identity, the vendor client, the availability flag and
/// the subscriptions the entity currently holds.
pub struct DeviceLink {
    serial: String,
    name: String,
    model: Option<String>,
    client: Arc<dyn MozartClient>,
    available: bool,
    subscriptions: Vec<SubscriptionId>,
}

impl DeviceLink {
    pub fn new(config: &BangOlufsenDeviceConfig, client: Arc<dyn MozartClient>) -> Self {
        Self {
            serial: config.serial.clone(),
            name: config.name.clone(),
            model: config.model.clone(),
            client,
            available: true,
            subscriptions: Vec::new(),
        }
    }

    /// Device unique id; prefix of every topic and entity unique id
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> Arc<dyn MozartClient> {
        self.client.clone()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Subscribe `entity_id` to connection status plus `kinds` on this device
    pub fn attach(
        &mut self,
        dispatcher: &mut Dispatcher,
        entity_id: &str,
        kinds: &[NotificationKind],
    ) {
        let kinds = std::iter::once(NotificationKind::ConnectionStatus).chain(kinds.iter().copied());

        for kind in kinds {
            let id = dispatcher.connect(Topic::new(self.serial.clone(), kind), entity_id);
            self.subscriptions.push(id);
        }
    }

    /// Drop every subscription held. Returns how many were dropped.
    pub fn detach(&mut self, dispatcher: &mut Dispatcher) -> usize {
        self.subscriptions
            .drain(..)
            .filter(|id| dispatcher.disconnect(*id))
            .count()
    }

    /// Device registry entry for this speaker
    pub fn device(&self) -> Device {
        let mut device = Device::new(self.serial.clone(), self.name.clone());
        device.identifiers = vec![(DOMAIN.to_string(), self.serial.clone())];
        device.manufacturer = Some(MANUFACTURER.to_string());
        device.model = self.model.clone();
        device
    }
}
