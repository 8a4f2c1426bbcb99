use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tracing::debug;

use super::client::MozartClient;
use super::dispatcher::DeviceNotification;
use super::dispatcher::Dispatcher;
use super::dispatcher::Topic;
use super::entity::BangOlufsenEntity;
use super::error::Error;
use super::error::Result;
use super::link::DeviceLink;
use super::number::Adjustment;
use super::number::AdjustmentNumber;
use super::number::AdjustmentRequest;
use super::sensor::BatterySensor;
use super::sensor::BatterySensorKind;
use crate::config::BangOlufsenDeviceConfig;
use crate::engine::Device;
use crate::engine::EntityInfo;
use crate::engine::EntityState;

/// Build the entity set for one speaker
///
/// Every speaker gets bass and treble numbers; battery powered speakers also
/// get level, charging time and playing time sensors.
pub fn device_entities(
    config: &BangOlufsenDeviceConfig,
    client: Arc<dyn MozartClient>,
) -> Vec<Box<dyn BangOlufsenEntity>> {
    let link = || DeviceLink::new(config, client.clone());

    let mut entities: Vec<Box<dyn BangOlufsenEntity>> = vec![
        Box::new(AdjustmentNumber::new(link(), Adjustment::Bass)),
        Box::new(AdjustmentNumber::new(link(), Adjustment::Treble)),
    ];

    if config.battery {
        for kind in [
            BatterySensorKind::Level,
            BatterySensorKind::ChargingTime,
            BatterySensorKind::PlayingTime,
        ] {
            entities.push(Box::new(BatterySensor::new(link(), kind)));
        }
    }

    entities
}

/// What the engine needs to know about a freshly attached entity
#[derive(Debug, Clone)]
pub struct Attached {
    pub info: EntityInfo,
    pub state: EntityState,
    pub device: Device,
}

/// Attached entities of the integration and the dispatcher routing to them
#[derive(Default)]
pub struct BangOlufsenPlatform {
    dispatcher: Dispatcher,
    entities: BTreeMap<String, Box<dyn BangOlufsenEntity>>,
}

impl BangOlufsenPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an entity: subscribe it to its topics and take ownership of it
    ///
    /// An entity with the same id is detached and replaced.
    pub fn add_entity(&mut self, mut entity: Box<dyn BangOlufsenEntity>) -> Attached {
        let entity_id = entity.entity_id().to_string();
        self.remove_entity(&entity_id);

        entity.attach(&mut self.dispatcher);
        let attached = Attached {
            info: entity.info().clone(),
            state: entity.state(),
            device: entity.link().device(),
        };
        self.entities.insert(entity_id, entity);
        attached
    }

    /// Detach and drop an entity. Returns false if it was not attached.
    pub fn remove_entity(&mut self, entity_id: &str) -> bool {
        match self.entities.remove(entity_id) {
            Some(mut entity) => {
                let dropped = entity.detach(&mut self.dispatcher);
                debug!("Detached {} ({} subscriptions)", entity_id, dropped);
                true
            }
            None => false,
        }
    }

    /// Detach every entity, returning their ids
    pub fn remove_all(&mut self) -> Vec<String> {
        let ids: Vec<String> = self.entities.keys().cloned().collect();
        for id in &ids {
            self.remove_entity(id);
        }
        ids
    }

    /// Route a notification to the entities subscribed to its topic
    ///
    /// Returns the new state of every entity that changed, to be published.
    pub fn dispatch(
        &mut self,
        notification: &DeviceNotification,
        now: DateTime<Utc>,
    ) -> Vec<(String, EntityState)> {
        let topic = Topic::new(
            notification.serial.clone(),
            notification.notification.kind(),
        );
        let subscribers: Vec<String> = self
            .dispatcher
            .subscribers(&topic)
            .map(str::to_string)
            .collect();

        debug!("{} -> {} subscriber(s)", topic, subscribers.len());

        let mut changed = Vec::new();
        for entity_id in subscribers {
            let Some(entity) = self.entities.get_mut(&entity_id) else {
                continue;
            };
            if entity.handle(&notification.notification, now) {
                changed.push((entity_id, entity.state()));
            }
        }
        changed
    }

    /// Validate a user write and pair the vendor request with its client
    ///
    /// The caller sends the request without holding on to the platform.
    pub fn write_request(
        &self,
        entity_id: &str,
        value: f64,
    ) -> Result<(Arc<dyn MozartClient>, AdjustmentRequest)> {
        let entity = self
            .entities
            .get(entity_id)
            .ok_or_else(|| Error::UnknownEntity(entity_id.to_string()))?;

        let number = entity
            .as_number()
            .ok_or_else(|| Error::NotWritable(entity_id.to_string()))?;

        let request = number.request(value)?;
        Ok((number.link().client(), request))
    }

    #[cfg(test)]
    pub fn entity(&self, entity_id: &str) -> Option<&dyn BangOlufsenEntity> {
        self.entities.get(entity_id).map(|e| e.as_ref())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
