use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use strum::Display;

use super::device::Device;

/// Entity platform, mirroring Home Assistant's platform names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Number,
    Sensor,
}

/// Device class of an entity, where one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Battery,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberMode {
    Slider,
}

/// Bounds and presentation of a number entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumberRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub mode: NumberMode,
}

impl NumberRange {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Static description of an entity. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInfo {
    pub entity_id: String,
    pub unique_id: String,
    pub name: String,
    pub platform: Platform,
    /// Device this entity belongs to
    pub device_id: String,
    pub icon: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    pub entity_category: Option<EntityCategory>,
    pub unit_of_measurement: Option<&'static str>,
    pub enabled_by_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<NumberRange>,
}

/// Object part of an entity id: lowercase, `-` mapped to `_`
///
/// Ids that normalize to the same object id collide in the engine.
pub fn object_id(unique_id: &str) -> String {
    unique_id.replace('-', "_").to_lowercase()
}

/// Displayed value of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntityValue {
    #[default]
    Unknown,
    Number(f64),
    Percentage(u8),
    Timestamp(DateTime<Utc>),
}

/// Mutable state of an entity, as published by its integration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub available: bool,
    pub value: EntityValue,
}

/// Everything the engine knows about one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    pub info: EntityInfo,
    /// `None` until the integration publishes the first state
    pub state: Option<EntityState>,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: BTreeMap<String, EntityRecord>,
    pub devices: BTreeMap<String, Device>,
}

impl State {
    pub fn entity(&self, entity_id: &str) -> Option<&EntityRecord> {
        self.entities.get(entity_id)
    }
}
