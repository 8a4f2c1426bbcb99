use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use tracing::debug;

use super::dispatcher::Notification;
use super::dispatcher::NotificationKind;
use super::dto::BatteryState;
use super::entity::BangOlufsenEntity;
use super::entity::entity_id;
use super::link::DeviceLink;
use crate::engine::Entity;
use crate::engine::EntityInfo;
use crate::engine::EntityState;
use crate::engine::EntityValue;
use crate::engine::Platform;
use crate::engine::state::DeviceClass;
use crate::engine::state::StateClass;

/// What a battery sensor displays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatterySensorKind {
    /// Charge in percent
    Level,
    /// Estimated time the battery is full
    ChargingTime,
    /// Estimated time the battery runs out
    PlayingTime,
}

impl BatterySensorKind {
    fn key(self) -> &'static str {
        match self {
            BatterySensorKind::Level => "battery-level",
            BatterySensorKind::ChargingTime => "battery-charging-time",
            BatterySensorKind::PlayingTime => "battery-playing-time",
        }
    }

    fn label(self) -> &'static str {
        match self {
            BatterySensorKind::Level => "Battery level",
            BatterySensorKind::ChargingTime => "Battery charging time",
            BatterySensorKind::PlayingTime => "Battery playing time",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            BatterySensorKind::Level => "mdi:battery",
            BatterySensorKind::ChargingTime => "mdi:battery-arrow-up",
            BatterySensorKind::PlayingTime => "mdi:battery-arrow-down",
        }
    }

    fn device_class(self) -> DeviceClass {
        match self {
            BatterySensorKind::Level => DeviceClass::Battery,
            BatterySensorKind::ChargingTime | BatterySensorKind::PlayingTime => {
                DeviceClass::Timestamp
            }
        }
    }

    /// Value for this kind, or `None` when the payload lacks the field
    fn value(self, battery: &BatteryState, now: DateTime<Utc>) -> Option<EntityValue> {
        match self {
            BatterySensorKind::Level => battery.battery_level.map(EntityValue::Percentage),
            BatterySensorKind::ChargingTime => {
                estimate(now, battery.remaining_charging_time_minutes?)
            }
            BatterySensorKind::PlayingTime => {
                estimate(now, battery.remaining_playing_time_minutes?)
            }
        }
    }
}

/// `now + minutes`, recomputed on every notification
fn estimate(now: DateTime<Utc>, minutes: i64) -> Option<EntityValue> {
    let remaining = TimeDelta::try_minutes(minutes)?;
    now.checked_add_signed(remaining).map(EntityValue::Timestamp)
}

/// Battery level, charging time or playing time sensor
pub struct BatterySensor {
    info: EntityInfo,
    link: DeviceLink,
    kind: BatterySensorKind,
    value: EntityValue,
}

impl BatterySensor {
    pub fn new(link: DeviceLink, kind: BatterySensorKind) -> Self {
        let unique_id = format!("{}-{}", link.serial(), kind.key());
        let info = EntityInfo {
            entity_id: entity_id(Platform::Sensor, &unique_id),
            unique_id,
            name: format!("{} {}", link.name(), kind.label()),
            platform: Platform::Sensor,
            device_id: link.serial().to_string(),
            icon: Some(kind.icon()),
            device_class: Some(kind.device_class()),
            state_class: Some(StateClass::Measurement),
            entity_category: None,
            unit_of_measurement: (kind == BatterySensorKind::Level).then_some("%"),
            // Only the level is enabled by default
            enabled_by_default: kind == BatterySensorKind::Level,
            number: None,
        };

        Self {
            info,
            link,
            kind,
            value: EntityValue::Unknown,
        }
    }

    pub fn native_value(&self) -> EntityValue {
        self.value
    }
}

impl Entity for BatterySensor {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn state(&self) -> EntityState {
        EntityState {
            available: self.link.is_available(),
            value: self.native_value(),
        }
    }
}

impl BangOlufsenEntity for BatterySensor {
    fn link(&self) -> &DeviceLink {
        &self.link
    }

    fn link_mut(&mut self) -> &mut DeviceLink {
        &mut self.link
    }

    fn notification_kinds(&self) -> &'static [NotificationKind] {
        &[NotificationKind::Battery]
    }

    fn on_notification(&mut self, notification: &Notification, now: DateTime<Utc>) -> bool {
        let Notification::Battery(battery) = notification else {
            return false;
        };

        match self.kind.value(battery, now) {
            Some(value) => {
                self.value = value;
                true
            }
            None => {
                debug!(
                    "{}: battery state without {}, keeping {:?}",
                    self.info.entity_id,
                    self.kind.key(),
                    self.value
                );
                false
            }
        }
    }
}
