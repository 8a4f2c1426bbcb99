use chrono::DateTime;
use chrono::Utc;

use super::dispatcher::Dispatcher;
use super::dispatcher::Notification;
use super::dispatcher::NotificationKind;
use super::link::DeviceLink;
use super::number::AdjustmentNumber;
use crate::engine::Entity;
use crate::engine::Platform;
use crate::engine::state::object_id;

/// Build the engine entity id from a platform and unique id,
/// e.g. `number` + `1234-bass` -> `number.1234_bass`
pub fn entity_id(platform: Platform, unique_id: &str) -> String {
    format!("{}.{}", platform, object_id(unique_id))
}

/// Entity driven by Bang & Olufsen device notifications
pub trait BangOlufsenEntity: Entity {
    fn link(&self) -> &DeviceLink;

    fn link_mut(&mut self) -> &mut DeviceLink;

    /// Notification kinds this entity listens to, besides connection status
    fn notification_kinds(&self) -> &'static [NotificationKind];

    /// Apply a payload notification. Returns whether the state changed.
    fn on_notification(&mut self, notification: &Notification, now: DateTime<Utc>) -> bool;

    /// Writable entities expose themselves as numbers
    fn as_number(&self) -> Option<&AdjustmentNumber> {
        None
    }

    /// Subscribe to this entity's topics. Attaching twice is a no-op.
    fn attach(&mut self, dispatcher: &mut Dispatcher) {
        if self.link().is_attached() {
            return;
        }
        let entity_id = self.entity_id().to_string();
        let kinds = self.notification_kinds();
        self.link_mut().attach(dispatcher, &entity_id, kinds);
    }

    /// Drop every subscription this entity holds
    fn detach(&mut self, dispatcher: &mut Dispatcher) -> usize {
        self.link_mut().detach(dispatcher)
    }

    /// Handle a routed notification. Returns whether state should be published.
    fn handle(&mut self, notification: &Notification, now: DateTime<Utc>) -> bool {
        match notification {
            Notification::ConnectionStatus(available) => {
                self.link_mut().set_available(*available);
                true
            }
            other => self.on_notification(other, now),
        }
    }
}
