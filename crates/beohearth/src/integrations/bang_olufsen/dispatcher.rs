//! Typed notification routing.
//!
//! Topics are `(device unique id, notification kind)` pairs. The kind of a
//! notification is derived from its payload, so a payload can only ever be
//! delivered on the topic that matches its type.

use std::collections::HashMap;
use std::fmt;

use strum::Display;

use super::dto::BatteryState;
use super::dto::SoundSettings;

/// Kinds of notification an entity can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum NotificationKind {
    ConnectionStatus,
    SoundSettings,
    Battery,
}

/// A notification from a device, carrying the payload for its kind
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Whether the push connection to the device is up
    ConnectionStatus(bool),
    SoundSettings(SoundSettings),
    Battery(BatteryState),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::ConnectionStatus(_) => NotificationKind::ConnectionStatus,
            Notification::SoundSettings(_) => NotificationKind::SoundSettings,
            Notification::Battery(_) => NotificationKind::Battery,
        }
    }
}

/// A notification together with the device it came from
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceNotification {
    pub serial: String,
    pub notification: Notification,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub unique_id: String,
    pub kind: NotificationKind,
}

impl Topic {
    pub fn new(unique_id: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            unique_id: unique_id.into(),
            kind,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.unique_id, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    entity_id: String,
}

/// Topic → subscribed entities
#[derive(Debug, Default)]
pub struct Dispatcher {
    next_id: u64,
    topics: HashMap<Topic, Vec<Subscriber>>,
    /// Reverse index so a subscription can be dropped by id alone
    by_id: HashMap<SubscriptionId, Topic>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `entity_id` to `topic`
    pub fn connect(&mut self, topic: Topic, entity_id: &str) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        self.topics.entry(topic.clone()).or_default().push(Subscriber {
            id,
            entity_id: entity_id.to_string(),
        });
        self.by_id.insert(id, topic);
        id
    }

    /// Drop a subscription. Returns false if it was already gone.
    pub fn disconnect(&mut self, id: SubscriptionId) -> bool {
        let Some(topic) = self.by_id.remove(&id) else {
            return false;
        };

        if let Some(subscribers) = self.topics.get_mut(&topic) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                self.topics.remove(&topic);
            }
        }
        true
    }

    /// Entities subscribed to `topic`, in subscription order
    pub fn subscribers<'a>(&'a self, topic: &Topic) -> impl Iterator<Item = &'a str> + 'a {
        self.topics
            .get(topic)
            .into_iter()
            .flatten()
            .map(|s| s.entity_id.as_str())
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
