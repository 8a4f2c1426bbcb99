//! Type-safe message system for beohearth
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use tokio::sync::oneshot;

use super::device::Device;
use super::state::EntityInfo;
use super::state::EntityState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug)]
pub enum FromIntegrationMessage {
    /// An entity was set up and attached
    EntityDiscovered {
        entity_id: String,
        integration_name: String,
        info: EntityInfo,
        device: Device,
    },

    /// An entity was detached and should no longer be rendered
    EntityRemoved { entity_id: String },

    /// An entity published its current state
    EntityStateChanged {
        entity_id: String,
        state: EntityState,
    },
}

/// Reply channel for commands whose outcome the caller waits for
pub type CommandReply = oneshot::Sender<Result<(), CommandError>>;

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug)]
pub enum ToIntegrationMessage {
    /// Set the value of a number entity (user write)
    SetNumber {
        entity_id: String,
        value: f64,
        reply: CommandReply,
    },
}

impl ToIntegrationMessage {
    pub fn entity_id(&self) -> &str {
        match self {
            ToIntegrationMessage::SetNumber { entity_id, .. } => entity_id,
        }
    }
}

/// Why a command did not take effect
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("no integration found for entity: {0}")]
    UnknownEntity(String),

    #[error("integration {0} is not running")]
    IntegrationUnavailable(String),

    /// The integration refused the command before contacting the device
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The device (or the transport to it) failed the command
    #[error("device error: {0}")]
    Device(String),
}
