mod device;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod engine;
mod entity;
mod integration;
mod message;
pub mod state;

pub use device::Device;
pub use engine::Engine;
pub use entity::Entity;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use message::CommandError;
pub use message::FromIntegrationMessage;
pub use message::ToIntegrationMessage;
pub use state::EntityInfo;
pub use state::EntityRecord;
pub use state::EntityState;
pub use state::EntityValue;
pub use state::Platform;
pub use state::State;
