/// Entity abstraction for beohearth
///
/// All entities (numbers, sensors, etc.) implement the Entity trait.
use super::state::EntityInfo;
use super::state::EntityState;

/// Base trait that all entities must implement
pub trait Entity: Send + Sync {
    /// Static description, reported to the engine on discovery
    fn info(&self) -> &EntityInfo;

    /// Current availability and displayed value
    fn state(&self) -> EntityState;

    fn entity_id(&self) -> &str {
        &self.info().entity_id
    }
}
