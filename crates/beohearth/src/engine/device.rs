use serde::Serialize;

/// A device in the beohearth system.
///
/// A device represents a physical speaker that contains one or more entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    /// `(domain, id)` pairs identifying the device across integrations
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub entity_ids: Vec<String>,
}

impl Device {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            identifiers: Vec::new(),
            name,
            manufacturer: None,
            model: None,
            entity_ids: Vec::new(),
        }
    }

    pub fn add_entity(&mut self, entity_id: String) {
        if !self.entity_ids.contains(&entity_id) {
            self.entity_ids.push(entity_id);
        }
    }

    pub fn remove_entity(&mut self, entity_id: &str) {
        self.entity_ids.retain(|id| id != entity_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_entity_is_idempotent() {
        let mut device = Device::new("1234".to_string(), "Kitchen".to_string());
        device.add_entity("number.1234_bass".to_string());
        device.add_entity("number.1234_bass".to_string());
        assert_eq!(device.entity_ids, vec!["number.1234_bass".to_string()]);

        device.remove_entity("number.1234_bass");
        assert!(device.entity_ids.is_empty());
    }
}
