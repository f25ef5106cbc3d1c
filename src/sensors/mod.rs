//! Sensor model: which sensors exist, which alarm modes they escalate
//! against, and how their zigbee2mqtt payloads are read.

pub mod catalog;
pub mod interpreter;

pub use catalog::SensorCatalog;
pub use interpreter::{Interpretation, SensorEventInterpreter, SensorKind};

/// Derive the sensor id from a message topic by stripping the configured
/// wildcard prefix.
///
/// Returns `None` when the topic is outside the prefix or does not name a
/// single topic level below it (e.g. `zigbee2mqtt/door1/availability`).
pub fn sensor_id_from_topic<'a>(topic: &'a str, wildcard_prefix: &str) -> Option<&'a str> {
    let id = topic.strip_prefix(wildcard_prefix)?;
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_id_from_topic() {
        assert_eq!(
            sensor_id_from_topic("zigbee2mqtt/door1", "zigbee2mqtt/"),
            Some("door1")
        );
        assert_eq!(
            sensor_id_from_topic("zigbee2mqtt/Hall Motion", "zigbee2mqtt/"),
            Some("Hall Motion")
        );
    }

    #[test]
    fn test_sensor_id_from_foreign_topic() {
        assert_eq!(sensor_id_from_topic("other/door1", "zigbee2mqtt/"), None);
        assert_eq!(sensor_id_from_topic("zigbee2mqtt/", "zigbee2mqtt/"), None);
        assert_eq!(
            sensor_id_from_topic("zigbee2mqtt/door1/set", "zigbee2mqtt/"),
            None
        );
    }
}
