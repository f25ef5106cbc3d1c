//! Static sensor to trigger group mapping built from configuration.

use crate::config::{TriggerFile, TriggerGroupConfig};
use crate::error::CatalogError;
use std::collections::{BTreeMap, BTreeSet};

/// Immutable map from sensor id to the alarm modes that sensor escalates in.
///
/// Built once at startup and shared behind an `Arc` by every worker. Both
/// directions of the mapping are kept: `resolve` answers "which groups is this
/// sensor in" and `trigger_group` answers "which sensors are in this group".
#[derive(Debug, Clone, Default)]
pub struct SensorCatalog {
    sensors: BTreeMap<String, BTreeSet<String>>,
    triggers: BTreeMap<String, BTreeSet<String>>,
}

impl SensorCatalog {
    /// Build the catalog from a list of trigger groups.
    ///
    /// Fails if a group name is repeated.
    pub fn build(groups: &[TriggerGroupConfig]) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();

        for group in groups {
            if group.name.is_empty() {
                return Err(CatalogError::EmptyTriggerName);
            }
            if catalog.triggers.contains_key(&group.name) {
                return Err(CatalogError::DuplicateTrigger(group.name.clone()));
            }

            let members = catalog.triggers.entry(group.name.clone()).or_default();
            for sensor in &group.sensors {
                members.insert(sensor.clone());
                catalog
                    .sensors
                    .entry(sensor.clone())
                    .or_default()
                    .insert(group.name.clone());
            }
        }

        Ok(catalog)
    }

    /// Build from a parsed trigger file, including sensors that are tracked
    /// without belonging to any group.
    pub fn from_file(file: &TriggerFile) -> Result<Self, CatalogError> {
        let mut catalog = Self::build(&file.sensor_triggers)?;
        for sensor in &file.tracked_sensors {
            catalog.sensors.entry(sensor.clone()).or_default();
        }
        Ok(catalog)
    }

    /// Trigger groups for `sensor_id`, or `None` if the sensor is unmanaged.
    pub fn resolve(&self, sensor_id: &str) -> Option<&BTreeSet<String>> {
        self.sensors.get(sensor_id)
    }

    pub fn contains(&self, sensor_id: &str) -> bool {
        self.sensors.contains_key(sensor_id)
    }

    /// Whether `sensor_id` escalates while the alarm is in `mode`.
    pub fn triggers_in(&self, sensor_id: &str, mode: &str) -> bool {
        self.resolve(sensor_id)
            .is_some_and(|groups| groups.contains(mode))
    }

    /// Sensors belonging to the trigger group `name`.
    pub fn trigger_group(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.triggers.get(name)
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }
}
