//! Turns raw zigbee2mqtt sensor payloads into semantic events.
//!
//! Contact sensors report `contact: false` while open; occupancy sensors
//! report `occupancy: true` while motion is detected. The interpreter decodes
//! the payload, reconciles the value with the state store and reports whether
//! the transition is an activation.

use crate::error::SensorError;
use crate::state::StateStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use strum::{AsRefStr, Display};

/// Kind of sensor, derived from which field the payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SensorKind {
    Contact,
    Occupancy,
}

/// Result of interpreting one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub kind: SensorKind,
    /// Whether the store saw a new value. Empty description when false.
    pub changed: bool,
    pub is_activation: bool,
    pub description: String,
}

pub struct SensorEventInterpreter {
    store: Arc<StateStore>,
}

impl SensorEventInterpreter {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Decode `payload` for `sensor_id` and reconcile it with stored state.
    ///
    /// Decode failures never touch the store.
    pub async fn interpret(
        &self,
        sensor_id: &str,
        payload: &[u8],
    ) -> Result<Interpretation, SensorError> {
        let (kind, value) = decode(sensor_id, payload)?;

        let changed = self.store.reconcile(sensor_id, value).await?;
        if !changed {
            return Ok(Interpretation {
                kind,
                changed,
                is_activation: false,
                description: String::new(),
            });
        }

        let (is_activation, description) = match kind {
            // Contact semantics are inverted: false means open
            SensorKind::Contact if !value => (
                true,
                format!("Contact sensor '{}' has been opened.", sensor_id),
            ),
            SensorKind::Contact => (
                false,
                format!("Contact sensor '{}' has been closed.", sensor_id),
            ),
            // Same wording for both values, only `true` activates
            SensorKind::Occupancy => (
                value,
                format!("Motion sensor '{}' has been triggered.", sensor_id),
            ),
        };

        Ok(Interpretation {
            kind,
            changed,
            is_activation,
            description,
        })
    }
}

/// Only `contact` and `occupancy` are read; everything else zigbee2mqtt
/// sends (battery, linkquality, voltage...) is ignored.
fn decode(sensor_id: &str, payload: &[u8]) -> Result<(SensorKind, bool), SensorError> {
    let decode_error = |reason: String| SensorError::Decode {
        sensor: sensor_id.to_string(),
        reason,
    };

    let fields: Map<String, Value> =
        serde_json::from_slice(payload).map_err(|e| decode_error(e.to_string()))?;

    let flag = |name: &str| match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(other) => Err(decode_error(format!("{} is not a boolean: {}", name, other))),
    };

    match (flag("contact")?, flag("occupancy")?) {
        (Some(_), Some(_)) => Err(SensorError::AmbiguousPayload(sensor_id.to_string())),
        (Some(contact), None) => Ok((SensorKind::Contact, contact)),
        (None, Some(occupancy)) => Ok((SensorKind::Occupancy, occupancy)),
        (None, None) => Err(decode_error(
            "payload has neither contact nor occupancy field".to_string(),
        )),
    }
}
