//! Decides whether a sensor activation escalates into an alarm.
//!
//! An activation escalates only when the alarm manager reports a mode that is
//! one of the sensor's trigger groups. A failed or slow mode query never
//! escalates.

use crate::alarm::{AlarmModeQuery, ModeCommand};
use crate::config::AlarmManagerConfig;
use crate::error::AlarmError;
use crate::sensors::SensorCatalog;
use log::{debug, error};
use std::sync::Arc;
use std::time::Duration;

/// Result of a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Unmanaged sensor, not an activation, or the mode could not be read.
    Suppressed,
    /// Activation while the alarm is in a mode the sensor does not trigger in.
    Logged { message: String },
    /// Activation while armed in one of the sensor's trigger groups.
    Escalated {
        message: String,
        command: ModeCommand,
    },
}

impl Outcome {
    /// Audit text for this outcome, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Suppressed => None,
            Outcome::Logged { message } | Outcome::Escalated { message, .. } => {
                Some(message.as_str())
            }
        }
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, Outcome::Escalated { .. })
    }
}

pub struct EscalationDecider {
    catalog: Arc<SensorCatalog>,
    modes: Arc<dyn AlarmModeQuery>,
    device_id: String,
    emergency_mode: String,
    timeout: Duration,
}

impl EscalationDecider {
    pub fn new(
        catalog: Arc<SensorCatalog>,
        modes: Arc<dyn AlarmModeQuery>,
        config: &AlarmManagerConfig,
    ) -> Self {
        Self {
            catalog,
            modes,
            device_id: config.device_id.clone(),
            emergency_mode: config.emergency_mode.clone(),
            timeout: config.timeout(),
        }
    }

    pub async fn decide(&self, sensor_id: &str, is_activation: bool, description: &str) -> Outcome {
        let Some(groups) = self.catalog.resolve(sensor_id) else {
            debug!("Ignoring unmanaged sensor {}", sensor_id);
            return Outcome::Suppressed;
        };

        if !is_activation {
            debug!("DEBUG - {}", description);
            return Outcome::Suppressed;
        }

        let mode = match self.current_mode().await {
            Ok(mode) => mode,
            Err(e) => {
                error!(
                    "Not escalating {}: alarm mode unavailable: {}",
                    sensor_id, e
                );
                return Outcome::Suppressed;
            }
        };

        if groups.contains(&mode) {
            Outcome::Escalated {
                message: format!(
                    "{} sensor has been triggered and alarm status is {}, triggering alarm.",
                    sensor_id, mode
                ),
                command: ModeCommand {
                    device_id: self.device_id.clone(),
                    mode: self.emergency_mode.clone(),
                },
            }
        } else {
            Outcome::Logged {
                message: format!(
                    "DEBUG - {} sensor has been triggered but alarm status is {}, NOT triggering alarm.",
                    sensor_id, mode
                ),
            }
        }
    }

    async fn current_mode(&self) -> Result<String, AlarmError> {
        tokio::time::timeout(self.timeout, self.modes.current_mode(&self.device_id))
            .await
            .map_err(|_| AlarmError::Timeout(self.timeout))?
    }
}
