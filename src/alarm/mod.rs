//! Alarm manager collaborators: reading the current mode and forcing a new
//! one.

mod client;

pub use client::AlarmManagerClient;

use crate::error::AlarmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reads the alarm device's current arming mode.
#[async_trait]
pub trait AlarmModeQuery: Send + Sync {
    async fn current_mode(&self, device_id: &str) -> Result<String, AlarmError>;
}

/// Sends a mode change to the alarm device.
#[async_trait]
pub trait AlarmCommand: Send + Sync {
    async fn set_mode(&self, device_id: &str, mode: &str) -> Result<(), AlarmError>;
}

/// Mode change request issued on escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCommand {
    #[serde(skip)]
    pub device_id: String,
    pub mode: String,
}
