//! HTTP client for the alarm manager API.

use super::{AlarmCommand, AlarmModeQuery, ModeCommand};
use crate::config::AlarmManagerConfig;
use crate::error::AlarmError;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;

/// `GET /devices/status` response body.
#[derive(Debug, Deserialize)]
struct DevicesStatus {
    #[serde(default)]
    devices: HashMap<String, DeviceStatus>,
}

#[derive(Debug, Deserialize)]
struct DeviceStatus {
    mode: String,
}

pub struct AlarmManagerClient {
    http: reqwest::Client,
    base_url: String,
}

impl AlarmManagerClient {
    /// Build a client whose requests fail after the configured timeout.
    pub fn new(config: &AlarmManagerConfig) -> Result<Self, AlarmError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AlarmError::ModeQuery(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
        })
    }

    fn status_url(&self) -> String {
        format!("{}/devices/status", self.base_url)
    }

    fn device_url(&self, device_id: &str) -> String {
        format!("{}/devices/status/{}", self.base_url, device_id)
    }
}

#[async_trait]
impl AlarmModeQuery for AlarmManagerClient {
    async fn current_mode(&self, device_id: &str) -> Result<String, AlarmError> {
        let response = self
            .http
            .get(self.status_url())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AlarmError::ModeQuery(e.to_string()))?;

        let body: DevicesStatus = response
            .json()
            .await
            .map_err(|e| AlarmError::ModeQuery(e.to_string()))?;

        mode_of(body, device_id)
    }
}

#[async_trait]
impl AlarmCommand for AlarmManagerClient {
    async fn set_mode(&self, device_id: &str, mode: &str) -> Result<(), AlarmError> {
        let command = ModeCommand {
            device_id: device_id.to_string(),
            mode: mode.to_string(),
        };
        debug!("PUT {} mode={}", self.device_url(device_id), mode);

        self.http
            .put(self.device_url(device_id))
            .json(&command)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AlarmError::Command(e.to_string()))?;
        Ok(())
    }
}

fn mode_of(mut status: DevicesStatus, device_id: &str) -> Result<String, AlarmError> {
    status
        .devices
        .remove(device_id)
        .map(|device| device.mode)
        .ok_or_else(|| {
            AlarmError::ModeQuery(format!("device {} not reported by alarm manager", device_id))
        })
}
