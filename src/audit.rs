//! Audit channel for human readable alarm notifications.

use crate::error::AuditError;
use async_trait::async_trait;
use log::info;
use rumqttc::{AsyncClient, QoS};

/// Best-effort sink for audit messages. Callers log failures and carry on.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn publish(&self, message: &str) -> Result<(), AuditError>;
}

/// Publishes audit messages as plain text on an MQTT topic.
pub struct MqttAuditSink {
    client: AsyncClient,
    topic: String,
}

impl MqttAuditSink {
    pub fn new(client: AsyncClient, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl AuditSink for MqttAuditSink {
    async fn publish(&self, message: &str) -> Result<(), AuditError> {
        self.client
            .publish(&self.topic, QoS::AtLeastOnce, false, message.as_bytes().to_vec())
            .await
            .map_err(|e| AuditError::Publish(e.to_string()))
    }
}

/// Writes audit messages to the log when no audit topic is configured.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn publish(&self, message: &str) -> Result<(), AuditError> {
        info!("[Audit] {}", message);
        Ok(())
    }
}
