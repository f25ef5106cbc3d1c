//! One unit of work per inbound sensor message:
//! topic -> sensor id -> interpret -> reconcile -> decide -> notify.
//!
//! Every failure stays inside the message that caused it.

use crate::alarm::AlarmCommand;
use crate::audit::AuditSink;
use crate::escalation::{EscalationDecider, Outcome};
use crate::sensors::{SensorCatalog, SensorEventInterpreter, sensor_id_from_topic};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

pub struct SensorPipeline {
    wildcard_prefix: String,
    catalog: Arc<SensorCatalog>,
    interpreter: SensorEventInterpreter,
    decider: EscalationDecider,
    commands: Arc<dyn AlarmCommand>,
    audit: Arc<dyn AuditSink>,
    command_timeout: Duration,
}

impl SensorPipeline {
    pub fn new(
        wildcard_prefix: impl Into<String>,
        catalog: Arc<SensorCatalog>,
        interpreter: SensorEventInterpreter,
        decider: EscalationDecider,
        commands: Arc<dyn AlarmCommand>,
        audit: Arc<dyn AuditSink>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            wildcard_prefix: wildcard_prefix.into(),
            catalog,
            interpreter,
            decider,
            commands,
            audit,
            command_timeout,
        }
    }

    /// Process one message and return the decision that was acted on.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> Outcome {
        let Some(sensor_id) = sensor_id_from_topic(topic, &self.wildcard_prefix) else {
            debug!("Ignoring message on unrelated topic {}", topic);
            return Outcome::Suppressed;
        };

        // Unmanaged sensors never reach the store
        if !self.catalog.contains(sensor_id) {
            debug!("Ignoring unmanaged sensor {}", sensor_id);
            return Outcome::Suppressed;
        }

        let event = match self.interpreter.interpret(sensor_id, payload).await {
            Ok(event) => event,
            Err(e) => {
                error!("{}", e);
                return Outcome::Suppressed;
            }
        };

        if !event.changed {
            return Outcome::Suppressed;
        }
        info!("{}", event.description);

        let outcome = self
            .decider
            .decide(sensor_id, event.is_activation, &event.description)
            .await;
        self.notify(&outcome).await;
        outcome
    }

    async fn notify(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Suppressed => {}
            Outcome::Logged { message } => {
                info!("{}", message);
                self.publish_audit(message).await;
            }
            Outcome::Escalated { message, command } => {
                info!("{}", message);

                // Audit never delays the command
                let sent = tokio::time::timeout(
                    self.command_timeout,
                    self.commands.set_mode(&command.device_id, &command.mode),
                )
                .await;
                match sent {
                    Ok(Ok(())) => info!(
                        "Alarm {} switched to {} mode",
                        command.device_id, command.mode
                    ),
                    Ok(Err(e)) => error!("{}", e),
                    Err(_) => error!(
                        "Alarm command to {} timed out after {:?}",
                        command.device_id, self.command_timeout
                    ),
                }

                self.publish_audit(message).await;
            }
        }
    }

    async fn publish_audit(&self, message: &str) {
        match tokio::time::timeout(self.command_timeout, self.audit.publish(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{}", e),
            Err(_) => warn!(
                "Audit publish timed out after {:?}, dropping message",
                self.command_timeout
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmModeQuery;
    use crate::config::{Config, TriggerFile, TriggerGroupConfig};
    use crate::error::{AlarmError, AuditError, StoreError};
    use crate::state::{MemoryBackend, SensorStatus, StateBackend, StateStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct FixedMode(String);

    #[async_trait]
    impl AlarmModeQuery for FixedMode {
        async fn current_mode(&self, _device_id: &str) -> Result<String, AlarmError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingCommands {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl AlarmCommand for RecordingCommands {
        async fn set_mode(&self, device_id: &str, mode: &str) -> Result<(), AlarmError> {
            self.sent.lock().push((device_id.to_string(), mode.to_string()));
            if self.fail {
                return Err(AlarmError::Command("500 Internal Server Error".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingAudit {
        messages: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AuditSink for RecordingAudit {
        async fn publish(&self, message: &str) -> Result<(), AuditError> {
            if self.fail {
                return Err(AuditError::Publish("broker unavailable".to_string()));
            }
            self.messages.lock().push(message.to_string());
            Ok(())
        }
    }

    /// Audit sink that never completes.
    struct StalledAudit;

    #[async_trait]
    impl AuditSink for StalledAudit {
        async fn publish(&self, _message: &str) -> Result<(), AuditError> {
            std::future::pending().await
        }
    }

    /// Backend whose reads always fail.
    struct UnreachableBackend;

    #[async_trait]
    impl StateBackend for UnreachableBackend {
        async fn get(&self, sensor_id: &str) -> Result<Option<SensorStatus>, StoreError> {
            Err(StoreError::Read {
                sensor: sensor_id.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        async fn put(&self, status: &SensorStatus) -> Result<(), StoreError> {
            Err(StoreError::Write {
                sensor: status.name.clone(),
                reason: "connection refused".to_string(),
            })
        }
    }

    struct Harness {
        pipeline: SensorPipeline,
        backend: Arc<MemoryBackend>,
        commands: Arc<RecordingCommands>,
        audit: Arc<RecordingAudit>,
    }

    fn build(
        mode: &str,
        config: &Config,
        backend: Arc<dyn StateBackend>,
        commands: Arc<dyn AlarmCommand>,
        audit: Arc<dyn AuditSink>,
    ) -> SensorPipeline {
        let file = TriggerFile {
            sensor_triggers: vec![TriggerGroupConfig {
                name: "home_armed".to_string(),
                sensors: vec!["door1".to_string(), "hall_motion".to_string()],
            }],
            tracked_sensors: vec!["garage".to_string()],
        };
        let catalog = Arc::new(SensorCatalog::from_file(&file).unwrap());
        let store = Arc::new(StateStore::new(backend));

        SensorPipeline::new(
            config.mqtt.wildcard_topic.clone(),
            catalog.clone(),
            SensorEventInterpreter::new(store),
            EscalationDecider::new(
                catalog,
                Arc::new(FixedMode(mode.to_string())),
                &config.alarm_manager,
            ),
            commands,
            audit,
            config.alarm_manager.timeout(),
        )
    }

    fn harness(mode: &str, commands: RecordingCommands, audit: RecordingAudit) -> Harness {
        let backend = Arc::new(MemoryBackend::new());
        let commands = Arc::new(commands);
        let audit = Arc::new(audit);
        let pipeline = build(
            mode,
            &Config::default(),
            backend.clone(),
            commands.clone(),
            audit.clone(),
        );

        Harness {
            pipeline,
            backend,
            commands,
            audit,
        }
    }

    #[tokio::test]
    async fn test_door_opened_while_armed_escalates() {
        let h = harness("home_armed", RecordingCommands::default(), RecordingAudit::default());

        let outcome = h
            .pipeline
            .handle_message("zigbee2mqtt/door1", br#"{"contact": false}"#)
            .await;

        assert!(outcome.is_escalated());
        assert_eq!(
            *h.commands.sent.lock(),
            vec![("alarm".to_string(), "SOS".to_string())]
        );
        assert_eq!(
            *h.audit.messages.lock(),
            vec!["door1 sensor has been triggered and alarm status is home_armed, triggering alarm."]
        );
    }

    #[tokio::test]
    async fn test_door_opened_while_disarmed_is_logged() {
        let h = harness("disarmed", RecordingCommands::default(), RecordingAudit::default());

        let outcome = h
            .pipeline
            .handle_message("zigbee2mqtt/door1", br#"{"contact": false}"#)
            .await;

        assert!(matches!(outcome, Outcome::Logged { .. }));
        assert!(h.commands.sent.lock().is_empty());
        assert_eq!(h.audit.messages.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_report_does_nothing() {
        let h = harness("home_armed", RecordingCommands::default(), RecordingAudit::default());
        h.pipeline
            .handle_message("zigbee2mqtt/hall_motion", br#"{"occupancy": true}"#)
            .await;

        let outcome = h
            .pipeline
            .handle_message("zigbee2mqtt/hall_motion", br#"{"occupancy": true}"#)
            .await;

        assert_eq!(outcome, Outcome::Suppressed);
        assert_eq!(h.commands.sent.lock().len(), 1);
        assert_eq!(h.audit.messages.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unmanaged_sensor_never_touches_store() {
        let h = harness("home_armed", RecordingCommands::default(), RecordingAudit::default());

        let outcome = h
            .pipeline
            .handle_message("zigbee2mqtt/door9", br#"{"contact": false}"#)
            .await;

        assert_eq!(outcome, Outcome::Suppressed);
        assert!(h.backend.is_empty());
        assert!(h.commands.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_tracked_sensor_records_but_never_escalates() {
        let h = harness("home_armed", RecordingCommands::default(), RecordingAudit::default());

        let outcome = h
            .pipeline
            .handle_message("zigbee2mqtt/garage", br#"{"contact": false}"#)
            .await;

        assert!(matches!(outcome, Outcome::Logged { .. }));
        assert_eq!(h.backend.len(), 1);
        assert!(h.commands.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_topic_is_ignored() {
        let h = harness("home_armed", RecordingCommands::default(), RecordingAudit::default());

        for topic in ["zigbee2mqtt/door1/availability", "homeassistant/door1"] {
            let outcome = h
                .pipeline
                .handle_message(topic, br#"{"contact": false}"#)
                .await;
            assert_eq!(outcome, Outcome::Suppressed);
        }
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let h = harness("home_armed", RecordingCommands::default(), RecordingAudit::default());

        let outcome = h
            .pipeline
            .handle_message("zigbee2mqtt/door1", b"\x00\x01garbage")
            .await;

        assert_eq!(outcome, Outcome::Suppressed);
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_block_command() {
        let h = harness(
            "home_armed",
            RecordingCommands::default(),
            RecordingAudit {
                fail: true,
                ..Default::default()
            },
        );

        let outcome = h
            .pipeline
            .handle_message("zigbee2mqtt/door1", br#"{"contact": false}"#)
            .await;

        assert!(outcome.is_escalated());
        assert_eq!(h.commands.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_stalled_audit_does_not_block_command() {
        let mut config = Config::default();
        config.alarm_manager.timeout_secs = 1;
        let commands = Arc::new(RecordingCommands::default());
        let pipeline = build(
            "home_armed",
            &config,
            Arc::new(MemoryBackend::new()),
            commands.clone(),
            Arc::new(StalledAudit),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(3),
            pipeline.handle_message("zigbee2mqtt/door1", br#"{"contact": false}"#),
        )
        .await
        .unwrap();

        assert!(outcome.is_escalated());
        assert_eq!(
            *commands.sent.lock(),
            vec![("alarm".to_string(), "SOS".to_string())]
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_treated_as_no_change() {
        let commands = Arc::new(RecordingCommands::default());
        let audit = Arc::new(RecordingAudit::default());
        let pipeline = build(
            "home_armed",
            &Config::default(),
            Arc::new(UnreachableBackend),
            commands.clone(),
            audit.clone(),
        );

        let outcome = pipeline
            .handle_message("zigbee2mqtt/door1", br#"{"contact": false}"#)
            .await;

        assert_eq!(outcome, Outcome::Suppressed);
        assert!(commands.sent.lock().is_empty());
        assert!(audit.messages.lock().is_empty());
    }

    #[tokio::test]
    async fn test_command_failure_is_contained() {
        let h = harness(
            "home_armed",
            RecordingCommands {
                fail: true,
                ..Default::default()
            },
            RecordingAudit::default(),
        );

        let outcome = h
            .pipeline
            .handle_message("zigbee2mqtt/door1", br#"{"contact": false}"#)
            .await;
        assert!(outcome.is_escalated());

        // Next message is still processed normally
        let closed = h
            .pipeline
            .handle_message("zigbee2mqtt/door1", br#"{"contact": true}"#)
            .await;
        assert_eq!(closed, Outcome::Suppressed);
        let status = h.backend.get("door1").await.unwrap().unwrap();
        assert!(status.triggered);
    }
}
