use thiserror::Error as ThisError;

/// Errors raised while building the sensor catalog from configuration.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("sensor trigger called {0} was already declared")]
    DuplicateTrigger(String),

    #[error("sensor trigger with an empty name")]
    EmptyTriggerName,
}

/// Errors from the sensor state backing store.
#[derive(ThisError, Debug)]
pub enum StoreError {
    #[error("failed to read state for sensor {sensor}: {reason}")]
    Read { sensor: String, reason: String },

    #[error("failed to write state for sensor {sensor}: {reason}")]
    Write { sensor: String, reason: String },

    #[error("corrupt state record for sensor {sensor}: {reason}")]
    Corrupt { sensor: String, reason: String },

    #[error("state store connection failed: {0}")]
    Connection(String),
}

/// Errors produced while interpreting a single sensor message.
#[derive(ThisError, Debug)]
pub enum SensorError {
    #[error("failed to decode payload for sensor {sensor}: {reason}")]
    Decode { sensor: String, reason: String },

    #[error("payload for sensor {0} carries both contact and occupancy fields")]
    AmbiguousPayload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors talking to the alarm manager.
#[derive(ThisError, Debug)]
pub enum AlarmError {
    #[error("failed to query alarm mode: {0}")]
    ModeQuery(String),

    #[error("failed to send alarm command: {0}")]
    Command(String),

    #[error("alarm manager did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Errors publishing to the audit channel.
#[derive(ThisError, Debug)]
pub enum AuditError {
    #[error("failed to publish audit message: {0}")]
    Publish(String),
}

/// Errors loading service configuration.
#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error("sensor trigger file not configured (set ALARM_SENSORS_CONFIG_FILE)")]
    MissingTriggerFile,

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse trigger file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Top-level error for the service binary.
#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Alarm(#[from] AlarmError),

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("MQTT connection error: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
