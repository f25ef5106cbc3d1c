use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Env vars already set take precedence
        if std::env::var(key).is_err() {
            // SAFETY: called from main before the async runtime spawns any threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub redis: RedisConfig,
    pub alarm_manager: AlarmManagerConfig,
    pub audit: AuditConfig,
    pub workers: WorkerConfig,
    /// Path to the TOML file listing sensor trigger groups.
    pub trigger_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Prefix of the sensor topics, e.g. `zigbee2mqtt/`. The bridge subscribes
    /// to `<wildcard_topic>+` and uses the last level as the sensor id.
    pub wildcard_topic: String,
}

impl MqttConfig {
    pub fn subscription(&self) -> String {
        format!("{}+", self.wildcard_topic)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `redis://` URL. When unset, sensor state is kept in memory only.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmManagerConfig {
    pub host: String,
    pub port: u16,
    pub device_id: String,
    pub timeout_secs: u64,
    /// Mode forced on the alarm device when a sensor escalates.
    pub emergency_mode: String,
}

impl AlarmManagerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// MQTT topic for audit messages. Falls back to the log when unset.
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub queue_depth: usize,
    pub max_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "alarm-sensors-bridge".to_string(),
                username: None,
                password: None,
                wildcard_topic: "zigbee2mqtt/".to_string(),
            },
            redis: RedisConfig { url: None },
            alarm_manager: AlarmManagerConfig {
                host: "localhost".to_string(),
                port: 8080,
                device_id: "alarm".to_string(),
                timeout_secs: 5,
                emergency_mode: "SOS".to_string(),
            },
            audit: AuditConfig { topic: None },
            workers: WorkerConfig {
                queue_depth: 64,
                max_concurrency: 16,
            },
            trigger_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // MQTT configuration
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Ok(topic) = std::env::var("MQTT_WILDCARD_TOPIC") {
            config.mqtt.wildcard_topic = topic;
        }

        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis.url = Some(url);
        }

        // Alarm manager configuration
        if let Ok(host) = std::env::var("ALARM_MANAGER_HOST") {
            config.alarm_manager.host = host;
        }
        if let Ok(port) = std::env::var("ALARM_MANAGER_PORT")
            && let Ok(p) = port.parse()
        {
            config.alarm_manager.port = p;
        }
        if let Ok(device_id) = std::env::var("ALARM_MANAGER_DEVICE_ID") {
            config.alarm_manager.device_id = device_id;
        }
        if let Ok(timeout) = std::env::var("ALARM_MANAGER_TIMEOUT_SECS")
            && let Ok(t) = timeout.parse()
        {
            config.alarm_manager.timeout_secs = t;
        }
        if let Ok(mode) = std::env::var("ALARM_EMERGENCY_MODE") {
            config.alarm_manager.emergency_mode = mode;
        }

        if let Ok(topic) = std::env::var("AUDIT_TOPIC") {
            config.audit.topic = Some(topic);
        }

        if let Ok(depth) = std::env::var("WORKER_QUEUE_DEPTH")
            && let Ok(d) = depth.parse()
        {
            config.workers.queue_depth = d;
        }
        if let Ok(max) = std::env::var("WORKER_MAX_CONCURRENCY")
            && let Ok(m) = max.parse()
        {
            config.workers.max_concurrency = m;
        }

        if let Ok(path) = std::env::var("ALARM_SENSORS_CONFIG_FILE") {
            config.trigger_file = Some(path);
        }

        config
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.wildcard_topic.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "MQTT_WILDCARD_TOPIC".to_string(),
                value: String::new(),
            });
        }
        if self.workers.queue_depth == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WORKER_QUEUE_DEPTH".to_string(),
                value: "0".to_string(),
            });
        }
        if self.workers.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WORKER_MAX_CONCURRENCY".to_string(),
                value: "0".to_string(),
            });
        }
        if self.alarm_manager.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ALARM_MANAGER_TIMEOUT_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Read and parse the trigger group file named by `trigger_file`.
    pub fn load_triggers(&self) -> Result<TriggerFile, ConfigError> {
        let path = self
            .trigger_file
            .as_deref()
            .ok_or(ConfigError::MissingTriggerFile)?;
        TriggerFile::load(path)
    }
}

/// One `[[sensor_triggers]]` table: an alarm mode and the sensors allowed to
/// escalate while the alarm is in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerGroupConfig {
    pub name: String,
    #[serde(default)]
    pub sensors: Vec<String>,
}

/// Contents of the trigger group file.
///
/// ```toml
/// tracked_sensors = ["garage"]
///
/// [[sensor_triggers]]
/// name = "home_armed"
/// sensors = ["door1", "window1"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFile {
    #[serde(default)]
    pub sensor_triggers: Vec<TriggerGroupConfig>,
    /// Sensors whose state is recorded but that never escalate.
    #[serde(default)]
    pub tracked_sensors: Vec<String>,
}

impl TriggerFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
