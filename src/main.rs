use alarm_sensors_bridge::alarm::{AlarmManagerClient, AlarmModeQuery};
use alarm_sensors_bridge::audit::{AuditSink, LogAuditSink, MqttAuditSink};
use alarm_sensors_bridge::config::{self, Config};
use alarm_sensors_bridge::error::Result;
use alarm_sensors_bridge::escalation::EscalationDecider;
use alarm_sensors_bridge::input::mqtt::{self, MqttClient};
use alarm_sensors_bridge::pipeline::SensorPipeline;
use alarm_sensors_bridge::sensors::{SensorCatalog, SensorEventInterpreter};
use alarm_sensors_bridge::state::{MemoryBackend, RedisBackend, StateBackend, StateStore};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Load .env before the runtime starts any threads
    config::load_dotenv();
    init_logger();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run()) {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    info!("Starting Alarm Sensors Bridge");

    let config = Config::from_env();
    config.validate()?;
    info!("Configuration loaded:");
    info!(
        "  MQTT broker: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    info!("  Sensor topics: {}", config.mqtt.subscription());
    info!("  Alarm manager: {}", config.alarm_manager.base_url());
    info!("  Alarm device: {}", config.alarm_manager.device_id);

    let triggers = config.load_triggers()?;
    let catalog = Arc::new(SensorCatalog::from_file(&triggers)?);
    info!(
        "  {} sensor(s) across {} trigger group(s)",
        catalog.sensor_count(),
        catalog.trigger_count()
    );

    let backend: Arc<dyn StateBackend> = match &config.redis.url {
        Some(url) => Arc::new(RedisBackend::connect(url).await?),
        None => {
            warn!("REDIS_URL not set, sensor state will not survive restarts");
            Arc::new(MemoryBackend::new())
        }
    };
    let store = Arc::new(StateStore::new(backend));

    info!("Establishing connection with alarm manager");
    let alarm = Arc::new(AlarmManagerClient::new(&config.alarm_manager)?);
    let mode = alarm.current_mode(&config.alarm_manager.device_id).await?;
    info!("Alarm manager reachable, current mode is {}", mode);

    let mqtt_client = MqttClient::new(&config.mqtt);
    let audit: Arc<dyn AuditSink> = match &config.audit.topic {
        Some(topic) => {
            info!("  Audit topic: {}", topic);
            Arc::new(MqttAuditSink::new(mqtt_client.client(), topic.clone()))
        }
        None => Arc::new(LogAuditSink),
    };

    let pipeline = Arc::new(SensorPipeline::new(
        config.mqtt.wildcard_topic.clone(),
        catalog.clone(),
        SensorEventInterpreter::new(store),
        EscalationDecider::new(catalog, alarm.clone(), &config.alarm_manager),
        alarm,
        audit,
        config.alarm_manager.timeout(),
    ));

    let shutdown = CancellationToken::new();
    let bridge = mqtt::start(
        mqtt_client,
        pipeline,
        &config.mqtt,
        &config.workers,
        shutdown.clone(),
    );

    info!("Alarm Sensors Bridge is running");
    info!("  - Press Ctrl+C to exit");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    shutdown.cancel();
    if let Err(e) = bridge.await {
        error!("Bridge task failed: {}", e);
    }

    info!("Alarm Sensors Bridge stopped");
    Ok(())
}
