//! Development tool that publishes a fake zigbee2mqtt sensor report.
//!
//! Usage:
//!   cargo run --bin sensor-inject -- contact door1 open
//!   cargo run --bin sensor-inject -- occupancy hall_motion --clear
//!
//! Broker settings come from the same environment as the bridge.

use alarm_sensors_bridge::config::{self, Config};
use alarm_sensors_bridge::input::mqtt::MqttClient;
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sensor-inject")]
#[command(about = "Publish a fake sensor payload to exercise the alarm sensors bridge")]
struct Cli {
    /// Topic prefix the bridge listens below
    #[arg(long, env = "MQTT_WILDCARD_TOPIC")]
    prefix: Option<String>,

    /// Seconds to wait for the broker to acknowledge
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ContactState {
    Open,
    Closed,
}

#[derive(Subcommand)]
enum Commands {
    /// Report a door/window contact sensor
    Contact {
        sensor: String,
        #[arg(value_enum)]
        state: ContactState,
    },
    /// Report a motion sensor
    Occupancy {
        sensor: String,
        /// Report no motion instead of motion
        #[arg(long)]
        clear: bool,
    },
}

impl Commands {
    fn sensor(&self) -> &str {
        match self {
            Commands::Contact { sensor, .. } | Commands::Occupancy { sensor, .. } => sensor,
        }
    }

    fn payload(&self) -> serde_json::Value {
        match self {
            // zigbee2mqtt reports contact=false while open
            Commands::Contact { state, .. } => serde_json::json!({
                "contact": matches!(state, ContactState::Closed),
            }),
            Commands::Occupancy { clear, .. } => serde_json::json!({
                "occupancy": !clear,
            }),
        }
    }
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(prefix) = cli.prefix {
        config.mqtt.wildcard_topic = prefix;
    }
    config.mqtt.client_id = format!("{}-inject", config.mqtt.client_id);

    let topic = format!("{}{}", config.mqtt.wildcard_topic, cli.command.sensor());
    let payload = cli.command.payload().to_string();
    info!(
        "Publishing {} to {} on {}:{}",
        payload, topic, config.mqtt.broker_host, config.mqtt.broker_port
    );

    let client = MqttClient::new(&config.mqtt);
    let sent = tokio::time::timeout(
        Duration::from_secs(cli.timeout),
        client.publish_once(&topic, payload.into_bytes()),
    )
    .await;

    match sent {
        Ok(Ok(())) => info!("Done."),
        Ok(Err(e)) => {
            error!("{}", e);
            std::process::exit(1);
        }
        Err(_) => {
            error!("Broker did not acknowledge within {} seconds", cli.timeout);
            std::process::exit(1);
        }
    }
}
