//! MQTT client wrapper for zigbee2mqtt communication.

use crate::config::MqttConfig;
use crate::error::Result;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Fixed delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// MQTT client for zigbee2mqtt communication.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self { client, event_loop }
    }

    /// Run the MQTT event loop and forward published messages to `tx`.
    ///
    /// `subscription` is (re)subscribed on every ConnAck so the bridge picks
    /// the sensor topics back up after a broker restart. When `tx` is full the
    /// loop waits for the workers to catch up. Returns when `shutdown` fires
    /// or the channel closes.
    pub async fn run(
        mut self,
        subscription: String,
        tx: mpsc::Sender<MqttMessage>,
        shutdown: CancellationToken,
    ) {
        info!("Starting MQTT event loop");

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected, subscribing to MQTT topic: {}", subscription);
                    if let Err(e) = self.client.try_subscribe(&subscription, QoS::AtLeastOnce) {
                        warn!("Failed to subscribe to {}: {}", subscription, e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!(
                        "Received MQTT message on {}: {}",
                        publish.topic,
                        String::from_utf8_lossy(&publish.payload)
                    );

                    let msg = MqttMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if tx.send(msg).await.is_err() {
                        error!("MQTT message channel closed");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {:?}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }

        info!("MQTT event loop stopped");
    }

    /// Publish one message and drive the event loop until the broker
    /// acknowledges it.
    pub async fn publish_once(mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;

        loop {
            if let Event::Incoming(Packet::PubAck(_)) = self.event_loop.poll().await? {
                debug!("Broker acknowledged message on {}", topic);
                break;
            }
        }

        self.client.disconnect().await?;
        Ok(())
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}
