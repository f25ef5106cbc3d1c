//! MQTT input source for zigbee2mqtt sensors.
//!
//! The client forwards every message below the wildcard topic into a bounded
//! queue; the dispatcher runs each one through the sensor pipeline.

mod client;
pub mod dispatcher;

pub use client::{MqttClient, MqttMessage};
pub use dispatcher::{WorkerPool, start};
