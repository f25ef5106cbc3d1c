//! Input sources feeding sensor events into the bridge.
//!
//! Current input sources:
//! - `mqtt`: zigbee2mqtt contact and occupancy sensors

pub mod mqtt;
