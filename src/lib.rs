//! Alarm Sensors Bridge library.
//!
//! Watches zigbee2mqtt contact and occupancy sensors, keeps their last known
//! state and escalates activations to the alarm manager when the alarm is
//! armed in a mode the sensor is configured to trigger in.

pub mod alarm;
pub mod audit;
pub mod config;
pub mod error;
pub mod escalation;
pub mod input;
pub mod pipeline;
pub mod sensors;
pub mod state;
