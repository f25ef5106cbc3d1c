//! Escalation decisions for sensor activations.

mod decider;

pub use decider::{EscalationDecider, Outcome};
