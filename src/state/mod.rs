//! Per-sensor last known status with change detection.
//!
//! `StateStore` owns the reconcile logic and per-sensor serialization; the
//! actual records live in a `StateBackend` (Redis in production, memory in
//! tests and local runs).

mod backend;
mod redis_backend;
mod store;

pub use backend::{MemoryBackend, StateBackend};
pub use redis_backend::RedisBackend;
pub use store::{Clock, SensorStatus, StateStore, SystemClock};
