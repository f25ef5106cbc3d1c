use super::backend::StateBackend;
use crate::error::StoreError;
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Last observed state of one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub name: String,
    pub triggered: bool,
    /// Unix seconds of the last observation, changed or not.
    pub last_updated: i64,
}

/// Source of the `last_updated` timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock in unix seconds.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Change detection over a `StateBackend`.
///
/// Reconciles for the same sensor are serialized so the get/put pair acts as
/// one read-modify-write; different sensors proceed independently.
pub struct StateStore {
    backend: Arc<dyn StateBackend>,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock_for(&self, sensor_id: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .entry(sensor_id.to_string())
            .or_default()
            .clone()
    }

    /// Record `new_value` for `sensor_id` and report whether it differs from
    /// the stored value. A sensor with no record always counts as changed.
    ///
    /// The timestamp is refreshed even when the value is unchanged, and is
    /// always greater than the one it replaces.
    pub async fn reconcile(&self, sensor_id: &str, new_value: bool) -> Result<bool, StoreError> {
        let lock = self.lock_for(sensor_id);
        let _guard = lock.lock().await;

        let stored = self.backend.get(sensor_id).await?;
        let now = self.clock.now();
        let (changed, last_updated) = match &stored {
            None => (true, now),
            // Never reuse or go below the stored timestamp
            Some(status) => (
                status.triggered != new_value,
                now.max(status.last_updated + 1),
            ),
        };

        let status = SensorStatus {
            name: sensor_id.to_string(),
            triggered: new_value,
            last_updated,
        };
        self.backend.put(&status).await?;

        debug!(
            "Sensor {} reconciled: value={} changed={}",
            sensor_id, new_value, changed
        );
        Ok(changed)
    }

    /// Current stored status for `sensor_id`.
    pub async fn status(&self, sensor_id: &str) -> Result<Option<SensorStatus>, StoreError> {
        self.backend.get(sensor_id).await
    }
}
