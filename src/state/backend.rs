use super::store::SensorStatus;
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Persistence behind `StateStore`.
///
/// `get` must report a missing record as `Ok(None)`, not as an error. `put`
/// writes the whole record in one operation.
#[async_trait]
pub trait StateBackend: Send + Sync {
    async fn get(&self, sensor_id: &str) -> Result<Option<SensorStatus>, StoreError>;

    async fn put(&self, status: &SensorStatus) -> Result<(), StoreError>;
}

/// Process-local backend. State is lost on restart.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, SensorStatus>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn get(&self, sensor_id: &str) -> Result<Option<SensorStatus>, StoreError> {
        Ok(self.records.read().get(sensor_id).cloned())
    }

    async fn put(&self, status: &SensorStatus) -> Result<(), StoreError> {
        self.records
            .write()
            .insert(status.name.clone(), status.clone());
        Ok(())
    }
}
