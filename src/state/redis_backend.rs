//! Redis backed sensor state.
//!
//! Each sensor is one hash keyed by its id with `name`, `lastupdated` and
//! `triggered` fields.

use super::backend::StateBackend;
use super::store::SensorStatus;
use crate::error::StoreError;
use async_trait::async_trait;
use log::info;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RedisBackend {
    conn: ConnectionManager,
    url: String,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("url", &self.url)
            .field("conn", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisBackend {
    /// Connect to `url`, failing if the server is not reachable within five
    /// seconds.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                StoreError::Connection(format!(
                    "Redis connection timeout after {} seconds",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("Connected to Redis at {}", url);
        Ok(Self {
            conn,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl StateBackend for RedisBackend {
    async fn get(&self, sensor_id: &str) -> Result<Option<SensorStatus>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            conn.hgetall(sensor_id)
                .await
                .map_err(|e| StoreError::Read {
                    sensor: sensor_id.to_string(),
                    reason: e.to_string(),
                })?;

        decode_status(sensor_id, &fields)
    }

    async fn put(&self, status: &SensorStatus) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset_multiple(&status.name, &encode_status(status)[..])
            .await
            .map_err(|e| StoreError::Write {
                sensor: status.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

fn encode_status(status: &SensorStatus) -> [(&'static str, String); 3] {
    [
        ("name", status.name.clone()),
        ("lastupdated", status.last_updated.to_string()),
        ("triggered", if status.triggered { "1" } else { "0" }.to_string()),
    ]
}

/// An empty hash means Redis has no record for the key.
fn decode_status(
    sensor_id: &str,
    fields: &HashMap<String, String>,
) -> Result<Option<SensorStatus>, StoreError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let corrupt = |reason: String| StoreError::Corrupt {
        sensor: sensor_id.to_string(),
        reason,
    };

    let triggered = match fields.get("triggered").map(String::as_str) {
        Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        Some(other) => return Err(corrupt(format!("triggered = {:?}", other))),
        None => return Err(corrupt("missing triggered field".to_string())),
    };

    let last_updated = match fields.get("lastupdated") {
        Some(raw) => raw
            .parse()
            .map_err(|_| corrupt(format!("lastupdated = {:?}", raw)))?,
        None => 0,
    };

    Ok(Some(SensorStatus {
        name: fields
            .get("name")
            .cloned()
            .unwrap_or_else(|| sensor_id.to_string()),
        triggered,
        last_updated,
    }))
}
