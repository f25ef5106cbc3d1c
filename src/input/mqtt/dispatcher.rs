//! Bounded hand-off between the MQTT receive loop and the sensor pipeline.
//!
//! The receive loop only pushes into a bounded channel. A dispatcher drains
//! the channel and runs each message on its own task, with at most
//! `max_concurrency` tasks in flight.

use super::client::{MqttClient, MqttMessage};
use crate::config::{MqttConfig, WorkerConfig};
use crate::pipeline::SensorPipeline;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct WorkerPool {
    pipeline: Arc<SensorPipeline>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<SensorPipeline>, max_concurrency: usize) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            tracker: TaskTracker::new(),
        }
    }

    /// Dispatch messages from `rx` until it closes or `shutdown` fires.
    pub async fn run(&self, mut rx: mpsc::Receiver<MqttMessage>, shutdown: CancellationToken) {
        loop {
            let msg = tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let pipeline = self.pipeline.clone();
            self.tracker.spawn(async move {
                let _permit = permit;
                let topic = msg.topic.clone();
                let work = tokio::spawn(async move {
                    pipeline.handle_message(&msg.topic, &msg.payload).await;
                });
                if let Err(e) = work.await {
                    error!("Worker for {} failed: {}", topic, e);
                }
            });
        }
    }

    /// Wait for in-flight messages to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Start the MQTT event loop and the worker pool.
///
/// Returns a handle that completes once both have stopped and in-flight
/// messages have drained.
pub fn start(
    client: MqttClient,
    pipeline: Arc<SensorPipeline>,
    mqtt: &MqttConfig,
    workers: &WorkerConfig,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let (msg_tx, msg_rx) = mpsc::channel::<MqttMessage>(workers.queue_depth);
    let subscription = mqtt.subscription();
    let pool = WorkerPool::new(pipeline, workers.max_concurrency);

    info!(
        "[MQTT] Connecting to {}:{} (queue depth {}, {} workers)",
        mqtt.broker_host, mqtt.broker_port, workers.queue_depth, workers.max_concurrency
    );

    let loop_shutdown = shutdown.clone();
    let mqtt_loop = tokio::spawn(async move {
        client.run(subscription, msg_tx, loop_shutdown).await;
    });

    tokio::spawn(async move {
        pool.run(msg_rx, shutdown).await;
        pool.drain().await;
        if let Err(e) = mqtt_loop.await {
            error!("MQTT event loop failed: {}", e);
        }
    })
}
