use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::event::Event,
    services::registry::EventHandlerRegistry,
};

#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    pub partitions: usize,
    pub queue_capacity: usize,
    pub max_redeliveries: u32,
    pub redelivery_backoff: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            partitions: 4,
            queue_capacity: 1024,
            max_redeliveries: 3,
            redelivery_backoff: Duration::from_millis(100),
        }
    }
}

impl From<&Config> for ConsumerOptions {
    fn from(config: &Config) -> Self {
        Self {
            partitions: config.consumer_partitions.max(1),
            queue_capacity: config.consumer_queue_capacity.max(1),
            max_redeliveries: config.max_redeliveries,
            redelivery_backoff: Duration::from_millis(config.redelivery_backoff_ms),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsumerStats {
    processed: AtomicU64,
    redelivered: AtomicU64,
    dead_lettered: AtomicU64,
}

impl ConsumerStats {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn redelivered(&self) -> u64 {
        self.redelivered.load(Ordering::Relaxed)
    }

    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }
}

/// 按分区键有序消费事件
///
/// 同一分区键的事件总是进入同一个 worker，按提交顺序逐个处理；
/// 不同分区之间并行。失败的事件按配置重新投递，耗尽后记录并丢弃。
pub struct PartitionedConsumer {
    name: &'static str,
    registry: Arc<EventHandlerRegistry>,
    senders: RwLock<Vec<mpsc::Sender<Event>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    round_robin: AtomicUsize,
    stats: Arc<ConsumerStats>,
}

impl PartitionedConsumer {
    pub fn start(
        name: &'static str,
        registry: Arc<EventHandlerRegistry>,
        options: ConsumerOptions,
    ) -> Self {
        let partitions = options.partitions.max(1);
        let stats = Arc::new(ConsumerStats::default());
        let mut senders = Vec::with_capacity(partitions);
        let mut workers = Vec::with_capacity(partitions);

        for partition in 0..partitions {
            let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
            senders.push(tx);
            workers.push(tokio::spawn(run_partition(
                name,
                partition,
                rx,
                registry.clone(),
                options.clone(),
                stats.clone(),
            )));
        }

        info!(
            "Consumer {} started with {} partitions for {:?}",
            name,
            partitions,
            registry.subscribed_types()
        );

        Self {
            name,
            registry,
            senders: RwLock::new(senders),
            workers: Mutex::new(workers),
            round_robin: AtomicUsize::new(0),
            stats,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> Arc<ConsumerStats> {
        self.stats.clone()
    }

    pub fn partition_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// 计算事件所在分区；没有分区键的事件轮询分配
    pub fn partition_for(&self, event: &Event, partitions: usize) -> usize {
        match self.registry.partition_key(event) {
            Some(key) => key.rem_euclid(partitions as i64) as usize,
            None => self.round_robin.fetch_add(1, Ordering::Relaxed) % partitions,
        }
    }

    pub async fn submit(&self, event: Event) -> Result<()> {
        let sender = {
            let senders = self.senders.read();
            if senders.is_empty() {
                return Err(AppError::ServiceUnavailable(format!(
                    "Consumer {} is shut down",
                    self.name
                )));
            }
            let partition = self.partition_for(&event, senders.len());
            senders[partition].clone()
        };

        sender.send(event).await.map_err(|_| {
            AppError::ServiceUnavailable(format!("Consumer {} partition closed", self.name))
        })
    }

    /// 停止接收新事件，处理完已排队的事件后退出
    pub async fn shutdown(&self) {
        self.senders.write().clear();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Consumer {} worker terminated abnormally: {}", self.name, e);
            }
        }
        info!("Consumer {} stopped", self.name);
    }
}

async fn run_partition(
    name: &'static str,
    partition: usize,
    mut rx: mpsc::Receiver<Event>,
    registry: Arc<EventHandlerRegistry>,
    options: ConsumerOptions,
    stats: Arc<ConsumerStats>,
) {
    debug!("Consumer {} partition {} running", name, partition);

    while let Some(event) = rx.recv().await {
        deliver(name, &registry, &event, &options, &stats).await;
    }

    debug!("Consumer {} partition {} drained", name, partition);
}

async fn deliver(
    name: &'static str,
    registry: &EventHandlerRegistry,
    event: &Event,
    options: &ConsumerOptions,
    stats: &ConsumerStats,
) {
    let mut attempt: u32 = 0;
    loop {
        match registry.dispatch(event).await.into_result() {
            Ok(()) => {
                stats.processed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) if e.is_retryable() && attempt < options.max_redeliveries => {
                attempt += 1;
                stats.redelivered.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Consumer {} redelivering event {} ({}), attempt {}: {}",
                    name,
                    event.event_id,
                    event.event_type(),
                    attempt,
                    e
                );
                tokio::time::sleep(options.redelivery_backoff * attempt).await;
            }
            Err(e) => {
                stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                error!(
                    "Consumer {} gave up on event {} ({}) after {} redeliveries: {}",
                    name,
                    event.event_id,
                    event.event_type(),
                    attempt,
                    e
                );
                return;
            }
        }
    }
}
