use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

use crate::utils::time::{local_bucket, Clock};

/// 计数器项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub value: i64,
    pub bucket: NaiveDate,
    pub expires_at: DateTime<Utc>,
}

impl CounterSnapshot {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// 按时间窗口重置的计数器存储
///
/// 每个实体一个计数器，到期后视为不存在；已过期的桶只会被整体替换，
/// 不会再被修改。单个键的读改写在 DashMap 分片锁内完成。
#[derive(Clone)]
pub struct WindowedCounterStore {
    name: &'static str,
    data: Arc<DashMap<i64, CounterSnapshot>>,
    clock: Arc<dyn Clock>,
}

impl WindowedCounterStore {
    pub fn new(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            data: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// 用快照值覆盖计数器并刷新过期时间（最后写入者胜出）
    pub fn create_or_update(&self, entity_id: i64, value: i64, ttl: Duration) -> CounterSnapshot {
        let now = self.clock.now();
        let fresh = CounterSnapshot {
            value,
            bucket: local_bucket(now),
            expires_at: now + ttl,
        };

        *self
            .data
            .entry(entity_id)
            .and_modify(|item| *item = fresh)
            .or_insert(fresh)
    }

    /// 读取当前值，过期视为不存在
    pub fn read(&self, entity_id: i64) -> Option<i64> {
        self.read_snapshot(entity_id).map(|s| s.value)
    }

    fn read_snapshot(&self, entity_id: i64) -> Option<CounterSnapshot> {
        let now = self.clock.now();
        self.data
            .get(&entity_id)
            .map(|item| *item)
            .filter(|item| item.is_live(now))
    }

    pub fn delete(&self, entity_id: i64) -> bool {
        self.data.remove(&entity_id).is_some()
    }

    /// 清理过期项
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.data.len();
        self.data.retain(|_, item| item.is_live(now));
        let removed = before.saturating_sub(self.data.len());
        if removed > 0 {
            debug!("Removed {} expired counters from {}", removed, self.name);
        }
        removed
    }

    /// 启动后台清理任务
    pub fn spawn_cleanup(&self, every: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                store.cleanup_expired();
            }
        })
    }
}
