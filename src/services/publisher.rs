use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::{error::Result, models::event::Event, services::consumer::PartitionedConsumer};

/// 事件发布者
///
/// 真实部署中由消息中间件实现；这里只约定接口。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: Event) -> Result<()>;
}

/// 进程内发布者，把事件投递给每个订阅的消费者
#[derive(Clone, Default)]
pub struct ConsumerPublisher {
    consumers: Vec<Arc<PartitionedConsumer>>,
}

impl ConsumerPublisher {
    pub fn new(consumers: Vec<Arc<PartitionedConsumer>>) -> Self {
        Self { consumers }
    }
}

#[async_trait]
impl EventPublisher for ConsumerPublisher {
    async fn publish(&self, event: Event) -> Result<()> {
        debug!(
            "Publishing event {} ({}) on {}",
            event.event_id,
            event.event_type(),
            event.event_type().topic()
        );
        for consumer in &self.consumers {
            consumer.submit(event.clone()).await?;
        }
        Ok(())
    }
}
