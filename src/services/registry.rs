//! Event handler registry.
//!
//! Handlers are registered once at startup and frozen into a lookup table
//! keyed by event type. Dispatch resolves the type tag once, then runs every
//! handler whose `supports` predicate accepts the event.

use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::{
    error::{AppError, Result},
    models::event::{Event, EventType},
};

/// 事件处理器
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称，用于日志和失败报告
    fn name(&self) -> &'static str;

    /// 处理器订阅的事件类型
    fn event_types(&self) -> &'static [EventType];

    /// 纯判断函数，不得修改状态
    fn supports(&self, event: &Event) -> bool {
        self.event_types().contains(&event.event_type())
    }

    /// 必须是幂等的：传输层会重新投递失败的事件
    async fn handle(&self, event: &Event) -> Result<()>;

    /// 分区键。返回 None 表示处理器不关心事件顺序
    fn find_article_id(&self, _event: &Event) -> Option<i64> {
        None
    }
}

/// 处理器拿到了与其类型不符的负载
pub fn unexpected_payload(handler: &'static str, event: &Event) -> AppError {
    AppError::Internal(format!(
        "{} received unsupported event {} ({})",
        handler,
        event.event_id,
        event.event_type()
    ))
}

#[derive(Default)]
pub struct EventHandlerRegistryBuilder {
    handlers: Vec<Arc<dyn EventHandler>>,
    handler_timeout: Option<Duration>,
}

impl EventHandlerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: EventHandler + 'static>(self, handler: H) -> Self {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// 单个处理器的超时，超时视为失败
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> EventHandlerRegistry {
        let mut routes: HashMap<EventType, Vec<Arc<dyn EventHandler>>> = HashMap::new();
        for handler in &self.handlers {
            for event_type in handler.event_types() {
                let entry = routes.entry(*event_type).or_default();
                // A handler listing a type twice is still invoked once per event.
                if !entry.iter().any(|h| Arc::ptr_eq(h, handler)) {
                    entry.push(handler.clone());
                }
            }
        }

        EventHandlerRegistry {
            routes,
            handler_count: self.handlers.len(),
            handler_timeout: self.handler_timeout,
        }
    }
}

/// 冻结的处理器注册表，启动后只读
pub struct EventHandlerRegistry {
    routes: HashMap<EventType, Vec<Arc<dyn EventHandler>>>,
    handler_count: usize,
    handler_timeout: Option<Duration>,
}

#[derive(Debug)]
pub struct HandlerFailure {
    pub handler: &'static str,
    pub error: AppError,
}

/// 一次分发的结果
#[derive(Debug)]
pub struct DispatchReport {
    pub event_id: i64,
    pub event_type: EventType,
    pub handled: Vec<&'static str>,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    /// 没有任何处理器订阅该事件
    pub fn is_unhandled(&self) -> bool {
        self.handled.is_empty() && self.failures.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn matched(&self) -> usize {
        self.handled.len() + self.failures.len()
    }

    pub fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }

        Err(AppError::Handler {
            event_id: self.event_id,
            matched: self.handled.len() + self.failures.len(),
            failed: self.failures.len(),
            messages: self
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.handler, f.error))
                .collect(),
        })
    }
}

impl EventHandlerRegistry {
    pub fn builder() -> EventHandlerRegistryBuilder {
        EventHandlerRegistryBuilder::new()
    }

    pub fn handler_count(&self) -> usize {
        self.handler_count
    }

    pub fn handlers_for(&self, event_type: EventType) -> &[Arc<dyn EventHandler>] {
        self.routes
            .get(&event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn subscribed_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.routes.keys().copied().collect();
        types.sort();
        types
    }

    /// 传输层用来选择分区的键
    pub fn partition_key(&self, event: &Event) -> Option<i64> {
        self.handlers_for(event.event_type())
            .iter()
            .filter(|h| h.supports(event))
            .find_map(|h| h.find_article_id(event))
    }

    /// 将事件分发给所有匹配的处理器
    ///
    /// 每个处理器恰好执行一次；一个处理器失败、超时或 panic
    /// 不影响其他处理器。
    pub async fn dispatch(&self, event: &Event) -> DispatchReport {
        let event_type = event.event_type();
        let mut report = DispatchReport {
            event_id: event.event_id,
            event_type,
            handled: Vec::new(),
            failures: Vec::new(),
        };

        let candidates = self.handlers_for(event_type);
        if candidates.is_empty() {
            debug!("No handler subscribed to {} (event {})", event_type, event.event_id);
            return report;
        }

        for handler in candidates {
            if !handler.supports(event) {
                debug!("{} declined event {}", handler.name(), event.event_id);
                continue;
            }

            match self.invoke(handler.as_ref(), event).await {
                Ok(()) => report.handled.push(handler.name()),
                Err(e) => {
                    warn!(
                        "Handler {} failed on event {} ({}): {}",
                        handler.name(),
                        event.event_id,
                        event_type,
                        e
                    );
                    report.failures.push(HandlerFailure {
                        handler: handler.name(),
                        error: e,
                    });
                }
            }
        }

        report
    }

    async fn invoke(&self, handler: &dyn EventHandler, event: &Event) -> Result<()> {
        let guarded = AssertUnwindSafe(handler.handle(event)).catch_unwind();

        let outcome = match self.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(AppError::Transient(format!(
                        "{} timed out after {:?}",
                        handler.name(),
                        limit
                    )))
                }
            },
            None => guarded.await,
        };

        outcome.unwrap_or_else(|_| {
            error!("Handler {} panicked on event {}", handler.name(), event.event_id);
            Err(AppError::Internal(format!("{} panicked", handler.name())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{ArticleViewPayload, EventPayload};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        name: &'static str,
        types: &'static [EventType],
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        fn event_types(&self) -> &'static [EventType] {
            self.types
        }

        async fn handle(&self, _event: &Event) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn find_article_id(&self, event: &Event) -> Option<i64> {
            Some(event.article_id())
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl EventHandler for PanickingHandler {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn event_types(&self) -> &'static [EventType] {
            &[EventType::ArticleViewed]
        }

        async fn handle(&self, _event: &Event) -> Result<()> {
            panic!("boom");
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl EventHandler for SlowHandler {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn event_types(&self) -> &'static [EventType] {
            &[EventType::ArticleViewed]
        }

        async fn handle(&self, _event: &Event) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    fn viewed(article_id: i64) -> Event {
        Event::new(
            1,
            EventPayload::ArticleViewed(ArticleViewPayload {
                article_id,
                article_view_count: 1,
            }),
        )
    }

    #[tokio::test]
    async fn test_dispatch_invokes_each_matching_handler_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let other = Arc::new(AtomicUsize::new(0));
        let registry = EventHandlerRegistry::builder()
            .register(CountingHandler {
                name: "views",
                types: &[EventType::ArticleViewed, EventType::ArticleViewed],
                calls: calls.clone(),
            })
            .register(CountingHandler {
                name: "likes",
                types: &[EventType::ArticleLiked],
                calls: other.clone(),
            })
            .build();

        let report = registry.dispatch(&viewed(1)).await;

        assert!(report.is_success());
        assert_eq!(report.handled, vec!["views"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsubscribed_event_is_ignored() {
        let registry = EventHandlerRegistry::builder()
            .register(CountingHandler {
                name: "likes",
                types: &[EventType::ArticleLiked],
                calls: Arc::new(AtomicUsize::new(0)),
            })
            .build();

        let report = registry.dispatch(&viewed(1)).await;
        assert!(report.is_unhandled());
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = EventHandlerRegistry::builder()
            .register(PanickingHandler)
            .register(CountingHandler {
                name: "views",
                types: &[EventType::ArticleViewed],
                calls: calls.clone(),
            })
            .build();

        let report = registry.dispatch(&viewed(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.handled, vec!["views"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].handler, "panicking");
        assert!(matches!(
            report.into_result(),
            Err(AppError::Handler { matched: 2, failed: 1, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let registry = EventHandlerRegistry::builder()
            .register(SlowHandler)
            .with_handler_timeout(Duration::from_millis(100))
            .build();

        let report = registry.dispatch(&viewed(1)).await;

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, AppError::Transient(_)));
    }

    #[test]
    fn test_partition_key_comes_from_supporting_handler() {
        let registry = EventHandlerRegistry::builder()
            .register(PanickingHandler)
            .register(CountingHandler {
                name: "views",
                types: &[EventType::ArticleViewed],
                calls: Arc::new(AtomicUsize::new(0)),
            })
            .build();

        assert_eq!(registry.partition_key(&viewed(77)), Some(77));
        assert_eq!(registry.subscribed_types(), vec![EventType::ArticleViewed]);
        assert_eq!(registry.handler_count(), 2);
    }
}
