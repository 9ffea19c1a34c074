use std::sync::Arc;
use tracing::info;

use crate::{
    config::Config,
    services::{
        ArticleReadService, CommentService, ConsumerOptions, ConsumerPublisher, EventHandler,
        EventHandlerRegistry, EventPublisher, HotArticleOptions, HotArticleService,
        InMemoryArticleQueryModelRepository, InMemoryCommentStore, PartitionedConsumer,
    },
    utils::{snowflake::Snowflake, time::Clock},
};

/// 应用程序的共享状态
/// 包含所有服务和消费者的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 事件发布者
    pub publisher: Arc<dyn EventPublisher>,

    /// 评论服务（命令侧）
    pub comment_service: CommentService,

    /// 文章查询模型服务
    pub article_read_service: ArticleReadService,

    /// 热门文章服务
    pub hot_article_service: HotArticleService,

    /// 已启动的消费者
    pub consumers: Vec<Arc<PartitionedConsumer>>,
}

impl AppState {
    /// 组装服务并启动消费者，需要在 tokio 运行时内调用
    pub fn build(config: Config, clock: Arc<dyn Clock>) -> Self {
        let consumer_options = ConsumerOptions::from(&config);

        let article_read_service =
            ArticleReadService::new(Arc::new(InMemoryArticleQueryModelRepository::new()));
        let hot_article_service =
            HotArticleService::new(clock, HotArticleOptions::from(&config));

        let article_read_consumer = Arc::new(PartitionedConsumer::start(
            "article-read",
            Arc::new(build_registry(&config, article_read_service.handlers())),
            consumer_options.clone(),
        ));
        let hot_article_consumer = Arc::new(PartitionedConsumer::start(
            "hot-article",
            Arc::new(build_registry(&config, hot_article_service.handlers())),
            consumer_options,
        ));
        let consumers = vec![article_read_consumer, hot_article_consumer];

        let publisher: Arc<dyn EventPublisher> =
            Arc::new(ConsumerPublisher::new(consumers.clone()));

        let comment_service = CommentService::new(
            Arc::new(InMemoryCommentStore::new()),
            publisher.clone(),
            Arc::new(Snowflake::new(config.snowflake_node_id)),
            config.comment_delete_max_retries,
        );

        info!("Application state initialized with {} consumers", consumers.len());

        Self {
            config,
            publisher,
            comment_service,
            article_read_service,
            hot_article_service,
            consumers,
        }
    }

    /// 停止所有消费者
    pub async fn shutdown(&self) {
        for consumer in &self.consumers {
            consumer.shutdown().await;
        }
    }
}

fn build_registry(config: &Config, handlers: Vec<Arc<dyn EventHandler>>) -> EventHandlerRegistry {
    handlers
        .into_iter()
        .fold(EventHandlerRegistry::builder(), |builder, handler| {
            builder.register_arc(handler)
        })
        .with_handler_timeout(config.handler_timeout())
        .build()
}
