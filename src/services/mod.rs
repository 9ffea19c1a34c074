pub mod article_read;
pub mod comment;
pub mod consumer;
pub mod hot_article;
pub mod publisher;
pub mod registry;

// 重新导出常用类型
pub use article_read::{
    ArticleQueryModelRepository, ArticleReadService, InMemoryArticleQueryModelRepository,
};
pub use comment::{CommentService, CommentStore, CommentTransaction, InMemoryCommentStore};
pub use consumer::{ConsumerOptions, ConsumerStats, PartitionedConsumer};
pub use hot_article::{HotArticleOptions, HotArticleService};
pub use publisher::{ConsumerPublisher, EventPublisher};
pub use registry::{DispatchReport, EventHandler, EventHandlerRegistry};
