use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    error::{AppError, Result},
    models::article::ArticleQueryModel,
    models::event::{Event, EventType},
    services::registry::{unexpected_payload, EventHandler},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleQueryModelRepository: Send + Sync {
    async fn create(&self, model: ArticleQueryModel) -> Result<()>;
    async fn read(&self, article_id: i64) -> Result<Option<ArticleQueryModel>>;
    async fn update(&self, model: ArticleQueryModel) -> Result<()>;
    async fn delete(&self, article_id: i64) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct InMemoryArticleQueryModelRepository {
    models: Arc<DashMap<i64, ArticleQueryModel>>,
}

impl InMemoryArticleQueryModelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleQueryModelRepository for InMemoryArticleQueryModelRepository {
    async fn create(&self, model: ArticleQueryModel) -> Result<()> {
        self.models.insert(model.article_id, model);
        Ok(())
    }

    async fn read(&self, article_id: i64) -> Result<Option<ArticleQueryModel>> {
        Ok(self.models.get(&article_id).map(|m| m.clone()))
    }

    async fn update(&self, model: ArticleQueryModel) -> Result<()> {
        // Only existing rows are updated; a concurrent delete wins.
        if let Some(mut current) = self.models.get_mut(&model.article_id) {
            *current = model;
        }
        Ok(())
    }

    async fn delete(&self, article_id: i64) -> Result<()> {
        self.models.remove(&article_id);
        Ok(())
    }
}

/// 查询模型尚未投影或已被删除，属于最终一致性允许的竞态
fn projection_race(handler: &'static str, event: &Event) {
    warn!(
        "{}: no query model for article {}, skipping event {}",
        handler,
        event.article_id(),
        event.event_id
    );
}

pub struct ArticleCreatedEventHandler {
    repository: Arc<dyn ArticleQueryModelRepository>,
}

impl ArticleCreatedEventHandler {
    pub fn new(repository: Arc<dyn ArticleQueryModelRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl EventHandler for ArticleCreatedEventHandler {
    fn name(&self) -> &'static str {
        "article_read.article_created"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ArticleCreated]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_article()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;

        match self.repository.read(payload.article_id).await? {
            // Redelivered: refresh the article fields and keep projected counters.
            Some(mut model) => {
                model.update_by_article(payload);
                self.repository.update(model).await
            }
            None => {
                info!("Projecting new article {}", payload.article_id);
                self.repository
                    .create(ArticleQueryModel::create(payload))
                    .await
            }
        }
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

pub struct ArticleUpdatedEventHandler {
    repository: Arc<dyn ArticleQueryModelRepository>,
}

impl ArticleUpdatedEventHandler {
    pub fn new(repository: Arc<dyn ArticleQueryModelRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl EventHandler for ArticleUpdatedEventHandler {
    fn name(&self) -> &'static str {
        "article_read.article_updated"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ArticleUpdated]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_article()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;

        match self.repository.read(payload.article_id).await? {
            Some(mut model) => {
                model.update_by_article(payload);
                self.repository.update(model).await
            }
            None => {
                projection_race(self.name(), event);
                Ok(())
            }
        }
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

pub struct ArticleDeletedEventHandler {
    repository: Arc<dyn ArticleQueryModelRepository>,
}

impl ArticleDeletedEventHandler {
    pub fn new(repository: Arc<dyn ArticleQueryModelRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl EventHandler for ArticleDeletedEventHandler {
    fn name(&self) -> &'static str {
        "article_read.article_deleted"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ArticleDeleted]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_article()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;
        self.repository.delete(payload.article_id).await
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

/// 点赞/取消点赞：用快照覆盖点赞数
pub struct ArticleLikedEventHandler {
    repository: Arc<dyn ArticleQueryModelRepository>,
}

impl ArticleLikedEventHandler {
    pub fn new(repository: Arc<dyn ArticleQueryModelRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl EventHandler for ArticleLikedEventHandler {
    fn name(&self) -> &'static str {
        "article_read.article_liked"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ArticleLiked, EventType::ArticleUnliked]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_article_like()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;

        match self.repository.read(payload.article_id).await? {
            Some(mut model) => {
                model.update_by_like(payload);
                self.repository.update(model).await
            }
            None => {
                projection_race(self.name(), event);
                Ok(())
            }
        }
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

pub struct CommentCountEventHandler {
    repository: Arc<dyn ArticleQueryModelRepository>,
}

impl CommentCountEventHandler {
    pub fn new(repository: Arc<dyn ArticleQueryModelRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl EventHandler for CommentCountEventHandler {
    fn name(&self) -> &'static str {
        "article_read.comment_count"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::CommentCreated, EventType::CommentDeleted]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_comment()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;

        match self.repository.read(payload.article_id).await? {
            Some(mut model) => {
                model.update_by_comment(payload);
                self.repository.update(model).await
            }
            None => {
                projection_race(self.name(), event);
                Ok(())
            }
        }
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

pub struct ArticleViewedEventHandler {
    repository: Arc<dyn ArticleQueryModelRepository>,
}

impl ArticleViewedEventHandler {
    pub fn new(repository: Arc<dyn ArticleQueryModelRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl EventHandler for ArticleViewedEventHandler {
    fn name(&self) -> &'static str {
        "article_read.article_viewed"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ArticleViewed]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_article_view()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;

        match self.repository.read(payload.article_id).await? {
            Some(mut model) => {
                model.update_by_view(payload);
                self.repository.update(model).await
            }
            None => {
                projection_race(self.name(), event);
                Ok(())
            }
        }
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

/// 文章读服务（article-read 消费者）
#[derive(Clone)]
pub struct ArticleReadService {
    repository: Arc<dyn ArticleQueryModelRepository>,
}

impl ArticleReadService {
    pub fn new(repository: Arc<dyn ArticleQueryModelRepository>) -> Self {
        Self { repository }
    }

    /// 该消费者的全部事件处理器
    pub fn handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        vec![
            Arc::new(ArticleCreatedEventHandler::new(self.repository.clone())),
            Arc::new(ArticleUpdatedEventHandler::new(self.repository.clone())),
            Arc::new(ArticleDeletedEventHandler::new(self.repository.clone())),
            Arc::new(ArticleLikedEventHandler::new(self.repository.clone())),
            Arc::new(CommentCountEventHandler::new(self.repository.clone())),
            Arc::new(ArticleViewedEventHandler::new(self.repository.clone())),
        ]
    }

    pub async fn read(&self, article_id: i64) -> Result<ArticleQueryModel> {
        debug!("Reading article query model: {}", article_id);
        self.repository
            .read(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))
    }
}
