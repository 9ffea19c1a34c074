use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{
    config::Config,
    error::Result,
    models::event::{Event, EventType},
    models::hot_article::{HotArticle, HotArticleScore},
    services::registry::{unexpected_payload, EventHandler},
    utils::counter::WindowedCounterStore,
    utils::time::{duration_to_midnight, local_bucket, Clock},
};

#[derive(Debug, Clone)]
pub struct HotArticleOptions {
    pub limit: usize,
    pub retention_days: i64,
}

impl Default for HotArticleOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            retention_days: 10,
        }
    }
}

impl From<&Config> for HotArticleOptions {
    fn from(config: &Config) -> Self {
        Self {
            limit: config.hot_article_limit,
            retention_days: config.hot_article_retention_days,
        }
    }
}

/// 按日期分桶的热门文章榜单
#[derive(Clone, Default)]
pub struct HotArticleListRepository {
    buckets: Arc<DashMap<NaiveDate, Vec<HotArticle>>>,
}

impl HotArticleListRepository {
    /// 写入或更新分数，按分数降序保留前 `limit` 个
    pub fn add(&self, date: NaiveDate, article_id: i64, score: i64, limit: usize) {
        let mut bucket = self.buckets.entry(date).or_default();
        bucket.retain(|a| a.article_id != article_id);
        bucket.push(HotArticle { article_id, score });
        bucket.sort_by(|a, b| b.score.cmp(&a.score).then(b.article_id.cmp(&a.article_id)));
        bucket.truncate(limit);
    }

    pub fn remove(&self, date: NaiveDate, article_id: i64) {
        if let Some(mut bucket) = self.buckets.get_mut(&date) {
            bucket.retain(|a| a.article_id != article_id);
        }
    }

    pub fn read_all(&self, date: NaiveDate) -> Vec<HotArticle> {
        self.buckets
            .get(&date)
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// 删除早于 `oldest` 的桶
    pub fn evict_before(&self, oldest: NaiveDate) {
        self.buckets.retain(|date, _| *date >= oldest);
    }
}

struct HotArticleState {
    views: WindowedCounterStore,
    likes: WindowedCounterStore,
    comments: WindowedCounterStore,
    // 文章创建时间（毫秒），午夜过期
    created_times: WindowedCounterStore,
    list: HotArticleListRepository,
    clock: Arc<dyn Clock>,
    options: HotArticleOptions,
}

impl HotArticleState {
    fn ttl(&self) -> Duration {
        duration_to_midnight(self.clock.now())
    }

    fn created_at(&self, article_id: i64) -> Option<DateTime<Utc>> {
        self.created_times
            .read(article_id)
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
    }

    /// 重新计算分数并写入今天的榜单，只统计今天创建的文章
    fn refresh_score(&self, article_id: i64) {
        let now = self.clock.now();
        let today = local_bucket(now);

        let created_today = self
            .created_at(article_id)
            .map(|created_at| local_bucket(created_at) == today)
            .unwrap_or(false);
        if !created_today {
            debug!("Article {} was not created today, ranking unchanged", article_id);
            return;
        }

        let score = HotArticleScore {
            like_count: self.likes.read(article_id).unwrap_or(0),
            comment_count: self.comments.read(article_id).unwrap_or(0),
            view_count: self.views.read(article_id).unwrap_or(0),
        };

        self.list
            .add(today, article_id, score.value(), self.options.limit);
        self.list
            .evict_before(today - Duration::days(self.options.retention_days.max(1) - 1));
    }
}

pub struct HotArticleCreatedEventHandler {
    state: Arc<HotArticleState>,
}

#[async_trait]
impl EventHandler for HotArticleCreatedEventHandler {
    fn name(&self) -> &'static str {
        "hot_article.article_created"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ArticleCreated]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_article()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;
        self.state.created_times.create_or_update(
            payload.article_id,
            payload.created_at.timestamp_millis(),
            self.state.ttl(),
        );
        Ok(())
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

pub struct HotArticleDeletedEventHandler {
    state: Arc<HotArticleState>,
}

#[async_trait]
impl EventHandler for HotArticleDeletedEventHandler {
    fn name(&self) -> &'static str {
        "hot_article.article_deleted"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ArticleDeleted]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_article()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;
        self.state
            .list
            .remove(local_bucket(payload.created_at), payload.article_id);
        self.state.created_times.delete(payload.article_id);
        Ok(())
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

/// 浏览数：用快照覆盖今天的计数器，午夜重置
pub struct HotArticleViewedEventHandler {
    state: Arc<HotArticleState>,
}

#[async_trait]
impl EventHandler for HotArticleViewedEventHandler {
    fn name(&self) -> &'static str {
        "hot_article.article_viewed"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ArticleViewed]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_article_view()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;
        self.state.views.create_or_update(
            payload.article_id,
            payload.article_view_count,
            self.state.ttl(),
        );
        self.state.refresh_score(payload.article_id);
        Ok(())
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

pub struct HotArticleLikedEventHandler {
    state: Arc<HotArticleState>,
}

#[async_trait]
impl EventHandler for HotArticleLikedEventHandler {
    fn name(&self) -> &'static str {
        "hot_article.article_liked"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::ArticleLiked, EventType::ArticleUnliked]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_article_like()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;
        self.state.likes.create_or_update(
            payload.article_id,
            payload.article_like_count,
            self.state.ttl(),
        );
        self.state.refresh_score(payload.article_id);
        Ok(())
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

pub struct HotArticleCommentEventHandler {
    state: Arc<HotArticleState>,
}

#[async_trait]
impl EventHandler for HotArticleCommentEventHandler {
    fn name(&self) -> &'static str {
        "hot_article.comment_count"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::CommentCreated, EventType::CommentDeleted]
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let payload = event
            .payload
            .as_comment()
            .ok_or_else(|| unexpected_payload(self.name(), event))?;
        if let Some(count) = payload.article_comment_count {
            self.state
                .comments
                .create_or_update(payload.article_id, count, self.state.ttl());
            self.state.refresh_score(payload.article_id);
        }
        Ok(())
    }

    fn find_article_id(&self, event: &Event) -> Option<i64> {
        Some(event.article_id())
    }
}

/// 热门文章服务（hot-article 消费者）
#[derive(Clone)]
pub struct HotArticleService {
    state: Arc<HotArticleState>,
}

impl HotArticleService {
    pub fn new(clock: Arc<dyn Clock>, options: HotArticleOptions) -> Self {
        Self {
            state: Arc::new(HotArticleState {
                views: WindowedCounterStore::new("article_view_count", clock.clone()),
                likes: WindowedCounterStore::new("article_like_count", clock.clone()),
                comments: WindowedCounterStore::new("article_comment_count", clock.clone()),
                created_times: WindowedCounterStore::new("article_created_time", clock.clone()),
                list: HotArticleListRepository::default(),
                clock,
                options,
            }),
        }
    }

    pub fn handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        vec![
            Arc::new(HotArticleCreatedEventHandler {
                state: self.state.clone(),
            }),
            Arc::new(HotArticleDeletedEventHandler {
                state: self.state.clone(),
            }),
            Arc::new(HotArticleViewedEventHandler {
                state: self.state.clone(),
            }),
            Arc::new(HotArticleLikedEventHandler {
                state: self.state.clone(),
            }),
            Arc::new(HotArticleCommentEventHandler {
                state: self.state.clone(),
            }),
        ]
    }

    /// 所有午夜过期的存储，用于启动后台清理
    pub fn windowed_stores(&self) -> [&WindowedCounterStore; 4] {
        [
            &self.state.views,
            &self.state.likes,
            &self.state.comments,
            &self.state.created_times,
        ]
    }

    pub fn view_count(&self, article_id: i64) -> Option<i64> {
        self.state.views.read(article_id)
    }

    pub fn read_all(&self, date: NaiveDate) -> Vec<HotArticle> {
        self.state.list.read_all(date)
    }

    pub fn today(&self) -> NaiveDate {
        local_bucket(self.state.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{
        ArticleLikePayload, ArticlePayload, ArticleViewPayload, EventPayload,
    };
    use crate::services::registry::EventHandlerRegistry;
    use crate::utils::time::{next_local_midnight, ManualClock};

    fn setup(limit: usize) -> (HotArticleService, EventHandlerRegistry, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let service = HotArticleService::new(
            Arc::new(clock.clone()),
            HotArticleOptions {
                limit,
                retention_days: 10,
            },
        );
        let registry = service
            .handlers()
            .into_iter()
            .fold(EventHandlerRegistry::builder(), |b, h| b.register_arc(h))
            .build();
        (service, registry, clock)
    }

    fn created(article_id: i64, created_at: DateTime<Utc>) -> Event {
        Event::new(
            article_id,
            EventPayload::ArticleCreated(ArticlePayload {
                article_id,
                title: "t".to_string(),
                content: "c".to_string(),
                board_id: 1,
                writer_id: 1,
                created_at,
                modified_at: created_at,
                board_article_count: None,
            }),
        )
    }

    fn viewed(article_id: i64, count: i64) -> Event {
        Event::new(
            100 + article_id,
            EventPayload::ArticleViewed(ArticleViewPayload {
                article_id,
                article_view_count: count,
            }),
        )
    }

    fn liked(article_id: i64, count: i64) -> Event {
        Event::new(
            200 + article_id,
            EventPayload::ArticleLiked(ArticleLikePayload {
                article_like_id: 1,
                article_id,
                user_id: 1,
                created_at: Utc::now(),
                article_like_count: count,
            }),
        )
    }

    #[tokio::test]
    async fn test_viewed_upsert_is_idempotent() {
        let (service, registry, clock) = setup(10);
        registry.dispatch(&created(1, clock.now())).await.into_result().unwrap();

        registry.dispatch(&viewed(1, 30)).await.into_result().unwrap();
        let once = (service.view_count(1), service.read_all(service.today()));
        registry.dispatch(&viewed(1, 30)).await.into_result().unwrap();
        let twice = (service.view_count(1), service.read_all(service.today()));

        assert_eq!(once, twice);
        assert_eq!(twice.0, Some(30));
    }

    #[tokio::test]
    async fn test_view_counter_resets_at_midnight() {
        let (service, registry, clock) = setup(10);
        let start = clock.now();
        registry.dispatch(&viewed(1, 30)).await.into_result().unwrap();

        clock.set(next_local_midnight(start) + Duration::seconds(1));
        assert_eq!(service.view_count(1), None);
    }

    #[tokio::test]
    async fn test_created_time_expires_at_midnight() {
        let (service, registry, clock) = setup(10);
        let start = clock.now();
        registry.dispatch(&created(1, start)).await.into_result().unwrap();
        assert!(service.state.created_at(1).is_some());

        clock.set(next_local_midnight(start) + Duration::seconds(1));
        assert_eq!(service.state.created_at(1), None);
        assert_eq!(service.state.created_times.cleanup_expired(), 1);
        assert_eq!(service.state.created_times.cleanup_expired(), 0);

        registry.dispatch(&viewed(1, 5)).await.into_result().unwrap();
        assert!(service.read_all(service.today()).is_empty());
    }

    #[tokio::test]
    async fn test_ranking_orders_by_score_and_truncates() {
        let (service, registry, clock) = setup(2);
        for article_id in 1..=3 {
            registry
                .dispatch(&created(article_id, clock.now()))
                .await
                .into_result()
                .unwrap();
        }

        registry.dispatch(&viewed(1, 5)).await.into_result().unwrap();
        registry.dispatch(&liked(2, 3)).await.into_result().unwrap();
        registry.dispatch(&viewed(3, 1)).await.into_result().unwrap();

        let ranking = service.read_all(service.today());
        assert_eq!(
            ranking,
            vec![
                HotArticle {
                    article_id: 2,
                    score: 9
                },
                HotArticle {
                    article_id: 1,
                    score: 5
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_old_articles_are_not_ranked() {
        let (service, registry, clock) = setup(10);
        registry
            .dispatch(&created(1, clock.now() - Duration::days(3)))
            .await
            .into_result()
            .unwrap();
        registry.dispatch(&viewed(1, 50)).await.into_result().unwrap();

        assert_eq!(service.view_count(1), Some(50));
        assert!(service.read_all(service.today()).is_empty());
    }

    #[tokio::test]
    async fn test_deleted_article_leaves_ranking() {
        let (service, registry, clock) = setup(10);
        let created_event = created(1, clock.now());
        registry.dispatch(&created_event).await.into_result().unwrap();
        registry.dispatch(&viewed(1, 5)).await.into_result().unwrap();
        assert_eq!(service.read_all(service.today()).len(), 1);

        let payload = created_event.payload.as_article().unwrap().clone();
        registry
            .dispatch(&Event::new(9, EventPayload::ArticleDeleted(payload)))
            .await
            .into_result()
            .unwrap();
        assert!(service.read_all(service.today()).is_empty());
    }

    #[test]
    fn test_list_evicts_old_buckets() {
        let list = HotArticleListRepository::default();
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        list.add(today - Duration::days(11), 1, 10, 10);
        list.add(today, 2, 10, 10);

        list.evict_before(today - Duration::days(9));
        assert!(list.read_all(today - Duration::days(11)).is_empty());
        assert_eq!(list.read_all(today).len(), 1);
    }
}
