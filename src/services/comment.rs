use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    error::{AppError, Result},
    models::comment::*,
    models::event::{CommentPayload, Event, EventPayload},
    services::publisher::EventPublisher,
    utils::snowflake::Snowflake,
};

/// 判断是否有子评论只需要区分 0、1、≥2
pub const DESCENDANT_COUNT_LIMIT: u64 = 2;

/// 评论存储上的一个工作单元
///
/// 未提交就被丢弃的事务会回滚。
#[async_trait]
pub trait CommentTransaction: Send {
    async fn find_by_id(&mut self, comment_id: i64) -> Result<Option<Comment>>;

    /// 统计以该评论为根的子树行数（含自身），最多数到 `limit`
    async fn count_descendants_or_self(
        &mut self,
        article_id: i64,
        comment_id: i64,
        limit: u64,
    ) -> Result<u64>;

    async fn count_by_article(&mut self, article_id: i64) -> Result<i64>;

    async fn find_all_by_article(&mut self, article_id: i64) -> Result<Vec<Comment>>;

    async fn save(&mut self, comment: &Comment) -> Result<()>;

    /// 存在则删除，返回是否真的删除了一行
    async fn delete(&mut self, comment: &Comment) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CommentTransaction>>;
}

#[derive(Debug, Default)]
struct CommentTable {
    rows: HashMap<i64, Comment>,
    children: HashMap<i64, BTreeSet<i64>>,
    per_article: HashMap<i64, i64>,
}

impl CommentTable {
    fn insert(&mut self, comment: Comment) -> Option<Comment> {
        let previous = self.remove(comment.comment_id);
        if let Some(parent_id) = comment.parent_comment_id {
            self.children
                .entry(parent_id)
                .or_default()
                .insert(comment.comment_id);
        }
        *self.per_article.entry(comment.article_id).or_insert(0) += 1;
        self.rows.insert(comment.comment_id, comment);
        previous
    }

    fn remove(&mut self, comment_id: i64) -> Option<Comment> {
        let removed = self.rows.remove(&comment_id)?;
        if let Some(parent_id) = removed.parent_comment_id {
            if let Some(siblings) = self.children.get_mut(&parent_id) {
                siblings.remove(&comment_id);
                if siblings.is_empty() {
                    self.children.remove(&parent_id);
                }
            }
        }
        if let Some(count) = self.per_article.get_mut(&removed.article_id) {
            *count -= 1;
            if *count <= 0 {
                self.per_article.remove(&removed.article_id);
            }
        }
        Some(removed)
    }
}

/// 内存评论存储
///
/// 一个事务在整个生命周期内持有表锁，因此对同一祖先的读后删是串行的。
#[derive(Clone, Default)]
pub struct InMemoryCommentStore {
    table: Arc<Mutex<CommentTable>>,
}

impl InMemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn begin(&self) -> Result<Box<dyn CommentTransaction>> {
        let guard = self.table.clone().lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            table: guard,
            undo: Vec::new(),
            committed: false,
        }))
    }
}

enum UndoEntry {
    Restore(Comment),
    Remove(i64),
}

struct InMemoryTransaction {
    table: OwnedMutexGuard<CommentTable>,
    undo: Vec<UndoEntry>,
    committed: bool,
}

#[async_trait]
impl CommentTransaction for InMemoryTransaction {
    async fn find_by_id(&mut self, comment_id: i64) -> Result<Option<Comment>> {
        Ok(self.table.rows.get(&comment_id).cloned())
    }

    async fn count_descendants_or_self(
        &mut self,
        article_id: i64,
        comment_id: i64,
        limit: u64,
    ) -> Result<u64> {
        let in_article = self
            .table
            .rows
            .get(&comment_id)
            .map(|c| c.article_id == article_id)
            .unwrap_or(false);
        if !in_article || limit == 0 {
            return Ok(0);
        }

        // Breadth-first, stopping as soon as the cap is reached.
        let mut count = 1;
        let mut queue = VecDeque::from([comment_id]);
        while let Some(current) = queue.pop_front() {
            let Some(children) = self.table.children.get(&current) else {
                continue;
            };
            for child in children {
                if count >= limit {
                    return Ok(count);
                }
                let same_article = self
                    .table
                    .rows
                    .get(child)
                    .map(|c| c.article_id == article_id)
                    .unwrap_or(false);
                if same_article {
                    count += 1;
                    queue.push_back(*child);
                }
            }
        }

        Ok(count.min(limit))
    }

    async fn count_by_article(&mut self, article_id: i64) -> Result<i64> {
        Ok(self
            .table
            .per_article
            .get(&article_id)
            .copied()
            .unwrap_or(0))
    }

    async fn find_all_by_article(&mut self, article_id: i64) -> Result<Vec<Comment>> {
        Ok(self
            .table
            .rows
            .values()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn save(&mut self, comment: &Comment) -> Result<()> {
        let undo = match self.table.insert(comment.clone()) {
            Some(previous) => UndoEntry::Restore(previous),
            None => UndoEntry::Remove(comment.comment_id),
        };
        self.undo.push(undo);
        Ok(())
    }

    async fn delete(&mut self, comment: &Comment) -> Result<bool> {
        match self.table.remove(comment.comment_id) {
            Some(previous) => {
                self.undo.push(UndoEntry::Restore(previous));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.committed = true;
        this.undo.clear();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(entry) = self.undo.pop() {
            match entry {
                UndoEntry::Restore(comment) => {
                    self.table.insert(comment);
                }
                UndoEntry::Remove(comment_id) => {
                    self.table.remove(comment_id);
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn CommentStore>,
    publisher: Arc<dyn EventPublisher>,
    id_generator: Arc<Snowflake>,
    max_delete_retries: u32,
    // Taken before commit and held until the events are published, so
    // count snapshots leave in commit order.
    publish_order: Arc<Mutex<()>>,
}

struct DeleteEffect {
    outcome: DeleteOutcome,
    affected: Vec<Comment>,
    article_comment_count: i64,
    _publish_turn: OwnedMutexGuard<()>,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn CommentStore>,
        publisher: Arc<dyn EventPublisher>,
        id_generator: Arc<Snowflake>,
        max_delete_retries: u32,
    ) -> Self {
        Self {
            store,
            publisher,
            id_generator,
            max_delete_retries,
            publish_order: Arc::new(Mutex::new(())),
        }
    }

    async fn publish_turn(&self) -> OwnedMutexGuard<()> {
        self.publish_order.clone().lock_owned().await
    }

    pub async fn create(&self, request: CreateCommentRequest) -> Result<Comment> {
        debug!("Creating comment for article: {}", request.article_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let mut tx = self.store.begin().await?;

        if let Some(parent_id) = request.parent_comment_id {
            let parent = tx
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;
            if parent.article_id != request.article_id {
                return Err(AppError::bad_request(
                    "Parent comment belongs to another article",
                ));
            }
            if parent.deleted {
                return Err(AppError::bad_request("Cannot reply to a deleted comment"));
            }
        }

        let comment = Comment {
            comment_id: self.id_generator.next_id(),
            article_id: request.article_id,
            parent_comment_id: request.parent_comment_id,
            content: request.content,
            writer_id: request.writer_id,
            deleted: false,
            created_at: Utc::now(),
        };

        tx.save(&comment).await?;
        let article_comment_count = tx.count_by_article(comment.article_id).await?;
        let _publish_turn = self.publish_turn().await;
        tx.commit().await?;

        info!(
            "Comment {} created on article {}",
            comment.comment_id, comment.article_id
        );

        self.publish(EventPayload::CommentCreated(Self::payload(
            &comment,
            article_comment_count,
        )))
        .await?;

        Ok(comment)
    }

    pub async fn read(&self, comment_id: i64) -> Result<Comment> {
        let mut tx = self.store.begin().await?;
        let comment = tx
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;
        tx.commit().await?;
        Ok(comment)
    }

    /// 文章下的所有评论，父评论在前，同级按 id 排序
    pub async fn read_all(&self, article_id: i64) -> Result<Vec<Comment>> {
        let mut tx = self.store.begin().await?;
        let comments = tx.find_all_by_article(article_id).await?;
        tx.commit().await?;
        Ok(tree_order(comments))
    }

    pub async fn count(&self, article_id: i64) -> Result<i64> {
        let mut tx = self.store.begin().await?;
        let count = tx.count_by_article(article_id).await?;
        tx.commit().await?;
        Ok(count)
    }

    /// 删除评论
    ///
    /// 有子评论时软删除；否则物理删除，并沿祖先链删除所有已软删除且
    /// 不再有其他子评论的祖先。整个过程在一个事务中完成，冲突时重试。
    pub async fn delete(&self, comment_id: i64) -> Result<DeleteOutcome> {
        let mut attempt: u32 = 0;
        let effect = loop {
            match self.try_delete(comment_id).await {
                Ok(effect) => break effect,
                Err(AppError::Conflict(msg)) => {
                    if attempt >= self.max_delete_retries {
                        return Err(AppError::Transient(format!(
                            "Deleting comment {} kept conflicting after {} retries: {}",
                            comment_id, attempt, msg
                        )));
                    }
                    attempt += 1;
                    warn!(
                        "Conflict while deleting comment {}, retry {}: {}",
                        comment_id, attempt, msg
                    );
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        };

        for comment in &effect.affected {
            self.publish(EventPayload::CommentDeleted(Self::payload(
                comment,
                effect.article_comment_count,
            )))
            .await?;
        }

        Ok(effect.outcome)
    }

    async fn try_delete(&self, comment_id: i64) -> Result<DeleteEffect> {
        let mut tx = self.store.begin().await?;

        let mut comment = tx
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if has_children(tx.as_mut(), &comment).await? {
            if !comment.deleted {
                comment.soft_delete();
                tx.save(&comment).await?;
            }
            let article_comment_count = tx.count_by_article(comment.article_id).await?;
            let publish_turn = self.publish_turn().await;
            tx.commit().await?;

            info!("Comment {} soft-deleted, replies kept", comment_id);
            return Ok(DeleteEffect {
                outcome: DeleteOutcome::SoftDeleted { comment_id },
                affected: vec![comment],
                article_comment_count,
                _publish_turn: publish_turn,
            });
        }

        let article_id = comment.article_id;
        let removed = remove_with_tombstoned_ancestors(tx.as_mut(), comment).await?;
        let article_comment_count = tx.count_by_article(article_id).await?;
        let publish_turn = self.publish_turn().await;
        tx.commit().await?;

        info!(
            "Comment {} removed, cascade removed {} rows",
            comment_id,
            removed.len()
        );

        Ok(DeleteEffect {
            outcome: DeleteOutcome::Removed {
                removed: removed.iter().map(|c| c.comment_id).collect(),
            },
            affected: removed,
            article_comment_count,
            _publish_turn: publish_turn,
        })
    }

    async fn publish(&self, payload: EventPayload) -> Result<()> {
        let event = Event::new(self.id_generator.next_id(), payload);
        self.publisher.publish(event).await
    }

    fn payload(comment: &Comment, article_comment_count: i64) -> CommentPayload {
        CommentPayload {
            comment_id: comment.comment_id,
            article_id: comment.article_id,
            parent_comment_id: comment.parent_comment_id,
            content: comment.content.clone(),
            writer_id: comment.writer_id,
            deleted: comment.deleted,
            created_at: comment.created_at,
            article_comment_count: Some(article_comment_count),
        }
    }
}

async fn has_children(tx: &mut dyn CommentTransaction, comment: &Comment) -> Result<bool> {
    let count = tx
        .count_descendants_or_self(comment.article_id, comment.comment_id, DESCENDANT_COUNT_LIMIT)
        .await?;
    Ok(count >= DESCENDANT_COUNT_LIMIT)
}

/// 删除一个没有子评论的评论，然后向上删除已软删除、且已无其他子评论的祖先
async fn remove_with_tombstoned_ancestors(
    tx: &mut dyn CommentTransaction,
    comment: Comment,
) -> Result<Vec<Comment>> {
    let mut removed = Vec::new();
    let mut current = comment;

    loop {
        if tx.delete(&current).await? {
            removed.push(current.clone());
        }

        let Some(parent_id) = current.parent_comment_id else {
            break;
        };

        let parent = match tx.find_by_id(parent_id).await? {
            Some(parent) => parent,
            None => {
                warn!(
                    "Parent {} of comment {} is missing, stopping cascade",
                    parent_id, current.comment_id
                );
                break;
            }
        };

        if !parent.deleted || has_children(tx, &parent).await? {
            break;
        }

        current = parent;
    }

    Ok(removed)
}

fn tree_order(comments: Vec<Comment>) -> Vec<Comment> {
    let ids: BTreeSet<i64> = comments.iter().map(|c| c.comment_id).collect();
    let mut by_parent: BTreeMap<Option<i64>, Vec<Comment>> = BTreeMap::new();
    for comment in comments {
        // Replies whose parent is outside the result are listed as roots.
        let key = comment.parent_comment_id.filter(|p| ids.contains(p));
        by_parent.entry(key).or_default().push(comment);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by_key(|c| c.comment_id);
    }

    let mut ordered = Vec::with_capacity(ids.len());
    let mut stack: Vec<Comment> = by_parent.remove(&None).unwrap_or_default();
    stack.reverse();
    while let Some(comment) = stack.pop() {
        if let Some(mut replies) = by_parent.remove(&Some(comment.comment_id)) {
            replies.reverse();
            stack.extend(replies);
        }
        ordered.push(comment);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::EventType;
    use crate::services::publisher::MockEventPublisher;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn comment(id: i64, parent: Option<i64>, deleted: bool) -> Comment {
        Comment {
            comment_id: id,
            article_id: 1,
            parent_comment_id: parent,
            content: format!("comment {}", id),
            writer_id: 1,
            deleted,
            created_at: Utc::now(),
        }
    }

    async fn seed(store: &InMemoryCommentStore, comments: Vec<Comment>) {
        let mut tx = store.begin().await.unwrap();
        for c in &comments {
            tx.save(c).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    fn quiet_publisher() -> Arc<dyn EventPublisher> {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().returning(|_| Ok(()));
        Arc::new(publisher)
    }

    fn service(store: Arc<dyn CommentStore>, publisher: Arc<dyn EventPublisher>) -> CommentService {
        CommentService::new(store, publisher, Arc::new(Snowflake::new(1)), 3)
    }

    #[tokio::test]
    async fn test_count_is_capped() {
        let store = InMemoryCommentStore::new();
        seed(
            &store,
            vec![
                comment(1, None, false),
                comment(2, Some(1), false),
                comment(3, Some(1), false),
                comment(4, Some(2), false),
            ],
        )
        .await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.count_descendants_or_self(1, 1, 2).await.unwrap(), 2);
        assert_eq!(tx.count_descendants_or_self(1, 1, 10).await.unwrap(), 4);
        assert_eq!(tx.count_descendants_or_self(1, 3, 2).await.unwrap(), 1);
        assert_eq!(tx.count_descendants_or_self(1, 99, 2).await.unwrap(), 0);
        // Wrong article scope.
        assert_eq!(tx.count_descendants_or_self(2, 1, 2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let store = InMemoryCommentStore::new();
        seed(&store, vec![comment(1, None, false), comment(2, Some(1), false)]).await;

        {
            let mut tx = store.begin().await.unwrap();
            let mut parent = tx.find_by_id(1).await.unwrap().unwrap();
            parent.soft_delete();
            tx.save(&parent).await.unwrap();
            let child = tx.find_by_id(2).await.unwrap().unwrap();
            assert!(tx.delete(&child).await.unwrap());
            tx.save(&comment(3, None, false)).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.find_by_id(1).await.unwrap().unwrap().deleted);
        assert!(tx.find_by_id(2).await.unwrap().is_some());
        assert!(tx.find_by_id(3).await.unwrap().is_none());
        assert_eq!(tx.count_by_article(1).await.unwrap(), 2);
        assert_eq!(tx.count_descendants_or_self(1, 1, 2).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_with_children_soft_deletes_and_publishes() {
        let store = Arc::new(InMemoryCommentStore::new());
        seed(&store, vec![comment(1, None, false), comment(2, Some(1), false)]).await;

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .withf(|event| {
                event.event_type() == EventType::CommentDeleted
                    && event.payload.as_comment().map(|p| p.comment_id) == Some(1)
                    && event.payload.as_comment().map(|p| p.deleted) == Some(true)
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service(store.clone(), Arc::new(publisher));
        let outcome = service.delete(1).await.unwrap();

        assert_eq!(outcome, DeleteOutcome::SoftDeleted { comment_id: 1 });
        assert!(service.read(1).await.unwrap().deleted);
        assert!(service.read(2).await.is_ok());
    }

    #[tokio::test]
    async fn test_cascade_publishes_each_removed_row() {
        let store = Arc::new(InMemoryCommentStore::new());
        seed(&store, vec![comment(1, None, true), comment(2, Some(1), false)]).await;

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .withf(|event| {
                event.event_type() == EventType::CommentDeleted
                    && event.payload.as_comment().and_then(|p| p.article_comment_count) == Some(0)
            })
            .times(2)
            .returning(|_| Ok(()));

        let service = service(store.clone(), Arc::new(publisher));
        let outcome = service.delete(2).await.unwrap();

        assert_eq!(outcome, DeleteOutcome::Removed { removed: vec![2, 1] });
        assert_eq!(service.count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_reply_to_deleted_parent() {
        let store = Arc::new(InMemoryCommentStore::new());
        seed(&store, vec![comment(1, None, true)]).await;
        let service = service(store, quiet_publisher());

        let result = service
            .create(CreateCommentRequest {
                article_id: 1,
                parent_comment_id: Some(1),
                content: "late reply".to_string(),
                writer_id: 5,
            })
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_publishes_comment_count() {
        let store = Arc::new(InMemoryCommentStore::new());
        seed(&store, vec![comment(1, None, false)]).await;

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .withf(|event| {
                event.event_type() == EventType::CommentCreated
                    && event.payload.as_comment().and_then(|p| p.article_comment_count) == Some(2)
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service(store, Arc::new(publisher));
        let created = service
            .create(CreateCommentRequest {
                article_id: 1,
                parent_comment_id: Some(1),
                content: "reply".to_string(),
                writer_id: 5,
            })
            .await
            .unwrap();

        assert_eq!(created.parent_comment_id, Some(1));
        assert!(!created.is_root());
    }

    #[tokio::test]
    async fn test_create_validates_content() {
        let store = Arc::new(InMemoryCommentStore::new());
        let service = service(store, quiet_publisher());

        let result = service
            .create(CreateCommentRequest {
                article_id: 1,
                parent_comment_id: None,
                content: String::new(),
                writer_id: 5,
            })
            .await;

        assert!(matches!(result, Err(AppError::ValidatorError(_))));
    }

    #[tokio::test]
    async fn test_read_all_is_in_tree_order() {
        let store = Arc::new(InMemoryCommentStore::new());
        seed(
            &store,
            vec![
                comment(5, None, false),
                comment(1, None, false),
                comment(3, Some(1), false),
                comment(2, Some(1), false),
                comment(4, Some(2), false),
            ],
        )
        .await;
        let service = service(store, quiet_publisher());

        let ids: Vec<i64> = service
            .read_all(1)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.comment_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 4, 3, 5]);
    }

    /// 前几次开启事务时报告冲突
    struct ConflictingStore {
        inner: InMemoryCommentStore,
        conflicts_left: AtomicU32,
    }

    #[async_trait]
    impl CommentStore for ConflictingStore {
        async fn begin(&self) -> Result<Box<dyn CommentTransaction>> {
            let left = self.conflicts_left.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts_left.store(left - 1, Ordering::SeqCst);
                return Err(AppError::conflict("row version changed"));
            }
            self.inner.begin().await
        }
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let inner = InMemoryCommentStore::new();
        seed(&inner, vec![comment(1, None, false)]).await;
        let store = Arc::new(ConflictingStore {
            inner,
            conflicts_left: AtomicU32::new(2),
        });
        let service = service(store, quiet_publisher());

        let outcome = service.delete(1).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed { removed: vec![1] });
    }

    #[tokio::test]
    async fn test_persistent_conflict_becomes_transient() {
        let inner = InMemoryCommentStore::new();
        seed(&inner, vec![comment(1, None, false)]).await;
        let store = Arc::new(ConflictingStore {
            inner,
            conflicts_left: AtomicU32::new(10),
        });
        let service = service(store, quiet_publisher());

        let result = service.delete(1).await;
        assert!(matches!(result, Err(AppError::Transient(_))));
    }

    /// 第一次发布时先等待一会儿
    #[derive(Default)]
    struct SlowFirstPublisher {
        calls: AtomicU32,
        counts: parking_lot::Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl EventPublisher for SlowFirstPublisher {
        async fn publish(&self, event: Event) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            if let Some(count) = event.payload.as_comment().and_then(|p| p.article_comment_count) {
                self.counts.lock().push(count);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_count_snapshots_are_published_in_commit_order() {
        let store = Arc::new(InMemoryCommentStore::new());
        let publisher = Arc::new(SlowFirstPublisher::default());
        let service = service(store, publisher.clone());
        let request = || CreateCommentRequest {
            article_id: 1,
            parent_comment_id: None,
            content: "hello".to_string(),
            writer_id: 5,
        };

        let (first, second) = tokio::join!(service.create(request()), service.create(request()));
        first.unwrap();
        second.unwrap();
        let third = service.create(request()).await.unwrap();
        service.delete(third.comment_id).await.unwrap();

        assert_eq!(*publisher.counts.lock(), vec![1, 2, 3, 2]);
        assert_eq!(service.count(1).await.unwrap(), 2);
    }
}
