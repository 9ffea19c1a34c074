use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::event::{ArticleLikePayload, ArticlePayload, ArticleViewPayload, CommentPayload};

/// 文章查询模型
///
/// 只能通过事件投影修改，不接受用户请求直接写入。计数字段都保存
/// 事件携带的快照值，重复投影同一事件结果不变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleQueryModel {
    pub article_id: i64,
    pub title: String,
    pub content: String,
    pub board_id: i64,
    pub writer_id: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub article_comment_count: i64,
    pub article_like_count: i64,
    pub article_view_count: i64,
}

impl ArticleQueryModel {
    pub fn create(payload: &ArticlePayload) -> Self {
        Self {
            article_id: payload.article_id,
            title: payload.title.clone(),
            content: payload.content.clone(),
            board_id: payload.board_id,
            writer_id: payload.writer_id,
            created_at: payload.created_at,
            modified_at: payload.modified_at,
            article_comment_count: 0,
            article_like_count: 0,
            article_view_count: 0,
        }
    }

    pub fn update_by_article(&mut self, payload: &ArticlePayload) {
        self.title = payload.title.clone();
        self.content = payload.content.clone();
        self.board_id = payload.board_id;
        self.writer_id = payload.writer_id;
        self.created_at = payload.created_at;
        self.modified_at = payload.modified_at;
    }

    pub fn update_by_like(&mut self, payload: &ArticleLikePayload) {
        self.article_like_count = payload.article_like_count;
    }

    pub fn update_by_comment(&mut self, payload: &CommentPayload) {
        if let Some(count) = payload.article_comment_count {
            self.article_comment_count = count;
        }
    }

    pub fn update_by_view(&mut self, payload: &ArticleViewPayload) {
        self.article_view_count = payload.article_view_count;
    }
}
