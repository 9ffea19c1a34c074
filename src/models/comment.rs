use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: i64,
    pub article_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub writer_id: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_comment_id.is_none()
    }

    /// 软删除：保留行以维持子评论的树结构
    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(range(min = 1))]
    pub article_id: i64,
    pub parent_comment_id: Option<i64>,
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    #[validate(range(min = 1))]
    pub writer_id: i64,
}

pub const DELETED_PLACEHOLDER: &str = "[deleted]";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub comment_id: i64,
    pub article_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub writer_id: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        let content = if comment.deleted {
            DELETED_PLACEHOLDER.to_string()
        } else {
            comment.content
        };

        Self {
            comment_id: comment.comment_id,
            article_id: comment.article_id,
            parent_comment_id: comment.parent_comment_id,
            content,
            writer_id: comment.writer_id,
            deleted: comment.deleted,
            created_at: comment.created_at,
        }
    }
}

/// 删除操作的最终效果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// 评论仍有子评论，只打上删除标记
    SoftDeleted { comment_id: i64 },
    /// 物理删除的评论，从被删评论开始沿祖先链向上
    Removed { removed: Vec<i64> },
}
