use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ArticleCreated,
    ArticleUpdated,
    ArticleDeleted,
    CommentCreated,
    CommentDeleted,
    ArticleLiked,
    ArticleUnliked,
    ArticleViewed,
}

impl EventType {
    /// 发布该类型事件的主题
    pub fn topic(&self) -> &'static str {
        match self {
            EventType::ArticleCreated | EventType::ArticleUpdated | EventType::ArticleDeleted => {
                topics::ARTICLE
            }
            EventType::CommentCreated | EventType::CommentDeleted => topics::COMMENT,
            EventType::ArticleLiked | EventType::ArticleUnliked => topics::LIKE,
            EventType::ArticleViewed => topics::VIEW,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ArticleCreated => "ARTICLE_CREATED",
            EventType::ArticleUpdated => "ARTICLE_UPDATED",
            EventType::ArticleDeleted => "ARTICLE_DELETED",
            EventType::CommentCreated => "COMMENT_CREATED",
            EventType::CommentDeleted => "COMMENT_DELETED",
            EventType::ArticleLiked => "ARTICLE_LIKED",
            EventType::ArticleUnliked => "ARTICLE_UNLIKED",
            EventType::ArticleViewed => "ARTICLE_VIEWED",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod topics {
    pub const ARTICLE: &str = "board-article";
    pub const COMMENT: &str = "board-comment";
    pub const LIKE: &str = "board-like";
    pub const VIEW: &str = "board-view";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePayload {
    pub article_id: i64,
    pub title: String,
    pub content: String,
    pub board_id: i64,
    pub writer_id: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub board_article_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub comment_id: i64,
    pub article_id: i64,
    #[serde(default)]
    pub parent_comment_id: Option<i64>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub writer_id: i64,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    /// 事件发出时文章的评论总数快照
    #[serde(default)]
    pub article_comment_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleLikePayload {
    #[serde(default)]
    pub article_like_id: i64,
    pub article_id: i64,
    #[serde(default)]
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    /// 点赞总数快照，不是增量
    #[serde(alias = "likeCount")]
    pub article_like_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleViewPayload {
    pub article_id: i64,
    pub article_view_count: i64,
}

/// 事件负载，形状完全由事件类型决定
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    ArticleCreated(ArticlePayload),
    ArticleUpdated(ArticlePayload),
    ArticleDeleted(ArticlePayload),
    CommentCreated(CommentPayload),
    CommentDeleted(CommentPayload),
    ArticleLiked(ArticleLikePayload),
    ArticleUnliked(ArticleLikePayload),
    ArticleViewed(ArticleViewPayload),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::ArticleCreated(_) => EventType::ArticleCreated,
            EventPayload::ArticleUpdated(_) => EventType::ArticleUpdated,
            EventPayload::ArticleDeleted(_) => EventType::ArticleDeleted,
            EventPayload::CommentCreated(_) => EventType::CommentCreated,
            EventPayload::CommentDeleted(_) => EventType::CommentDeleted,
            EventPayload::ArticleLiked(_) => EventType::ArticleLiked,
            EventPayload::ArticleUnliked(_) => EventType::ArticleUnliked,
            EventPayload::ArticleViewed(_) => EventType::ArticleViewed,
        }
    }

    pub fn article_id(&self) -> i64 {
        match self {
            EventPayload::ArticleCreated(p)
            | EventPayload::ArticleUpdated(p)
            | EventPayload::ArticleDeleted(p) => p.article_id,
            EventPayload::CommentCreated(p) | EventPayload::CommentDeleted(p) => p.article_id,
            EventPayload::ArticleLiked(p) | EventPayload::ArticleUnliked(p) => p.article_id,
            EventPayload::ArticleViewed(p) => p.article_id,
        }
    }

    pub fn as_article(&self) -> Option<&ArticlePayload> {
        match self {
            EventPayload::ArticleCreated(p)
            | EventPayload::ArticleUpdated(p)
            | EventPayload::ArticleDeleted(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_comment(&self) -> Option<&CommentPayload> {
        match self {
            EventPayload::CommentCreated(p) | EventPayload::CommentDeleted(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_article_like(&self) -> Option<&ArticleLikePayload> {
        match self {
            EventPayload::ArticleLiked(p) | EventPayload::ArticleUnliked(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_article_view(&self) -> Option<&ArticleViewPayload> {
        match self {
            EventPayload::ArticleViewed(p) => Some(p),
            _ => None,
        }
    }

    /// 按声明的类型解码负载，类型与形状不符时拒绝
    pub fn decode(event_type: EventType, payload: Value) -> Result<Self> {
        fn typed<T: serde::de::DeserializeOwned>(event_type: EventType, payload: Value) -> Result<T> {
            serde_json::from_value(payload).map_err(|e| AppError::PayloadMismatch {
                event_type,
                reason: e.to_string(),
            })
        }

        let decoded = match event_type {
            EventType::ArticleCreated => EventPayload::ArticleCreated(typed(event_type, payload)?),
            EventType::ArticleUpdated => EventPayload::ArticleUpdated(typed(event_type, payload)?),
            EventType::ArticleDeleted => EventPayload::ArticleDeleted(typed(event_type, payload)?),
            EventType::CommentCreated => EventPayload::CommentCreated(typed(event_type, payload)?),
            EventType::CommentDeleted => EventPayload::CommentDeleted(typed(event_type, payload)?),
            EventType::ArticleLiked => EventPayload::ArticleLiked(typed(event_type, payload)?),
            EventType::ArticleUnliked => EventPayload::ArticleUnliked(typed(event_type, payload)?),
            EventType::ArticleViewed => EventPayload::ArticleViewed(typed(event_type, payload)?),
        };
        Ok(decoded)
    }

    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            EventPayload::ArticleCreated(p)
            | EventPayload::ArticleUpdated(p)
            | EventPayload::ArticleDeleted(p) => serde_json::to_value(p)?,
            EventPayload::CommentCreated(p) | EventPayload::CommentDeleted(p) => {
                serde_json::to_value(p)?
            }
            EventPayload::ArticleLiked(p) | EventPayload::ArticleUnliked(p) => {
                serde_json::to_value(p)?
            }
            EventPayload::ArticleViewed(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }
}

/// 事件信封
///
/// 类型由负载推导，构造出的事件不可能出现类型与负载不匹配的情况。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent", into = "RawEvent")]
pub struct Event {
    pub event_id: i64,
    pub payload: EventPayload,
    pub occurred_at: DateTime<Utc>,
}

/// 传输格式 `{ eventId, type, payload, occurredAt }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    event_id: i64,
    #[serde(rename = "type")]
    event_type: EventType,
    payload: Value,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<RawEvent> for Event {
    type Error = AppError;

    fn try_from(raw: RawEvent) -> Result<Self> {
        Ok(Event {
            event_id: raw.event_id,
            payload: EventPayload::decode(raw.event_type, raw.payload)?,
            occurred_at: raw.occurred_at,
        })
    }
}

impl From<Event> for RawEvent {
    fn from(event: Event) -> Self {
        let event_type = event.event_type();
        // Payload structs contain only plain fields and always serialize.
        let payload = event.payload.to_value().unwrap_or(Value::Null);
        RawEvent {
            event_id: event.event_id,
            event_type,
            payload,
            occurred_at: event.occurred_at,
        }
    }
}

impl Event {
    pub fn new(event_id: i64, payload: EventPayload) -> Self {
        Self {
            event_id,
            payload,
            occurred_at: Utc::now(),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// 事件所属文章，作为默认的分区键
    pub fn article_id(&self) -> i64 {
        self.payload.article_id()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawEvent = serde_json::from_str(json)?;
        Event::try_from(raw)
    }

    pub fn to_json(&self) -> Result<String> {
        let raw = RawEvent {
            event_id: self.event_id,
            event_type: self.event_type(),
            payload: self.payload.to_value()?,
            occurred_at: self.occurred_at,
        };
        Ok(serde_json::to_string(&raw)?)
    }
}
