use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 当日热门文章
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotArticle {
    pub article_id: i64,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotArticleListResponse {
    pub date: NaiveDate,
    pub articles: Vec<HotArticle>,
}

/// 热度计算：点赞权重3，评论权重2，浏览权重1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotArticleScore {
    pub like_count: i64,
    pub comment_count: i64,
    pub view_count: i64,
}

impl HotArticleScore {
    pub const LIKE_WEIGHT: i64 = 3;
    pub const COMMENT_WEIGHT: i64 = 2;
    pub const VIEW_WEIGHT: i64 = 1;

    pub fn value(&self) -> i64 {
        self.like_count
            .saturating_mul(Self::LIKE_WEIGHT)
            .saturating_add(self.comment_count.saturating_mul(Self::COMMENT_WEIGHT))
            .saturating_add(self.view_count.saturating_mul(Self::VIEW_WEIGHT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_weights() {
        let score = HotArticleScore {
            like_count: 2,
            comment_count: 3,
            view_count: 10,
        };
        assert_eq!(score.value(), 6 + 6 + 10);
    }

    #[test]
    fn test_score_saturates_on_huge_counts() {
        let score = HotArticleScore {
            like_count: i64::MAX,
            comment_count: 1,
            view_count: 1,
        };
        assert_eq!(score.value(), i64::MAX);

        let negative = HotArticleScore {
            like_count: i64::MIN,
            comment_count: 0,
            view_count: -1,
        };
        assert_eq!(negative.value(), i64::MIN);
    }
}
