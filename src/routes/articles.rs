use crate::{
    error::{AppError, Result},
    models::{article::ArticleQueryModel, hot_article::HotArticleListResponse, ApiResponse},
    state::AppState,
    utils::time::parse_date_key,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:id", get(get_article))
}

pub fn hot_router() -> Router<Arc<AppState>> {
    Router::new().route("/:date", get(get_hot_articles))
}

async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<i64>,
) -> Result<Json<ApiResponse<ArticleQueryModel>>> {
    let article = state.article_read_service.read(article_id).await?;
    Ok(Json(ApiResponse::success(article)))
}

/// 日期格式为 yyyyMMdd
async fn get_hot_articles(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<ApiResponse<HotArticleListResponse>>> {
    let date = parse_date_key(&date)
        .ok_or_else(|| AppError::bad_request("Date must be formatted as yyyyMMdd"))?;
    let articles = state.hot_article_service.read_all(date);

    Ok(Json(ApiResponse::success(HotArticleListResponse {
        date,
        articles,
    })))
}
