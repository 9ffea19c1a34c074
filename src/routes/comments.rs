use crate::{
    error::Result,
    models::comment::{CommentResponse, CreateCommentRequest},
    models::ApiResponse,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_comment))
        .route("/article/:article_id", get(get_article_comments))
        .route("/:id", get(get_comment).delete(delete_comment))
}

async fn create_comment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CommentResponse>>)> {
    let comment = state.comment_service.create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CommentResponse::from(comment))),
    ))
}

async fn get_comment(
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<i64>,
) -> Result<Json<ApiResponse<CommentResponse>>> {
    let comment = state.comment_service.read(comment_id).await?;
    Ok(Json(ApiResponse::success(CommentResponse::from(comment))))
}

async fn get_article_comments(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<i64>,
) -> Result<Json<Value>> {
    let comments: Vec<CommentResponse> = state
        .comment_service
        .read_all(article_id)
        .await?
        .into_iter()
        .map(CommentResponse::from)
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": comments,
        "total": comments.len()
    })))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<i64>,
) -> Result<Json<Value>> {
    tracing::info!("Deleting comment {}", comment_id);
    let outcome = state.comment_service.delete(comment_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": outcome
    })))
}
