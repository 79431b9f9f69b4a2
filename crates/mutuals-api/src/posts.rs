use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use mutuals_types::api::{Claims, CreatePostRequest, CreateReportRequest, LikeResponse};
use mutuals_types::models::{LikeToggle, NewPost, PostId, PostView};

use crate::error::ApiResult;
use crate::middleware::Viewer;
use crate::{AppState, blocking};

pub async fn list_posts(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
) -> ApiResult<Json<Vec<PostView>>> {
    let posts = blocking(&state, move |engine| engine.list_posts(viewer)).await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    let post = NewPost {
        content: req.content,
        kind: req.kind,
        file_url: req.file_url,
    };
    let created = blocking(&state, move |engine| engine.create_post(claims.sub, post)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post): Path<PostId>,
) -> ApiResult<Json<LikeResponse>> {
    let toggle = blocking(&state, move |engine| engine.toggle_like(claims.sub, post)).await?;
    Ok(Json(LikeResponse {
        liked: toggle == LikeToggle::Liked,
    }))
}

pub async fn report_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post): Path<PostId>,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<impl IntoResponse> {
    let report = blocking(&state, move |engine| {
        engine.report_post(claims.sub, post, &req.reason, req.description)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(report)))
}
