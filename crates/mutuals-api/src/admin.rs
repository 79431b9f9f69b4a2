//! Moderation endpoints. Mounted under `/admin` behind `require_auth`; the
//! admin check itself happens in the engine on every call.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};

use mutuals_types::api::{BanUserRequest, Claims, ReviewReportRequest};
use mutuals_types::models::{
    AdminUserView, AuditLogEntry, Post, PostId, Report, ReportId, ReportStatus, UserId,
};

use crate::error::{ApiError, ApiResult};
use crate::{AppState, blocking};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/ban", post(ban_user))
        .route("/users/{id}/unban", post(unban_user))
        .route("/posts", get(list_posts))
        .route("/posts/{id}", delete(delete_post))
        .route("/reports", get(list_reports))
        .route("/reports/{id}/review", post(review_report))
        .route("/audit-logs", get(audit_logs))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<AdminUserView>>> {
    let users = blocking(&state, move |engine| engine.list_users(claims.sub)).await?;
    Ok(Json(users))
}

pub async fn ban_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(target): Path<UserId>,
    Json(req): Json<BanUserRequest>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |engine| {
        engine.ban_user(claims.sub, target, &req.reason, req.expires_at)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unban_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(target): Path<UserId>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |engine| engine.unban_user(claims.sub, target)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Post>>> {
    let posts = blocking(&state, move |engine| engine.list_all_posts(claims.sub)).await?;
    Ok(Json(posts))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post): Path<PostId>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |engine| engine.delete_post(claims.sub, post)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_reports(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Report>>> {
    let reports = blocking(&state, move |engine| engine.list_reports(claims.sub)).await?;
    Ok(Json(reports))
}

pub async fn review_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(report): Path<ReportId>,
    Json(req): Json<ReviewReportRequest>,
) -> ApiResult<StatusCode> {
    let status = ReportStatus::parse(&req.status)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown report status '{}'", req.status)))?;
    blocking(&state, move |engine| engine.review_report(claims.sub, report, status)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn audit_logs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    let entries = blocking(&state, move |engine| engine.audit_logs(claims.sub)).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::testutil::{app, send, signup};

    #[tokio::test]
    async fn admin_routes_require_admin() {
        let (_, app) = app();
        let (_, alice) = signup(&app, "alice").await;
        let (status, json) = send(&app, "GET", "/admin/users", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Admin access required");
    }

    #[tokio::test]
    async fn moderation_round_trip() {
        let (state, app) = app();
        let (_, admin) = signup(&app, "moderator").await;
        let (alice_id, alice) = signup(&app, "alice").await;
        let (_, bob) = signup(&app, "bob").await;
        state.engine.grant_admin("moderator").unwrap();

        let (_, post) =
            send(&app, "POST", "/posts", Some(&alice), Some(json!({ "content": "rude" }))).await;
        let (_, report) = send(
            &app,
            "POST",
            &format!("/posts/{}/report", post["id"]),
            Some(&bob),
            Some(json!({ "reason": "abuse" })),
        )
        .await;

        let (status, _) = send(
            &app,
            "POST",
            &format!("/admin/reports/{}/review", report["id"]),
            Some(&admin),
            Some(json!({ "status": "resolved" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) =
            send(&app, "DELETE", &format!("/admin/posts/{}", post["id"]), Some(&admin), None)
                .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, feed) = send(&app, "GET", "/posts", None, None).await;
        assert!(feed.as_array().unwrap().is_empty());

        let (status, _) = send(
            &app,
            "POST",
            &format!("/admin/users/{alice_id}/ban"),
            Some(&admin),
            Some(json!({ "reason": "abuse" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, users) = send(&app, "GET", "/admin/users", Some(&admin), None).await;
        let banned = users
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["id"] == alice_id)
            .unwrap();
        assert_eq!(banned["is_banned"], true);

        let (_, logs) = send(&app, "GET", "/admin/audit-logs", Some(&admin), None).await;
        let actions: Vec<&str> =
            logs.as_array().unwrap().iter().filter_map(|l| l["action"].as_str()).collect();
        assert_eq!(actions, vec!["user_ban", "post_delete", "report_review"]);

        let (status, _) = send(
            &app,
            "POST",
            "/admin/reports/1/review",
            Some(&admin),
            Some(json!({ "status": "escalated" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
