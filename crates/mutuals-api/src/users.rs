use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use mutuals_types::api::{
    Claims, CreateReportRequest, FollowResponse, SearchQuery, UpdateProfileRequest,
};
use mutuals_types::models::{
    Account, FollowToggle, LeaderboardEntry, NewReport, Profile, ProfileUpdate, UserId,
    UserSearchHit,
};

use crate::error::ApiResult;
use crate::middleware::Viewer;
use crate::{AppState, blocking};

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Account>> {
    let account = blocking(&state, move |engine| engine.account(claims.sub)).await?;
    Ok(Json(account))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Account>> {
    let update = ProfileUpdate {
        username: req.username,
        bio: req.bio,
        avatar: req.avatar,
        banner: req.banner,
    };
    let account = blocking(&state, move |engine| engine.update_profile(claims.sub, update)).await?;
    Ok(Json(account))
}

pub async fn search(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<UserSearchHit>>> {
    let hits = blocking(&state, move |engine| engine.search_users(claims.sub, &query.q)).await?;
    Ok(Json(hits))
}

pub async fn profile(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(username): Path<String>,
) -> ApiResult<Json<Profile>> {
    let profile = blocking(&state, move |engine| engine.profile(viewer, &username)).await?;
    Ok(Json(profile))
}

pub async fn toggle_follow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(target): Path<UserId>,
) -> ApiResult<Json<FollowResponse>> {
    let toggle = blocking(&state, move |engine| engine.toggle_follow(claims.sub, target)).await?;
    Ok(Json(FollowResponse {
        following: toggle == FollowToggle::Followed,
    }))
}

pub async fn report_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(target): Path<UserId>,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<impl IntoResponse> {
    let report = blocking(&state, move |engine| {
        engine.create_report(
            claims.sub,
            NewReport {
                post_id: None,
                reported_user_id: target,
                reason: req.reason,
                description: req.description,
            },
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn leaderboard(State(state): State<AppState>) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let entries = blocking(&state, |engine| engine.leaderboard()).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::testutil::{app, send, signup};

    #[tokio::test]
    async fn profile_settings_round_trip() {
        let (_, app) = app();
        let (alice_id, alice) = signup(&app, "alice").await;
        let (_, bob) = signup(&app, "bob").await;

        let (status, me) = send(&app, "GET", "/me", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], alice_id);
        assert_eq!(me["email"], "alice@example.com");
        assert!(me["bio"].is_null());

        let edit = json!({ "bio": "climber", "avatar": "/uploads/avatars/a.png" });
        let (status, me) = send(&app, "PATCH", "/settings/profile", Some(&alice), Some(edit)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["bio"], "climber");

        let (_, hits) = send(&app, "GET", "/users/search?q=ali", Some(&bob), None).await;
        assert_eq!(hits[0]["bio"], "climber");
        assert_eq!(hits[0]["avatar"], "/uploads/avatars/a.png");

        let taken = json!({ "username": "bob" });
        let (status, _) =
            send(&app, "PATCH", "/settings/profile", Some(&alice), Some(taken)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let rename = json!({ "username": "alice_w" });
        let (status, _) =
            send(&app, "PATCH", "/settings/profile", Some(&alice), Some(rename)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, profile) = send(&app, "GET", "/users/alice_w", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["id"], alice_id);
        assert_eq!(profile["avatar"], "/uploads/avatars/a.png");
    }

    #[tokio::test]
    async fn follow_search_and_profile() {
        let (_, app) = app();
        let (_, alice) = signup(&app, "alice").await;
        let (bob_id, bob) = signup(&app, "bob").await;

        let uri = format!("/users/{bob_id}/follow");
        let (status, json) = send(&app, "POST", &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["following"], true);

        let (_, hits) = send(&app, "GET", "/users/search?q=BO", Some(&alice), None).await;
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["is_following"], true);
        assert_eq!(hits[0]["followers_count"], 1);

        let (_, hits) = send(&app, "GET", "/users/search?q=bob", Some(&bob), None).await;
        assert!(hits.as_array().unwrap().is_empty());

        let (status, _) = send(&app, "GET", "/users/search?q=", Some(&bob), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, profile) = send(&app, "GET", "/users/alice", Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["username"], "alice");
        assert_eq!(profile["is_followed_by"], true);
        assert_eq!(profile["following_count"], 1);

        let (status, profile) = send(&app, "GET", "/users/bob", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["rank"], 1);
        assert_eq!(profile["is_following"], false);

        let (status, _) = send(&app, "GET", "/users/nobody", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn self_follow_is_bad_request() {
        let (_, app) = app();
        let (id, token) = signup(&app, "alice").await;
        let uri = format!("/users/{id}/follow");
        let (status, json) = send(&app, "POST", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].is_string());

        let (status, _) = send(&app, "POST", "/users/999/follow", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn leaderboard_is_public() {
        let (_, app) = app();
        let (_, alice) = signup(&app, "alice").await;
        let (bob_id, _) = signup(&app, "bob").await;
        send(&app, "POST", &format!("/users/{bob_id}/follow"), Some(&alice), None).await;

        let (status, board) = send(&app, "GET", "/leaderboard", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board[0]["username"], "bob");
        assert_eq!(board[0]["rank"], 1);
    }
}
