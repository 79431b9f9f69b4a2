use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use mutuals_types::api::{
    Claims, CreateConversationRequest, CreateConversationResponse, SendMessageRequest,
};
use mutuals_types::models::{ConversationId, ConversationSummary, Message, MessageKind, NewMessage};

use crate::error::{ApiError, ApiResult};
use crate::{AppState, blocking};

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    let list = blocking(&state, move |engine| engine.list_conversations(claims.sub)).await?;
    Ok(Json(list))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> ApiResult<Json<CreateConversationResponse>> {
    let id = blocking(&state, move |engine| {
        engine.create_or_get_conversation(claims.sub, req.user_id)
    })
    .await?;
    Ok(Json(CreateConversationResponse { id }))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation): Path<ConversationId>,
) -> ApiResult<Json<Vec<Message>>> {
    let messages =
        blocking(&state, move |engine| engine.list_messages(claims.sub, conversation)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation): Path<ConversationId>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let kind = MessageKind::parse(&req.kind)
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported message type '{}'", req.kind)))?;

    let message = NewMessage {
        kind,
        content: req.content,
        file_url: req.file_url,
    };
    let sent = blocking(&state, move |engine| {
        engine.send_message(claims.sub, conversation, message)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(sent)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::testutil::{app, send, signup};

    #[tokio::test]
    async fn mutual_followers_can_chat_until_unfollow() {
        let (_, app) = app();
        let (alice_id, alice) = signup(&app, "alice").await;
        let (bob_id, bob) = signup(&app, "bob").await;

        let open = json!({ "user_id": bob_id });
        let (status, _) =
            send(&app, "POST", "/conversations", Some(&alice), Some(open.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        send(&app, "POST", &format!("/users/{bob_id}/follow"), Some(&alice), None).await;
        send(&app, "POST", &format!("/users/{alice_id}/follow"), Some(&bob), None).await;

        let (status, json) =
            send(&app, "POST", "/conversations", Some(&alice), Some(open)).await;
        assert_eq!(status, StatusCode::OK);
        let conv = json["id"].as_i64().unwrap();

        let (_, again) = send(
            &app,
            "POST",
            "/conversations",
            Some(&bob),
            Some(json!({ "user_id": alice_id })),
        )
        .await;
        assert_eq!(again["id"], conv);

        let uri = format!("/conversations/{conv}/messages");
        let (status, sent) =
            send(&app, "POST", &uri, Some(&alice), Some(json!({ "content": "hi" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["type"], "text");
        assert_eq!(sent["sender_id"], alice_id);

        let (status, listed) = send(&app, "GET", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["content"], "hi");

        send(&app, "POST", &format!("/users/{alice_id}/follow"), Some(&bob), None).await;
        let (status, json) =
            send(&app, "POST", &uri, Some(&alice), Some(json!({ "content": "hello?" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Mutual follow required");

        let (_, list) = send(&app, "GET", "/conversations", Some(&bob), None).await;
        assert_eq!(list[0]["other_user"]["username"], "alice");
        assert_eq!(list[0]["last_message"]["content"], "hi");
    }

    #[tokio::test]
    async fn strangers_get_not_found_and_bad_types_are_rejected() {
        let (_, app) = app();
        let (alice_id, alice) = signup(&app, "alice").await;
        let (bob_id, bob) = signup(&app, "bob").await;
        let (_, eve) = signup(&app, "eve").await;
        send(&app, "POST", &format!("/users/{bob_id}/follow"), Some(&alice), None).await;
        send(&app, "POST", &format!("/users/{alice_id}/follow"), Some(&bob), None).await;
        let (_, json) = send(
            &app,
            "POST",
            "/conversations",
            Some(&alice),
            Some(json!({ "user_id": bob_id })),
        )
        .await;
        let uri = format!("/conversations/{}/messages", json["id"]);

        let (status, json) = send(&app, "GET", &uri, Some(&eve), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Conversation not found");

        let image = json!({ "type": "image", "content": "x" });
        let (status, _) = send(&app, "POST", &uri, Some(&alice), Some(image)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
