//! Message gateway.
//!
//! Every read and write of a conversation's messages passes the same gate:
//! the caller must be a member, the conversation must have a counterpart,
//! and the two must follow each other at the moment of the call. A
//! non-member sees exactly what they would see for a conversation that does
//! not exist.

use mutuals_types::models::{ConversationId, Message, NewMessage, UserId};
use tracing::debug;

use crate::error::{CONVERSATION_NOT_FOUND, CoreError, CoreResult, MUTUAL_FOLLOW_REQUIRED};
use crate::{Engine, rows};

pub const MAX_MESSAGE_CHARS: usize = 4000;

impl Engine {
    /// Runs the gate and returns the counterpart on success.
    pub fn authorize_conversation(
        &self,
        viewer: UserId,
        conversation: ConversationId,
    ) -> CoreResult<UserId> {
        if !self.db.is_conversation_member(conversation, viewer)? {
            return Err(CoreError::NotFound(CONVERSATION_NOT_FOUND));
        }
        let other = self
            .db
            .other_conversation_member(conversation, viewer)?
            .ok_or(CoreError::NotFound(CONVERSATION_NOT_FOUND))?;

        if !self.is_mutual(viewer, other)? {
            debug!(
                "User {} denied conversation {}: no longer mutual with {}",
                viewer, conversation, other
            );
            return Err(CoreError::Forbidden(MUTUAL_FOLLOW_REQUIRED));
        }
        Ok(other)
    }

    /// All messages of the conversation, oldest first.
    pub fn list_messages(
        &self,
        viewer: UserId,
        conversation: ConversationId,
    ) -> CoreResult<Vec<Message>> {
        self.authorize_conversation(viewer, conversation)?;
        let rows = self.db.get_messages(conversation)?;
        Ok(rows.into_iter().map(rows::message).collect())
    }

    pub fn send_message(
        &self,
        viewer: UserId,
        conversation: ConversationId,
        message: NewMessage,
    ) -> CoreResult<Message> {
        self.authorize_conversation(viewer, conversation)?;

        let content = validate_content(message.content.as_deref())?;
        let file_url = message
            .file_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        let row = self.db.insert_message(
            conversation,
            viewer,
            message.kind.as_str(),
            Some(content),
            file_url,
        )?;
        debug!("User {} sent message {} in conversation {}", viewer, row.id, conversation);
        Ok(rows::message(row))
    }
}

fn validate_content(content: Option<&str>) -> CoreResult<&str> {
    let content = content.map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(CoreError::validation("Message content is required"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(CoreError::validation(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(content)
}
