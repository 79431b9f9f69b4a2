use mutuals_types::models::{ConversationId, ConversationSummary, MessagePreview, PublicUser, UserId};
use tracing::debug;

use crate::error::{CoreError, CoreResult, MUTUAL_FOLLOW_REQUIRED, USER_NOT_FOUND};
use crate::{Engine, rows};

impl Engine {
    /// Returns the one conversation between `viewer` and `other`, creating
    /// it on first use. Only mutual followers may open one.
    pub fn create_or_get_conversation(
        &self,
        viewer: UserId,
        other: UserId,
    ) -> CoreResult<ConversationId> {
        if viewer == other {
            return Err(CoreError::validation("You cannot message yourself"));
        }
        if !self.db.user_exists(other)? {
            return Err(CoreError::NotFound(USER_NOT_FOUND));
        }
        if !self.is_mutual(viewer, other)? {
            debug!("Conversation between {} and {} refused: not mutual", viewer, other);
            return Err(CoreError::Forbidden(MUTUAL_FOLLOW_REQUIRED));
        }

        let (id, _created) = self.db.get_or_create_conversation(viewer, other)?;
        Ok(id)
    }

    /// Every conversation of `viewer`, most recent activity first. Not
    /// gated: conversations stay listed after a follow is withdrawn.
    pub fn list_conversations(&self, viewer: UserId) -> CoreResult<Vec<ConversationSummary>> {
        let rows = self.db.list_conversations(viewer)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let owner = format!("conversation {}", row.conversation_id);
                let last_message = match (row.last_kind, row.last_created_at) {
                    (Some(kind), Some(created_at)) => Some(MessagePreview {
                        kind: rows::message_kind(&kind, &owner),
                        content: row.last_content,
                        created_at: rows::timestamp(&created_at, &owner),
                    }),
                    _ => None,
                };
                ConversationSummary {
                    id: row.conversation_id,
                    other_user: PublicUser {
                        id: row.other_id,
                        username: row.other_username,
                        avatar: row.other_avatar,
                    },
                    last_message,
                }
            })
            .collect())
    }
}
