use anyhow::Result;
use mutuals_types::models::{ConversationId, UserId};
use rusqlite::TransactionBehavior;
use tracing::debug;

use crate::{Database, OptionalExt};
use crate::models::{ConversationListRow, MESSAGE_COLUMNS, MessageRow};

impl Database {
    // -- Conversations --

    /// Returns the conversation whose members are exactly `a` and `b`,
    /// creating it (with both membership rows) if none exists. The lookup
    /// and the insert share one immediate transaction, so two concurrent
    /// callers for the same pair cannot both create one.
    ///
    /// The flag is `true` when a new conversation was created.
    pub fn get_or_create_conversation(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<(ConversationId, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing: Option<ConversationId> = tx
                .query_row(
                    "SELECT mine.conversation_id
                     FROM conversation_members mine
                     JOIN conversation_members theirs
                       ON theirs.conversation_id = mine.conversation_id
                     WHERE mine.user_id = ?1 AND theirs.user_id = ?2
                     ORDER BY mine.conversation_id ASC
                     LIMIT 1",
                    [a, b],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(id) = existing {
                return Ok((id, false));
            }

            tx.execute("INSERT INTO conversations DEFAULT VALUES", [])?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO conversation_members (conversation_id, user_id) VALUES (?1, ?2), (?1, ?3)",
                [id, a, b],
            )?;
            tx.commit()?;

            debug!("Created conversation {} for users {} and {}", id, a, b);
            Ok((id, true))
        })
    }

    pub fn is_conversation_member(&self, conversation: ConversationId, user: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM conversation_members WHERE conversation_id = ?1 AND user_id = ?2",
                    [conversation, user],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// The member of `conversation` that is not `user`. `None` when `user`
    /// is not a member or there is no second member.
    pub fn other_conversation_member(
        &self,
        conversation: ConversationId,
        user: UserId,
    ) -> Result<Option<UserId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM conversation_members
                 WHERE conversation_id = ?1
                 ORDER BY user_id ASC",
            )?;
            let members = stmt
                .query_map([conversation], |row| row.get::<_, UserId>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if !members.contains(&user) {
                return Ok(None);
            }
            Ok(members.into_iter().find(|&m| m != user))
        })
    }

    /// Every conversation `user` belongs to, with the counterpart's identity
    /// and the newest message. Most recent activity first.
    pub fn list_conversations(&self, user: UserId) -> Result<Vec<ConversationListRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, u.id, u.username, u.avatar, m.type, m.content, m.created_at
                 FROM conversation_members me
                 JOIN conversations c ON c.id = me.conversation_id
                 JOIN conversation_members other
                   ON other.conversation_id = c.id AND other.user_id != me.user_id
                 JOIN users u ON u.id = other.user_id
                 LEFT JOIN messages m ON m.id = (
                     SELECT id FROM messages
                     WHERE conversation_id = c.id
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1
                 )
                 WHERE me.user_id = ?1
                 ORDER BY COALESCE(m.created_at, c.created_at) DESC, c.id DESC",
            )?;

            let rows = stmt
                .query_map([user], |row| {
                    Ok(ConversationListRow {
                        conversation_id: row.get(0)?,
                        other_id: row.get(1)?,
                        other_username: row.get(2)?,
                        other_avatar: row.get(3)?,
                        last_kind: row.get(4)?,
                        last_content: row.get(5)?,
                        last_created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        kind: &str,
        content: Option<&str>,
        file_url: Option<&str>,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO messages (conversation_id, sender_id, type, content, file_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING {MESSAGE_COLUMNS}"
            );
            let row = conn.query_row(
                &sql,
                rusqlite::params![conversation, sender, kind, content, file_url],
                MessageRow::from_row,
            )?;
            Ok(row)
        })
    }

    /// All messages of a conversation, oldest first.
    pub fn get_messages(&self, conversation: ConversationId) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([conversation], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
