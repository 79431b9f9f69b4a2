//! Database row types — these map directly to SQLite rows.
//! Distinct from mutuals-types models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use mutuals_types::models::{ConversationId, MessageId, PostId, ReportId, UserId};
use rusqlite::Row;

/// Outcome of a toggle on a uniquely keyed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Inserted,
    Deleted,
    /// The insert hit an existing row that the delete did not see. Only
    /// possible when another process writes to the same file.
    Raced,
}

pub struct UserRow {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub rank: i64,
    pub is_admin: bool,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
    pub ban_expires: Option<String>,
    pub created_at: String,
}

pub(crate) const USER_COLUMNS: &str = "id, username, email, password, bio, avatar, banner, rank, \
     is_admin, is_banned, ban_reason, ban_expires, created_at";

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            bio: row.get(4)?,
            avatar: row.get(5)?,
            banner: row.get(6)?,
            rank: row.get(7)?,
            is_admin: row.get(8)?,
            is_banned: row.get(9)?,
            ban_reason: row.get(10)?,
            ban_expires: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

pub struct MessageRow {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub kind: String,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub created_at: String,
}

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, type, content, file_url, created_at";

impl MessageRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_id: row.get(2)?,
            kind: row.get(3)?,
            content: row.get(4)?,
            file_url: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// One line of a user's conversation list: the counterpart plus the latest
/// message, if any.
pub struct ConversationListRow {
    pub conversation_id: ConversationId,
    pub other_id: UserId,
    pub other_username: String,
    pub other_avatar: Option<String>,
    pub last_kind: Option<String>,
    pub last_content: Option<String>,
    pub last_created_at: Option<String>,
}

pub struct PostRow {
    pub id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub kind: String,
    pub file_url: Option<String>,
    pub is_deleted: bool,
    pub created_at: String,
}

pub(crate) const POST_COLUMNS: &str =
    "id, user_id, content, type, file_url, is_deleted, created_at";

impl PostRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            content: row.get(2)?,
            kind: row.get(3)?,
            file_url: row.get(4)?,
            is_deleted: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// A feed entry: post, author identity and like aggregates for one viewer.
pub struct PostFeedRow {
    pub post: PostRow,
    pub author_username: String,
    pub author_avatar: Option<String>,
    pub likes_count: i64,
    pub is_liked: bool,
}

pub struct ReportRow {
    pub id: ReportId,
    pub post_id: Option<PostId>,
    pub reporter_id: UserId,
    pub reported_user_id: UserId,
    pub reason: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: String,
    pub reviewed_at: Option<String>,
    pub reviewed_by: Option<UserId>,
}

pub(crate) const REPORT_COLUMNS: &str = "id, post_id, reporter_id, reported_user_id, reason, \
     description, status, created_at, reviewed_at, reviewed_by";

impl ReportRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            reporter_id: row.get(2)?,
            reported_user_id: row.get(3)?,
            reason: row.get(4)?,
            description: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
            reviewed_at: row.get(8)?,
            reviewed_by: row.get(9)?,
        })
    }
}

pub struct AuditLogRow {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub action: String,
    pub details: Option<String>,
    pub created_at: String,
}

/// Parses a stored timestamp. Rows written by this crate are RFC 3339; the
/// plain `YYYY-MM-DD HH:MM:SS` form produced by SQLite's `datetime()` is
/// accepted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>().ok().or_else(|| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|ndt| ndt.and_utc())
    })
}

/// Formats a timestamp the way the schema defaults write them, so string
/// comparison in SQL orders correctly.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
