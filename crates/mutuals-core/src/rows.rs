//! Row -> domain model conversion.
//!
//! Corrupt stored values are logged and replaced with defaults rather than
//! failing the whole request.

use chrono::{DateTime, Utc};
use tracing::warn;

use mutuals_db::models::{
    AuditLogRow, MessageRow, PostRow, ReportRow, UserRow, parse_timestamp,
};
use mutuals_types::models::{
    Account, AdminUserView, AuditLogEntry, Message, MessageKind, Post, Report, ReportStatus, User,
};

pub(crate) fn timestamp(raw: &str, owner: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt timestamp '{}' on {}", raw, owner);
        DateTime::default()
    })
}

pub(crate) fn message_kind(raw: &str, owner: &str) -> MessageKind {
    MessageKind::parse(raw).unwrap_or_else(|| {
        warn!("Unknown message type '{}' on {}", raw, owner);
        MessageKind::Text
    })
}

pub(crate) fn user(row: UserRow) -> User {
    User {
        created_at: timestamp(&row.created_at, &format!("user {}", row.id)),
        id: row.id,
        username: row.username,
        bio: row.bio,
        avatar: row.avatar,
        banner: row.banner,
        rank: row.rank,
    }
}

pub(crate) fn account(row: UserRow) -> Account {
    let email = row.email.clone();
    let is_admin = row.is_admin;
    Account {
        user: user(row),
        email,
        is_admin,
    }
}

pub(crate) fn admin_user(row: UserRow) -> AdminUserView {
    let ban_expires = row
        .ban_expires
        .as_deref()
        .map(|raw| timestamp(raw, &format!("ban of user {}", row.id)));
    let email = row.email.clone();
    let (is_admin, is_banned, ban_reason) = (row.is_admin, row.is_banned, row.ban_reason.clone());
    AdminUserView {
        user: user(row),
        email,
        is_admin,
        is_banned,
        ban_reason,
        ban_expires,
    }
}

pub(crate) fn message(row: MessageRow) -> Message {
    let owner = format!("message {}", row.id);
    Message {
        id: row.id,
        conversation_id: row.conversation_id,
        sender_id: row.sender_id,
        kind: message_kind(&row.kind, &owner),
        content: row.content,
        file_url: row.file_url,
        created_at: timestamp(&row.created_at, &owner),
    }
}

pub(crate) fn post(row: PostRow) -> Post {
    Post {
        created_at: timestamp(&row.created_at, &format!("post {}", row.id)),
        id: row.id,
        user_id: row.user_id,
        content: row.content,
        kind: row.kind,
        file_url: row.file_url,
        is_deleted: row.is_deleted,
    }
}

pub(crate) fn report(row: ReportRow) -> Report {
    let owner = format!("report {}", row.id);
    let status = ReportStatus::parse(&row.status).unwrap_or_else(|| {
        warn!("Unknown status '{}' on {}", row.status, owner);
        ReportStatus::Pending
    });
    Report {
        id: row.id,
        post_id: row.post_id,
        reporter_id: row.reporter_id,
        reported_user_id: row.reported_user_id,
        reason: row.reason,
        description: row.description,
        status,
        created_at: timestamp(&row.created_at, &owner),
        reviewed_at: row.reviewed_at.as_deref().map(|raw| timestamp(raw, &owner)),
        reviewed_by: row.reviewed_by,
    }
}

pub(crate) fn audit_entry(row: AuditLogRow) -> AuditLogEntry {
    AuditLogEntry {
        created_at: timestamp(&row.created_at, &format!("audit entry {}", row.id)),
        id: row.id,
        user_id: row.user_id,
        action: row.action,
        details: row.details,
    }
}
