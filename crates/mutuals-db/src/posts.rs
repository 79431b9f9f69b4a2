use anyhow::Result;
use mutuals_types::models::{PostId, UserId};
use rusqlite::TransactionBehavior;

use crate::models::{POST_COLUMNS, PostFeedRow, PostRow, Toggled};
use crate::{Database, OptionalExt};

impl Database {
    // -- Posts --

    pub fn insert_post(
        &self,
        user: UserId,
        content: &str,
        kind: &str,
        file_url: Option<&str>,
    ) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO posts (user_id, content, type, file_url)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING {POST_COLUMNS}"
            );
            let row = conn.query_row(
                &sql,
                rusqlite::params![user, content, kind, file_url],
                PostRow::from_row,
            )?;
            Ok(row)
        })
    }

    pub fn get_post(&self, id: PostId) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1");
            conn.query_row(&sql, [id], PostRow::from_row).optional()
        })
    }

    /// Non-deleted posts, newest first, with like aggregates for `viewer`
    /// (`is_liked` is always false without a viewer).
    pub fn post_feed(&self, viewer: Option<UserId>) -> Result<Vec<PostFeedRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.user_id, p.content, p.type, p.file_url, p.is_deleted, p.created_at,
                        u.username, u.avatar,
                        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
                        EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1)
                 FROM posts p
                 JOIN users u ON u.id = p.user_id
                 WHERE p.is_deleted = 0
                 ORDER BY p.created_at DESC, p.id DESC",
            )?;
            let rows = stmt
                .query_map([viewer], |row| {
                    Ok(PostFeedRow {
                        post: PostRow::from_row(row)?,
                        author_username: row.get(7)?,
                        author_avatar: row.get(8)?,
                        likes_count: row.get(9)?,
                        is_liked: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every post including soft-deleted ones, newest first.
    pub fn list_all_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], PostRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Likes --

    /// Toggle a like: removes if exists, inserts if not.
    pub fn toggle_like(&self, user: UserId, post: PostId) -> Result<Toggled> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let removed = tx.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
                [user, post],
            )?;
            if removed == 1 {
                tx.commit()?;
                return Ok(Toggled::Deleted);
            }

            let inserted = tx.execute(
                "INSERT INTO likes (user_id, post_id) VALUES (?1, ?2)
                 ON CONFLICT (user_id, post_id) DO NOTHING",
                [user, post],
            )?;
            if inserted == 0 {
                tx.rollback()?;
                return Ok(Toggled::Raced);
            }

            tx.commit()?;
            Ok(Toggled::Inserted)
        })
    }

    #[cfg(test)]
    pub(crate) fn count_likes(&self, post: PostId) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM likes WHERE post_id = ?1", [post], |row| {
                row.get(0)
            })?)
        })
    }
}
