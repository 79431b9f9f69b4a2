use std::collections::HashMap;

use anyhow::Result;
use mutuals_types::models::{FollowEdge, UserId};
use rusqlite::{Connection, TransactionBehavior, params_from_iter};

use crate::models::Toggled;
use crate::{Database, OptionalExt, placeholders};

impl Database {
    pub fn has_follow(&self, follower: UserId, following: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                    [follower, following],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Toggle the edge `follower -> following`: removes it if present,
    /// otherwise creates it and bumps the target's rank in the same
    /// transaction. Removal never touches rank.
    pub fn toggle_follow(&self, follower: UserId, following: UserId) -> Result<Toggled> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let removed = tx.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                [follower, following],
            )?;
            if removed == 1 {
                tx.commit()?;
                return Ok(Toggled::Deleted);
            }

            let inserted = tx.execute(
                "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)
                 ON CONFLICT (follower_id, following_id) DO NOTHING",
                [follower, following],
            )?;
            if inserted == 0 {
                tx.rollback()?;
                return Ok(Toggled::Raced);
            }

            tx.execute("UPDATE users SET rank = rank + 1 WHERE id = ?1", [following])?;
            tx.commit()?;
            Ok(Toggled::Inserted)
        })
    }

    /// Every edge between `a` and `b`, in either direction (0, 1 or 2 rows).
    pub fn follows_between(&self, a: UserId, b: UserId) -> Result<Vec<FollowEdge>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT follower_id, following_id FROM follows
                 WHERE (follower_id = ?1 AND following_id = ?2)
                    OR (follower_id = ?2 AND following_id = ?1)",
            )?;
            let rows = stmt
                .query_map([a, b], edge_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Edges restricted to `{viewer} x candidates U candidates x {viewer}`,
    /// fetched in one query.
    pub fn follows_touching(&self, viewer: UserId, candidates: &[UserId]) -> Result<Vec<FollowEdge>> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let list = placeholders(2, candidates.len());
            let sql = format!(
                "SELECT follower_id, following_id FROM follows
                 WHERE (follower_id = ?1 AND following_id IN ({list}))
                    OR (following_id = ?1 AND follower_id IN ({list}))"
            );
            let params = std::iter::once(&viewer).chain(candidates.iter());
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), edge_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_followers(&self, user: UserId) -> Result<i64> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM follows WHERE following_id = ?1", user))
    }

    pub fn count_following(&self, user: UserId) -> Result<i64> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM follows WHERE follower_id = ?1", user))
    }

    /// Follower counts for a batch of users. Users with no followers are
    /// absent from the map.
    pub fn follower_counts(&self, users: &[UserId]) -> Result<HashMap<UserId, i64>> {
        if users.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT following_id, COUNT(*) FROM follows
                 WHERE following_id IN ({})
                 GROUP BY following_id",
                placeholders(1, users.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let counts = stmt
                .query_map(params_from_iter(users.iter()), |row| {
                    Ok((row.get::<_, UserId>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(counts)
        })
    }
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FollowEdge> {
    Ok(FollowEdge {
        follower_id: row.get(0)?,
        following_id: row.get(1)?,
    })
}

fn count(conn: &Connection, sql: &str, user: UserId) -> Result<i64> {
    Ok(conn.query_row(sql, [user], |row| row.get(0))?)
}
