use anyhow::Result;
use mutuals_types::models::UserId;
use rusqlite::Connection;

use crate::models::{USER_COLUMNS, UserRow};
use crate::{Database, OptionalExt, is_constraint_violation};

impl Database {
    /// Inserts a user. Returns `None` when the username or email is already taken.
    pub fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<UserId>> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(e) if is_constraint_violation(&e) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", &username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &email))
    }

    pub fn user_exists(&self, id: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Case-insensitive substring match on username, excluding `exclude`,
    /// ordered by id. `needle` is matched literally: LIKE wildcards in it are
    /// escaped.
    pub fn search_users(&self, needle: &str, exclude: UserId, limit: u32) -> Result<Vec<UserRow>> {
        let pattern = format!("%{}%", escape_like(needle));
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE username LIKE ?1 ESCAPE '\\' AND id != ?2
                 ORDER BY id ASC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![pattern, exclude, limit], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Highest rank first; ties by ascending id.
    pub fn top_ranked_users(&self, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql =
                format!("SELECT {USER_COLUMNS} FROM users ORDER BY rank DESC, id ASC LIMIT ?1");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Overwrites the self-editable profile columns. Returns `None` when the
    /// new username is taken or the user does not exist.
    pub fn update_user_profile(
        &self,
        id: UserId,
        username: &str,
        bio: Option<&str>,
        avatar: Option<&str>,
        banner: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE users SET username = ?1, bio = ?2, avatar = ?3, banner = ?4
                 WHERE id = ?5
                 RETURNING {USER_COLUMNS}"
            );
            let updated = conn.query_row(
                &sql,
                rusqlite::params![username, bio, avatar, banner, id],
                UserRow::from_row,
            );
            match updated {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) if is_constraint_violation(&e) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn update_password(&self, id: UserId, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                (password_hash, id),
            )?;
            Ok(changed == 1)
        })
    }

    pub fn set_admin(&self, id: UserId, is_admin: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed =
                conn.execute("UPDATE users SET is_admin = ?1 WHERE id = ?2", (is_admin, id))?;
            Ok(changed == 1)
        })
    }
}

fn query_user(
    conn: &Connection,
    predicate: &str,
    value: &dyn rusqlite::ToSql,
) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([value], UserRow::from_row).optional()
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_username_or_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_user("alice", "a@example.com", "h").unwrap().is_some());
        assert!(db.insert_user("alice", "other@example.com", "h").unwrap().is_none());
        assert!(db.insert_user("alice2", "a@example.com", "h").unwrap().is_none());
    }

    #[test]
    fn new_users_start_at_rank_zero() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_user("alice", "a@example.com", "h").unwrap().unwrap();
        let row = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(row.rank, 0);
        assert!(!row.is_admin);
        assert!(!row.is_banned);
    }

    #[test]
    fn search_is_case_insensitive_and_literal() {
        let db = Database::open_in_memory().unwrap();
        let viewer = db.insert_user("viewer", "v@example.com", "h").unwrap().unwrap();
        db.insert_user("AliceW", "a@example.com", "h").unwrap();
        db.insert_user("malice", "m@example.com", "h").unwrap();
        db.insert_user("bob", "b@example.com", "h").unwrap();
        db.insert_user("under_score", "u@example.com", "h").unwrap();

        let names: Vec<String> = db
            .search_users("ALIC", viewer, 20)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["AliceW", "malice"]);

        // `_` and `%` must not act as wildcards
        assert!(db.search_users("al_ce", viewer, 20).unwrap().is_empty());
        assert!(db.search_users("a%e", viewer, 20).unwrap().is_empty());
        let hits = db.search_users("er_sc", viewer, 20).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn profile_update_writes_columns_and_keeps_usernames_unique() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.insert_user("alice", "a@example.com", "h").unwrap().unwrap();
        db.insert_user("bob", "b@example.com", "h").unwrap();

        let row = db
            .update_user_profile(alice, "alice_w", Some("hi"), Some("/a.png"), None)
            .unwrap()
            .unwrap();
        assert_eq!(row.username, "alice_w");
        assert_eq!(row.bio.as_deref(), Some("hi"));
        assert_eq!(row.avatar.as_deref(), Some("/a.png"));
        assert!(row.banner.is_none());

        assert!(db.update_user_profile(alice, "bob", None, None, None).unwrap().is_none());
        assert_eq!(db.get_user_by_id(alice).unwrap().unwrap().username, "alice_w");
        assert!(db.update_user_profile(999, "ghost", None, None, None).unwrap().is_none());
    }

    #[test]
    fn password_update_replaces_hash() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.insert_user("alice", "a@example.com", "old").unwrap().unwrap();
        assert!(db.update_password(alice, "new").unwrap());
        assert_eq!(db.get_user_by_id(alice).unwrap().unwrap().password, "new");
        assert!(!db.update_password(999, "new").unwrap());
    }

    #[test]
    fn search_excludes_viewer_and_respects_limit() {
        let db = Database::open_in_memory().unwrap();
        let viewer = db.insert_user("user0", "u0@example.com", "h").unwrap().unwrap();
        for i in 1..=5 {
            db.insert_user(&format!("user{}", i), &format!("u{}@example.com", i), "h")
                .unwrap();
        }
        let hits = db.search_users("user", viewer, 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|u| u.id != viewer));
    }
}
