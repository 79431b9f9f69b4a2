use anyhow::Result;
use mutuals_types::models::{AuditAction, PostId, ReportId, UserId};
use rusqlite::Connection;

use crate::Database;
use crate::models::{AuditLogRow, REPORT_COLUMNS, ReportRow};

impl Database {
    // -- Bans --

    /// Marks `target` banned and records the action in the audit log.
    /// Returns false (and writes nothing) when the user does not exist.
    pub fn ban_user(
        &self,
        actor: UserId,
        target: UserId,
        reason: &str,
        expires: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE users SET is_banned = 1, ban_reason = ?1, ban_expires = ?2 WHERE id = ?3",
                rusqlite::params![reason, expires, target],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            let details = match expires {
                Some(until) => format!("user {} banned until {}: {}", target, until, reason),
                None => format!("user {} banned: {}", target, reason),
            };
            record_audit(&tx, Some(actor), AuditAction::UserBan, Some(&details))?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn unban_user(&self, actor: UserId, target: UserId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE users SET is_banned = 0, ban_reason = NULL, ban_expires = NULL WHERE id = ?1",
                [target],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            record_audit(
                &tx,
                Some(actor),
                AuditAction::UserUnban,
                Some(&format!("user {} unbanned", target)),
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    // -- Posts --

    pub fn soft_delete_post(&self, actor: UserId, post: PostId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute("UPDATE posts SET is_deleted = 1 WHERE id = ?1", [post])?;
            if changed == 0 {
                return Ok(false);
            }
            record_audit(
                &tx,
                Some(actor),
                AuditAction::PostDelete,
                Some(&format!("post {} deleted", post)),
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    // -- Reports --

    pub fn insert_report(
        &self,
        reporter: UserId,
        post: Option<PostId>,
        reported_user: UserId,
        reason: &str,
        description: Option<&str>,
    ) -> Result<ReportRow> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO reports (post_id, reporter_id, reported_user_id, reason, description)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING {REPORT_COLUMNS}"
            );
            let row = conn.query_row(
                &sql,
                rusqlite::params![post, reporter, reported_user, reason, description],
                ReportRow::from_row,
            )?;
            Ok(row)
        })
    }

    /// Newest first.
    pub fn list_reports(&self) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at DESC, id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], ReportRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn review_report(&self, actor: UserId, report: ReportId, status: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE reports
                 SET status = ?1,
                     reviewed_by = ?2,
                     reviewed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                rusqlite::params![status, actor, report],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            record_audit(
                &tx,
                Some(actor),
                AuditAction::ReportReview,
                Some(&format!("report {} marked {}", report, status)),
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    // -- Audit log --

    /// Newest first, at most `limit` rows.
    pub fn list_audit_logs(&self, limit: u32) -> Result<Vec<AuditLogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, action, details, created_at FROM audit_logs
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(AuditLogRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        action: row.get(2)?,
                        details: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn record_audit(
    conn: &Connection,
    actor: Option<UserId>,
    action: AuditAction,
    details: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_logs (user_id, action, details) VALUES (?1, ?2, ?3)",
        rusqlite::params![actor, action.as_str(), details],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ban_and_unban_write_audit_rows() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.insert_user("admin", "root@example.com", "h").unwrap().unwrap();
        let user = db.insert_user("spammer", "s@example.com", "h").unwrap().unwrap();

        assert!(db.ban_user(admin, user, "spam", None).unwrap());
        let row = db.get_user_by_id(user).unwrap().unwrap();
        assert!(row.is_banned);
        assert_eq!(row.ban_reason.as_deref(), Some("spam"));

        assert!(db.unban_user(admin, user).unwrap());
        let row = db.get_user_by_id(user).unwrap().unwrap();
        assert!(!row.is_banned);
        assert!(row.ban_reason.is_none());

        let actions: Vec<String> =
            db.list_audit_logs(10).unwrap().into_iter().map(|l| l.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::UserUnban.as_str(), AuditAction::UserBan.as_str()]
        );
    }

    #[test]
    fn post_and_report_changes_log_their_action() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.insert_user("admin", "root@example.com", "h").unwrap().unwrap();
        let a = db.insert_user("alice", "a@example.com", "h").unwrap().unwrap();
        let post = db.insert_post(a, "rude", "text", None).unwrap();
        let report = db.insert_report(admin, Some(post.id), a, "abuse", None).unwrap();

        assert!(db.soft_delete_post(admin, post.id).unwrap());
        assert!(db.review_report(admin, report.id, "resolved").unwrap());

        let logs = db.list_audit_logs(10).unwrap();
        let actions: Vec<&str> = logs.iter().map(|l| l.action.as_str()).collect();
        assert_eq!(
            actions,
            vec![AuditAction::ReportReview.as_str(), AuditAction::PostDelete.as_str()]
        );
        assert!(logs.iter().all(|l| l.user_id == Some(admin)));
    }

    #[test]
    fn missing_targets_write_nothing() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.insert_user("admin", "root@example.com", "h").unwrap().unwrap();

        assert!(!db.ban_user(admin, 999, "spam", None).unwrap());
        assert!(!db.soft_delete_post(admin, 999).unwrap());
        assert!(!db.review_report(admin, 999, "resolved").unwrap());
        assert!(db.list_audit_logs(10).unwrap().is_empty());
    }

    #[test]
    fn review_stamps_reviewer() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.insert_user("admin", "root@example.com", "h").unwrap().unwrap();
        let a = db.insert_user("alice", "a@example.com", "h").unwrap().unwrap();
        let b = db.insert_user("bob", "b@example.com", "h").unwrap().unwrap();
        let post = db.insert_post(b, "rude", "text", None).unwrap();

        let report = db.insert_report(a, Some(post.id), b, "abuse", None).unwrap();
        assert_eq!(report.status, "pending");
        assert!(report.reviewed_by.is_none());

        assert!(db.review_report(admin, report.id, "resolved").unwrap());
        let reports = db.list_reports().unwrap();
        assert_eq!(reports[0].status, "resolved");
        assert_eq!(reports[0].reviewed_by, Some(admin));
        assert!(reports[0].reviewed_at.is_some());
    }
}
