//! Admin-only operations. Every mutating action writes an audit row in the
//! same transaction as the change itself.

use chrono::{DateTime, Utc};
use mutuals_db::models::format_timestamp;
use mutuals_types::models::{
    AdminUserView, AuditLogEntry, NewReport, Post, PostId, Report, ReportId, ReportStatus, UserId,
};
use tracing::info;

use crate::error::{
    ADMIN_REQUIRED, CoreError, CoreResult, POST_NOT_FOUND, REPORT_NOT_FOUND, USER_NOT_FOUND,
};
use crate::{Engine, rows};

pub const AUDIT_LOG_LIMIT: u32 = 200;

impl Engine {
    pub fn require_admin(&self, viewer: UserId) -> CoreResult<()> {
        match self.db.get_user_by_id(viewer)? {
            Some(row) if row.is_admin => Ok(()),
            _ => Err(CoreError::Forbidden(ADMIN_REQUIRED)),
        }
    }

    pub fn list_users(&self, admin: UserId) -> CoreResult<Vec<AdminUserView>> {
        self.require_admin(admin)?;
        let rows = self.db.list_users()?;
        Ok(rows.into_iter().map(rows::admin_user).collect())
    }

    /// Bans `target`, permanently when `expires` is `None`.
    pub fn ban_user(
        &self,
        admin: UserId,
        target: UserId,
        reason: &str,
        expires: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        self.require_admin(admin)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::validation("Ban reason is required"));
        }
        if admin == target {
            return Err(CoreError::validation("You cannot ban yourself"));
        }

        let expires = expires.map(|at| format_timestamp(&at));
        if !self.db.ban_user(admin, target, reason, expires.as_deref())? {
            return Err(CoreError::NotFound(USER_NOT_FOUND));
        }
        info!("Admin {} banned user {}: {}", admin, target, reason);
        Ok(())
    }

    pub fn unban_user(&self, admin: UserId, target: UserId) -> CoreResult<()> {
        self.require_admin(admin)?;
        if !self.db.unban_user(admin, target)? {
            return Err(CoreError::NotFound(USER_NOT_FOUND));
        }
        info!("Admin {} unbanned user {}", admin, target);
        Ok(())
    }

    /// Every post including soft-deleted ones, newest first.
    pub fn list_all_posts(&self, admin: UserId) -> CoreResult<Vec<Post>> {
        self.require_admin(admin)?;
        let rows = self.db.list_all_posts()?;
        Ok(rows.into_iter().map(rows::post).collect())
    }

    pub fn delete_post(&self, admin: UserId, post: PostId) -> CoreResult<()> {
        self.require_admin(admin)?;
        if !self.db.soft_delete_post(admin, post)? {
            return Err(CoreError::NotFound(POST_NOT_FOUND));
        }
        info!("Admin {} deleted post {}", admin, post);
        Ok(())
    }

    /// Files a report against a user, optionally about one of their posts.
    pub fn create_report(&self, reporter: UserId, report: NewReport) -> CoreResult<Report> {
        let reason = report.reason.trim();
        if reason.is_empty() {
            return Err(CoreError::validation("Report reason is required"));
        }
        if report.reported_user_id == reporter {
            return Err(CoreError::validation("You cannot report yourself"));
        }
        if !self.db.user_exists(report.reported_user_id)? {
            return Err(CoreError::NotFound(USER_NOT_FOUND));
        }
        if let Some(post) = report.post_id {
            match self.db.get_post(post)? {
                Some(row) if row.user_id == report.reported_user_id => {}
                Some(_) => {
                    return Err(CoreError::validation("Post does not belong to the reported user"));
                }
                None => return Err(CoreError::NotFound(POST_NOT_FOUND)),
            }
        }

        let description = report
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let row = self.db.insert_report(
            reporter,
            report.post_id,
            report.reported_user_id,
            reason,
            description,
        )?;
        info!("User {} reported user {} (report {})", reporter, report.reported_user_id, row.id);
        Ok(rows::report(row))
    }

    /// Reports the author of a visible post about that post.
    pub fn report_post(
        &self,
        reporter: UserId,
        post: PostId,
        reason: &str,
        description: Option<String>,
    ) -> CoreResult<Report> {
        let author = self
            .db
            .get_post(post)?
            .filter(|row| !row.is_deleted)
            .ok_or(CoreError::NotFound(POST_NOT_FOUND))?
            .user_id;
        self.create_report(
            reporter,
            NewReport {
                post_id: Some(post),
                reported_user_id: author,
                reason: reason.to_string(),
                description,
            },
        )
    }

    pub fn list_reports(&self, admin: UserId) -> CoreResult<Vec<Report>> {
        self.require_admin(admin)?;
        let rows = self.db.list_reports()?;
        Ok(rows.into_iter().map(rows::report).collect())
    }

    pub fn review_report(
        &self,
        admin: UserId,
        report: ReportId,
        status: ReportStatus,
    ) -> CoreResult<()> {
        self.require_admin(admin)?;
        if status == ReportStatus::Pending {
            return Err(CoreError::validation("Status must be reviewed or resolved"));
        }
        if !self.db.review_report(admin, report, status.as_str())? {
            return Err(CoreError::NotFound(REPORT_NOT_FOUND));
        }
        info!("Admin {} marked report {} {}", admin, report, status.as_str());
        Ok(())
    }

    pub fn audit_logs(&self, admin: UserId) -> CoreResult<Vec<AuditLogEntry>> {
        self.require_admin(admin)?;
        let rows = self.db.list_audit_logs(AUDIT_LOG_LIMIT)?;
        Ok(rows.into_iter().map(rows::audit_entry).collect())
    }
}
