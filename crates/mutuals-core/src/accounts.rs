use chrono::{DateTime, Utc};
use tracing::{info, warn};

use mutuals_db::models::{UserRow, parse_timestamp};
use mutuals_types::models::{
    Account, Profile, ProfileUpdate, Relationship, User, UserId, UserStats,
};

use crate::error::{CoreError, CoreResult, USER_NOT_FOUND};
use crate::{Engine, rows};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const EMAIL_MAX: usize = 254;
const BIO_MAX: usize = 500;
const IMAGE_REF_MAX: usize = 2048;

/// What the login handler needs to authenticate a user.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
    pub banned: bool,
}

impl Engine {
    /// Creates an account. The password must already be hashed.
    pub fn register(&self, username: &str, email: &str, password_hash: &str) -> CoreResult<User> {
        validate_username(username)?;
        let email = email.trim();
        validate_email(email)?;

        if self.db.get_user_by_username(username)?.is_some() {
            return Err(CoreError::Conflict("Username already exists".into()));
        }
        if self.db.get_user_by_email(email)?.is_some() {
            return Err(CoreError::Conflict("Email already exists".into()));
        }

        let id = self
            .db
            .insert_user(username, email, password_hash)?
            .ok_or_else(|| CoreError::Conflict("Username or email already exists".into()))?;

        info!("Registered user {} ({})", username, id);
        self.user_by_id(id)
    }

    pub fn user_by_id(&self, id: UserId) -> CoreResult<User> {
        let row = self.db.get_user_by_id(id)?.ok_or(CoreError::NotFound(USER_NOT_FOUND))?;
        Ok(rows::user(row))
    }

    pub fn user_by_username(&self, username: &str) -> CoreResult<User> {
        let row = self
            .db
            .get_user_by_username(username)?
            .ok_or(CoreError::NotFound(USER_NOT_FOUND))?;
        Ok(rows::user(row))
    }

    pub fn credentials_by_username(&self, username: &str) -> CoreResult<Option<Credentials>> {
        Ok(self.db.get_user_by_username(username)?.map(credentials))
    }

    pub fn credentials_by_id(&self, id: UserId) -> CoreResult<Credentials> {
        let row = self.db.get_user_by_id(id)?.ok_or(CoreError::NotFound(USER_NOT_FOUND))?;
        Ok(credentials(row))
    }

    /// The caller's own record, including the private fields.
    pub fn account(&self, viewer: UserId) -> CoreResult<Account> {
        let row = self.db.get_user_by_id(viewer)?.ok_or(CoreError::NotFound(USER_NOT_FOUND))?;
        Ok(rows::account(row))
    }

    /// Applies a self-service profile edit. Avatar and banner are stored as
    /// given; they are references to media hosted elsewhere.
    pub fn update_profile(&self, viewer: UserId, update: ProfileUpdate) -> CoreResult<Account> {
        let current = self.db.get_user_by_id(viewer)?.ok_or(CoreError::NotFound(USER_NOT_FOUND))?;

        let username = match update.username {
            Some(name) => {
                validate_username(&name)?;
                let taken = self
                    .db
                    .get_user_by_username(&name)?
                    .is_some_and(|other| other.id != viewer);
                if taken {
                    return Err(CoreError::Conflict("Username already exists".into()));
                }
                name
            }
            None => current.username,
        };
        let bio = merge_field(update.bio, current.bio, "Bio", BIO_MAX)?;
        let avatar = merge_field(update.avatar, current.avatar, "Avatar", IMAGE_REF_MAX)?;
        let banner = merge_field(update.banner, current.banner, "Banner", IMAGE_REF_MAX)?;

        let row = self
            .db
            .update_user_profile(
                viewer,
                &username,
                bio.as_deref(),
                avatar.as_deref(),
                banner.as_deref(),
            )?
            .ok_or_else(|| CoreError::Conflict("Username already exists".into()))?;

        info!("User {} updated their profile", viewer);
        Ok(rows::account(row))
    }

    /// Stores a new password hash. The caller has already checked the
    /// current password.
    pub fn change_password(&self, viewer: UserId, new_password_hash: &str) -> CoreResult<()> {
        if !self.db.update_password(viewer, new_password_hash)? {
            return Err(CoreError::NotFound(USER_NOT_FOUND));
        }
        info!("User {} changed their password", viewer);
        Ok(())
    }

    /// Follower and following counts, counted from the live edges.
    pub fn user_stats(&self, user: UserId) -> CoreResult<UserStats> {
        Ok(UserStats {
            followers_count: self.db.count_followers(user)?,
            following_count: self.db.count_following(user)?,
        })
    }

    /// A profile as seen by `viewer`. Anonymous viewers get all relationship
    /// flags false.
    pub fn profile(&self, viewer: Option<UserId>, username: &str) -> CoreResult<Profile> {
        let user = self.user_by_username(username)?;
        let stats = self.user_stats(user.id)?;
        let relationship = match viewer {
            Some(viewer) => self.relationship(viewer, user.id)?,
            None => Relationship::default(),
        };
        Ok(Profile {
            user,
            stats,
            relationship,
        })
    }

    /// Grants admin rights by username. Used to bootstrap moderators from
    /// configuration.
    pub fn grant_admin(&self, username: &str) -> CoreResult<()> {
        let user = self.user_by_username(username)?;
        if self.db.set_admin(user.id, true)? {
            info!("Granted admin to {} ({})", user.username, user.id);
        }
        Ok(())
    }
}

fn credentials(row: UserRow) -> Credentials {
    Credentials {
        banned: is_actively_banned(&row, Utc::now()),
        user_id: row.id,
        username: row.username,
        password_hash: row.password,
    }
}

/// `None` keeps `current`; a blank value clears the field.
fn merge_field(
    update: Option<String>,
    current: Option<String>,
    label: &str,
    max: usize,
) -> CoreResult<Option<String>> {
    let Some(value) = update else {
        return Ok(current);
    };
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.chars().count() > max {
        return Err(CoreError::validation(format!(
            "{} must be at most {} characters",
            label, max
        )));
    }
    Ok(Some(value.to_string()))
}

/// Banned with no expiry, or with an expiry still in the future.
pub(crate) fn is_actively_banned(row: &UserRow, now: DateTime<Utc>) -> bool {
    if !row.is_banned {
        return false;
    }
    match row.ban_expires.as_deref() {
        None => true,
        Some(raw) => match parse_timestamp(raw) {
            Some(expires) => expires > now,
            None => {
                warn!("Corrupt ban_expires '{}' on user {}, treating as permanent", raw, row.id);
                true
            }
        },
    }
}

fn validate_username(username: &str) -> CoreResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(CoreError::validation(format!(
            "Username must be {}-{} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::validation(
            "Username must contain only English letters, numbers and underscores",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> CoreResult<()> {
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    };
    if !well_formed || email.len() > EMAIL_MAX || email.chars().any(char::is_whitespace) {
        return Err(CoreError::validation("Invalid email address"));
    }
    Ok(())
}
