use mutuals_db::models::Toggled;
use mutuals_types::models::{FollowToggle, LeaderboardEntry, UserId};
use tracing::debug;

use crate::error::{CoreError, CoreResult, USER_NOT_FOUND};
use crate::{Engine, toggle_with_retry};

pub const LEADERBOARD_SIZE: u32 = 10;

impl Engine {
    /// Follows `target` if `viewer` does not already, otherwise unfollows.
    /// A new follow bumps the target's rank; an unfollow leaves it alone.
    pub fn toggle_follow(&self, viewer: UserId, target: UserId) -> CoreResult<FollowToggle> {
        if viewer == target {
            return Err(CoreError::validation("You cannot follow yourself"));
        }
        if !self.db.user_exists(target)? {
            return Err(CoreError::NotFound(USER_NOT_FOUND));
        }

        let outcome = toggle_with_retry("follow", || self.db.toggle_follow(viewer, target))?;
        let toggle = follow_outcome(outcome)?;
        debug!("User {} {:?} user {}", viewer, toggle, target);
        Ok(toggle)
    }

    /// Top users by rank, ties broken by id.
    pub fn leaderboard(&self) -> CoreResult<Vec<LeaderboardEntry>> {
        let rows = self.db.top_ranked_users(LEADERBOARD_SIZE)?;
        let ids: Vec<UserId> = rows.iter().map(|r| r.id).collect();
        let counts = self.db.follower_counts(&ids)?;

        Ok(rows
            .into_iter()
            .map(|row| LeaderboardEntry {
                followers_count: counts.get(&row.id).copied().unwrap_or(0),
                id: row.id,
                username: row.username,
                avatar: row.avatar,
                rank: row.rank,
            })
            .collect())
    }
}

fn follow_outcome(outcome: Toggled) -> CoreResult<FollowToggle> {
    match outcome {
        Toggled::Inserted => Ok(FollowToggle::Followed),
        Toggled::Deleted => Ok(FollowToggle::Unfollowed),
        Toggled::Raced => Err(CoreError::Conflict(
            "Concurrent follow update, please retry".into(),
        )),
    }
}
