use std::collections::HashMap;

use mutuals_types::models::{FollowEdge, Relationship, UserId, UserSearchHit};

use crate::error::{CoreError, CoreResult};
use crate::Engine;

pub const SEARCH_PAGE_SIZE: u32 = 20;

/// Classifies the edges between `viewer` and `subject`. Edges that touch
/// neither orientation are ignored, so callers may pass a wider edge set.
pub fn classify(viewer: UserId, subject: UserId, edges: &[FollowEdge]) -> Relationship {
    if viewer == subject {
        return Relationship::default();
    }

    let mut rel = Relationship::default();
    for edge in edges {
        if edge.follower_id == viewer && edge.following_id == subject {
            rel.is_following = true;
        } else if edge.follower_id == subject && edge.following_id == viewer {
            rel.is_followed_by = true;
        }
    }
    rel.is_mutual_follow = rel.is_following && rel.is_followed_by;
    rel
}

impl Engine {
    /// Relationship facts of `viewer` towards `subject`, read from the live
    /// graph. All false when they are the same user.
    pub fn relationship(&self, viewer: UserId, subject: UserId) -> CoreResult<Relationship> {
        if viewer == subject {
            return Ok(Relationship::default());
        }
        let edges = self.db.follows_between(viewer, subject)?;
        Ok(classify(viewer, subject, &edges))
    }

    pub fn is_mutual(&self, a: UserId, b: UserId) -> CoreResult<bool> {
        Ok(self.relationship(a, b)?.is_mutual_follow)
    }

    /// Relationship of `viewer` towards every candidate, in one graph query.
    /// Each value equals what [`Engine::relationship`] returns for the pair.
    pub fn annotate(
        &self,
        viewer: UserId,
        candidates: &[UserId],
    ) -> CoreResult<HashMap<UserId, Relationship>> {
        let others: Vec<UserId> = candidates.iter().copied().filter(|&c| c != viewer).collect();
        let edges = self.db.follows_touching(viewer, &others)?;

        Ok(candidates
            .iter()
            .map(|&candidate| (candidate, classify(viewer, candidate, &edges)))
            .collect())
    }

    /// Case-insensitive substring search on usernames, never including the
    /// viewer.
    pub fn search_users(&self, viewer: UserId, query: &str) -> CoreResult<Vec<UserSearchHit>> {
        let needle = query.trim();
        if needle.is_empty() {
            return Err(CoreError::validation("Search query is required"));
        }

        let rows = self.db.search_users(needle, viewer, SEARCH_PAGE_SIZE)?;
        let ids: Vec<UserId> = rows.iter().map(|r| r.id).collect();
        let relationships = self.annotate(viewer, &ids)?;
        let counts = self.db.follower_counts(&ids)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let rel = relationships.get(&row.id).copied().unwrap_or_default();
                UserSearchHit {
                    followers_count: counts.get(&row.id).copied().unwrap_or(0),
                    is_following: rel.is_following,
                    is_followed_by: rel.is_followed_by,
                    id: row.id,
                    username: row.username,
                    bio: row.bio,
                    avatar: row.avatar,
                }
            })
            .collect())
    }
}
