use mutuals_db::models::Toggled;
use mutuals_types::models::{LikeToggle, NewPost, Post, PostId, PostView, PublicUser, UserId};
use tracing::debug;

use crate::error::{CoreError, CoreResult, POST_NOT_FOUND, USER_NOT_FOUND};
use crate::{Engine, rows, toggle_with_retry};

pub const MAX_POST_CHARS: usize = 5000;
const DEFAULT_POST_KIND: &str = "text";

impl Engine {
    /// Publishes a post. Either text or an attachment reference is required.
    pub fn create_post(&self, viewer: UserId, post: NewPost) -> CoreResult<Post> {
        if !self.db.user_exists(viewer)? {
            return Err(CoreError::NotFound(USER_NOT_FOUND));
        }

        let content = post.content.trim();
        let file_url = post.file_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
        if content.is_empty() && file_url.is_none() {
            return Err(CoreError::validation("Post must have content or a file"));
        }
        if content.chars().count() > MAX_POST_CHARS {
            return Err(CoreError::validation(format!(
                "Post must be at most {} characters",
                MAX_POST_CHARS
            )));
        }
        let kind = post
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_POST_KIND);

        let row = self.db.insert_post(viewer, content, kind, file_url)?;
        debug!("User {} created post {}", viewer, row.id);
        Ok(rows::post(row))
    }

    /// Visible posts, newest first. `is_liked` is false for anonymous viewers.
    pub fn list_posts(&self, viewer: Option<UserId>) -> CoreResult<Vec<PostView>> {
        let rows = self.db.post_feed(viewer)?;
        Ok(rows
            .into_iter()
            .map(|row| PostView {
                author: PublicUser {
                    id: row.post.user_id,
                    username: row.author_username,
                    avatar: row.author_avatar,
                },
                post: rows::post(row.post),
                likes_count: row.likes_count,
                is_liked: row.is_liked,
            })
            .collect())
    }

    pub fn toggle_like(&self, viewer: UserId, post: PostId) -> CoreResult<LikeToggle> {
        match self.db.get_post(post)? {
            Some(row) if !row.is_deleted => {}
            _ => return Err(CoreError::NotFound(POST_NOT_FOUND)),
        }

        let outcome = toggle_with_retry("like", || self.db.toggle_like(viewer, post))?;
        like_outcome(outcome)
    }
}

fn like_outcome(outcome: Toggled) -> CoreResult<LikeToggle> {
    match outcome {
        Toggled::Inserted => Ok(LikeToggle::Liked),
        Toggled::Deleted => Ok(LikeToggle::Unliked),
        Toggled::Raced => Err(CoreError::Conflict("Concurrent like update, please retry".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{engine, user};

    fn text(content: &str) -> NewPost {
        NewPost {
            content: content.into(),
            ..Default::default()
        }
    }

    #[test]
    fn create_post_validates() {
        let engine = engine();
        let a = user(&engine, "alice");

        let err = engine.create_post(a, text("   ")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        let err = engine.create_post(a, text(&"x".repeat(MAX_POST_CHARS + 1))).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let image = engine
            .create_post(
                a,
                NewPost {
                    content: String::new(),
                    kind: Some("image".into()),
                    file_url: Some("/uploads/p.png".into()),
                },
            )
            .unwrap();
        assert_eq!(image.kind, "image");

        let post = engine.create_post(a, text(" hello ")).unwrap();
        assert_eq!(post.content, "hello");
        assert_eq!(post.kind, DEFAULT_POST_KIND);
    }

    #[test]
    fn like_toggles_per_viewer() {
        let engine = engine();
        let a = user(&engine, "alice");
        let b = user(&engine, "bob");
        let post = engine.create_post(a, text("hello")).unwrap();

        assert_eq!(engine.toggle_like(b, post.id).unwrap(), LikeToggle::Liked);
        let feed = engine.list_posts(Some(b)).unwrap();
        assert_eq!(feed[0].likes_count, 1);
        assert!(feed[0].is_liked);
        assert_eq!(feed[0].author.username, "alice");
        assert!(!engine.list_posts(Some(a)).unwrap()[0].is_liked);
        assert!(!engine.list_posts(None).unwrap()[0].is_liked);

        assert_eq!(engine.toggle_like(b, post.id).unwrap(), LikeToggle::Unliked);
        assert_eq!(engine.list_posts(None).unwrap()[0].likes_count, 0);
    }

    #[test]
    fn lost_race_is_never_reported_as_liked() {
        assert_eq!(like_outcome(Toggled::Inserted).unwrap(), LikeToggle::Liked);
        assert_eq!(like_outcome(Toggled::Deleted).unwrap(), LikeToggle::Unliked);
        let err = like_outcome(Toggled::Raced).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn missing_or_deleted_posts_cannot_be_liked() {
        let engine = engine();
        let a = user(&engine, "alice");
        let err = engine.toggle_like(a, 42).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(POST_NOT_FOUND)));

        let post = engine.create_post(a, text("gone soon")).unwrap();
        engine.db().soft_delete_post(a, post.id).unwrap();
        let err = engine.toggle_like(a, post.id).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert!(engine.list_posts(None).unwrap().is_empty());
    }
}
