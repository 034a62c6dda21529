use super::schema::{db_err, summary_from_row};
use crate::db::*;
use crate::error::Result;
use rusqlite::{OptionalExtension, Row, params};

/// Post columns, author summary, like count and liked-by-viewer flag.
/// `?1` is the viewer id (may be NULL).
const POST_VIEW_SELECT: &str = "SELECT p.id, p.user_id, p.content, p.image, p.created_at,
        u.id, u.username, u.full_name, u.profile_picture,
        (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id),
        EXISTS (SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = ?1)
     FROM posts p JOIN users u ON u.id = p.user_id";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        image: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn post_view_from_row(row: &Row<'_>) -> rusqlite::Result<(PostView, bool)> {
    let view = PostView {
        post: post_from_row(row)?,
        user: summary_from_row(row, 5)?,
        like_count: row.get(9)?,
        is_liked: None,
    };
    Ok((view, row.get(10)?))
}

const COMMENT_VIEW_SELECT: &str = "SELECT c.id, c.user_id, c.post_id, c.content, c.created_at,
        u.id, u.username, u.full_name, u.profile_picture
     FROM post_comments c JOIN users u ON u.id = c.user_id";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        post_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn comment_view_from_row(row: &Row<'_>) -> rusqlite::Result<CommentView> {
    Ok(CommentView {
        comment: comment_from_row(row)?,
        user: summary_from_row(row, 5)?,
    })
}

impl Database {
    // ========== POST OPERATIONS ==========

    /// Create a post and return it with its author.
    pub fn create_post(&self, user_id: i64, content: &str, image: Option<&str>) -> Result<PostView> {
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO posts (user_id, content, image, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, content, image, now_timestamp()],
            )
            .map_err(db_err("Failed to create post"))?;
            conn.last_insert_rowid()
        };

        self.get_post_view(id, Some(user_id))?
            .ok_or_else(|| crate::error::AppError::Internal("Created post vanished".to_string()))
    }

    /// Get a post by ID.
    pub fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, content, image, created_at FROM posts WHERE id = ?1",
            params![id],
            post_from_row,
        )
        .optional()
        .map_err(db_err("Failed to get post"))
    }

    /// Get a post with author, like count and the viewer's like status.
    pub fn get_post_view(&self, id: i64, viewer: Option<i64>) -> Result<Option<PostView>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE p.id = ?2", POST_VIEW_SELECT),
            params![viewer, id],
            post_view_from_row,
        )
        .optional()
        .map(|found| {
            found.map(|(mut view, liked)| {
                view.is_liked = Some(liked);
                view
            })
        })
        .map_err(db_err("Failed to get post"))
    }

    /// One page of the global feed, newest first.
    ///
    /// Every post carries `is_liked`, false for anonymous viewers.
    pub fn get_feed(&self, viewer: Option<i64>, offset: i64, limit: i64) -> Result<Vec<PostView>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "{} ORDER BY p.created_at DESC, p.id DESC LIMIT ?2 OFFSET ?3",
                POST_VIEW_SELECT
            ))
            .map_err(db_err("Failed to prepare query"))?;

        let posts = stmt
            .query_map(params![viewer, limit, offset], post_view_from_row)
            .map_err(db_err("Failed to get feed"))?
            .map(|r| {
                r.map(|(mut view, liked)| {
                    view.is_liked = Some(liked);
                    view
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Failed to collect feed"))?;

        Ok(posts)
    }

    /// All posts by a user, newest first.
    pub fn get_user_posts(&self, user_id: i64) -> Result<Vec<PostView>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE p.user_id = ?2 ORDER BY p.created_at DESC, p.id DESC",
                POST_VIEW_SELECT
            ))
            .map_err(db_err("Failed to prepare query"))?;

        let posts = stmt
            .query_map(params![Option::<i64>::None, user_id], |row| {
                post_view_from_row(row).map(|(view, _)| view)
            })
            .map_err(db_err("Failed to get user posts"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Failed to collect user posts"))?;

        Ok(posts)
    }

    /// Delete a post. Likes and comments cascade.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])
            .map_err(db_err("Failed to delete post"))?;
        Ok(rows > 0)
    }

    // ========== LIKE OPERATIONS ==========

    /// Check whether a user liked a post.
    pub fn has_liked(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM post_likes WHERE user_id = ?1 AND post_id = ?2)",
            params![user_id, post_id],
            |row| row.get(0),
        )
        .map_err(db_err("Failed to check like"))
    }

    /// Like a post. A duplicate like is a `Conflict`.
    pub fn create_like(&self, user_id: i64, post_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO post_likes (user_id, post_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, post_id, now_timestamp()],
        )
        .map_err(db_err("Failed to like post"))?;
        Ok(())
    }

    /// Remove a like. Returns whether one existed.
    pub fn delete_like(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM post_likes WHERE user_id = ?1 AND post_id = ?2",
                params![user_id, post_id],
            )
            .map_err(db_err("Failed to unlike post"))?;
        Ok(rows > 0)
    }

    // ========== COMMENT OPERATIONS ==========

    /// Create a comment and return it with its author.
    pub fn create_comment(&self, user_id: i64, post_id: i64, content: &str) -> Result<CommentView> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO post_comments (user_id, post_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, post_id, content, now_timestamp()],
        )
        .map_err(db_err("Failed to create comment"))?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("{} WHERE c.id = ?1", COMMENT_VIEW_SELECT),
            params![id],
            comment_view_from_row,
        )
        .map_err(db_err("Failed to get comment"))
    }

    /// Get a comment by ID.
    pub fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, post_id, content, created_at FROM post_comments WHERE id = ?1",
            params![id],
            comment_from_row,
        )
        .optional()
        .map_err(db_err("Failed to get comment"))
    }

    /// Comments on a post, newest first.
    pub fn get_post_comments(&self, post_id: i64) -> Result<Vec<CommentView>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE c.post_id = ?1 ORDER BY c.created_at DESC, c.id DESC",
                COMMENT_VIEW_SELECT
            ))
            .map_err(db_err("Failed to prepare query"))?;

        let comments = stmt
            .query_map(params![post_id], comment_view_from_row)
            .map_err(db_err("Failed to get comments"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Failed to collect comments"))?;

        Ok(comments)
    }

    /// Delete a comment.
    pub fn delete_comment(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM post_comments WHERE id = ?1", params![id])
            .map_err(db_err("Failed to delete comment"))?;
        Ok(rows > 0)
    }
}
