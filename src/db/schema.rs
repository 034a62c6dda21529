use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    pub(super) conn: Arc<Mutex<Connection>>,
}

/// Translate a SQLite failure into an application error.
///
/// Unique violations become `Conflict` naming the offending column and a
/// missing row becomes `NotFound`; anything else is internal.
pub(super) fn db_err(context: &'static str) -> impl FnOnce(rusqlite::Error) -> AppError {
    move |e| match &e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound("Record not found".to_string()),
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == ErrorCode::ConstraintViolation
                && msg.starts_with("UNIQUE constraint failed") =>
        {
            // "UNIQUE constraint failed: users.email"
            let column = msg
                .split(": ")
                .nth(1)
                .and_then(|cols| cols.split(',').next())
                .and_then(|col| col.trim().rsplit('.').next())
                .unwrap_or("record");
            AppError::Conflict(format!("{} already exists", column))
        }
        _ => AppError::Internal(format!("{}: {}", context, e)),
    }
}

pub(super) const USER_COLUMNS: &str =
    "id, email, username, password_hash, full_name, bio, profile_picture, created_at";

pub(super) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        full_name: row.get(4)?,
        bio: row.get(5)?,
        profile_picture: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Reads `id, username, full_name, profile_picture` starting at `offset`.
pub(super) fn summary_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        full_name: row.get(offset + 2)?,
        profile_picture: row.get(offset + 3)?,
    })
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE NOT NULL,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                full_name TEXT,
                bio TEXT,
                profile_picture TEXT,
                created_at INTEGER NOT NULL
            );

            -- Shared catalog
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                isbn TEXT UNIQUE,
                title TEXT NOT NULL,
                authors TEXT NOT NULL,
                description TEXT,
                categories TEXT NOT NULL DEFAULT 'Uncategorized',
                language TEXT,
                published_date TEXT,
                page_count INTEGER,
                pdf_key TEXT,
                pdf_url TEXT,
                preview_key TEXT,
                preview_url TEXT,
                thumbnail TEXT,
                uploaded_by INTEGER,
                status TEXT NOT NULL DEFAULT 'ready',
                created_at INTEGER NOT NULL,
                FOREIGN KEY (uploaded_by) REFERENCES users(id) ON DELETE SET NULL
            );

            -- Personal collections
            CREATE TABLE IF NOT EXISTS user_books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                book_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS ratings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                book_id INTEGER NOT NULL,
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                image TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS post_likes (
                user_id INTEGER NOT NULL,
                post_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, post_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS post_comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                post_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS follows (
                follower_id INTEGER NOT NULL,
                following_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (follower_id, following_id),
                CHECK (follower_id <> following_id),
                FOREIGN KEY (follower_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (following_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_created ON books(created_at);
            CREATE INDEX IF NOT EXISTS idx_user_books_user ON user_books(user_id);
            CREATE INDEX IF NOT EXISTS idx_ratings_book ON ratings(book_id);
            CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
            CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id);
            CREATE INDEX IF NOT EXISTS idx_likes_post ON post_likes(post_id);
            CREATE INDEX IF NOT EXISTS idx_comments_post ON post_comments(post_id);
            CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user and return it.
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.conn.lock();
        let created_at = now_timestamp();
        conn.execute(
            "INSERT INTO users (email, username, password_hash, full_name, bio, profile_picture, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.email,
                user.username,
                user.password_hash,
                user.full_name,
                user.bio,
                user.profile_picture,
                created_at,
            ],
        )
        .map_err(db_err("Failed to create user"))?;

        Ok(User {
            id: conn.last_insert_rowid(),
            email: user.email.clone(),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            full_name: user.full_name.clone(),
            bio: user.bio.clone(),
            profile_picture: user.profile_picture.clone(),
            created_at,
        })
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(db_err("Failed to get user"))
    }

    /// Get user by email.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email],
            user_from_row,
        )
        .optional()
        .map_err(db_err("Failed to get user"))
    }

    /// Find any user holding either the email or the username.
    pub fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {} FROM users WHERE email = ?1 OR username = ?2 LIMIT 1",
                USER_COLUMNS
            ),
            params![email, username],
            user_from_row,
        )
        .optional()
        .map_err(db_err("Failed to get user"))
    }

    /// Check whether a username is taken.
    pub fn username_exists(&self, username: &str) -> Result<bool> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1)",
            params![username],
            |row| row.get(0),
        )
        .map_err(db_err("Failed to check username"))
    }

    /// Apply a partial profile update and return the updated user.
    pub fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<User> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET
                full_name = COALESCE(?1, full_name),
                bio = COALESCE(?2, bio),
                profile_picture = COALESCE(?3, profile_picture)
             WHERE id = ?4",
            params![
                update.full_name,
                update.bio,
                update.profile_picture,
                user_id
            ],
        )
        .map_err(db_err("Failed to update profile"))?;

        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![user_id],
            user_from_row,
        )
        .map_err(db_err("Failed to get user"))
    }

    /// Aggregate counts for a user's profile.
    pub fn user_counts(&self, user_id: i64) -> Result<UserCounts> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM posts WHERE user_id = ?1),
                (SELECT COUNT(*) FROM user_books WHERE user_id = ?1),
                (SELECT COUNT(*) FROM ratings WHERE user_id = ?1),
                (SELECT COUNT(*) FROM post_comments WHERE user_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE following_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
            params![user_id],
            |row| {
                Ok(UserCounts {
                    posts: row.get(0)?,
                    books: row.get(1)?,
                    ratings: row.get(2)?,
                    comments: row.get(3)?,
                    followers: row.get(4)?,
                    following: row.get(5)?,
                })
            },
        )
        .map_err(db_err("Failed to count user activity"))
    }

    // ========== FOLLOW OPERATIONS ==========

    /// Check whether `follower_id` follows `following_id`.
    pub fn is_following(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2)",
            params![follower_id, following_id],
            |row| row.get(0),
        )
        .map_err(db_err("Failed to check follow"))
    }

    /// Create a follow edge.
    pub fn create_follow(&self, follower_id: i64, following_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?1, ?2, ?3)",
            params![follower_id, following_id, now_timestamp()],
        )
        .map_err(db_err("Failed to follow user"))?;
        Ok(())
    }

    /// Delete a follow edge. Returns whether one existed.
    pub fn delete_follow(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                params![follower_id, following_id],
            )
            .map_err(db_err("Failed to unfollow user"))?;
        Ok(rows > 0)
    }

    /// Users following `user_id`, most recent first.
    pub fn get_followers(&self, user_id: i64) -> Result<Vec<UserSummary>> {
        self.follow_edges(
            "SELECT u.id, u.username, u.full_name, u.profile_picture
             FROM follows f JOIN users u ON u.id = f.follower_id
             WHERE f.following_id = ?1
             ORDER BY f.created_at DESC, u.id DESC",
            user_id,
        )
    }

    /// Users that `user_id` follows, most recent first.
    pub fn get_following(&self, user_id: i64) -> Result<Vec<UserSummary>> {
        self.follow_edges(
            "SELECT u.id, u.username, u.full_name, u.profile_picture
             FROM follows f JOIN users u ON u.id = f.following_id
             WHERE f.follower_id = ?1
             ORDER BY f.created_at DESC, u.id DESC",
            user_id,
        )
    }

    fn follow_edges(&self, sql: &str, user_id: i64) -> Result<Vec<UserSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(db_err("Failed to prepare query"))?;

        let users = stmt
            .query_map(params![user_id], |row| summary_from_row(row, 0))
            .map_err(db_err("Failed to list follows"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Failed to collect follows"))?;

        Ok(users)
    }
}
