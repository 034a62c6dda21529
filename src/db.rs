mod books;
mod schema;
mod social;

pub use schema::Database;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login email, unique.
    pub email: String,
    /// Public handle, unique.
    pub username: String,
    /// Argon2 password hash.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Display name.
    pub full_name: Option<String>,
    /// Profile bio.
    pub bio: Option<String>,
    /// Avatar URL.
    pub profile_picture: Option<String>,
    /// Account creation timestamp.
    pub created_at: i64,
}

/// Fields needed to insert a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    /// `Some("")` clears the bio.
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

/// Author summary embedded in posts, comments and follow lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
}

/// Aggregate counts attached to profiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCounts {
    pub posts: i64,
    pub books: i64,
    pub ratings: i64,
    pub comments: i64,
    pub followers: i64,
    pub following: i64,
}

/// Lifecycle of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    /// Original stored, preview not yet available.
    Processing,
    /// Fully available.
    Ready,
}

impl BookStatus {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Processing => "processing",
            BookStatus::Ready => "ready",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "processing" => BookStatus::Processing,
            _ => BookStatus::Ready,
        }
    }
}

/// Catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Book ID.
    pub id: i64,
    /// ISBN or other external identifier.
    pub isbn: Option<String>,
    /// Book title.
    pub title: String,
    /// Authors, comma separated.
    pub authors: String,
    /// Book description.
    pub description: Option<String>,
    /// Genres, comma separated.
    pub categories: String,
    /// Language code.
    pub language: Option<String>,
    /// Publication date as supplied by the uploader.
    pub published_date: Option<String>,
    /// Page count of the original PDF.
    pub page_count: Option<i64>,
    /// Public URL of the full PDF.
    pub pdf_url: Option<String>,
    /// Public URL of the preview PDF.
    pub preview_url: Option<String>,
    /// Cover image URL.
    pub thumbnail: Option<String>,
    /// Uploader, owner of the catalog entry.
    pub uploaded_by: Option<i64>,
    /// Readiness flag.
    pub status: BookStatus,
    /// Storage key of the full PDF.
    #[serde(skip)]
    pub pdf_key: Option<String>,
    /// Storage key of the preview PDF.
    #[serde(skip)]
    pub preview_key: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
}

impl Book {
    /// Split categories into individual genres.
    pub fn genres(&self) -> impl Iterator<Item = &str> {
        self.categories
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }
}

/// Fields needed to insert a catalog entry.
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub isbn: Option<String>,
    pub title: String,
    pub authors: String,
    pub description: Option<String>,
    pub categories: String,
    pub language: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i64>,
    pub pdf_key: Option<String>,
    pub pdf_url: Option<String>,
    pub thumbnail: Option<String>,
    pub uploaded_by: Option<i64>,
}

/// A user's rating of a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    /// 1 to 5.
    pub rating: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Average and count of all ratings for a book.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

/// Membership of a catalog book in a user's collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub created_at: i64,
}

/// Book as listed in a user's collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBook {
    /// Membership id, used to remove the entry.
    pub collection_id: i64,
    pub added_at: i64,
    /// The owner's own rating.
    pub user_rating: Option<i64>,
    /// Ratings from all users.
    pub total_ratings: i64,
    #[serde(flatten)]
    pub book: Book,
}

/// Social feed post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub image: Option<String>,
    pub created_at: i64,
}

/// Post with author and like information.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub user: UserSummary,
    pub like_count: i64,
    /// Whether the viewer liked the post; absent when there is no viewer context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
}

/// Comment on a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub content: String,
    pub created_at: i64,
}

/// Comment with author summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: UserSummary,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}
