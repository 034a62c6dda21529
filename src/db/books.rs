use super::schema::db_err;
use crate::db::*;
use crate::error::Result;
use rusqlite::{OptionalExtension, Row, params};
use std::collections::BTreeMap;

const BOOK_COLUMNS: &str = "b.id, b.isbn, b.title, b.authors, b.description, b.categories, \
     b.language, b.published_date, b.page_count, b.pdf_url, b.preview_url, b.thumbnail, \
     b.uploaded_by, b.status, b.pdf_key, b.preview_key, b.created_at";

/// Number of columns in `BOOK_COLUMNS`.
const BOOK_COLUMN_COUNT: usize = 17;

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    let status: String = row.get(13)?;
    Ok(Book {
        id: row.get(0)?,
        isbn: row.get(1)?,
        title: row.get(2)?,
        authors: row.get(3)?,
        description: row.get(4)?,
        categories: row.get(5)?,
        language: row.get(6)?,
        published_date: row.get(7)?,
        page_count: row.get(8)?,
        pdf_url: row.get(9)?,
        preview_url: row.get(10)?,
        thumbnail: row.get(11)?,
        uploaded_by: row.get(12)?,
        status: BookStatus::parse(&status),
        pdf_key: row.get(14)?,
        preview_key: row.get(15)?,
        created_at: row.get(16)?,
    })
}

/// Unicode case-insensitive substring match. `needle` is already lowercase.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl Database {
    // ========== CATALOG OPERATIONS ==========

    /// Insert a catalog entry with the given status.
    pub fn create_book(&self, book: &NewBook, status: BookStatus) -> Result<Book> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books
             (isbn, title, authors, description, categories, language, published_date,
              page_count, pdf_key, pdf_url, thumbnail, uploaded_by, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                book.isbn,
                book.title,
                book.authors,
                book.description,
                book.categories,
                book.language,
                book.published_date,
                book.page_count,
                book.pdf_key,
                book.pdf_url,
                book.thumbnail,
                book.uploaded_by,
                status.as_str(),
                now_timestamp(),
            ],
        )
        .map_err(db_err("Failed to create book"))?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {} FROM books b WHERE b.id = ?1", BOOK_COLUMNS),
            params![id],
            book_from_row,
        )
        .map_err(db_err("Failed to get book"))
    }

    /// Record the preview artifact and mark the entry ready.
    ///
    /// `page_count` and `description` only fill in values the uploader did
    /// not supply.
    pub fn mark_book_ready(
        &self,
        id: i64,
        preview_key: &str,
        preview_url: &str,
        page_count: i64,
        description: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET preview_key = ?1, preview_url = ?2,
                    page_count = COALESCE(page_count, ?3),
                    description = COALESCE(description, ?4), status = 'ready'
                 WHERE id = ?5",
                params![preview_key, preview_url, page_count, description, id],
            )
            .map_err(db_err("Failed to update book"))?;
        Ok(rows > 0)
    }

    /// Get a catalog entry by ID, whatever its status.
    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM books b WHERE b.id = ?1", BOOK_COLUMNS),
            params![id],
            book_from_row,
        )
        .optional()
        .map_err(db_err("Failed to get book"))
    }

    /// Resolve a ready catalog entry by ISBN, falling back to its numeric id.
    pub fn find_catalog_book(&self, key: &str) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        let by_isbn = conn
            .query_row(
                &format!(
                    "SELECT {} FROM books b WHERE b.isbn = ?1 AND b.status = 'ready'",
                    BOOK_COLUMNS
                ),
                params![key],
                book_from_row,
            )
            .optional()
            .map_err(db_err("Failed to get book"))?;

        if by_isbn.is_some() {
            return Ok(by_isbn);
        }

        let Ok(id) = key.parse::<i64>() else {
            return Ok(None);
        };

        conn.query_row(
            &format!(
                "SELECT {} FROM books b WHERE b.id = ?1 AND b.status = 'ready'",
                BOOK_COLUMNS
            ),
            params![id],
            book_from_row,
        )
        .optional()
        .map_err(db_err("Failed to get book"))
    }

    /// List ready catalog entries, newest first.
    ///
    /// `search` matches title, authors, description and categories; otherwise
    /// `genre` matches categories. Both are case-insensitive substring matches.
    /// SQLite `LIKE` only folds ASCII, so filtering happens after the query.
    pub fn list_books(&self, search: Option<&str>, genre: Option<&str>) -> Result<Vec<Book>> {
        let books = self.ready_books()?;

        let books = match (search, genre) {
            (Some(q), _) => {
                let needle = q.to_lowercase();
                books
                    .into_iter()
                    .filter(|b| {
                        contains_folded(&b.title, &needle)
                            || contains_folded(&b.authors, &needle)
                            || b.description
                                .as_deref()
                                .is_some_and(|d| contains_folded(d, &needle))
                            || contains_folded(&b.categories, &needle)
                    })
                    .collect()
            }
            (None, Some(g)) => {
                let needle = g.to_lowercase();
                books
                    .into_iter()
                    .filter(|b| contains_folded(&b.categories, &needle))
                    .collect()
            }
            (None, None) => books,
        };

        Ok(books)
    }

    fn ready_books(&self) -> Result<Vec<Book>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM books b WHERE b.status = 'ready' ORDER BY b.created_at DESC, b.id DESC",
                BOOK_COLUMNS
            ))
            .map_err(db_err("Failed to prepare query"))?;

        let books = stmt
            .query_map([], book_from_row)
            .map_err(db_err("Failed to list books"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Failed to collect books"))?;

        Ok(books)
    }

    /// Distinct genres across ready entries, sorted.
    ///
    /// Genres differing only by case are merged, keeping the spelling of the
    /// oldest entry.
    pub fn list_genres(&self) -> Result<Vec<String>> {
        let books = self.ready_books()?;

        let mut genres: BTreeMap<String, String> = BTreeMap::new();
        for genre in books.iter().rev().flat_map(|b| b.genres()) {
            genres
                .entry(genre.to_lowercase())
                .or_insert_with(|| genre.to_string());
        }

        Ok(genres.into_values().collect())
    }

    /// Delete a catalog entry. Ratings and memberships cascade.
    pub fn delete_book(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM books WHERE id = ?1", params![id])
            .map_err(db_err("Failed to delete book"))?;
        Ok(rows > 0)
    }

    // ========== RATING OPERATIONS ==========

    /// Create or update the rating of `user_id` for `book_id`.
    pub fn upsert_rating(&self, user_id: i64, book_id: i64, rating: i64) -> Result<Rating> {
        let conn = self.conn.lock();
        let now = now_timestamp();
        conn.query_row(
            "INSERT INTO ratings (user_id, book_id, rating, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (user_id, book_id) DO UPDATE SET
                rating = excluded.rating,
                updated_at = excluded.updated_at
             RETURNING id, user_id, book_id, rating, created_at, updated_at",
            params![user_id, book_id, rating, now],
            |row| {
                Ok(Rating {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    book_id: row.get(2)?,
                    rating: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .map_err(db_err("Failed to save rating"))
    }

    /// Rating given by a user to a book.
    pub fn get_user_rating(&self, user_id: i64, book_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT rating FROM ratings WHERE user_id = ?1 AND book_id = ?2",
            params![user_id, book_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err("Failed to get rating"))
    }

    /// Average and count of all ratings for a book.
    pub fn rating_summary(&self, book_id: i64) -> Result<RatingSummary> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COALESCE(AVG(rating), 0.0), COUNT(*) FROM ratings WHERE book_id = ?1",
            params![book_id],
            |row| {
                Ok(RatingSummary {
                    average: row.get(0)?,
                    count: row.get(1)?,
                })
            },
        )
        .map_err(db_err("Failed to summarize ratings"))
    }

    // ========== COLLECTION OPERATIONS ==========

    /// Add a book to a user's collection. Adding twice returns the existing entry.
    pub fn add_to_collection(&self, user_id: i64, book_id: i64) -> Result<CollectionEntry> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO user_books (user_id, book_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, book_id) DO NOTHING",
            params![user_id, book_id, now_timestamp()],
        )
        .map_err(db_err("Failed to add to collection"))?;

        conn.query_row(
            "SELECT id, user_id, book_id, created_at FROM user_books
             WHERE user_id = ?1 AND book_id = ?2",
            params![user_id, book_id],
            |row| {
                Ok(CollectionEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    book_id: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .map_err(db_err("Failed to get collection entry"))
    }

    /// Get a collection entry by ID.
    pub fn get_collection_entry(&self, id: i64) -> Result<Option<CollectionEntry>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, book_id, created_at FROM user_books WHERE id = ?1",
            params![id],
            |row| {
                Ok(CollectionEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    book_id: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(db_err("Failed to get collection entry"))
    }

    /// Delete a collection entry.
    pub fn delete_collection_entry(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM user_books WHERE id = ?1", params![id])
            .map_err(db_err("Failed to remove from collection"))?;
        Ok(rows > 0)
    }

    /// A user's collection with their own rating and the total rating count.
    pub fn get_user_collection(&self, user_id: i64) -> Result<Vec<CollectionBook>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {},
                    ub.id, ub.created_at,
                    (SELECT r.rating FROM ratings r WHERE r.book_id = b.id AND r.user_id = ?1),
                    (SELECT COUNT(*) FROM ratings r WHERE r.book_id = b.id)
             FROM user_books ub JOIN books b ON b.id = ub.book_id
             WHERE ub.user_id = ?1
             ORDER BY ub.created_at DESC, ub.id DESC",
            BOOK_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(db_err("Failed to prepare query"))?;

        let books = stmt
            .query_map(params![user_id], |row| {
                Ok(CollectionBook {
                    book: book_from_row(row)?,
                    collection_id: row.get(BOOK_COLUMN_COUNT)?,
                    added_at: row.get(BOOK_COLUMN_COUNT + 1)?,
                    user_rating: row.get(BOOK_COLUMN_COUNT + 2)?,
                    total_ratings: row.get(BOOK_COLUMN_COUNT + 3)?,
                })
            })
            .map_err(db_err("Failed to get collection"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Failed to collect collection"))?;

        Ok(books)
    }
}
