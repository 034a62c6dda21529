//! HTTP request handlers.

use crate::db::{
    Book, CollectionBook, CollectionEntry, CommentView, PostView, ProfileUpdate, Rating, User,
    UserCounts, UserSummary,
};
use crate::error::{AppError, Result};
use crate::library::{Artifact, BookMetadata, PDF_MIME, UploadedFile};
use crate::server::AppState;
use crate::server::extract::{AuthUser, MaybeUser, PathParam, QueryParam, TOKEN_COOKIE};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::Response,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};

/// Largest page size accepted by the feed.
const MAX_FEED_LIMIT: i64 = 50;

/// Plain confirmation body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

/// Confirmation body for book endpoints.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    success: bool,
    message: &'static str,
}

fn success(message: &'static str) -> Json<SuccessResponse> {
    Json(SuccessResponse {
        success: true,
        message,
    })
}

/// Trimmed, non-empty string.
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// HEALTH
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "BookVerse API is running",
    })
}

// ============================================================================
// AUTH API
// ============================================================================

/// Register request.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
    full_name: Option<String>,
}

/// Login request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

/// Federated login request, with the email already vouched for by the client.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SocialLoginRequest {
    email: Option<String>,
    name: Option<String>,
    provider: Option<String>,
    photo_url: Option<String>,
}

/// Google login request carrying an OAuth access token.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GoogleLoginRequest {
    token: Option<String>,
}

/// Response for every successful login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    message: &'static str,
    user: User,
    token: String,
}

/// Caller profile with aggregate counts.
#[derive(Debug, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    user: User,
    counts: UserCounts,
}

/// Wrapper for `{"user": ...}` bodies.
#[derive(Debug, Serialize)]
pub struct UserResponse<T> {
    user: T,
}

/// Attach the token cookie when enabled.
fn with_token_cookie(state: &AppState, jar: CookieJar, token: &str) -> CookieJar {
    if !state.config.auth.set_cookie {
        return jar;
    }

    jar.add(
        Cookie::build((TOKEN_COOKIE, token.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

fn auth_response(
    state: &AppState,
    jar: CookieJar,
    msg: &'static str,
    (user, token): (User, String),
) -> (CookieJar, Json<AuthResponse>) {
    let jar = with_token_cookie(state, jar, &token);
    (
        jar,
        Json(AuthResponse {
            message: msg,
            user,
            token,
        }),
    )
}

/// Create an account.
pub async fn auth_register(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let Json(req) = payload?;

    let issued = state.auth.register(
        req.email.as_deref().unwrap_or_default(),
        req.username.as_deref().unwrap_or_default(),
        req.password.as_deref().unwrap_or_default(),
        req.full_name.as_deref(),
    )?;

    let (jar, body) = auth_response(&state, jar, "User registered successfully", issued);
    Ok((StatusCode::CREATED, jar, body))
}

/// Log in with email and password.
pub async fn auth_login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let Json(req) = payload?;

    let issued = state.auth.login(
        req.email.as_deref().unwrap_or_default(),
        req.password.as_deref().unwrap_or_default(),
    )?;

    Ok(auth_response(&state, jar, "Login successful", issued))
}

/// Log in with a federated identity.
pub async fn auth_social_login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<SocialLoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let Json(req) = payload?;
    let provider = required(req.provider).unwrap_or_else(|| "social".to_string());

    let issued = state.auth.social_login(
        req.email.as_deref().unwrap_or_default(),
        req.name.as_deref(),
        &provider,
        req.photo_url.as_deref(),
    )?;

    Ok(auth_response(&state, jar, "Login successful", issued))
}

/// Log in with a Google access token.
pub async fn auth_google(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<GoogleLoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let Json(req) = payload?;

    let issued = state
        .auth
        .google_login(req.token.as_deref().unwrap_or_default())
        .await?;

    Ok(auth_response(&state, jar, "Google login successful", issued))
}

/// Current user with counts.
pub async fn auth_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserResponse<Profile>>> {
    let counts = state.db.user_counts(user.id)?;
    Ok(Json(UserResponse {
        user: Profile { user, counts },
    }))
}

/// Clear the token cookie. Tokens stay valid until they expire.
pub async fn auth_logout(
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    tracing::debug!(user_id = user.id, "Logout");
    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    (jar, message("Logout successful"))
}

// ============================================================================
// BOOKS API
// ============================================================================

/// Catalog query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct LibraryParams {
    search: Option<String>,
    genre: Option<String>,
}

/// List of books with a count.
#[derive(Debug, Serialize)]
pub struct BookListResponse<T> {
    success: bool,
    count: usize,
    books: Vec<T>,
}

impl<T> BookListResponse<T> {
    fn new(books: Vec<T>) -> Self {
        Self {
            success: true,
            count: books.len(),
            books,
        }
    }
}

/// Distinct genres.
#[derive(Debug, Serialize)]
pub struct GenresResponse {
    success: bool,
    genres: Vec<String>,
}

/// Book with the caller's rating and the rating aggregate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    #[serde(flatten)]
    book: Book,
    user_rating: Option<i64>,
    /// Average rating with one decimal, e.g. "4.0".
    average_rating: String,
    total_ratings: i64,
}

/// Single book body.
#[derive(Debug, Serialize)]
pub struct BookResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    book: T,
}

/// Collection membership body.
#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    success: bool,
    message: &'static str,
    entry: CollectionEntry,
}

/// Rating request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RateRequest {
    rating: Option<i64>,
}

/// Rating body.
#[derive(Debug, Serialize)]
pub struct RatingResponse {
    success: bool,
    message: &'static str,
    rating: Rating,
}

/// Search or list the catalog.
pub async fn books_library(
    State(state): State<AppState>,
    QueryParam(params): QueryParam<LibraryParams>,
) -> Result<Json<BookListResponse<Book>>> {
    let search = required(params.search);
    let genre = required(params.genre);

    let books = state.db.list_books(search.as_deref(), genre.as_deref())?;
    Ok(Json(BookListResponse::new(books)))
}

/// Distinct genres across the catalog.
pub async fn books_genres(State(state): State<AppState>) -> Result<Json<GenresResponse>> {
    let genres = state.db.list_genres()?;
    Ok(Json(GenresResponse {
        success: true,
        genres,
    }))
}

fn find_book(state: &AppState, key: &str) -> Result<Book> {
    state
        .db
        .find_catalog_book(key)?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
}

/// Book detail with ratings.
pub async fn books_details(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParam(isbn): PathParam<String>,
) -> Result<Json<BookResponse<BookDetails>>> {
    let book = find_book(&state, &isbn)?;

    let user_rating = match viewer.id() {
        Some(user_id) => state.db.get_user_rating(user_id, book.id)?,
        None => None,
    };
    let summary = state.db.rating_summary(book.id)?;

    Ok(Json(BookResponse {
        success: true,
        message: None,
        book: BookDetails {
            book,
            user_rating,
            average_rating: format!("{:.1}", summary.average),
            total_ratings: summary.count,
        },
    }))
}

/// Keep a title usable inside a quoted header parameter.
fn header_filename(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn stream_artifact(state: AppState, isbn: String, artifact: Artifact) -> Result<Response> {
    let (book, blob) = state.library.open(&isbn, artifact).await?;

    let filename = header_filename(&book.title);
    let disposition = match artifact {
        Artifact::Pdf => format!("attachment; filename=\"{}.pdf\"", filename),
        Artifact::Preview => format!("inline; filename=\"{}-preview.pdf\"", filename),
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PDF_MIME)
        .header(header::CONTENT_DISPOSITION, disposition);

    if let Some(len) = blob.len {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }

    builder
        .body(Body::from_stream(blob.stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

/// Stream the full PDF.
pub async fn books_pdf(
    State(state): State<AppState>,
    PathParam(isbn): PathParam<String>,
) -> Result<Response> {
    stream_artifact(state, isbn, Artifact::Pdf).await
}

/// Stream the preview PDF.
pub async fn books_preview(
    State(state): State<AppState>,
    PathParam(isbn): PathParam<String>,
) -> Result<Response> {
    stream_artifact(state, isbn, Artifact::Preview).await
}

/// Multipart upload: a `pdf` file field plus metadata fields.
pub async fn books_upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BookResponse<Book>>)> {
    let mut file = None;
    let mut meta = BookMetadata::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "pdf" {
            let file_name = field.file_name().unwrap_or("book.pdf").to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await?;
            file = Some(UploadedFile {
                file_name,
                content_type,
                data,
            });
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "title" => meta.title = Some(value),
            "authors" => meta.authors = Some(value),
            "description" => meta.description = Some(value),
            "categories" => meta.categories = Some(value),
            "language" => meta.language = Some(value),
            "publishedDate" => meta.published_date = Some(value),
            "pageCount" => meta.page_count = value.trim().parse().ok(),
            "isbn" => meta.isbn = Some(value),
            "thumbnail" => meta.thumbnail = Some(value),
            other => tracing::debug!(field = other, "Ignoring upload field"),
        }
    }

    let book = state.library.upload(user.id, file, meta).await?;

    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            success: true,
            message: Some("Book uploaded successfully"),
            book,
        }),
    ))
}

/// Delete a catalog entry. Uploader only.
pub async fn books_delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(isbn): PathParam<String>,
) -> Result<Json<SuccessResponse>> {
    state.library.delete_book(user.id, &isbn).await?;
    Ok(success("Book deleted successfully"))
}

/// Add a catalog book to the caller's collection.
pub async fn books_add(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(isbn): PathParam<String>,
) -> Result<Json<CollectionResponse>> {
    let book = find_book(&state, &isbn)?;
    let entry = state.db.add_to_collection(user.id, book.id)?;

    Ok(Json(CollectionResponse {
        success: true,
        message: "Book added to your collection",
        entry,
    }))
}

/// Rate a catalog book, adding it to the caller's collection.
pub async fn books_rate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(isbn): PathParam<String>,
    payload: std::result::Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<RatingResponse>> {
    let Json(req) = payload?;

    let rating = req
        .rating
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::InvalidInput("Rating must be between 1 and 5".to_string()))?;

    let book = find_book(&state, &isbn)?;
    state.db.add_to_collection(user.id, book.id)?;
    let rating = state.db.upsert_rating(user.id, book.id, rating)?;

    tracing::debug!(user_id = user.id, book_id = book.id, rating = rating.rating, "Book rated");

    Ok(Json(RatingResponse {
        success: true,
        message: "Book rated successfully",
        rating,
    }))
}

/// The caller's collection.
pub async fn books_collection(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<BookListResponse<CollectionBook>>> {
    let books = state.db.get_user_collection(user.id)?;
    Ok(Json(BookListResponse::new(books)))
}

/// Remove a collection entry by its membership id.
pub async fn books_remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(entry_id): PathParam<i64>,
) -> Result<Json<SuccessResponse>> {
    let entry = state
        .db
        .get_collection_entry(entry_id)?
        .ok_or_else(|| AppError::NotFound("Book not found in your collection".to_string()))?;

    if entry.user_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to remove this book".to_string(),
        ));
    }

    state.db.delete_collection_entry(entry.id)?;
    Ok(success("Book removed from collection"))
}

// ============================================================================
// USERS API
// ============================================================================

/// Another user's profile, without the email.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    id: i64,
    username: String,
    full_name: Option<String>,
    bio: Option<String>,
    profile_picture: Option<String>,
    created_at: i64,
    counts: UserCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_following: Option<bool>,
}

/// Profile update request. Absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    full_name: Option<String>,
    bio: Option<String>,
    profile_picture: Option<String>,
}

/// Profile update body.
#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    message: &'static str,
    user: User,
}

/// Followers list.
#[derive(Debug, Serialize)]
pub struct FollowersResponse {
    followers: Vec<UserSummary>,
}

/// Following list.
#[derive(Debug, Serialize)]
pub struct FollowingResponse {
    following: Vec<UserSummary>,
}

fn find_user(state: &AppState, user_id: i64) -> Result<User> {
    state
        .db
        .get_user_by_id(user_id)?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Public profile of any user.
pub async fn users_profile(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<UserResponse<PublicProfile>>> {
    let user = find_user(&state, user_id)?;
    let counts = state.db.user_counts(user.id)?;

    let is_following = match viewer.id() {
        Some(viewer_id) if viewer_id != user.id => {
            Some(state.db.is_following(viewer_id, user.id)?)
        }
        _ => None,
    };

    Ok(Json(UserResponse {
        user: PublicProfile {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            bio: user.bio,
            profile_picture: user.profile_picture,
            created_at: user.created_at,
            counts,
            is_following,
        },
    }))
}

/// Update the caller's profile.
pub async fn users_update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: std::result::Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UpdateProfileResponse>> {
    let Json(req) = payload?;

    let user = state.db.update_profile(
        user.id,
        &ProfileUpdate {
            full_name: req.full_name,
            bio: req.bio,
            profile_picture: req.profile_picture,
        },
    )?;

    Ok(Json(UpdateProfileResponse {
        message: "Profile updated successfully",
        user,
    }))
}

/// Follow a user.
pub async fn users_follow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(target_id): PathParam<i64>,
) -> Result<Json<MessageResponse>> {
    if target_id == user.id {
        return Err(AppError::InvalidInput("Cannot follow yourself".to_string()));
    }

    find_user(&state, target_id)?;

    if state.db.is_following(user.id, target_id)? {
        return Err(AppError::Conflict("Already following this user".to_string()));
    }

    state
        .db
        .create_follow(user.id, target_id)
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict("Already following this user".to_string()),
            other => other,
        })?;

    Ok(message("User followed successfully"))
}

/// Unfollow a user.
pub async fn users_unfollow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(target_id): PathParam<i64>,
) -> Result<Json<MessageResponse>> {
    if !state.db.delete_follow(user.id, target_id)? {
        return Err(AppError::NotFound("Not following this user".to_string()));
    }

    Ok(message("User unfollowed successfully"))
}

/// Users following `user_id`.
pub async fn users_followers(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<FollowersResponse>> {
    find_user(&state, user_id)?;
    let followers = state.db.get_followers(user_id)?;
    Ok(Json(FollowersResponse { followers }))
}

/// Users `user_id` follows.
pub async fn users_following(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<FollowingResponse>> {
    find_user(&state, user_id)?;
    let following = state.db.get_following(user_id)?;
    Ok(Json(FollowingResponse { following }))
}

// ============================================================================
// POSTS API
// ============================================================================

/// New post request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePostRequest {
    content: Option<String>,
    image: Option<String>,
}

/// Feed pagination.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    page: Option<i64>,
    limit: Option<i64>,
}

impl FeedParams {
    /// Page and limit after defaults and clamping.
    fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(10).clamp(1, MAX_FEED_LIMIT);
        (page, limit)
    }
}

/// Single post body.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    post: PostView,
}

/// Page of posts.
#[derive(Debug, Serialize)]
pub struct PostsResponse {
    posts: Vec<PostView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<i64>,
}

fn find_post(state: &AppState, post_id: i64) -> Result<crate::db::Post> {
    state
        .db
        .get_post(post_id)?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// Create a post.
pub async fn posts_create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: std::result::Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostResponse>)> {
    let Json(req) = payload?;

    let content = required(req.content)
        .ok_or_else(|| AppError::InvalidInput("Post content is required".to_string()))?;
    let image = required(req.image);

    let post = state.db.create_post(user.id, &content, image.as_deref())?;
    tracing::debug!(post_id = post.post.id, user_id = user.id, "Post created");

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            message: Some("Post created successfully"),
            post,
        }),
    ))
}

/// Global feed, newest first.
pub async fn posts_feed(
    State(state): State<AppState>,
    viewer: MaybeUser,
    QueryParam(params): QueryParam<FeedParams>,
) -> Result<Json<PostsResponse>> {
    let (page, limit) = params.resolve();
    let posts = state.db.get_feed(viewer.id(), (page - 1) * limit, limit)?;

    Ok(Json(PostsResponse {
        posts,
        page: Some(page),
        limit: Some(limit),
    }))
}

/// Posts by one user.
pub async fn posts_by_user(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<PostsResponse>> {
    find_user(&state, user_id)?;
    let posts = state.db.get_user_posts(user_id)?;

    Ok(Json(PostsResponse {
        posts,
        page: None,
        limit: None,
    }))
}

/// A single post.
pub async fn posts_get(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParam(post_id): PathParam<i64>,
) -> Result<Json<PostResponse>> {
    let post = state
        .db
        .get_post_view(post_id, viewer.id())?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(PostResponse {
        message: None,
        post,
    }))
}

/// Like a post.
pub async fn posts_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(post_id): PathParam<i64>,
) -> Result<Json<MessageResponse>> {
    find_post(&state, post_id)?;

    let already = || AppError::Conflict("Post already liked".to_string());
    if state.db.has_liked(user.id, post_id)? {
        return Err(already());
    }

    state
        .db
        .create_like(user.id, post_id)
        .map_err(|e| match e {
            AppError::Conflict(_) => already(),
            other => other,
        })?;

    Ok(message("Post liked successfully"))
}

/// Remove a like.
pub async fn posts_unlike(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(post_id): PathParam<i64>,
) -> Result<Json<MessageResponse>> {
    if !state.db.delete_like(user.id, post_id)? {
        return Err(AppError::NotFound("Like not found".to_string()));
    }

    Ok(message("Post unliked successfully"))
}

/// Delete a post. Author only.
pub async fn posts_delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(post_id): PathParam<i64>,
) -> Result<Json<MessageResponse>> {
    let post = find_post(&state, post_id)?;

    if post.user_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to delete this post".to_string(),
        ));
    }

    state.db.delete_post(post.id)?;
    Ok(message("Post deleted successfully"))
}

// ============================================================================
// COMMENTS API
// ============================================================================

/// New comment request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateCommentRequest {
    content: Option<String>,
}

/// Single comment body.
#[derive(Debug, Serialize)]
pub struct CommentResponse {
    message: &'static str,
    comment: CommentView,
}

/// Comments on a post.
#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    comments: Vec<CommentView>,
}

/// Comment on a post.
pub async fn comments_create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(post_id): PathParam<i64>,
    payload: std::result::Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let Json(req) = payload?;

    let content = required(req.content)
        .ok_or_else(|| AppError::InvalidInput("Comment content is required".to_string()))?;
    find_post(&state, post_id)?;

    let comment = state.db.create_comment(user.id, post_id, &content)?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            message: "Comment created successfully",
            comment,
        }),
    ))
}

/// Comments on a post, newest first.
pub async fn comments_list(
    State(state): State<AppState>,
    PathParam(post_id): PathParam<i64>,
) -> Result<Json<CommentsResponse>> {
    find_post(&state, post_id)?;
    let comments = state.db.get_post_comments(post_id)?;
    Ok(Json(CommentsResponse { comments }))
}

/// Delete a comment. Author only.
pub async fn comments_delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(comment_id): PathParam<i64>,
) -> Result<Json<MessageResponse>> {
    let comment = state
        .db
        .get_comment(comment_id)?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if comment.user_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to delete this comment".to_string(),
        ));
    }

    state.db.delete_comment(comment.id)?;
    Ok(message("Comment deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_params_defaults_and_clamping() {
        assert_eq!(FeedParams::default().resolve(), (1, 10));

        let params = FeedParams {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(params.resolve(), (1, MAX_FEED_LIMIT));
    }

    #[test]
    fn test_header_filename_strips_quotes() {
        assert_eq!(header_filename("A \"Quoted\" Title"), "A _Quoted_ Title");
        assert_eq!(header_filename("Café"), "Caf_");
    }
}
