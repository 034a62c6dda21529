//! HTTP server and routes.

mod extract;
mod handlers;
mod state;

pub use extract::{AuthUser, MaybeUser};
pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{delete, get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// CORS policy from the configured origins. Empty means permissive.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth_register))
        .route("/login", post(handlers::auth_login))
        .route("/social-login", post(handlers::auth_social_login))
        .route("/google", post(handlers::auth_google))
        .route("/me", get(handlers::auth_me))
        .route("/logout", post(handlers::auth_logout));

    let book_routes = Router::new()
        .route("/library", get(handlers::books_library))
        .route("/genres", get(handlers::books_genres))
        .route(
            "/library/upload",
            post(handlers::books_upload).layer(DefaultBodyLimit::max(state.upload_body_limit())),
        )
        .route(
            "/library/{isbn}",
            get(handlers::books_details).delete(handlers::books_delete),
        )
        .route("/library/{isbn}/pdf", get(handlers::books_pdf))
        .route("/library/{isbn}/preview", get(handlers::books_preview))
        .route("/library/{isbn}/add", post(handlers::books_add))
        .route("/library/{isbn}/rate", post(handlers::books_rate))
        .route("/collection", get(handlers::books_collection))
        .route("/collection/{entry_id}", delete(handlers::books_remove));

    let user_routes = Router::new()
        .route(
            "/profile",
            get(handlers::auth_me).put(handlers::users_update_profile),
        )
        .route("/{user_id}", get(handlers::users_profile))
        .route(
            "/{user_id}/follow",
            post(handlers::users_follow).delete(handlers::users_unfollow),
        )
        .route("/{user_id}/followers", get(handlers::users_followers))
        .route("/{user_id}/following", get(handlers::users_following));

    let post_routes = Router::new()
        .route("/", post(handlers::posts_create))
        .route("/feed", get(handlers::posts_feed))
        .route("/user/{user_id}", get(handlers::posts_by_user))
        .route(
            "/{post_id}",
            get(handlers::posts_get).delete(handlers::posts_delete),
        )
        .route(
            "/{post_id}/like",
            post(handlers::posts_like).delete(handlers::posts_unlike),
        );

    let comment_routes = Router::new()
        .route(
            "/post/{post_id}",
            get(handlers::comments_list).post(handlers::comments_create),
        )
        .route("/{comment_id}", delete(handlers::comments_delete));

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/auth", auth_routes)
        .nest("/api/books", book_routes)
        .nest("/api/users", user_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/comments", comment_routes);

    // Direct file access for the local backend.
    if let Some(root) = state.library.storage().local_root() {
        router = router.nest_service("/books", ServeDir::new(root));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.server.cors_origins))
        .with_state(state)
}
