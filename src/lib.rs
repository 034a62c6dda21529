//! bookverse: a college digital library with a social reading feed.
//!
//! This crate provides a JSON REST API where readers register, browse and
//! upload PDF books, keep a personal collection with ratings, and share
//! posts, likes and comments with the people they follow.
//!
//! # Features
//!
//! - Password and federated (Google) login with signed, expiring tokens
//! - Shared PDF catalog with search and genre browsing
//! - Automatic preview generation from the first pages of each upload
//! - Local or remote blob storage for PDFs and previews
//! - Personal collections and 1-5 star ratings
//! - Posts, likes, comments and follows

#![forbid(unsafe_code)]

/// Authentication and federated identity.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Upload pipeline and stored artifacts.
pub mod library;
/// PDF inspection and previews.
pub mod pdf;
/// HTTP server.
pub mod server;
/// Blob storage backends.
pub mod storage;


pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
