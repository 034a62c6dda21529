//! bookverse server entry point.

use bookverse::{
    auth::{self, AuthService, GoogleIdentity},
    config::{Cli, Command, Config},
    db::Database,
    server, storage,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let mut config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    if let Some(secret) = cli.jwt_secret {
        config.auth.jwt_secret = secret;
    }

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => {
            // Default: start server
            cmd_serve(config, None).await
        }
    }
}

/// Initialize config, database and storage directories.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Write default config
    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();

    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    for dir in ["pdfs", "previews"] {
        std::fs::create_dir_all(config.storage.root.join(dir))?;
    }
    println!("Created storage directory: {}", config.storage.root.display());

    println!("\nEdit config.toml to configure your server.");
    println!("Then run: bookverse serve");

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookverse=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.auth.jwt_secret.is_empty() {
        tracing::warn!(
            "No jwt_secret configured, using a random one. Tokens will not survive a restart."
        );
        config.auth.jwt_secret = auth::generate_token();
    }

    // Open database
    let db = Database::open(&config.database.path)?;

    let storage = storage::from_config(&config.storage)?;
    let identity = Arc::new(GoogleIdentity::new(config.auth.google_userinfo_url.clone()));

    let auth = AuthService::new(
        db.clone(),
        &config.auth.jwt_secret,
        config.auth.token_days,
        identity,
    );

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        storage = ?config.storage.backend,
        "Starting bookverse server"
    );

    let bind_addr = config.server.bind;
    let state = server::AppState::new(config, db, auth, storage);
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(address = %bind_addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
