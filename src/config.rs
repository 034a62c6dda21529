use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// College digital library and social reading feed.
#[derive(Parser, Debug, Clone)]
#[command(name = "bookverse")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BOOKVERSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Secret used to sign access tokens (overrides the config file).
    #[arg(long, env = "BOOKVERSE_JWT_SECRET", global = true, hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the API server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Initialize database, storage directories and a default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// PDF storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Preview generation configuration.
    #[serde(default)]
    pub preview: PreviewConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Allowed CORS origins. Empty means permissive.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        5001,
    )
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:5174".to_string(),
    ]
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/bookverse.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens. Empty generates a per-process secret.
    #[serde(default)]
    pub jwt_secret: String,

    /// Token lifetime in days.
    #[serde(default = "default_token_days")]
    pub token_days: u32,

    /// Whether login also sets the `token` cookie.
    #[serde(default = "default_set_cookie")]
    pub set_cookie: bool,

    /// Endpoint used to resolve Google access tokens to a profile.
    #[serde(default = "default_google_userinfo_url")]
    pub google_userinfo_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_days: default_token_days(),
            set_cookie: default_set_cookie(),
            google_userinfo_url: default_google_userinfo_url(),
        }
    }
}

fn default_token_days() -> u32 {
    7
}

fn default_set_cookie() -> bool {
    true
}

fn default_google_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v3/userinfo".to_string()
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Files on the local filesystem.
    Local,
    /// HTTPS content host.
    Remote,
}

/// PDF storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend stores uploaded PDFs and previews.
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Root directory for the local backend.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Base URL for the remote backend.
    #[serde(default)]
    pub base_url: String,

    /// Bearer token sent to the remote backend on writes.
    #[serde(default)]
    pub token: Option<String>,

    /// Upload size limit in megabytes. Defaults depend on the backend.
    #[serde(default)]
    pub max_upload_mb: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            root: default_storage_root(),
            base_url: String::new(),
            token: None,
            max_upload_mb: None,
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/books")
}

impl StorageConfig {
    /// Effective upload limit in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        let mb = self.max_upload_mb.unwrap_or(match self.backend {
            StorageBackend::Local => 50,
            // Leaves headroom under the 100MB per-file cap of raw content hosts.
            StorageBackend::Remote => 90,
        });
        mb.saturating_mul(1024 * 1024)
    }
}

/// Preview generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Maximum number of leading pages copied into a preview.
    #[serde(default = "default_preview_pages")]
    pub pages: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            pages: default_preview_pages(),
        }
    }
}

fn default_preview_pages() -> u32 {
    5
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("bookverse.toml"),
            dirs::config_dir()
                .map(|p| p.join("bookverse").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/bookverse/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# bookverse configuration

[server]
bind = "0.0.0.0:5001"
cors_origins = ["http://localhost:5173", "http://localhost:5174"]

[database]
# path = "/var/lib/bookverse/bookverse.db"

[auth]
# Leave empty to generate a secret at startup (tokens die on restart).
# Can also be set with BOOKVERSE_JWT_SECRET.
jwt_secret = ""
# Token lifetime in days
token_days = 7
set_cookie = true

[storage]
# "local" serves files from `root`, "remote" pushes them to `base_url`
backend = "local"
root = "data/books"
# base_url = "https://content.example.org/library"
# token = "..."
# max_upload_mb = 50

[preview]
# Number of leading pages copied into the preview PDF
pages = 5
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_round_trips() {
        let config: Config = toml::from_str(&Config::generate_default()).unwrap();
        assert_eq!(config.server.bind.port(), 5001);
        assert_eq!(config.auth.token_days, 7);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.preview.pages, 5);
    }

    #[test]
    fn upload_limit_depends_on_backend() {
        let mut storage = StorageConfig::default();
        assert_eq!(storage.max_upload_bytes(), 50 * 1024 * 1024);

        storage.backend = StorageBackend::Remote;
        assert_eq!(storage.max_upload_bytes(), 90 * 1024 * 1024);

        storage.max_upload_mb = Some(10);
        assert_eq!(storage.max_upload_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn huge_upload_limit_saturates() {
        let storage = StorageConfig {
            max_upload_mb: Some(u64::MAX / 2),
            ..Default::default()
        };
        assert_eq!(storage.max_upload_bytes(), u64::MAX);
    }
}
