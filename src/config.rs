//! Typed environment configuration
//!
//! All runtime configuration comes from environment variables (optionally via
//! a .env file loaded in main). Values are read once at startup into an
//! `AppConfig` that is shared through the application state.

use std::env;
use std::path::PathBuf;

/// Application configuration resolved from the environment
///
/// # Environment Variables
///
/// - `PORT` - Server port number (default: 8080)
/// - `DATABASE_URL` - Path to the embedded database file (default: "data.db")
/// - `API_BASE_URL` - Public base URL used in encoded redirect URLs and
///   download links (default: "http://localhost:8080")
/// - `DATA_DIR` - Root directory for generated artifacts (default: "data")
///
/// `APP_ENV` is read separately by the error layer: "production" suppresses
/// internal error detail in 500-class responses.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub api_base_url: String,
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "data.db".to_string());

        // Trailing slashes would double up when joined with /data/... paths
        let api_base_url = env::var("API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));

        AppConfig {
            port,
            database_url,
            api_base_url,
            data_dir,
        }
    }
}
