//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Initializes the database, artifact store and logo HTTP client
//! - Starts the HTTP server with graceful shutdown support

use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

// Module declarations
mod codec;
mod config;
mod database;
mod error;
mod generator;
mod handler;
mod logo;
mod middleware;
mod model;
mod params;
mod route;
mod storage;
mod usage;

use config::AppConfig;
use database::{init_db, AppState};
use route::create_app;
use storage::ArtifactStore;

/// How long a logo fetch may take before it is treated as failed
const LOGO_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Application entry point
///
/// This asynchronous main function:
/// 1. Loads environment variables from .env file
/// 2. Reads the typed configuration
/// 3. Initializes the embedded database and artifact store
/// 4. Creates the application state and router
/// 5. Starts the HTTP server with graceful shutdown handling
#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter("qrgen=debug,tower_http=debug")
        .init();

    let config = AppConfig::from_env();

    // Initialize the embedded database with the specified path
    let db = init_db(&config.database_url).expect("Failed to initialize database");

    // Logo fetches share one client so the timeout is set exactly once
    let http = reqwest::Client::builder()
        .timeout(LOGO_FETCH_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client");

    let store = ArtifactStore::new(config.data_dir.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    let port = config.port;
    let db_name = config.database_url.clone();

    // Create application state with thread-safe references
    let state = AppState {
        db: Arc::new(db),
        config: Arc::new(config),
        store,
        http,
    };

    // Create the Axum router with all routes configured
    let app = create_app(state).layer(TraceLayer::new_for_http());

    // Bind to all network interfaces on the specified port
    let listener = TcpListener::bind(&addr).await.unwrap();

    // Print startup information
    println!("🚀 Server running at http://localhost:{}", port);
    println!("📂 Using database: {}", db_name);

    // Start the server with graceful shutdown support
    // The server will continue running until it receives SIGTERM or SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

/// Handles graceful shutdown signals
///
/// This function listens for shutdown signals and returns when one is received:
/// - SIGINT (Ctrl+C) - Interrupt signal from terminal
/// - SIGTERM - Termination signal (common in Docker/Kubernetes)
///
/// When a signal is received the server stops accepting connections, open
/// requests are allowed to complete and database transactions close
/// cleanly before the process exits.
async fn shutdown_signal() {
    // Handle Ctrl+C (SIGINT)
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    // Handle SIGTERM on Unix systems (Linux, macOS)
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    // On non-Unix systems (Windows), only handle Ctrl+C
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    // Wait for either signal to be received
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!("\n🛑 Shutdown signal received, stopping server.");
}
