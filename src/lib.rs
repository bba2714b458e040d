//! D&D Table Server Library
//!
//! Character sheets, game sessions and a realtime table relay. This module
//! exports the core types for the binary and for testing.

pub mod config;
pub mod constants;
pub mod content_store;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod rules;
pub mod security;

pub use config::Config;
pub use content_store::ContentStore;
pub use db::open_database;
pub use error::{AppError, Result};
pub use realtime::Relay;
pub use routes::build_router;

use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub content: Arc<ContentStore>,
    pub relay: Arc<Relay>,
}

impl AppState {
    /// Create a new AppState with an empty relay
    pub fn new(pool: SqlitePool, config: Config, content: ContentStore) -> Self {
        Self {
            pool,
            config,
            content: Arc::new(content),
            relay: Arc::new(Relay::new()),
        }
    }
}
