//! Database-backed stores for the blog. Subjects and their roles live in
//! [`RoleStore`], posts with their category and tags in [`PostStore`], and
//! [`Authorizer`] glues fresh snapshots from both to the policy gateway.

mod access;
mod error;
mod posts;
mod roles;

use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use serde::Deserialize;
use tracing::info;

pub use access::{Authorizer, Target};
pub use error::{DbError, DbResult, FieldViolation, ValidationError};
pub use posts::{NewPost, PostChanges, PostStore};
pub use roles::{NewSubject, RoleStore};

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default)]
    max_connections: Option<u32>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            env_key: default_url_key(),
            max_connections: None,
        }
    }
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            max_connections: None,
        }
    }

    /// Reads `DATABASE_URL` and, when set, `DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> Self {
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|raw| raw.trim().parse().ok());
        Self {
            max_connections,
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn env_key(&self) -> &str {
        &self.env_key
    }

    pub fn database_url(&self) -> DbResult<String> {
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl)
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    connect_url(&url, settings.max_connections).await
}

pub async fn connect_url(url: &str, max_connections: Option<u32>) -> DbResult<DbPool> {
    let mut options = ConnectOptions::new(url.to_string());
    options
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    if let Some(max) = max_connections {
        options.max_connections(max);
    }
    let pool = Database::connect(options).await?;
    info!(backend = ?pool.get_database_backend(), "database connected");
    Ok(pool)
}
