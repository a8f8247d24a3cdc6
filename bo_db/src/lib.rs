//! ABOUTME: Database layer with SQLite, migrations, querysets and repositories
//! ABOUTME: Handles persistence of auth data and generic record access for views

use bo_core::{Error, Result};
use sqlx::{
    migrate::{MigrateDatabase, Migrator},
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Sqlite, SqlitePool,
};
use tracing::{debug, info, instrument, warn};

pub mod model;
pub mod queryset;
pub mod repositories;
pub mod value;

pub use model::{Model, Record};
pub use queryset::{QuerySet, SqlParam};
pub use repositories::users::{CreateUserRequest, UpdateUserRequest, User, UserRepository};
pub use value::{FileRef, GeoPoint, RelatedObject, Thunk, Value};

/// Validates that a name contains only safe SQL identifier characters
///
/// # Security
/// Table and column names can't be bound as parameters, so every dynamic
/// identifier must start with a letter or underscore and contain only
/// alphanumeric characters and underscores.
pub fn is_safe_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates a possibly qualified column reference such as `u.username`
pub fn is_safe_column_ref(column: &str) -> bool {
    column.split('.').all(is_safe_sql_identifier)
}

/// Database connection pool and operations
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Create a new database connection with migrations
    #[instrument(skip(db_path))]
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_pool_size(db_path, 10).await
    }

    /// Create a connection pool of the given size and run the auth migrations
    #[instrument(skip(db_path))]
    pub async fn with_pool_size(db_path: &str, pool_size: u32) -> Result<Self> {
        info!("Initializing database at: {}", db_path);

        let database_url = format!("sqlite://{}", db_path);
        if !Sqlite::database_exists(&database_url)
            .await
            .unwrap_or(false)
        {
            info!("Creating database: {}", database_url);
            Sqlite::create_database(&database_url)
                .await
                .map_err(|e| Error::Database(format!("Failed to create database: {}", e)))?;
        }

        // Foreign keys must be on for ON DELETE RESTRICT to protect records
        let connect_options = SqliteConnectOptions::new()
            .filename(db_path)
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true)
            .foreign_keys(true)
            .pragma("synchronous", "NORMAL")
            .pragma("busy_timeout", "30000");

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .min_connections(1)
            .connect_with(connect_options)
            .await
            .map_err(|e| Error::Database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.migrate().await?;

        info!("Database initialized successfully");
        Ok(db)
    }

    /// Run the auth migrations shipped with this crate
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_with(sqlx::migrate!("./migrations")).await
    }

    /// Run an additional migrator, e.g. the host application's own tables
    ///
    /// Versions applied by other migrators are ignored, so each migrator only
    /// has to know about its own files.
    #[instrument(skip(self, migrator))]
    pub async fn migrate_with(&self, mut migrator: Migrator) -> Result<()> {
        info!("Running database migrations");

        migrator.set_ignore_missing(true);
        migrator
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a Db instance from an existing pool (for testing/reuse)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Check database health
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<()> {
        debug!("Performing database health check");

        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))?;

        debug!("Database health check passed");
        Ok(())
    }
}

/// Delete one record of `M` by primary key
///
/// Rows still referenced through a restricting foreign key are left in place
/// and reported as [`Error::Protected`].
#[instrument(skip(pool), fields(model = M::MODEL_NAME))]
pub async fn delete_by_pk<M: Model>(pool: &SqlitePool, pk: i64) -> Result<()> {
    if !is_safe_sql_identifier(M::TABLE) {
        return Err(Error::Config(format!(
            "Invalid table name for {}: '{}'",
            M::MODEL_NAME,
            M::TABLE
        )));
    }

    let sql = format!("DELETE FROM {} WHERE id = ?", M::TABLE);
    match sqlx::query(&sql).bind(pk).execute(pool).await {
        Ok(result) if result.rows_affected() == 0 => Err(Error::NotFound(format!(
            "{} {} does not exist",
            M::MODEL_NAME,
            pk
        ))),
        Ok(_) => {
            debug!("Deleted {} {}", M::MODEL_NAME, pk);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err))
            if db_err.is_foreign_key_violation()
                || db_err.message().contains("FOREIGN KEY constraint failed") =>
        {
            warn!("Refused to delete {} {}: still referenced", M::MODEL_NAME, pk);
            Err(Error::Protected(format!(
                "{} {} is referenced by other records",
                M::MODEL_NAME,
                pk
            )))
        }
        Err(e) => Err(Error::Database(format!(
            "Failed to delete {} {}: {}",
            M::MODEL_NAME,
            pk,
            e
        ))),
    }
}
