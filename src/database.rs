use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::DatabaseConfig;
use crate::models::{NewPriceRecord, PriceRecord, UpdatePriceRecord};
use crate::utils::error::{AppError, Result};

const RECORD_COLUMNS: &str = "id, name, cost, observed_at";

/// Persistence for price observations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Looks up the record holding exactly this `(name, cost)` pair.
    async fn find_observation(&self, name: &str, cost: i64) -> Result<Option<PriceRecord>>;

    /// Inserts unless the `(name, cost)` pair is already stored. Returns `None` when it was.
    async fn insert_if_absent(&self, record: &NewPriceRecord) -> Result<Option<PriceRecord>>;

    /// Inserts, failing with `Conflict` on a duplicate `(name, cost)` pair.
    async fn create(&self, record: &NewPriceRecord) -> Result<PriceRecord>;

    async fn get(&self, id: i64) -> Result<Option<PriceRecord>>;

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<PriceRecord>>;

    async fn update(&self, id: i64, update: &UpdatePriceRecord) -> Result<Option<PriceRecord>>;

    async fn delete(&self, id: i64) -> Result<Option<PriceRecord>>;

    async fn count(&self) -> Result<i64>;
}

/// Opens the configured SQLite database, creating the file if needed, and applies migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(url = %config.url, "Database ready");

    Ok(pool)
}

/// Single-connection in-memory database with the schema applied.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    // Every connection to `sqlite::memory:` is a separate database, so keep exactly one alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct SqlitePriceStore {
    pool: SqlitePool,
}

impl SqlitePriceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn conflict_on_duplicate(err: sqlx::Error, record_name: &str, cost: Option<i64>) -> AppError {
    let err = AppError::from(err);
    if err.is_unique_violation() {
        let cost = cost.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string());
        AppError::Conflict(format!("price record ({}, {}) already exists", record_name, cost))
    } else {
        err
    }
}

#[async_trait]
impl PriceStore for SqlitePriceStore {
    async fn find_observation(&self, name: &str, cost: i64) -> Result<Option<PriceRecord>> {
        let sql = format!("SELECT {} FROM prices WHERE name = ? AND cost = ?", RECORD_COLUMNS);
        let record = sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(name)
            .bind(cost)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn insert_if_absent(&self, record: &NewPriceRecord) -> Result<Option<PriceRecord>> {
        let sql = format!(
            "INSERT INTO prices (name, cost, observed_at) VALUES (?, ?, ?) \
             ON CONFLICT (name, cost) DO NOTHING RETURNING {}",
            RECORD_COLUMNS
        );
        let inserted = sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(&record.name)
            .bind(record.cost)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        Ok(inserted)
    }

    async fn create(&self, record: &NewPriceRecord) -> Result<PriceRecord> {
        let sql = format!(
            "INSERT INTO prices (name, cost, observed_at) VALUES (?, ?, ?) RETURNING {}",
            RECORD_COLUMNS
        );
        sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(&record.name)
            .bind(record.cost)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_duplicate(e, &record.name, Some(record.cost)))
    }

    async fn get(&self, id: i64) -> Result<Option<PriceRecord>> {
        let sql = format!("SELECT {} FROM prices WHERE id = ?", RECORD_COLUMNS);
        let record = sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<PriceRecord>> {
        let sql = format!("SELECT {} FROM prices ORDER BY id LIMIT ? OFFSET ?", RECORD_COLUMNS);
        let records = sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn update(&self, id: i64, update: &UpdatePriceRecord) -> Result<Option<PriceRecord>> {
        let sql = format!(
            "UPDATE prices SET name = COALESCE(?, name), cost = COALESCE(?, cost) \
             WHERE id = ? RETURNING {}",
            RECORD_COLUMNS
        );
        let name_hint = update.name.clone().unwrap_or_else(|| format!("#{}", id));
        sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(update.name.as_deref())
            .bind(update.cost)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_duplicate(e, &name_hint, update.cost))
    }

    async fn delete(&self, id: i64) -> Result<Option<PriceRecord>> {
        let sql = format!("DELETE FROM prices WHERE id = ? RETURNING {}", RECORD_COLUMNS);
        let deleted = sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(deleted)
    }

    async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM prices")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
