use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::domain::{Account, AccountPublicKey};

use super::{AccountStore, MIGRATION_001_INITIAL, StoreError};

/// Connection settings for [`SqliteAccountStore`].
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub database_url: String,
    pub pool_size: u32,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    /// Settings for a database file, created on first use.
    pub fn for_path(path: &str) -> Self {
        Self {
            database_url: format!("sqlite:{}?mode=rwc", path),
            pool_size: 5,
            connect_attempts: 1,
            retry_delay: Duration::from_secs(1),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }
}

/// Account store persisted in SQLite.
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect, retrying up to `config.connect_attempts` times.
    pub async fn connect(config: &SqliteConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .context("Invalid database URL")?
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let mut attempt = 1;
        loop {
            let result = SqlitePoolOptions::new()
                .max_connections(config.pool_size)
                .connect_with(options.clone())
                .await;

            match result {
                Ok(pool) => return Ok(Self::new(pool)),
                Err(err) if attempt < config.connect_attempts => {
                    info!(
                        attempt,
                        delay_ms = config.retry_delay.as_millis() as u64,
                        error = %err,
                        "database connection failed, retrying"
                    );
                    tokio::time::sleep(config.retry_delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("Failed to connect to database after {} attempts", attempt)
                    });
                }
            }
        }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        info!("database schema is up to date");
        Ok(())
    }

    /// Initialize the store (connect + migrate).
    pub async fn init(config: &SqliteConfig) -> Result<Self> {
        let store = Self::connect(config).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Delete every account and key. Administrative reset only.
    pub async fn truncate_all(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await.context("Failed to begin reset")?;

        sqlx::query("DELETE FROM public_keys")
            .execute(&mut *tx)
            .await
            .context("Failed to delete public keys")?;
        let deleted = sqlx::query("DELETE FROM accounts")
            .execute(&mut *tx)
            .await
            .context("Failed to delete accounts")?
            .rows_affected();

        tx.commit().await.context("Failed to commit reset")?;

        warn!(deleted, "account store truncated");
        Ok(deleted)
    }

    fn row_to_key(row: &SqliteRow) -> AccountPublicKey {
        AccountPublicKey {
            account_address: row.get("account_address"),
            public_key: row.get("public_key"),
            sig_algo: row.get("sig_algo"),
            hash_algo: row.get("hash_algo"),
        }
    }
}

/// Integrity violations surface as `AlreadyExists`; anything else means the
/// database itself is failing.
fn write_error(err: sqlx::Error, context: &'static str) -> StoreError {
    let integrity = matches!(
        &err,
        sqlx::Error::Database(db) if matches!(
            db.kind(),
            ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation
        )
    );

    if integrity {
        StoreError::AlreadyExists
    } else {
        StoreError::Unavailable(anyhow::Error::new(err).context(context))
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO accounts (address, locked_address, creation_tx_id)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&account.address)
        .bind(&account.locked_address)
        .bind(&account.creation_tx_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, "Failed to save account"))?;

        for key in &account.public_keys {
            sqlx::query(
                r#"
                INSERT INTO public_keys (public_key, account_address, sig_algo, hash_algo)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&key.public_key)
            .bind(&account.address)
            .bind(&key.sig_algo)
            .bind(&key.hash_algo)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "Failed to save public key"))?;
        }

        // Dropping `tx` on any error above rolls the whole insert back.
        tx.commit()
            .await
            .map_err(|e| write_error(e, "Failed to commit account"))?;
        Ok(())
    }

    async fn get_account_by_public_key(&self, public_key: &str) -> Result<Account, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let row = sqlx::query(
            r#"
            SELECT a.address, a.locked_address, a.creation_tx_id
            FROM accounts a
            JOIN public_keys k ON a.address = k.account_address
            WHERE k.public_key = ?
            "#,
        )
        .bind(public_key)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to fetch account by public key")?;

        let Some(row) = row else {
            return Err(StoreError::NotFound);
        };

        let address: String = row.get("address");
        let key_rows = sqlx::query(
            r#"
            SELECT account_address, public_key, sig_algo, hash_algo
            FROM public_keys
            WHERE account_address = ?
            ORDER BY rowid
            "#,
        )
        .bind(&address)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to fetch public keys")?;

        tx.commit().await.context("Failed to commit lookup")?;

        Ok(Account {
            address,
            locked_address: row.get("locked_address"),
            creation_tx_id: row.get("creation_tx_id"),
            public_keys: key_rows.iter().map(Self::row_to_key).collect(),
        })
    }

    async fn get_account_count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count accounts")?
            .get("count");

        Ok(u64::try_from(count).context("Negative account count")?)
    }
}
