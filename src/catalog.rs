//! Persistent directory of known feeds: one row per virtual identity.
//!
//! Grounded on `pkg/new/adapters/feed_definition_storage.go` (schema: four
//! columns `publickey, privatekey, url, nitter`; `ListRandom` query shape —
//! its hardcoded `LIMIT 50` is NOT replicated, see DESIGN.md) and the
//! `Put`/`Search`/`CountTotal` signatures attested in
//! `pkg/new/app/{handler_create_feed_definition,search_feeds,handler_get_total_event_count}.go`.
//! SQLite via `sqlx`, runtime-checked queries (`sqlx::query`/`query_as` plus
//! `.bind()`, not the `query!` macro family) matching the teacher's own
//! `feed_manager.rs` style.

use nostr::key::{Keys, PublicKey, SecretKey};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid public key stored for a feed: {0}")]
    InvalidPublicKey(String),
    #[error("invalid private key stored for a feed: {0}")]
    InvalidSecretKey(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// One catalogued feed: its virtual identity, source URL, and whether it is
/// a Nitter (Twitter-mirror) feed eligible for mirror-host retry.
#[derive(Debug, Clone)]
pub struct FeedDefinition {
    pub public_key: PublicKey,
    pub secret_key: SecretKey,
    pub url: String,
    pub nitter: bool,
}

impl FeedDefinition {
    pub fn keys(&self) -> Keys {
        Keys::new(self.secret_key.clone())
    }
}

struct Row4 {
    public_key: String,
    private_key: String,
    url: String,
    nitter: bool,
}

impl Row4 {
    fn into_definition(self) -> Result<FeedDefinition> {
        let public_key = PublicKey::from_hex(&self.public_key).map_err(|_| CatalogError::InvalidPublicKey(self.public_key))?;
        let secret_key = SecretKey::from_hex(&self.private_key).map_err(|_| CatalogError::InvalidSecretKey(self.private_key))?;
        Ok(FeedDefinition {
            public_key,
            secret_key,
            url: self.url,
            nitter: self.nitter,
        })
    }
}

pub struct FeedCatalog {
    pool: SqlitePool,
}

impl FeedCatalog {
    /// Opens (creating if absent) the SQLite database at `path` and runs
    /// startup migrations.
    pub async fn open(path: &str) -> Result<Self> {
        let (url, max_connections) = if path == ":memory:" {
            // A single connection keeps the in-memory database shared across
            // the pool instead of each connection getting its own.
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite://{path}?mode=rwc"), 5)
        };
        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(&url).await?;
        let catalog = Self { pool };
        catalog.migrate().await?;
        Ok(catalog)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS feeds (
                publickey TEXT NOT NULL PRIMARY KEY,
                privatekey TEXT NOT NULL,
                url TEXT NOT NULL,
                nitter BOOLEAN NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        let has_nitter_column = sqlx::query("SELECT nitter FROM feeds LIMIT 1").fetch_optional(&self.pool).await;
        if has_nitter_column.is_err() {
            sqlx::query("ALTER TABLE feeds ADD COLUMN nitter BOOLEAN NOT NULL DEFAULT 0")
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Inserts `definition` only if its public key is not already present.
    pub async fn put(&self, definition: &FeedDefinition) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO feeds (publickey, privatekey, url, nitter) VALUES (?, ?, ?, ?)")
            .bind(definition.public_key.to_hex())
            .bind(definition.secret_key.to_secret_hex())
            .bind(&definition.url)
            .bind(definition.nitter)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<FeedDefinition>> {
        let rows = sqlx::query("SELECT publickey, privatekey, url, nitter FROM feeds")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_definition).collect()
    }

    /// Honors `n` exactly — the original's equivalent query hardcodes
    /// `LIMIT 50` regardless of its parameter; that is not replicated here.
    pub async fn list_random(&self, n: i64) -> Result<Vec<FeedDefinition>> {
        let rows = sqlx::query("SELECT publickey, privatekey, url, nitter FROM feeds ORDER BY RANDOM() LIMIT ?")
            .bind(n)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_definition).collect()
    }

    pub async fn search(&self, query: &str, n: i64) -> Result<Vec<FeedDefinition>> {
        let pattern = format!("%{query}%");
        let rows = sqlx::query("SELECT publickey, privatekey, url, nitter FROM feeds WHERE url LIKE ? LIMIT ?")
            .bind(pattern)
            .bind(n)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_definition).collect()
    }

    pub async fn count_total(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM feeds").fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    pub async fn get_by_public_key(&self, public_key: &PublicKey) -> Result<Option<FeedDefinition>> {
        let row = sqlx::query("SELECT publickey, privatekey, url, nitter FROM feeds WHERE publickey = ?")
            .bind(public_key.to_hex())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_definition).transpose()
    }

    pub async fn delete(&self, public_key: &PublicKey) -> Result<()> {
        sqlx::query("DELETE FROM feeds WHERE publickey = ?")
            .bind(public_key.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_nitter(&self, public_key: &PublicKey, nitter: bool) -> Result<()> {
        sqlx::query("UPDATE feeds SET nitter = ? WHERE publickey = ?")
            .bind(nitter)
            .bind(public_key.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_definition(row: sqlx::sqlite::SqliteRow) -> Result<FeedDefinition> {
    Row4 {
        public_key: row.try_get("publickey")?,
        private_key: row.try_get("privatekey")?,
        url: row.try_get("url")?,
        nitter: row.try_get("nitter")?,
    }
    .into_definition()
}
