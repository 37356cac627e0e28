use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use fortuna_core::{derive_hash_hex, Entry, EntryStore, PersistenceError};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://fortuna.db";

/// SQLite-backed entry store plus the provably-fair seed parameters.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FairnessParams {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub nonce: i64,
}

fn store_error(e: sqlx::Error) -> PersistenceError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => PersistenceError::Connection(e.to_string()),
        other => PersistenceError::Query(other.to_string()),
    }
}

// fixed-width UTC so that text order is time order
fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Query(format!("bad timestamp {raw:?}: {e}")))
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self, PersistenceError> {
        let opts = SqliteConnectOptions::from_str(url)
            .map_err(store_error)?
            .create_if_missing(true);
        let pool = if url.contains(":memory:") {
            // every connection would get its own empty database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(opts)
                .await
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(opts)
                .await
        }
        .map_err(store_error)?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?;
        // ensure server_seed_hash matches server_seed
        let mut p = self.params().await?;
        let hash = derive_hash_hex(p.server_seed.as_bytes());
        if p.server_seed_hash != hash {
            p.server_seed_hash = hash;
            self.set_params(&p).await?;
        }
        Ok(())
    }

    pub async fn params(&self) -> Result<FairnessParams, PersistenceError> {
        sqlx::query_as::<_, FairnessParams>(
            "SELECT server_seed, server_seed_hash, nonce FROM params WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)
    }

    pub async fn set_params(&self, p: &FairnessParams) -> Result<(), PersistenceError> {
        sqlx::query(
            "UPDATE params SET server_seed = ?, server_seed_hash = ?, nonce = ? WHERE id = 1",
        )
        .bind(&p.server_seed)
        .bind(&p.server_seed_hash)
        .bind(p.nonce)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    /// Bump the nonce and return the parameters the next draw must use.
    pub async fn next_nonce(&self) -> Result<FairnessParams, PersistenceError> {
        sqlx::query_as::<_, FairnessParams>(
            "UPDATE params SET nonce = nonce + 1 WHERE id = 1 \
             RETURNING server_seed, server_seed_hash, nonce",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)
    }

    /// Replace the server seed and restart the nonce. Returns the new hash.
    pub async fn rotate_seed(&self, new_seed: &str) -> Result<String, PersistenceError> {
        let hash = derive_hash_hex(new_seed.as_bytes());
        self.set_params(&FairnessParams {
            server_seed: new_seed.to_string(),
            server_seed_hash: hash.clone(),
            nonce: 0,
        })
        .await?;
        tracing::info!(hash = %hash, "server seed rotated");
        Ok(hash)
    }
}

impl EntryStore for Database {
    async fn insert(&self, entry: &Entry) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO entries (id, ts, username, tier_amount, proof_image, awarded_prize) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(encode_ts(&entry.timestamp))
        .bind(&entry.username)
        .bind(&entry.tier_amount)
        .bind(&entry.proof_image)
        .bind(i64::from(entry.awarded_prize))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Entry>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT id, ts, username, tier_amount, proof_image, awarded_prize \
             FROM entries ORDER BY ts DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter()
            .map(|r| -> Result<Entry, PersistenceError> {
                let ts: String = r.get("ts");
                let prize: i64 = r.get("awarded_prize");
                Ok(Entry {
                    id: r.get("id"),
                    timestamp: decode_ts(&ts)?,
                    username: r.get("username"),
                    tier_amount: r.get("tier_amount"),
                    proof_image: r.get("proof_image"),
                    awarded_prize: u32::try_from(prize).map_err(|_| {
                        PersistenceError::Query(format!("awarded_prize out of range: {prize}"))
                    })?,
                })
            })
            .collect()
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM entries")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
