use std::{sync::{atomic::{AtomicBool, Ordering}, Arc}, time::Duration};

use sqlx::{sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions}, Sqlite, SqlitePool, Transaction};

use crate::config::Config;

/// Connection pool plus the readiness flag the gate middleware reads.
#[derive(Clone)]
pub struct Db {
    pub pool: SqlitePool,
    ready: Arc<AtomicBool>,
}

impl Db {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, ready: Arc::new(AtomicBool::new(false)) }
    }

    /// Builds a pool without touching the database; the monitor connects later.
    pub fn connect_lazy(config: &Config) -> anyhow::Result<Self> {
        let options: SqliteConnectOptions = config.database_url.parse()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect_lazy_with(
                options
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(Duration::from_secs(5))
            );
        Ok(Self::new(pool))
    }

    /// Single-connection in-memory database with the schema applied, for tests.
    pub async fn memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let db = Self::new(pool);
        db.migrate().await?;
        db.set_ready(true);
        Ok(db)
    }

    /// Opens a transaction holding the write lock from the start, so writers
    /// queue on `busy_timeout` instead of failing when they upgrade.
    pub async fn begin_write(&self) -> sqlx::Result<Transaction<'static, Sqlite>> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        let was = self.ready.swap(ready, Ordering::AcqRel);
        if was != ready {
            if ready {
                tracing::info!("database connected");
            } else {
                tracing::warn!("database unavailable");
            }
        }
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Migrates once reachable, then keeps the readiness flag in line with `SELECT 1`.
    pub async fn monitor(self, every: Duration) {
        let mut migrated = false;
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            if !migrated {
                match self.migrate().await {
                    Ok(()) => migrated = true,
                    Err(e) => {
                        tracing::warn!("migrations not applied yet: {e:#}");
                        self.set_ready(false);
                        continue;
                    }
                }
            }
            let ok = self.ping().await;
            self.set_ready(ok);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_db_is_ready_and_migrated() {
        let db = Db::memory().await.unwrap();
        assert!(db.is_ready());
        assert!(db.ping().await);

        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn closed_pool_is_not_ready() {
        let db = Db::memory().await.unwrap();
        db.pool.close().await;
        assert!(!db.ping().await);
    }
}
