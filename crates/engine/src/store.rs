use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use common::{Error, Result, StrategyDraft, StrategyId, StrategyRecord, StrategyStore};

/// Strategy definitions in the `strategies` table.
#[derive(Clone)]
pub struct SqliteStrategyStore {
    pool: SqlitePool,
}

impl SqliteStrategyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating the file if needed) and migrate.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        info!("Database ready");
        Ok(store)
    }

    /// A private migrated database that lives as long as the store.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StrategyStore for SqliteStrategyStore {
    async fn persist_strategy(&self, algorithm: &str, draft: &StrategyDraft) -> Result<StrategyId> {
        let config = serde_json::to_string(draft)?;
        let id = sqlx::query(
            r#"
            INSERT INTO strategies (algorithm, name, pair, config, active, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            "#,
        )
        .bind(algorithm)
        .bind(&draft.name)
        .bind(&draft.pair)
        .bind(config)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    async fn load_all_strategies(&self) -> Result<Vec<StrategyRecord>> {
        let rows = sqlx::query("SELECT id, algorithm, config, active FROM strategies ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: StrategyId = row.try_get("id")?;
            let config: String = row.try_get("config")?;
            let draft: StrategyDraft = match serde_json::from_str(&config) {
                Ok(draft) => draft,
                Err(e) => {
                    warn!(id, error = %e, "Skipping strategy with unreadable config");
                    continue;
                }
            };
            records.push(StrategyRecord {
                id,
                algorithm: row.try_get("algorithm")?,
                draft,
                active: row.try_get("active")?,
            });
        }
        Ok(records)
    }

    async fn update_active_flag(&self, id: StrategyId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE strategies SET active = ?1 WHERE id = ?2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    async fn delete_strategy(&self, id: StrategyId) -> Result<()> {
        let result = sqlx::query("DELETE FROM strategies WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::TradingMode;

    use super::*;

    #[tokio::test]
    async fn persist_load_and_flag_round_trip() {
        let store = SqliteStrategyStore::in_memory().await.unwrap();
        let draft = StrategyDraft {
            mode: TradingMode::Live,
            venue: "uniswap".into(),
            ..StrategyDraft::new("eth grid", "ETH/USDC")
        }
        .with_param("lower_price", 1500.0)
        .with_param("upper_price", 4000.0);

        let a = store.persist_strategy("grid", &draft).await.unwrap();
        let b = store.persist_strategy("dca", &StrategyDraft::new("dca", "BTCUSDT")).await.unwrap();
        assert!(b > a);

        store.update_active_flag(a, true).await.unwrap();
        let records = store.load_all_strategies().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, a);
        assert_eq!(records[0].algorithm, "grid");
        assert_eq!(records[0].draft, draft);
        assert!(records[0].active);
        assert!(!records[1].active);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store = SqliteStrategyStore::in_memory().await.unwrap();
        assert!(matches!(store.update_active_flag(99, true).await, Err(Error::NotFound(99))));
        assert!(matches!(store.delete_strategy(99).await, Err(Error::NotFound(99))));
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let store = SqliteStrategyStore::in_memory().await.unwrap();
        let id = store
            .persist_strategy("dca", &StrategyDraft::new("dca", "BTCUSDT"))
            .await
            .unwrap();
        store.delete_strategy(id).await.unwrap();
        assert!(store.load_all_strategies().await.unwrap().is_empty());
    }
}
