use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use common::{
    Error, LogEntry, MarketDataProvider, Result, StrategyConfig, StrategyDraft, StrategyId,
    StrategyRecord, StrategySnapshot, StrategyStatus, StrategyStore,
};
use strategy::{catalog, Algorithm, CatalogEntry, StrategyFileConfig};

use crate::dex::check_venue_pair;
use crate::instance::StrategyInstance;
use crate::router::ExecutionRouter;

/// Owns every live `StrategyInstance`.
///
/// Mutations (create, start, stop, remove, shutdown) are serialized through
/// `ops`. Reads take only the registry read lock and may observe a state
/// that a concurrent mutation is about to change.
pub struct RuntimeManager {
    registry: RwLock<BTreeMap<StrategyId, Arc<StrategyInstance>>>,
    ops: Mutex<()>,
    store: Arc<dyn StrategyStore>,
    market: Arc<dyn MarketDataProvider>,
    router: Arc<ExecutionRouter>,
}

impl RuntimeManager {
    pub fn new(
        store: Arc<dyn StrategyStore>,
        market: Arc<dyn MarketDataProvider>,
        router: Arc<ExecutionRouter>,
    ) -> Self {
        Self {
            registry: RwLock::new(BTreeMap::new()),
            ops: Mutex::new(()),
            store,
            market,
            router,
        }
    }

    /// Rebuild persisted strategies and restart the active ones. An empty
    /// store is seeded from `seeds` instead, with everything stopped.
    pub async fn init(&self, seeds: &StrategyFileConfig) -> Result<()> {
        let records = self.store.load_all_strategies().await?;

        if records.is_empty() {
            info!(count = seeds.strategies.len(), "No persisted strategies, seeding defaults");
            for entry in &seeds.strategies {
                match self.create_strategy(&entry.algorithm, entry.draft.clone()).await {
                    Ok(_) => {}
                    Err(e) if e.is_configuration() => {
                        warn!(name = %entry.draft.name, error = %e, "Skipping invalid seed strategy");
                    }
                    Err(e) => return Err(e),
                }
            }
            return Ok(());
        }

        let _guard = self.ops.lock().await;
        let mut started = 0;
        for record in records {
            let (id, active) = (record.id, record.active);
            let instance = match self.rebuild(record) {
                Ok(instance) => Arc::new(instance),
                Err(e) => {
                    warn!(id, error = %e, "Skipping persisted strategy that no longer validates");
                    continue;
                }
            };
            self.registry.write().await.insert(id, instance.clone());
            if active {
                instance.start().await;
                started += 1;
            }
        }
        info!(
            loaded = self.registry.read().await.len(),
            started, "Runtime manager initialized"
        );
        Ok(())
    }

    fn rebuild(&self, record: StrategyRecord) -> Result<StrategyInstance> {
        record.draft.validate()?;
        check_venue_pair(&record.draft.venue, &record.draft.pair)?;
        let algorithm = Algorithm::from_type(&record.algorithm, &record.draft.params)?;
        Ok(self.instantiate(StrategyConfig::new(record.id, record.draft), algorithm))
    }

    fn instantiate(&self, config: StrategyConfig, algorithm: Algorithm) -> StrategyInstance {
        StrategyInstance::new(config, algorithm, self.router.clone(), self.market.clone())
    }

    pub fn algorithms(&self) -> Vec<CatalogEntry> {
        catalog()
    }

    /// Validate, persist, then register a stopped instance. Configuration
    /// errors are returned before anything is written.
    pub async fn create_strategy(&self, algorithm: &str, draft: StrategyDraft) -> Result<StrategySnapshot> {
        draft.validate()?;
        check_venue_pair(&draft.venue, &draft.pair)?;
        let built = Algorithm::from_type(algorithm, &draft.params)?;

        let _guard = self.ops.lock().await;
        let id = self.store.persist_strategy(built.kind().id(), &draft).await?;
        let instance = Arc::new(self.instantiate(StrategyConfig::new(id, draft), built));
        info!(id, algorithm = %instance.kind(), pair = %instance.config().pair, "Strategy created");
        self.registry.write().await.insert(id, instance.clone());
        Ok(instance.snapshot().await)
    }

    pub async fn start(&self, id: StrategyId) -> Result<StrategySnapshot> {
        let _guard = self.ops.lock().await;
        let instance = self.instance(id).await?;
        instance.start().await;
        self.store.update_active_flag(id, true).await?;
        Ok(instance.snapshot().await)
    }

    pub async fn stop(&self, id: StrategyId) -> Result<StrategySnapshot> {
        let _guard = self.ops.lock().await;
        let instance = self.instance(id).await?;
        instance.stop().await;
        self.store.update_active_flag(id, false).await?;
        Ok(instance.snapshot().await)
    }

    /// Stop, delete the definition, and drop the instance.
    pub async fn remove(&self, id: StrategyId) -> Result<()> {
        let _guard = self.ops.lock().await;
        let instance = self.instance(id).await?;
        instance.stop().await;
        self.store.delete_strategy(id).await?;
        self.registry.write().await.remove(&id);
        info!(id, "Strategy removed");
        Ok(())
    }

    /// Snapshots ordered by id.
    pub async fn list_all(&self) -> Vec<StrategySnapshot> {
        let instances: Vec<_> = self.registry.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(instances.len());
        for instance in instances {
            out.push(instance.snapshot().await);
        }
        out
    }

    pub async fn get(&self, id: StrategyId) -> Result<StrategySnapshot> {
        Ok(self.instance(id).await?.snapshot().await)
    }

    pub async fn logs(&self, id: StrategyId) -> Result<Vec<LogEntry>> {
        Ok(self.instance(id).await?.logs().await)
    }

    /// `(registered, running)` counts.
    pub async fn counts(&self) -> (usize, usize) {
        let instances: Vec<_> = self.registry.read().await.values().cloned().collect();
        let mut running = 0;
        for instance in &instances {
            if instance.status().await == StrategyStatus::Running {
                running += 1;
            }
        }
        (instances.len(), running)
    }

    /// Stop every loop. Persisted active flags are left alone so the same
    /// set restarts on the next boot.
    pub async fn shutdown(&self) {
        let _guard = self.ops.lock().await;
        let instances: Vec<_> = self.registry.read().await.values().cloned().collect();
        let mut stopped = 0;
        for instance in instances {
            if instance.status().await != StrategyStatus::Stopped && instance.stop().await {
                stopped += 1;
            }
        }
        info!(stopped, "Runtime manager shut down");
    }

    async fn instance(&self, id: StrategyId) -> Result<Arc<StrategyInstance>> {
        self.registry
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use common::{Candle, DateRange, StrategyRecord, TradingMode};
    use paper::PaperClient;
    use strategy::StrategyEntry;

    use super::*;
    use crate::store::SqliteStrategyStore;

    struct Flat;

    #[async_trait]
    impl MarketDataProvider for Flat {
        async fn price_window(&self, _pair: &str, lookback: usize) -> Result<Vec<f64>> {
            Ok(vec![100.0; lookback.max(1)])
        }

        async fn candles(&self, _: &str, _: Duration, _: &DateRange) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }
    }

    /// Empty on load, but every write fails.
    struct ReadOnlyStore;

    #[async_trait]
    impl StrategyStore for ReadOnlyStore {
        async fn persist_strategy(&self, _: &str, _: &StrategyDraft) -> Result<StrategyId> {
            Err(Error::Database(sqlx::Error::PoolClosed))
        }

        async fn load_all_strategies(&self) -> Result<Vec<StrategyRecord>> {
            Ok(Vec::new())
        }

        async fn update_active_flag(&self, _: StrategyId, _: bool) -> Result<()> {
            Err(Error::Database(sqlx::Error::PoolClosed))
        }

        async fn delete_strategy(&self, _: StrategyId) -> Result<()> {
            Err(Error::Database(sqlx::Error::PoolClosed))
        }
    }

    fn manager(store: Arc<dyn StrategyStore>) -> RuntimeManager {
        let router = Arc::new(ExecutionRouter::new(PaperClient::new(0.0), Duration::from_secs(5)));
        RuntimeManager::new(store, Arc::new(Flat), router)
    }

    fn dca_draft(name: &str) -> StrategyDraft {
        StrategyDraft {
            mode: TradingMode::Paper,
            ..StrategyDraft::new(name, "BTCUSDT")
        }
        .with_param("amount", 50.0)
    }

    #[tokio::test]
    async fn unknown_algorithm_persists_nothing() {
        let store = Arc::new(SqliteStrategyStore::in_memory().await.unwrap());
        let mgr = manager(store.clone());
        let err = mgr.create_strategy("macd", dca_draft("x")).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(store.load_all_strategies().await.unwrap().is_empty());
        assert!(mgr.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_params_persist_nothing() {
        let store = Arc::new(SqliteStrategyStore::in_memory().await.unwrap());
        let mgr = manager(store.clone());
        let draft = dca_draft("x").with_param("amount", -1.0);
        assert!(matches!(
            mgr.create_strategy("dca", draft).await,
            Err(Error::InvalidParameter { .. })
        ));
        assert!(store.load_all_strategies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dex_pair_without_base_and_quote_is_rejected_at_creation() {
        let store = Arc::new(SqliteStrategyStore::in_memory().await.unwrap());
        let mgr = manager(store.clone());
        let draft = StrategyDraft {
            mode: TradingMode::Live,
            venue: "raydium".into(),
            ..StrategyDraft::new("wif", "WIFSOL")
        };
        let err = mgr.create_strategy("dca", draft).await.unwrap_err();
        assert!(matches!(&err, Error::InvalidParameter { name, .. } if name == "pair"));
        assert!(store.load_all_strategies().await.unwrap().is_empty());

        let splittable = StrategyDraft {
            venue: "raydium".into(),
            ..StrategyDraft::new("wif", "WIF/SOL")
        };
        mgr.create_strategy("dca", splittable).await.unwrap();
    }

    #[tokio::test]
    async fn seeding_stops_on_storage_failure() {
        let mgr = manager(Arc::new(ReadOnlyStore));
        let err = mgr.init(&StrategyFileConfig::builtin()).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(mgr.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn start_and_stop_persist_the_active_flag() {
        let store = Arc::new(SqliteStrategyStore::in_memory().await.unwrap());
        let mgr = manager(store.clone());
        let created = mgr.create_strategy("dca", dca_draft("dca")).await.unwrap();
        assert_eq!(created.status, StrategyStatus::Stopped);

        let running = mgr.start(created.id).await.unwrap();
        assert_eq!(running.status, StrategyStatus::Running);
        assert!(store.load_all_strategies().await.unwrap()[0].active);
        assert_eq!(mgr.counts().await, (1, 1));

        let stopped = mgr.stop(created.id).await.unwrap();
        assert_eq!(stopped.status, StrategyStatus::Stopped);
        assert!(!store.load_all_strategies().await.unwrap()[0].active);

        let logs = mgr.logs(created.id).await.unwrap();
        assert_eq!(logs.last().unwrap().message, "Status: running -> stopped");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let mgr = manager(Arc::new(SqliteStrategyStore::in_memory().await.unwrap()));
        assert!(matches!(mgr.start(42).await, Err(Error::NotFound(42))));
        assert!(matches!(mgr.stop(42).await, Err(Error::NotFound(42))));
        assert!(matches!(mgr.logs(42).await, Err(Error::NotFound(42))));
        assert!(matches!(mgr.remove(42).await, Err(Error::NotFound(42))));
    }

    #[tokio::test]
    async fn empty_store_is_seeded_and_invalid_seeds_skipped() {
        let store = Arc::new(SqliteStrategyStore::in_memory().await.unwrap());
        let mgr = manager(store.clone());
        let mut seeds = StrategyFileConfig::builtin();
        seeds.strategies.push(StrategyEntry {
            algorithm: "nope".into(),
            draft: dca_draft("bad"),
        });
        mgr.init(&seeds).await.unwrap();

        let listed = mgr.list_all().await;
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|s| s.status == StrategyStatus::Stopped));
        assert_eq!(store.load_all_strategies().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn restart_reconstructs_and_resumes_active_strategies() {
        let store = Arc::new(SqliteStrategyStore::in_memory().await.unwrap());
        let first = manager(store.clone());
        let a = first.create_strategy("dca", dca_draft("a")).await.unwrap();
        let b = first.create_strategy("momentum", dca_draft("b")).await.unwrap();
        first.start(a.id).await.unwrap();
        first.shutdown().await;
        assert_eq!(first.get(a.id).await.unwrap().status, StrategyStatus::Stopped);

        let second = manager(store.clone());
        second.init(&StrategyFileConfig::builtin()).await.unwrap();
        let listed = second.list_all().await;
        assert_eq!(listed.len(), 2, "existing store is not re-seeded");
        assert_eq!(second.get(a.id).await.unwrap().status, StrategyStatus::Running);
        assert_eq!(second.get(b.id).await.unwrap().status, StrategyStatus::Stopped);
        second.shutdown().await;
    }

    #[tokio::test]
    async fn remove_deletes_definition_and_instance() {
        let store = Arc::new(SqliteStrategyStore::in_memory().await.unwrap());
        let mgr = manager(store.clone());
        let created = mgr.create_strategy("dca", dca_draft("gone")).await.unwrap();
        mgr.start(created.id).await.unwrap();
        mgr.remove(created.id).await.unwrap();
        assert!(matches!(mgr.get(created.id).await, Err(Error::NotFound(_))));
        assert!(store.load_all_strategies().await.unwrap().is_empty());
    }
}
