use async_trait::async_trait;

use crate::{Result, StrategyDraft, StrategyId, StrategyRecord};

/// Durable storage of strategy definitions and their active flag.
#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Persist a new definition and return its durable id.
    async fn persist_strategy(&self, algorithm: &str, draft: &StrategyDraft) -> Result<StrategyId>;

    /// All persisted definitions, ordered by id.
    async fn load_all_strategies(&self) -> Result<Vec<StrategyRecord>>;

    async fn update_active_flag(&self, id: StrategyId, active: bool) -> Result<()>;

    async fn delete_strategy(&self, id: StrategyId) -> Result<()>;
}
