//! State store seam and in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::exit_log::ExitLogEntry;
use crate::state::TradingState;

/// Durable per-user state persistence. Linearizable per user.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load a user's state, or None when the user has none yet.
    async fn load_state(&self, user_id: &str) -> Result<Option<TradingState>, StoreError>;

    /// Persist a user's state, replacing the previous snapshot.
    async fn save_state(&self, user_id: &str, state: &TradingState) -> Result<(), StoreError>;

    /// Append one closed-trade record. The log is never rewritten.
    async fn append_exit_log(
        &self,
        user_id: &str,
        entry: &ExitLogEntry,
    ) -> Result<(), StoreError>;

    /// Ids of every user with monitoring enabled.
    async fn monitoring_user_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// In-memory store for tests and paper trading.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: DashMap<String, TradingState>,
    exit_logs: DashMap<String, Vec<ExitLogEntry>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read back a user's exit log (test helper).
    pub fn exit_log(&self, user_id: &str) -> Vec<ExitLogEntry> {
        self.exit_logs
            .get(user_id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_state(&self, user_id: &str) -> Result<Option<TradingState>, StoreError> {
        Ok(self.states.get(user_id).map(|s| s.clone()))
    }

    async fn save_state(&self, user_id: &str, state: &TradingState) -> Result<(), StoreError> {
        self.states.insert(user_id.to_string(), state.clone());
        Ok(())
    }

    async fn append_exit_log(
        &self,
        user_id: &str,
        entry: &ExitLogEntry,
    ) -> Result<(), StoreError> {
        self.exit_logs
            .entry(user_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn monitoring_user_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .states
            .iter()
            .filter(|entry| entry.flags.is_monitoring)
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
