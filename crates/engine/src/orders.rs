//! Live-order index.
//!
//! Maps gateway order ids back to the owning user and symbol so push
//! events can be routed without scanning every user's state.

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Generate a unique order tag with a prefix.
///
/// Format: `{prefix}_{uuid}` where uuid is a v4 UUID in simple format.
pub fn generate_order_tag(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().as_simple())
}

/// Ownership record for one live order.
#[derive(Debug, Clone)]
pub struct OrderRef {
    pub user_id: String,
    pub symbol_id: String,
    pub registered_at_ms: i64,
}

/// Thread-safe index of live entry orders across all users.
///
/// Entries are registered before the gateway call returns and removed when
/// the order reaches a terminal state; stale entries are purged periodically
/// so abandoned orders cannot leak.
#[derive(Debug, Default)]
pub struct LiveOrderIndex {
    orders: DashMap<String, OrderRef>,
}

impl LiveOrderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an order id against its owner.
    pub fn register(&self, order_id: &str, user_id: &str, symbol_id: &str, now_ms: i64) {
        self.orders.insert(
            order_id.to_string(),
            OrderRef {
                user_id: user_id.to_string(),
                symbol_id: symbol_id.to_string(),
                registered_at_ms: now_ms,
            },
        );
    }

    /// Look up the owner of an order id.
    pub fn lookup(&self, order_id: &str) -> Option<OrderRef> {
        self.orders.get(order_id).map(|r| r.clone())
    }

    /// Remove a completed order.
    pub fn remove(&self, order_id: &str) {
        self.orders.remove(order_id);
    }

    /// All order ids currently registered for one user.
    pub fn order_ids_for_user(&self, user_id: &str) -> Vec<String> {
        self.orders
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Purge entries older than the given timeout.
    pub fn cleanup_stale(&self, timeout_ms: i64, now_ms: i64) {
        self.orders
            .retain(|_, r| now_ms - r.registered_at_ms < timeout_ms);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Shared handle to the live-order index.
pub type SharedOrderIndex = Arc<LiveOrderIndex>;

pub fn create_order_index() -> SharedOrderIndex {
    Arc::new(LiveOrderIndex::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_order_tag_unique() {
        let a = generate_order_tag("hma");
        let b = generate_order_tag("hma");

        assert!(a.starts_with("hma_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_register_lookup_remove() {
        let index = LiveOrderIndex::new();

        index.register("o1", "user-1", "sym-1", 1_000);
        let found = index.lookup("o1").unwrap();
        assert_eq!(found.user_id, "user-1");
        assert_eq!(found.symbol_id, "sym-1");

        index.remove("o1");
        assert!(index.lookup("o1").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_order_ids_for_user() {
        let index = LiveOrderIndex::new();
        index.register("o1", "user-1", "sym-1", 1_000);
        index.register("o2", "user-1", "sym-2", 1_000);
        index.register("o3", "user-2", "sym-1", 1_000);

        let mut ids = index.order_ids_for_user("user-1");
        ids.sort();
        assert_eq!(ids, vec!["o1", "o2"]);
    }

    #[test]
    fn test_cleanup_stale() {
        let index = LiveOrderIndex::new();
        index.register("old", "user-1", "sym-1", 1_000);
        index.register("new", "user-1", "sym-2", 5_000);

        index.cleanup_stale(2_000, 6_000);

        assert!(index.lookup("old").is_none());
        assert!(index.lookup("new").is_some());
    }
}
