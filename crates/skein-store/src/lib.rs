//! # skein-store
//!
//! In-memory execution store for paused skein executions.
//!
//! Snapshots live in a shared map until they are resumed, cancelled,
//! deleted or expire. The store is the only mutable state shared between
//! executions; status changes go through a compare-and-set so that two
//! concurrent resumes of the same execution can never both win.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use skein_core::{ExecutionSnapshot, ExecutionStore, Result, SnapshotStatus};
use tokio::sync::RwLock;
use tracing::debug;

/// Default snapshot TTL: 24 hours from creation.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// In-memory, TTL-aware implementation of
/// [`ExecutionStore`](skein_core::ExecutionStore).
///
/// An ACTIVE snapshot past its `expires_at` is surfaced (and persisted) as
/// EXPIRED on read, which makes it ineligible for resume.
pub struct InMemoryExecutionStore {
    snapshots: Arc<RwLock<HashMap<String, ExecutionSnapshot>>>,
    ttl: Duration,
}

impl Default for InMemoryExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryExecutionStore {
    /// Creates an empty store with the default TTL.
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    /// Overrides the TTL applied by [`ttl`](InMemoryExecutionStore::ttl).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The TTL new snapshots should be created with.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored snapshots, expired ones included.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Whether the store holds no snapshots.
    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn save(&self, snapshot: ExecutionSnapshot) -> Result<()> {
        debug!(execution_id = %snapshot.execution_id, "saving snapshot");
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(snapshot.execution_id.clone(), snapshot);
        Ok(())
    }

    async fn find_by_id(&self, execution_id: &str) -> Result<Option<ExecutionSnapshot>> {
        let now = Utc::now();
        let mut snapshots = self.snapshots.write().await;
        let Some(snapshot) = snapshots.get_mut(execution_id) else {
            return Ok(None);
        };
        if snapshot.effective_status(now) == SnapshotStatus::Expired {
            snapshot.status = SnapshotStatus::Expired;
        }
        Ok(Some(snapshot.clone()))
    }

    async fn try_transition(
        &self,
        execution_id: &str,
        from: SnapshotStatus,
        to: SnapshotStatus,
    ) -> Result<bool> {
        let now = Utc::now();
        let mut snapshots = self.snapshots.write().await;
        let Some(snapshot) = snapshots.get_mut(execution_id) else {
            return Ok(false);
        };
        if snapshot.effective_status(now) != from {
            return Ok(false);
        }
        snapshot.status = to;
        debug!(
            execution_id = %execution_id,
            from = from.as_str(),
            to = to.as_str(),
            "snapshot status transition"
        );
        Ok(true)
    }

    async fn delete(&self, execution_id: &str) -> Result<Option<ExecutionSnapshot>> {
        let mut snapshots = self.snapshots.write().await;
        Ok(snapshots.remove(execution_id))
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut snapshots = self.snapshots.write().await;
        let before = snapshots.len();
        snapshots.retain(|_, s| !s.is_expired(now));
        Ok(before - snapshots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{AwaitRequest, ExecutionContext};
    use std::collections::HashMap as StdHashMap;

    fn snapshot(id: &str, ttl: Duration) -> ExecutionSnapshot {
        let context = ExecutionContext::new(id, StdHashMap::new());
        ExecutionSnapshot::create_active(
            context,
            "demo",
            None,
            0,
            AwaitRequest {
                message: "ok?".to_string(),
                input_schema: vec![],
            },
            ttl,
        )
    }

    #[tokio::test]
    async fn save_and_find_round_trip() {
        let store = InMemoryExecutionStore::new();
        store.save(snapshot("e-1", Duration::hours(1))).await.unwrap();

        let found = store.find_by_id("e-1").await.unwrap().unwrap();
        assert_eq!(found.execution_id, "e-1");
        assert_eq!(found.status, SnapshotStatus::Active);
        assert!(store.find_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_snapshots_read_as_expired() {
        let store = InMemoryExecutionStore::new();
        store
            .save(snapshot("e-1", Duration::milliseconds(-1)))
            .await
            .unwrap();

        let found = store.find_by_id("e-1").await.unwrap().unwrap();
        assert_eq!(found.status, SnapshotStatus::Expired);

        // An expired snapshot is not resumable.
        let moved = store
            .try_transition("e-1", SnapshotStatus::Active, SnapshotStatus::Resumed)
            .await
            .unwrap();
        assert!(!moved);
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = InMemoryExecutionStore::new();
        store.save(snapshot("e-1", Duration::hours(1))).await.unwrap();

        assert!(store
            .try_transition("e-1", SnapshotStatus::Active, SnapshotStatus::Resumed)
            .await
            .unwrap());
        // Second attempt sees RESUMED, not ACTIVE.
        assert!(!store
            .try_transition("e-1", SnapshotStatus::Active, SnapshotStatus::Resumed)
            .await
            .unwrap());
        assert!(!store
            .try_transition("missing", SnapshotStatus::Active, SnapshotStatus::Resumed)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn concurrent_transitions_admit_exactly_one_winner() {
        let store = Arc::new(InMemoryExecutionStore::new());
        store.save(snapshot("e-1", Duration::hours(1))).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .try_transition("e-1", SnapshotStatus::Active, SnapshotStatus::Resumed)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn cancelled_snapshots_stay_cancelled() {
        let store = InMemoryExecutionStore::new();
        store.save(snapshot("e-1", Duration::hours(1))).await.unwrap();

        assert!(store
            .try_transition("e-1", SnapshotStatus::Active, SnapshotStatus::Cancelled)
            .await
            .unwrap());
        assert!(!store
            .try_transition("e-1", SnapshotStatus::Active, SnapshotStatus::Resumed)
            .await
            .unwrap());
        let found = store.find_by_id("e-1").await.unwrap().unwrap();
        assert_eq!(found.status, SnapshotStatus::Cancelled);
    }

    #[tokio::test]
    async fn sweep_drops_only_expired_snapshots() {
        let store = InMemoryExecutionStore::new();
        store.save(snapshot("old", Duration::milliseconds(-1))).await.unwrap();
        store.save(snapshot("new", Duration::hours(1))).await.unwrap();

        let removed = store.sweep_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.find_by_id("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_returns_the_snapshot() {
        let store = InMemoryExecutionStore::new();
        store.save(snapshot("e-1", Duration::hours(1))).await.unwrap();

        assert!(store.delete("e-1").await.unwrap().is_some());
        assert!(store.delete("e-1").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
