//! Durable records of paused executions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::result::AwaitRequest;

/// Lifecycle status of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    /// Paused and resumable.
    Active,
    /// Already resumed; never served again.
    Resumed,
    /// Past its TTL.
    Expired,
    /// Cancelled by the caller.
    Cancelled,
}

impl SnapshotStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Resumed => "RESUMED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// A paused execution, persisted in the execution store.
///
/// The snapshot embeds the whole [`ExecutionContext`], the index of the
/// suspending await step and the request shown to the caller; that is
/// everything needed to reconstitute the execution. Only ACTIVE snapshots
/// are resumable, and a successful resume transitions ACTIVE → RESUMED
/// atomically before any further stepping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    /// The execution id; the store key.
    pub execution_id: String,

    /// Id of the skill being executed.
    pub skill_id: String,

    /// Version of the skill being executed, when it declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_version: Option<String>,

    /// Index of the await step that suspended the execution.
    pub current_step_index: usize,

    /// The whole execution context at suspension time.
    pub context: ExecutionContext,

    /// The input request surfaced to the caller.
    pub await_request: AwaitRequest,

    /// Lifecycle status.
    pub status: SnapshotStatus,

    /// When the snapshot was created.
    pub created_at: DateTime<Utc>,

    /// When the snapshot stops being resumable.
    pub expires_at: DateTime<Utc>,
}

impl ExecutionSnapshot {
    /// Creates an ACTIVE snapshot expiring `ttl` from now.
    pub fn create_active(
        context: ExecutionContext,
        skill_id: impl Into<String>,
        skill_version: Option<String>,
        current_step_index: usize,
        await_request: AwaitRequest,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            execution_id: context.execution_id().to_string(),
            skill_id: skill_id.into(),
            skill_version,
            current_step_index,
            context,
            await_request,
            status: SnapshotStatus::Active,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Whether the snapshot is past its TTL at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// The status as observed at `now`: an ACTIVE snapshot past its TTL
    /// reads as EXPIRED.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SnapshotStatus {
        if self.status == SnapshotStatus::Active && self.is_expired(now) {
            SnapshotStatus::Expired
        } else {
            self.status
        }
    }
}
