//! Persisted state surface.
//!
//! A snapshot is plain data. Restoring one goes through
//! [`ElicitationSession::restore`](crate::session::ElicitationSession::restore),
//! which re-checks every invariant against the configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bundle::{Bundle, BundleId};
use crate::chat::ChatTranscript;
use crate::error::{ElicitError, ElicitResult};
use crate::ledger::PriorityId;
use crate::session::{SessionId, StageResult};

/// Chips placed on one priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// Target priority.
    pub priority_id: PriorityId,
    /// Chips allocated.
    pub value: u32,
}

/// One stage's bundles and current order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// 0-based stage position.
    pub stage_index: usize,
    /// Bundles in their configured order.
    pub bundles: Vec<Bundle>,
    /// Current rank order, most preferred first.
    pub order: Vec<BundleId>,
    /// Overlay flag; absent when the stage has no goal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_visible: Option<bool>,
}

/// Everything needed to resume a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: SessionId,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the last stage was confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Budget the allocations were made against.
    pub budget: u32,
    /// Ledger contents in priority order.
    pub allocations: Vec<AllocationRecord>,
    /// Per-stage orders.
    pub stages: Vec<StageRecord>,
    /// `None` once the session is complete.
    pub current_stage_index: Option<usize>,
    /// Frozen rankings of confirmed stages.
    pub completed_results: Vec<StageResult>,
    /// Side-panel transcript.
    #[serde(default)]
    pub chat: ChatTranscript,
}

/// Serialize a snapshot to pretty JSON.
pub fn to_json_pretty(snapshot: &SessionSnapshot) -> ElicitResult<String> {
    serde_json::to_string_pretty(snapshot)
        .map_err(|e| ElicitError::internal(format!("serialize snapshot: {e}")))
}

/// Deserialize a snapshot from JSON.
///
/// Callers should then pass it to `ElicitationSession::restore`, which
/// validates it.
pub fn from_json(s: &str) -> ElicitResult<SessionSnapshot> {
    serde_json::from_str::<SessionSnapshot>(s)
        .map_err(|e| ElicitError::internal(format!("deserialize snapshot: {e}")))
}
