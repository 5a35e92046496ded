//! Error types for prefsync.
//!
//! Two very different failure classes exist in the engine:
//!
//! - **Rejected edits** come from live UI controls (sliders, drag-to-reorder)
//!   and are never errors. They are reported as [`EditOutcome::Rejected`] and
//!   leave the prior valid state untouched.
//! - **Invalid session state** and **validation** failures indicate a logic
//!   error in the surrounding orchestration or a bad configuration/snapshot.
//!   They are strongly typed using thiserror and returned as `Err`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bundle::BundleId;
use crate::ledger::PriorityId;

/// Why an interactive edit was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Committing the value would push the total allocation over budget.
    OverBudget {
        /// Total the edit would have produced.
        prospective_total: u64,
        /// Configured budget.
        budget: u32,
    },

    /// A single allocation can never exceed the budget.
    ValueExceedsBudget {
        /// Requested value.
        value: u32,
        /// Configured budget.
        budget: u32,
    },

    /// No priority with this id exists in the ledger.
    UnknownPriority {
        /// The id that was not found.
        priority_id: PriorityId,
    },

    /// The proposed order is not a permutation of the held bundles.
    NotAPermutation {
        /// Bundles held by the stage.
        expected_len: usize,
        /// Length of the proposed order.
        actual_len: usize,
    },

    /// No bundle with this id is held by the stage.
    UnknownBundle {
        /// The id that was not found.
        bundle_id: BundleId,
    },

    /// Rank slot outside `1..=len`.
    SlotOutOfRange {
        /// Requested 1-based rank.
        slot: usize,
        /// Bundles held by the stage.
        len: usize,
    },

    /// The stage has no goal overlay to show or hide.
    NoGoalOverlay,

    /// The stage was already confirmed; its order is read-only.
    StageFrozen {
        /// The confirmed stage.
        stage_index: usize,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverBudget {
                prospective_total,
                budget,
            } => write!(f, "allocation total {prospective_total} would exceed budget {budget}"),
            Self::ValueExceedsBudget { value, budget } => {
                write!(f, "value {value} exceeds budget {budget}")
            }
            Self::UnknownPriority { priority_id } => write!(f, "unknown priority '{priority_id}'"),
            Self::NotAPermutation {
                expected_len,
                actual_len,
            } => write!(
                f,
                "order is not a permutation of the held bundles (expected {expected_len}, got {actual_len})"
            ),
            Self::UnknownBundle { bundle_id } => write!(f, "unknown bundle '{bundle_id}'"),
            Self::SlotOutOfRange { slot, len } => write!(f, "rank slot {slot} outside 1..={len}"),
            Self::NoGoalOverlay => write!(f, "stage has no goal overlay"),
            Self::StageFrozen { stage_index } => write!(f, "stage {stage_index} is already confirmed"),
        }
    }
}

/// Result of an interactive edit.
///
/// A rejected edit is a silent no-op from the engine's point of view: the
/// previous state is kept and callers may ignore the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditOutcome {
    /// The edit was committed.
    Applied,
    /// The edit was dropped; state is exactly as before the call.
    Rejected {
        /// Why the edit was dropped.
        #[serde(flatten)]
        reason: RejectReason,
    },
}

impl EditOutcome {
    pub(crate) const fn rejected(reason: RejectReason) -> Self {
        Self::Rejected { reason }
    }

    /// Returns true if the edit was committed.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Returns true if the edit was dropped.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// The rejection reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Applied => None,
            Self::Rejected { reason } => Some(reason),
        }
    }
}

/// Validation errors for configuration and restored snapshots.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The budget is zero.
    #[error("Budget must be a positive integer")]
    ZeroBudget,

    /// A required field is absent or blank.
    #[error("Required field '{field}' is missing or empty")]
    MissingField {
        field: String,
    },

    /// Two items of the same kind share an id.
    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId {
        kind: &'static str,
        id: String,
    },

    /// The allocation step has no priorities.
    #[error("At least one priority is required")]
    NoPriorities,

    /// The flow has no stages.
    #[error("At least one stage is required")]
    NoStages,

    /// `bundles_per_stage` is zero.
    #[error("bundles_per_stage must be at least 1")]
    ZeroBundlesPerStage,

    /// A stage does not hold `bundles_per_stage` bundles.
    #[error("Stage {stage_index} has {actual} bundles, expected {expected}")]
    WrongBundleCount {
        stage_index: usize,
        expected: usize,
        actual: usize,
    },

    /// A bundle or goal lacks a schema attribute.
    #[error("'{owner}' has no value for attribute '{attribute}'")]
    MissingAttribute {
        owner: String,
        attribute: String,
    },

    /// A bundle or goal has an attribute outside the schema.
    #[error("'{owner}' has attribute '{attribute}' which is not in the stage schema")]
    UnknownAttribute {
        owner: String,
        attribute: String,
    },

    /// An attribute value falls outside its axis.
    #[error("'{owner}' attribute '{attribute}' = {value} is outside [{min}, {max}]")]
    AttributeOutOfRange {
        owner: String,
        attribute: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// An attribute axis is inverted or not finite.
    #[error("Attribute '{attribute}' has an invalid range [{min}, {max}]")]
    InvalidAttributeRange {
        attribute: String,
        min: f64,
        max: f64,
    },

    /// Depletion thresholds are out of order or outside `[0, 1]`.
    #[error("Depletion thresholds must satisfy 0 <= low < plenty <= 1 (low={low}, plenty={plenty})")]
    InvalidThresholds {
        low: f64,
        plenty: f64,
    },

    /// A rank slot of 0; slots are 1-based.
    #[error("Rank must be at least 1, got {rank}")]
    InvalidRankSlot {
        rank: usize,
    },

    /// A snapshot disagrees with the configuration it is restored against.
    #[error("Snapshot does not match configuration: {reason}")]
    SnapshotMismatch {
        reason: String,
    },
}

/// Conditions where an operation is attempted in a state that does not allow it.
///
/// These indicate a logic error in the orchestration around the engine, so they
/// are reported to the caller instead of being swallowed.
#[derive(Debug, Error)]
pub enum SessionStateError {
    /// The operation needs an active stage but every stage is confirmed.
    #[error("Cannot {operation}: session is complete")]
    SessionComplete {
        operation: &'static str,
    },

    /// The order to confirm is not a permutation of the stage's bundles.
    #[error("Stage {stage_index} cannot be confirmed: {reason}")]
    MalformedPermutation {
        stage_index: usize,
        reason: RejectReason,
    },
}

/// Top-level error type for prefsync.
#[derive(Debug, Error)]
pub enum ElicitError {
    /// Bad configuration or snapshot.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Operation not allowed in the current session state.
    #[error("Invalid session state: {0}")]
    InvalidSessionState(#[from] SessionStateError),

    /// Serialization or I/O failure.
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ElicitError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an invalid-session-state error.
    #[must_use]
    pub const fn is_invalid_session_state(&self) -> bool {
        matches!(self, Self::InvalidSessionState(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for prefsync operations.
pub type ElicitResult<T> = Result<T, ElicitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_over_budget_message() {
        let reason = RejectReason::OverBudget {
            prospective_total: 40,
            budget: 36,
        };
        let msg = format!("{reason}");
        assert!(msg.contains("40"));
        assert!(msg.contains("36"));
    }

    #[test]
    fn test_edit_outcome_predicates() {
        let ok = EditOutcome::Applied;
        assert!(ok.is_applied());
        assert!(ok.reason().is_none());

        let rejected = EditOutcome::rejected(RejectReason::NoGoalOverlay);
        assert!(rejected.is_rejected());
        assert_eq!(rejected.reason(), Some(&RejectReason::NoGoalOverlay));
    }

    #[test]
    fn test_edit_outcome_serializes_flat() {
        let rejected = EditOutcome::rejected(RejectReason::ValueExceedsBudget {
            value: 40,
            budget: 36,
        });
        let json = serde_json::to_value(&rejected).unwrap();
        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["reason"], "value_exceeds_budget");
        assert_eq!(json["value"], 40);
    }

    #[test]
    fn test_validation_error_bundle_count() {
        let err = ValidationError::WrongBundleCount {
            stage_index: 1,
            expected: 3,
            actual: 2,
        };
        let msg = format!("{err}");
        assert!(msg.contains("Stage 1"));
        assert!(msg.contains("expected 3"));
    }

    #[test]
    fn test_elicit_error_from_validation() {
        let err: ElicitError = ValidationError::ZeroBudget.into();
        assert!(err.is_validation());
        assert!(!err.is_invalid_session_state());
    }

    #[test]
    fn test_elicit_error_from_session_state() {
        let err: ElicitError = SessionStateError::SessionComplete {
            operation: "confirm_stage",
        }
        .into();
        assert!(err.is_invalid_session_state());
        let msg = format!("{err}");
        assert!(msg.contains("confirm_stage"));
        assert!(msg.contains("complete"));
    }

    #[test]
    fn test_elicit_error_internal() {
        let err = ElicitError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(format!("{err}").contains("unexpected state"));
    }
}
