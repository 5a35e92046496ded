//! Budget-conserving chip allocation.
//!
//! The respondent distributes a fixed number of indivisible chips across a set
//! of named priorities. Every edit is checked against the budget before it is
//! committed:
//!
//! ```text
//! prospective = total - old(priority) + new_value
//! prospective <= budget  => commit
//! otherwise              => no-op
//! ```
//!
//! A rejected edit is not an error. It comes from a live slider whose previous
//! position is always a valid fallback.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EditOutcome, RejectReason, ValidationError};

/// Stable priority identifier (e.g. `"sweetness"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityId(String);

impl PriorityId {
    /// Creates a priority id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PriorityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PriorityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PriorityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Configured priority (id + display label), before any chips are placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritySpec {
    /// Identifier, unique within the ledger.
    pub id: PriorityId,
    /// Display name.
    pub label: String,
}

impl PrioritySpec {
    /// Creates a priority spec.
    #[must_use]
    pub fn new(id: impl Into<PriorityId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A named allocation target competing for the shared budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    /// Identifier, unique within the ledger.
    pub id: PriorityId,
    /// Display name.
    pub label: String,
    allocation: u32,
}

impl Priority {
    /// Chips currently allocated to this priority.
    #[must_use]
    pub const fn allocation(&self) -> u32 {
        self.allocation
    }
}

/// Fractions of the budget that separate the depletion bands.
///
/// Purely presentational: the engine never consults these when deciding
/// whether an edit is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepletionThresholds {
    /// Remaining above `plenty * budget` is [`DepletionBand::Plenty`].
    pub plenty: f64,
    /// Remaining above `low * budget` is [`DepletionBand::Low`].
    pub low: f64,
}

impl Default for DepletionThresholds {
    fn default() -> Self {
        Self {
            plenty: 0.5,
            low: 0.2,
        }
    }
}

impl DepletionThresholds {
    /// Validate thresholds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.low) || !in_unit(self.plenty) || self.low >= self.plenty {
            return Err(ValidationError::InvalidThresholds {
                low: self.low,
                plenty: self.plenty,
            });
        }
        Ok(())
    }
}

/// Coarse indicator of how much of the budget is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepletionBand {
    /// At least `plenty` of the budget is left.
    Plenty,
    /// Between `low` and `plenty`.
    Low,
    /// Below `low`.
    Critical,
}

/// Owns the priorities of the allocation step and enforces
/// `sum(allocations) <= budget`.
///
/// # Examples
///
/// ```
/// use prefsync::{AllocationLedger, PriorityId, PrioritySpec};
///
/// let mut ledger = AllocationLedger::new(
///     36,
///     vec![PrioritySpec::new("a", "A"), PrioritySpec::new("b", "B")],
/// )?;
/// assert!(ledger.set_allocation(&PriorityId::new("a"), 20).is_applied());
/// assert!(ledger.set_allocation(&PriorityId::new("b"), 20).is_rejected());
/// assert_eq!(ledger.remaining(), 16);
/// # Ok::<(), prefsync::ValidationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationLedger {
    budget: u32,
    priorities: Vec<Priority>,
    thresholds: DepletionThresholds,
}

impl AllocationLedger {
    /// Creates a ledger with every allocation at zero.
    pub fn new(budget: u32, priorities: Vec<PrioritySpec>) -> Result<Self, ValidationError> {
        Self::with_thresholds(budget, priorities, DepletionThresholds::default())
    }

    /// Creates a ledger with custom depletion thresholds.
    pub fn with_thresholds(
        budget: u32,
        priorities: Vec<PrioritySpec>,
        thresholds: DepletionThresholds,
    ) -> Result<Self, ValidationError> {
        if budget == 0 {
            return Err(ValidationError::ZeroBudget);
        }
        if priorities.is_empty() {
            return Err(ValidationError::NoPriorities);
        }
        thresholds.validate()?;

        let mut seen = std::collections::HashSet::new();
        for spec in &priorities {
            if spec.id.as_str().trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: "priority.id".to_string(),
                });
            }
            if !seen.insert(spec.id.clone()) {
                return Err(ValidationError::DuplicateId {
                    kind: "priority",
                    id: spec.id.to_string(),
                });
            }
        }

        Ok(Self {
            budget,
            priorities: priorities
                .into_iter()
                .map(|spec| Priority {
                    id: spec.id,
                    label: spec.label,
                    allocation: 0,
                })
                .collect(),
            thresholds,
        })
    }

    /// Attempts to set one priority's allocation.
    ///
    /// Commits only if the resulting total stays within budget. On rejection
    /// every allocation is left exactly as it was.
    pub fn set_allocation(&mut self, priority_id: &PriorityId, new_value: u32) -> EditOutcome {
        if new_value > self.budget {
            debug!(%priority_id, new_value, budget = self.budget, "allocation rejected: value exceeds budget");
            return EditOutcome::rejected(RejectReason::ValueExceedsBudget {
                value: new_value,
                budget: self.budget,
            });
        }

        let total = self.total_allocated();
        let Some(priority) = self.priorities.iter_mut().find(|p| &p.id == priority_id) else {
            debug!(%priority_id, "allocation rejected: unknown priority");
            return EditOutcome::rejected(RejectReason::UnknownPriority {
                priority_id: priority_id.clone(),
            });
        };

        let prospective_total = total - u64::from(priority.allocation) + u64::from(new_value);
        if prospective_total > u64::from(self.budget) {
            debug!(
                %priority_id,
                new_value,
                prospective_total,
                budget = self.budget,
                "allocation rejected: over budget"
            );
            return EditOutcome::rejected(RejectReason::OverBudget {
                prospective_total,
                budget: self.budget,
            });
        }

        priority.allocation = new_value;
        debug!(%priority_id, new_value, prospective_total, "allocation committed");
        EditOutcome::Applied
    }

    /// Total chip budget (constant for the session).
    #[must_use]
    pub const fn budget(&self) -> u32 {
        self.budget
    }

    /// Sum of all allocations.
    #[must_use]
    pub fn total_allocated(&self) -> u64 {
        self.priorities.iter().map(|p| u64::from(p.allocation)).sum()
    }

    /// Chips not yet placed.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        // total <= budget is an invariant, so this never saturates in practice.
        let remaining = u64::from(self.budget).saturating_sub(self.total_allocated());
        u32::try_from(remaining).unwrap_or(0)
    }

    /// Current allocation of one priority.
    #[must_use]
    pub fn allocation(&self, priority_id: &PriorityId) -> Option<u32> {
        self.priorities
            .iter()
            .find(|p| &p.id == priority_id)
            .map(Priority::allocation)
    }

    /// All priorities in configured order.
    #[must_use]
    pub fn priorities(&self) -> &[Priority] {
        &self.priorities
    }

    /// Depletion thresholds used by [`Self::depletion_band`].
    #[must_use]
    pub const fn thresholds(&self) -> DepletionThresholds {
        self.thresholds
    }

    /// Presentation band for the remaining budget.
    #[must_use]
    pub fn depletion_band(&self) -> DepletionBand {
        let remaining = f64::from(self.remaining());
        let budget = f64::from(self.budget);
        if remaining > budget * self.thresholds.plenty {
            DepletionBand::Plenty
        } else if remaining > budget * self.thresholds.low {
            DepletionBand::Low
        } else {
            DepletionBand::Critical
        }
    }

    /// Rebuilds allocations from persisted `(priority, value)` pairs.
    ///
    /// Unlike [`Self::set_allocation`] this is all-or-nothing validation: a
    /// persisted record that violates the conservation invariant is corrupt,
    /// not a live edit to be dropped.
    pub(crate) fn load_allocations<'a>(
        &mut self,
        records: impl IntoIterator<Item = (&'a PriorityId, u32)>,
    ) -> Result<(), ValidationError> {
        let mut next = self.priorities.clone();
        let mut seen = std::collections::HashSet::new();
        for (id, value) in records {
            if !seen.insert(id.clone()) {
                return Err(ValidationError::DuplicateId {
                    kind: "allocation",
                    id: id.to_string(),
                });
            }
            let Some(priority) = next.iter_mut().find(|p| &p.id == id) else {
                return Err(ValidationError::SnapshotMismatch {
                    reason: format!("unknown priority '{id}'"),
                });
            };
            priority.allocation = value;
        }

        let total: u64 = next.iter().map(|p| u64::from(p.allocation)).sum();
        if total > u64::from(self.budget) {
            return Err(ValidationError::SnapshotMismatch {
                reason: format!("allocations total {total} exceeds budget {}", self.budget),
            });
        }
        self.priorities = next;
        Ok(())
    }
}
