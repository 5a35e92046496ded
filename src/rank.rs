//! Ordinal ranking of a stage's bundles.
//!
//! Rank is purely positional: rank `k` is the bundle at sequence position `k`.
//! No rank is stored on the bundle itself, so the order and the ranks can
//! never disagree. Interactive dragging is sampled into discrete
//! [`RankableSet::reorder`] calls, each replacing the full order.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bundle::{Bundle, BundleId};
use crate::error::{EditOutcome, RejectReason, ValidationError};

/// A 1-based rank position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct RankSlot(usize);

impl RankSlot {
    /// The most preferred slot.
    pub const FIRST: Self = Self(1);

    /// Creates a slot from a 1-based rank. Returns `None` for 0.
    #[must_use]
    pub const fn new(rank: usize) -> Option<Self> {
        if rank == 0 {
            None
        } else {
            Some(Self(rank))
        }
    }

    /// Creates a slot from a 0-based sequence position.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index + 1)
    }

    /// The 1-based rank.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// The 0-based sequence position.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 - 1
    }

    /// Display label, e.g. `"1st Choice"`.
    #[must_use]
    pub fn label(self) -> String {
        format!("{self} Choice")
    }
}

impl TryFrom<usize> for RankSlot {
    type Error = ValidationError;

    fn try_from(rank: usize) -> Result<Self, Self::Error> {
        Self::new(rank).ok_or(ValidationError::InvalidRankSlot { rank })
    }
}

impl From<RankSlot> for usize {
    fn from(slot: RankSlot) -> Self {
        slot.0
    }
}

impl fmt::Display for RankSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        let suffix = match (n % 10, n % 100) {
            (_, 11..=13) => "th",
            (1, _) => "st",
            (2, _) => "nd",
            (3, _) => "rd",
            _ => "th",
        };
        write!(f, "{n}{suffix}")
    }
}

/// An ordered sequence of bundles forming a total order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankableSet {
    sequence: Vec<Bundle>,
}

impl RankableSet {
    /// Creates a set in the given initial order.
    pub fn new(bundles: Vec<Bundle>) -> Result<Self, ValidationError> {
        if bundles.is_empty() {
            return Err(ValidationError::MissingField {
                field: "bundles".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for bundle in &bundles {
            if bundle.id.as_str().trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: "bundle.id".to_string(),
                });
            }
            if !seen.insert(&bundle.id) {
                return Err(ValidationError::DuplicateId {
                    kind: "bundle",
                    id: bundle.id.to_string(),
                });
            }
        }
        Ok(Self { sequence: bundles })
    }

    /// Number of bundles (N).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Always false for a constructed set; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Bundles in rank order.
    #[must_use]
    pub fn bundles(&self) -> &[Bundle] {
        &self.sequence
    }

    /// Bundle ids in rank order.
    #[must_use]
    pub fn ordered_ids(&self) -> Vec<BundleId> {
        self.sequence.iter().map(|b| b.id.clone()).collect()
    }

    /// Bundles paired with their rank slot.
    pub fn ranked(&self) -> impl Iterator<Item = (RankSlot, &Bundle)> {
        self.sequence
            .iter()
            .enumerate()
            .map(|(i, b)| (RankSlot::from_index(i), b))
    }

    /// The bundle occupying `slot`.
    #[must_use]
    pub fn at(&self, slot: RankSlot) -> Option<&Bundle> {
        self.sequence.get(slot.index())
    }

    /// The slot a bundle currently occupies.
    #[must_use]
    pub fn rank_of(&self, bundle_id: &BundleId) -> Option<RankSlot> {
        self.sequence
            .iter()
            .position(|b| &b.id == bundle_id)
            .map(RankSlot::from_index)
    }

    /// Returns true if this set holds `bundle_id`.
    #[must_use]
    pub fn contains(&self, bundle_id: &BundleId) -> bool {
        self.sequence.iter().any(|b| &b.id == bundle_id)
    }

    /// Returns true if `ids` is a permutation of the held bundle ids.
    #[must_use]
    pub fn is_permutation(&self, ids: &[BundleId]) -> bool {
        if ids.len() != self.sequence.len() {
            return false;
        }
        let proposed: HashSet<&BundleId> = ids.iter().collect();
        proposed.len() == ids.len() && self.sequence.iter().all(|b| proposed.contains(&b.id))
    }

    /// Replaces the full order.
    ///
    /// `new_sequence` must be a permutation of the held ids. Anything else is
    /// a caller error and leaves the order unchanged.
    pub fn reorder(&mut self, new_sequence: &[BundleId]) -> EditOutcome {
        if !self.is_permutation(new_sequence) {
            warn!(
                expected_len = self.sequence.len(),
                actual_len = new_sequence.len(),
                "reorder rejected: not a permutation of the held bundles"
            );
            return EditOutcome::rejected(RejectReason::NotAPermutation {
                expected_len: self.sequence.len(),
                actual_len: new_sequence.len(),
            });
        }

        let target: HashMap<&BundleId, usize> = new_sequence
            .iter()
            .enumerate()
            .map(|(pos, id)| (id, pos))
            .collect();
        self.sequence
            .sort_by_key(|b| target.get(&b.id).copied().unwrap_or(usize::MAX));
        debug!(order = ?new_sequence, "reorder committed");
        EditOutcome::Applied
    }

    /// Moves one bundle to `slot`, shifting the others. Models a single drag.
    pub fn move_to(&mut self, bundle_id: &BundleId, slot: RankSlot) -> EditOutcome {
        let Some(from) = self.rank_of(bundle_id) else {
            return EditOutcome::rejected(RejectReason::UnknownBundle {
                bundle_id: bundle_id.clone(),
            });
        };
        if slot.get() > self.sequence.len() {
            return EditOutcome::rejected(RejectReason::SlotOutOfRange {
                slot: slot.get(),
                len: self.sequence.len(),
            });
        }

        let mut order = self.ordered_ids();
        let moved = order.remove(from.index());
        order.insert(slot.index(), moved);
        self.reorder(&order)
    }
}
