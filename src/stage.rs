//! A single ranking stage: schema, rankable bundles, optional goal overlay.

use serde::Serialize;
use tracing::debug;

use crate::bundle::{AttributeSpec, Bundle, BundleId};
use crate::config::StageSpec;
use crate::error::{EditOutcome, RejectReason, ValidationError};
use crate::goal::GoalOverlay;
use crate::rank::{RankSlot, RankableSet};

/// One stage of the ranking flow.
///
/// The stage exclusively owns its bundles and the rank bijection. Once
/// confirmed it is frozen and every edit is rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    index: usize,
    title: String,
    prompt: String,
    attributes: Vec<AttributeSpec>,
    ranking: RankableSet,
    goal: Option<GoalOverlay>,
    original_order: Vec<BundleId>,
    frozen: bool,
}

impl Stage {
    /// Builds a stage from its validated spec.
    pub fn from_spec(
        index: usize,
        spec: &StageSpec,
        bundles_per_stage: usize,
    ) -> Result<Self, ValidationError> {
        spec.validate(index, bundles_per_stage)?;
        let ranking = RankableSet::new(spec.bundles.clone())?;
        Ok(Self {
            index,
            title: spec.title.clone(),
            prompt: spec.prompt.clone(),
            attributes: spec.attributes.clone(),
            original_order: ranking.ordered_ids(),
            ranking,
            goal: spec
                .goal
                .clone()
                .map(|goal| GoalOverlay::new(goal, spec.goal_visible_by_default)),
            frozen: false,
        })
    }

    /// 0-based position in the flow.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Stage heading.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Instruction shown under the heading.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Attribute schema in display order.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    /// Current ranking.
    #[must_use]
    pub const fn ranking(&self) -> &RankableSet {
        &self.ranking
    }

    /// Bundles in current rank order.
    #[must_use]
    pub fn bundles(&self) -> &[Bundle] {
        self.ranking.bundles()
    }

    /// Bundle ids in the order the stage was initialized with.
    #[must_use]
    pub fn original_order(&self) -> &[BundleId] {
        &self.original_order
    }

    /// The goal overlay, if this stage has one.
    #[must_use]
    pub const fn goal(&self) -> Option<&GoalOverlay> {
        self.goal.as_ref()
    }

    /// True once the stage has been confirmed.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Replaces the full order.
    pub fn reorder(&mut self, order: &[BundleId]) -> EditOutcome {
        if self.frozen {
            return self.frozen_rejection();
        }
        self.ranking.reorder(order)
    }

    /// Moves one bundle to `slot`.
    pub fn move_bundle(&mut self, bundle_id: &BundleId, slot: RankSlot) -> EditOutcome {
        if self.frozen {
            return self.frozen_rejection();
        }
        self.ranking.move_to(bundle_id, slot)
    }

    /// Shows or hides the goal overlay. Never touches the ranking.
    pub fn set_goal_visible(&mut self, on: bool) -> EditOutcome {
        match &mut self.goal {
            Some(overlay) => {
                overlay.toggle_visible(on);
                EditOutcome::Applied
            }
            None => EditOutcome::rejected(RejectReason::NoGoalOverlay),
        }
    }

    /// Freezes the stage and returns its final order.
    pub(crate) fn freeze(&mut self) -> Vec<BundleId> {
        self.frozen = true;
        let order = self.ranking.ordered_ids();
        debug!(stage_index = self.index, ?order, "stage frozen");
        order
    }

    /// Restores a persisted order; used when rebuilding from a snapshot.
    pub(crate) fn restore(
        &mut self,
        order: &[BundleId],
        goal_visible: Option<bool>,
        frozen: bool,
    ) -> Result<(), ValidationError> {
        if self.ranking.reorder(order).is_rejected() {
            return Err(ValidationError::SnapshotMismatch {
                reason: format!("stage {} order is not a permutation of its bundles", self.index),
            });
        }
        if let (Some(overlay), Some(visible)) = (&mut self.goal, goal_visible) {
            overlay.toggle_visible(visible);
        }
        self.frozen = frozen;
        Ok(())
    }

    fn frozen_rejection(&self) -> EditOutcome {
        EditOutcome::rejected(RejectReason::StageFrozen {
            stage_index: self.index,
        })
    }
}
