//! Read-only snapshots consumed by rendering collaborators.
//!
//! The goal overlay is merged here: each ranked card gets one row per schema
//! attribute, and `goal` on that row is filled only while the overlay is
//! visible. Cards keep the ranking's order; merging never reorders.

use serde::{Deserialize, Serialize};

use crate::bundle::{AttributeSpec, Bundle, BundleId};
use crate::goal::GoalOverlay;
use crate::ledger::{AllocationLedger, DepletionBand, PriorityId};
use crate::rank::RankSlot;
use crate::session::SessionId;
use crate::stage::Stage;

/// One attribute line on a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRow {
    /// Attribute key.
    pub name: String,
    /// Display name.
    pub label: String,
    /// The bundle's value.
    pub value: f64,
    /// Goal target for comparison, present only while the overlay is shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<f64>,
    /// Lower end of the display axis.
    pub min: f64,
    /// Upper end of the display axis.
    pub max: f64,
}

/// A ranked bundle as shown to the respondent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleCard {
    /// Current slot.
    pub rank: RankSlot,
    /// e.g. `"1st Choice"`.
    pub rank_label: String,
    /// Bundle shown on the card.
    pub bundle_id: BundleId,
    /// Bundle display name.
    pub label: String,
    /// One row per schema attribute.
    pub rows: Vec<AttributeRow>,
}

/// The goal reference card. Always rendered when the stage has a goal; the
/// flag only controls whether the goal is overlaid on the ranked cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalCard {
    /// Goal display name.
    pub label: String,
    /// Whether goal values appear on the ranked cards.
    pub overlay_visible: bool,
    /// Target values; `goal` is unset on these rows.
    pub rows: Vec<AttributeRow>,
}

/// The ranking screen of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageView {
    /// 0-based stage position.
    pub stage_index: usize,
    /// Stage heading.
    pub title: String,
    /// Instruction text.
    pub prompt: String,
    /// Ranked cards, most preferred first.
    pub cards: Vec<BundleCard>,
    /// Reference card, when the stage has a goal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<GoalCard>,
}

impl StageView {
    /// Builds the display for a stage in its current rank order.
    #[must_use]
    pub fn from_stage(stage: &Stage) -> Self {
        let schema = stage.attributes();
        let overlay = stage.goal();
        Self {
            stage_index: stage.index(),
            title: stage.title().to_string(),
            prompt: stage.prompt().to_string(),
            cards: stage
                .ranking()
                .ranked()
                .map(|(rank, bundle)| bundle_card(rank, bundle, schema, overlay))
                .collect(),
            goal: overlay.map(|overlay| goal_card(overlay, schema)),
        }
    }
}

fn bundle_card(
    rank: RankSlot,
    bundle: &Bundle,
    schema: &[AttributeSpec],
    overlay: Option<&GoalOverlay>,
) -> BundleCard {
    BundleCard {
        rank,
        rank_label: rank.label(),
        bundle_id: bundle.id.clone(),
        label: bundle.label.clone(),
        rows: schema
            .iter()
            .filter_map(|spec| {
                let value = bundle.attribute(&spec.name)?;
                Some(AttributeRow {
                    name: spec.name.clone(),
                    label: spec.label.clone(),
                    value,
                    goal: overlay.and_then(|o| o.overlay_value(&spec.name)),
                    min: spec.min,
                    max: spec.max,
                })
            })
            .collect(),
    }
}

fn goal_card(overlay: &GoalOverlay, schema: &[AttributeSpec]) -> GoalCard {
    let goal = overlay.goal();
    GoalCard {
        label: goal.label.clone(),
        overlay_visible: overlay.is_visible(),
        rows: schema
            .iter()
            .filter_map(|spec| {
                Some(AttributeRow {
                    name: spec.name.clone(),
                    label: spec.label.clone(),
                    value: goal.attribute(&spec.name)?,
                    goal: None,
                    min: spec.min,
                    max: spec.max,
                })
            })
            .collect(),
    }
}

/// One slider on the allocation screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRow {
    /// Priority identifier.
    pub id: PriorityId,
    /// Display name.
    pub label: String,
    /// Chips currently placed.
    pub allocation: u32,
}

/// The allocation screen: priorities plus conservation feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerView {
    /// Total chips.
    pub budget: u32,
    /// Chips not yet placed.
    pub remaining: u32,
    /// Colour band for `remaining`.
    pub band: DepletionBand,
    /// Priorities in display order.
    pub priorities: Vec<PriorityRow>,
}

impl LedgerView {
    /// Captures the ledger's current allocations.
    #[must_use]
    pub fn from_ledger(ledger: &AllocationLedger) -> Self {
        Self {
            budget: ledger.budget(),
            remaining: ledger.remaining(),
            band: ledger.depletion_band(),
            priorities: ledger
                .priorities()
                .iter()
                .map(|p| PriorityRow {
                    id: p.id.clone(),
                    label: p.label.clone(),
                    allocation: p.allocation(),
                })
                .collect(),
        }
    }
}

/// Everything a renderer needs for the current screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    /// Session identifier.
    pub session_id: SessionId,
    /// Allocation screen.
    pub ledger: LedgerView,
    /// The active stage, absent once the session is complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageView>,
    /// Active stage index, `None` once complete.
    pub current_stage_index: Option<usize>,
    /// Total number of stages.
    pub stage_count: usize,
    /// e.g. `"Set 1 of 3"`.
    pub stage_label: String,
    /// Derived progress in `[0, 1]`.
    pub progress_fraction: f64,
    /// True once every stage is confirmed.
    pub is_complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElicitationConfig;

    fn stage(index: usize) -> Stage {
        let config = ElicitationConfig::demo();
        Stage::from_spec(index, &config.stages[index], config.bundles_per_stage).unwrap()
    }

    #[test]
    fn visible_goal_is_merged_into_every_row() {
        let view = StageView::from_stage(&stage(0));
        assert_eq!(view.cards.len(), 3);
        let first = &view.cards[0];
        assert_eq!(first.rank_label, "1st Choice");
        assert_eq!(first.bundle_id.as_str(), "optionA");
        let names: Vec<&str> = first.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["saltiness", "sweetness", "sourness"]);
        let goals: Vec<Option<f64>> = first.rows.iter().map(|r| r.goal).collect();
        assert_eq!(goals, [Some(4.0), Some(8.0), Some(3.0)]);

        let goal = view.goal.unwrap();
        assert!(goal.overlay_visible);
        assert!(goal.rows.iter().all(|r| r.goal.is_none()));
    }

    #[test]
    fn hidden_goal_clears_overlay_but_keeps_order() {
        let mut stage = stage(0);
        let shown = StageView::from_stage(&stage);
        stage.set_goal_visible(false);
        let hidden = StageView::from_stage(&stage);

        assert!(hidden.cards.iter().flat_map(|c| &c.rows).all(|r| r.goal.is_none()));
        let order = |v: &StageView| v.cards.iter().map(|c| c.bundle_id.clone()).collect::<Vec<_>>();
        assert_eq!(order(&shown), order(&hidden));
        assert!(!hidden.goal.unwrap().overlay_visible);
    }

    #[test]
    fn cards_follow_current_rank_order() {
        let mut stage = stage(1);
        let mut order = stage.ranking().ordered_ids();
        order.rotate_left(1);
        assert!(stage.reorder(&order).is_applied());
        let view = StageView::from_stage(&stage);
        let ids: Vec<BundleId> = view.cards.iter().map(|c| c.bundle_id.clone()).collect();
        assert_eq!(ids, order);
        assert_eq!(view.cards[2].rank.get(), 3);
        assert!(view.goal.is_none());
        assert_eq!(view.cards[0].rows[0].name, "cost");
        assert_eq!(view.cards[0].rows[0].max, 5000.0);
    }

    #[test]
    fn ledger_view_reports_remaining() {
        let config = ElicitationConfig::demo();
        let mut ledger = AllocationLedger::new(config.budget, config.priorities).unwrap();
        ledger.set_allocation(&PriorityId::new("sweetness"), 30);
        let view = LedgerView::from_ledger(&ledger);
        assert_eq!(view.remaining, 6);
        assert_eq!(view.band, DepletionBand::Critical);
        assert_eq!(view.priorities[0].allocation, 30);
    }
}
