//! Goal reference bundle shown next to a stage's rankable options.
//!
//! The goal lives in its own type and its own field on the stage. It is never
//! a member of the [`RankableSet`](crate::rank::RankableSet), so toggling it
//! cannot add or remove an option from the permutation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A fixed reference bundle. Has no id because it is never ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalBundle {
    /// Display name of the reference card.
    #[serde(default = "default_goal_label")]
    pub label: String,
    /// Target values keyed by attribute name.
    pub attributes: BTreeMap<String, f64>,
}

fn default_goal_label() -> String {
    "Goal".to_string()
}

impl GoalBundle {
    /// Creates a goal with no attributes.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a target value.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Returns the target value of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).copied()
    }
}

/// A goal bundle plus its "compare" visibility flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalOverlay {
    goal: GoalBundle,
    visible: bool,
}

impl GoalOverlay {
    /// Creates an overlay.
    #[must_use]
    pub const fn new(goal: GoalBundle, visible: bool) -> Self {
        Self { goal, visible }
    }

    /// The reference bundle.
    #[must_use]
    pub const fn goal(&self) -> &GoalBundle {
        &self.goal
    }

    /// Whether the goal is overlaid on the ranked bundles' attribute display.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Shows or hides the overlay. Display state only.
    pub fn toggle_visible(&mut self, on: bool) {
        if self.visible != on {
            debug!(visible = on, "goal overlay toggled");
        }
        self.visible = on;
    }

    /// The goal value to overlay for `attribute`, or `None` while hidden.
    #[must_use]
    pub fn overlay_value(&self, attribute: &str) -> Option<f64> {
        if self.visible {
            self.goal.attribute(attribute)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal() -> GoalBundle {
        GoalBundle::new("Goal")
            .with_attribute("saltiness", 4.0)
            .with_attribute("sweetness", 8.0)
    }

    #[test]
    fn overlay_value_follows_visibility() {
        let mut overlay = GoalOverlay::new(goal(), true);
        assert_eq!(overlay.overlay_value("sweetness"), Some(8.0));

        overlay.toggle_visible(false);
        assert!(!overlay.is_visible());
        assert_eq!(overlay.overlay_value("sweetness"), None);
        // The goal itself is still available for its own reference card.
        assert_eq!(overlay.goal().attribute("sweetness"), Some(8.0));
    }

    #[test]
    fn goal_label_defaults_when_omitted() {
        let goal: GoalBundle = serde_json::from_str(r#"{"attributes":{"saltiness":4.0}}"#).unwrap();
        assert_eq!(goal.label, "Goal");
    }
}
