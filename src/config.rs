//! Session configuration.
//!
//! Everything a session needs is passed in explicitly: budget, priorities,
//! stage count, bundles per stage, and each stage's attribute schema. There
//! are no module-level default option lists.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bundle::{validate_attribute_values, AttributeSpec, Bundle};
use crate::error::{ElicitError, ElicitResult, ValidationError};
use crate::goal::GoalBundle;
use crate::ledger::{DepletionThresholds, PrioritySpec};

const fn default_bundles_per_stage() -> usize {
    3
}

const fn default_true() -> bool {
    true
}

/// One ranking question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Stage heading.
    pub title: String,
    /// Instruction shown under the heading.
    #[serde(default)]
    pub prompt: String,
    /// Attribute schema, in display order.
    pub attributes: Vec<AttributeSpec>,
    /// Bundles in their initial order.
    pub bundles: Vec<Bundle>,
    /// Optional reference bundle. Never ranked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<GoalBundle>,
    /// Initial state of the goal overlay.
    #[serde(default = "default_true")]
    pub goal_visible_by_default: bool,
}

impl StageSpec {
    /// Validates this stage against the expected bundle count.
    pub fn validate(&self, stage_index: usize, bundles_per_stage: usize) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: format!("stages[{stage_index}].title"),
            });
        }
        if self.attributes.is_empty() {
            return Err(ValidationError::MissingField {
                field: format!("stages[{stage_index}].attributes"),
            });
        }
        let mut names = HashSet::new();
        for attribute in &self.attributes {
            attribute.validate()?;
            if !names.insert(attribute.name.as_str()) {
                return Err(ValidationError::DuplicateId {
                    kind: "attribute",
                    id: attribute.name.clone(),
                });
            }
        }

        if self.bundles.len() != bundles_per_stage {
            return Err(ValidationError::WrongBundleCount {
                stage_index,
                expected: bundles_per_stage,
                actual: self.bundles.len(),
            });
        }
        let mut ids = HashSet::new();
        for bundle in &self.bundles {
            if bundle.id.as_str().trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: format!("stages[{stage_index}].bundles[].id"),
                });
            }
            if !ids.insert(&bundle.id) {
                return Err(ValidationError::DuplicateId {
                    kind: "bundle",
                    id: bundle.id.to_string(),
                });
            }
            validate_attribute_values(bundle.id.as_str(), &bundle.attributes, &self.attributes)?;
        }

        if let Some(goal) = &self.goal {
            validate_attribute_values(&goal.label, &goal.attributes, &self.attributes)?;
        }
        Ok(())
    }
}

/// Full configuration of one elicitation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitationConfig {
    /// Total chips available in the allocation step.
    pub budget: u32,
    /// Priorities in display order.
    pub priorities: Vec<PrioritySpec>,
    /// Every stage must hold exactly this many bundles.
    #[serde(default = "default_bundles_per_stage")]
    pub bundles_per_stage: usize,
    /// Remaining-budget bands for the allocation display.
    #[serde(default)]
    pub depletion: DepletionThresholds,
    /// Ranking stages in flow order.
    pub stages: Vec<StageSpec>,
}

impl ElicitationConfig {
    /// Validate the whole configuration.
    ///
    /// This must pass before a session is constructed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.budget == 0 {
            return Err(ValidationError::ZeroBudget);
        }
        if self.priorities.is_empty() {
            return Err(ValidationError::NoPriorities);
        }
        let mut ids = HashSet::new();
        for priority in &self.priorities {
            if priority.id.as_str().trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: "priorities[].id".to_string(),
                });
            }
            if !ids.insert(&priority.id) {
                return Err(ValidationError::DuplicateId {
                    kind: "priority",
                    id: priority.id.to_string(),
                });
            }
        }
        self.depletion.validate()?;

        if self.bundles_per_stage == 0 {
            return Err(ValidationError::ZeroBundlesPerStage);
        }
        if self.stages.is_empty() {
            return Err(ValidationError::NoStages);
        }
        for (index, stage) in self.stages.iter().enumerate() {
            stage.validate(index, self.bundles_per_stage)?;
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(s: &str) -> ElicitResult<Self> {
        let config: Self = serde_json::from_str(s)
            .map_err(|e| ElicitError::internal(format!("deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> ElicitResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ElicitError::internal(format!("read config {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Serializes to pretty JSON.
    pub fn to_json_pretty(&self) -> ElicitResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ElicitError::internal(format!("serialize config: {e}")))
    }

    /// The flavour-formulation demonstration: 36 chips over nine priorities,
    /// then three ranking stages of three options each.
    #[must_use]
    pub fn demo() -> Self {
        let priorities = [
            ("sweetness", "Sweetness: Maximize"),
            ("sourness", "Sourness: Minimize"),
            ("thickness", "Thickness: 4"),
            ("cardboard", "Cardboard: Minimize"),
            ("saltiness", "Saltiness: 4"),
            ("stability", "Stability: Low"),
            ("shelf_life", "Shelf Life: Long"),
            ("vinegar_flavor", "Vinegar flavor: low"),
            ("tanginess", "Tanginess: high"),
        ]
        .into_iter()
        .map(|(id, label)| PrioritySpec::new(id, label))
        .collect();

        let taste = || {
            vec![
                AttributeSpec::new("saltiness", "Saltiness"),
                AttributeSpec::new("sweetness", "Sweetness"),
                AttributeSpec::new("sourness", "Sourness"),
            ]
        };
        let option = |id: &str, label: &str, values: &[(&str, f64)]| {
            values
                .iter()
                .fold(Bundle::new(id, label), |b, &(k, v)| b.with_attribute(k, v))
        };
        let taste_goal = GoalBundle::new("Goal")
            .with_attribute("saltiness", 4.0)
            .with_attribute("sweetness", 8.0)
            .with_attribute("sourness", 3.0);

        let stages = vec![
            StageSpec {
                title: "Outcome Prioritization".to_string(),
                prompt: "First, tune the importance of your top priorities.".to_string(),
                attributes: taste(),
                bundles: vec![
                    option("optionA", "Option A", &[("saltiness", 5.0), ("sweetness", 7.0), ("sourness", 3.0)]),
                    option("optionB", "Option B", &[("saltiness", 3.0), ("sweetness", 6.0), ("sourness", 5.0)]),
                    option("optionC", "Option C", &[("saltiness", 8.0), ("sweetness", 8.0), ("sourness", 2.0)]),
                ],
                goal: Some(taste_goal.clone()),
                goal_visible_by_default: true,
            },
            StageSpec {
                title: "Cost Tradeoffs".to_string(),
                prompt: "Now rank the options with cost in mind.".to_string(),
                attributes: vec![
                    AttributeSpec::new("cost", "Cost").with_range(0.0, 5000.0),
                    AttributeSpec::new("sweetness", "Sweetness"),
                    AttributeSpec::new("sourness", "Sourness"),
                ],
                bundles: vec![
                    option("optionA", "Option A", &[("cost", 1200.0), ("sweetness", 7.0), ("sourness", 3.0)]),
                    option("optionC", "Option C", &[("cost", 1500.0), ("sweetness", 6.0), ("sourness", 5.0)]),
                    option("optionB", "Option B", &[("cost", 950.0), ("sweetness", 8.0), ("sourness", 2.0)]),
                ],
                goal: None,
                goal_visible_by_default: false,
            },
            StageSpec {
                title: "Final Check".to_string(),
                prompt: "Drag the cards to arrange your ranking.".to_string(),
                attributes: taste(),
                bundles: vec![
                    option("optionA", "Option A", &[("saltiness", 5.0), ("sweetness", 7.0), ("sourness", 3.0)]),
                    option("optionC", "Option C", &[("saltiness", 3.0), ("sweetness", 6.0), ("sourness", 5.0)]),
                    option("optionB", "Option B", &[("saltiness", 8.0), ("sweetness", 8.0), ("sourness", 2.0)]),
                ],
                goal: Some(taste_goal),
                goal_visible_by_default: true,
            },
        ];

        Self {
            budget: 36,
            priorities,
            bundles_per_stage: default_bundles_per_stage(),
            depletion: DepletionThresholds::default(),
            stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_config_is_valid() {
        let config = ElicitationConfig::demo();
        config.validate().unwrap();
        assert_eq!(config.budget, 36);
        assert_eq!(config.priorities.len(), 9);
        assert_eq!(config.stages.len(), 3);
    }

    #[test]
    fn json_defaults_apply() {
        let json = r#"{
            "budget": 10,
            "priorities": [{"id": "a", "label": "A"}],
            "stages": [{
                "title": "T",
                "attributes": [{"name": "x", "label": "X"}],
                "bundles": [
                    {"id": "1", "label": "One", "attributes": {"x": 1}},
                    {"id": "2", "label": "Two", "attributes": {"x": 2}},
                    {"id": "3", "label": "Three", "attributes": {"x": 3}}
                ]
            }]
        }"#;
        let config = ElicitationConfig::from_json_str(json).unwrap();
        assert_eq!(config.bundles_per_stage, 3);
        assert_eq!(config.depletion, DepletionThresholds::default());
        assert!(config.stages[0].goal.is_none());
        assert!(config.stages[0].goal_visible_by_default);
    }

    #[test]
    fn rejects_wrong_bundle_count() {
        let mut config = ElicitationConfig::demo();
        config.stages[1].bundles.pop();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::WrongBundleCount {
                stage_index: 1,
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn bundles_per_stage_is_a_parameter() {
        let mut config = ElicitationConfig::demo();
        config.bundles_per_stage = 2;
        for stage in &mut config.stages {
            stage.bundles.truncate(2);
        }
        config.validate().unwrap();
    }

    #[test]
    fn rejects_goal_outside_schema() {
        let mut config = ElicitationConfig::demo();
        config.stages[0].goal = Some(GoalBundle::new("Goal").with_attribute("saltiness", 4.0));
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_priorities_and_empty_stages() {
        let mut config = ElicitationConfig::demo();
        config.priorities.push(PrioritySpec::new("sweetness", "again"));
        assert!(matches!(
            config.validate(),
            Err(ValidationError::DuplicateId { kind: "priority", .. })
        ));

        let mut config = ElicitationConfig::demo();
        config.stages.clear();
        assert!(matches!(config.validate(), Err(ValidationError::NoStages)));
    }

    #[test]
    fn malformed_json_is_internal_error() {
        let err = ElicitationConfig::from_json_str("{not json").unwrap_err();
        assert!(err.is_internal());
    }
}
