//! Respondent actions as data.
//!
//! A recorded event log (one JSON object per line) can be replayed against a
//! fresh session to reproduce its state deterministically.

use serde::{Deserialize, Serialize};

use crate::bundle::BundleId;
use crate::error::{EditOutcome, ElicitError};
use crate::ledger::PriorityId;
use crate::session::StageResult;

/// One committed respondent action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Sets one priority's chip count.
    SetAllocation {
        /// Target priority.
        priority_id: PriorityId,
        /// New chip count.
        value: u32,
    },
    /// Replaces the active stage's full order.
    Reorder {
        /// Proposed order, most preferred first.
        order: Vec<BundleId>,
    },
    /// Single-card drag.
    MoveBundle {
        /// Bundle being dragged.
        bundle_id: BundleId,
        /// 1-based destination rank.
        rank: usize,
    },
    /// Shows or hides the active stage's goal overlay.
    SetGoalVisible {
        /// Desired overlay state.
        visible: bool,
    },
    /// Confirms the active stage.
    ConfirmStage,
}

impl Command {
    /// Short operation name, used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetAllocation { .. } => "set_allocation",
            Self::Reorder { .. } => "reorder",
            Self::MoveBundle { .. } => "move_bundle",
            Self::SetGoalVisible { .. } => "set_goal_visible",
            Self::ConfirmStage => "confirm_stage",
        }
    }
}

/// What applying a [`Command`] produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// An edit was applied or rejected.
    Edit {
        /// Applied or the rejection reason.
        #[serde(flatten)]
        outcome: EditOutcome,
    },
    /// A stage was confirmed.
    Confirmed {
        /// The frozen ranking.
        result: StageResult,
    },
}

/// Parses a JSON Lines event log. Blank lines and `#` comments are skipped.
pub fn parse_command_log(input: &str) -> Result<Vec<Command>, ElicitError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| ElicitError::internal(format!("command log line {}: {e}", n + 1)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_commands() {
        let log = r#"
# allocation step
{"op":"set_allocation","priority_id":"sweetness","value":12}
{"op":"reorder","order":["optionC","optionA","optionB"]}

{"op":"move_bundle","bundle_id":"optionB","rank":1}
{"op":"set_goal_visible","visible":false}
{"op":"confirm_stage"}
"#;
        let commands = parse_command_log(log).unwrap();
        assert_eq!(commands.len(), 5);
        assert_eq!(
            commands[0],
            Command::SetAllocation {
                priority_id: PriorityId::new("sweetness"),
                value: 12
            }
        );
        assert_eq!(commands[4], Command::ConfirmStage);
        assert_eq!(commands[2].name(), "move_bundle");
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_command_log("{\"op\":\"confirm_stage\"}\n{\"op\":\"explode\"}").unwrap_err();
        assert!(err.is_internal());
        assert!(format!("{err}").contains("line 2"));
    }
}
