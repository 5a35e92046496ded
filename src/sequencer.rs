//! Stage sequencing and progress accounting.
//!
//! ```text
//! Active(0) -> Active(1) -> ... -> Active(S-1) -> Complete
//! ```
//!
//! `Complete` is terminal. Progress is derived from the position on every call
//! and cannot be set independently.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SessionStateError, ValidationError};

/// Position in the stage flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum SequencerState {
    /// Stage `i` (0-based) is accepting reorders.
    Active(usize),
    /// Every stage has been confirmed.
    Complete,
}

/// Orders stages and governs advancement.
///
/// Only serializable. A persisted position comes back through
/// [`StageSequencer::resume`], which range-checks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSequencer {
    stage_count: usize,
    state: SequencerState,
}

impl StageSequencer {
    /// Creates a sequencer positioned at the first stage.
    pub fn new(stage_count: usize) -> Result<Self, ValidationError> {
        if stage_count == 0 {
            return Err(ValidationError::NoStages);
        }
        Ok(Self {
            stage_count,
            state: SequencerState::Active(0),
        })
    }

    /// Recreates a sequencer at a persisted position (`None` = complete).
    pub fn resume(stage_count: usize, current: Option<usize>) -> Result<Self, ValidationError> {
        let mut sequencer = Self::new(stage_count)?;
        sequencer.state = match current {
            Some(index) if index < stage_count => SequencerState::Active(index),
            Some(index) => {
                return Err(ValidationError::SnapshotMismatch {
                    reason: format!("stage index {index} out of range for {stage_count} stages"),
                })
            }
            None => SequencerState::Complete,
        };
        Ok(sequencer)
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SequencerState {
        self.state
    }

    /// Total number of stages (S).
    #[must_use]
    pub const fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// Index of the active stage, or `None` once complete.
    #[must_use]
    pub const fn current_index(&self) -> Option<usize> {
        match self.state {
            SequencerState::Active(index) => Some(index),
            SequencerState::Complete => None,
        }
    }

    /// Returns true once the terminal state is reached.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.state, SequencerState::Complete)
    }

    /// Number of stages confirmed so far.
    #[must_use]
    pub const fn completed_stages(&self) -> usize {
        match self.state {
            SequencerState::Active(index) => index,
            SequencerState::Complete => self.stage_count,
        }
    }

    /// Fraction of the flow reached, in `(0, 1]`.
    ///
    /// The terminal screen counts as one more step after the last stage, so
    /// stage `i` of `S` reports `(i + 1) / (S + 1)` and `Complete` reports
    /// exactly 1.0. For three stages this yields 25%, 50%, 75%, 100%.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_fraction(&self) -> f64 {
        let position = self.completed_stages();
        if position == self.stage_count {
            return 1.0;
        }
        (position + 1) as f64 / (self.stage_count + 1) as f64
    }

    /// Human-readable position, e.g. `"Set 2 of 3"`.
    #[must_use]
    pub fn stage_label(&self) -> String {
        match self.state {
            SequencerState::Active(index) => format!("Set {} of {}", index + 1, self.stage_count),
            SequencerState::Complete => "Complete".to_string(),
        }
    }

    /// Moves to the next stage, or to `Complete` from the last one.
    ///
    /// The caller is responsible for the respondent's explicit confirmation;
    /// the sequencer only refuses to leave the terminal state.
    pub fn advance(&mut self) -> Result<SequencerState, SessionStateError> {
        let next = match self.state {
            SequencerState::Active(index) if index + 1 < self.stage_count => {
                SequencerState::Active(index + 1)
            }
            SequencerState::Active(_) => SequencerState::Complete,
            SequencerState::Complete => {
                return Err(SessionStateError::SessionComplete { operation: "advance" })
            }
        };
        info!(from = ?self.state, to = ?next, "stage sequencer advanced");
        self.state = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_through_every_stage_then_completes() {
        let mut seq = StageSequencer::new(3).unwrap();
        assert_eq!(seq.current_index(), Some(0));
        assert_eq!(seq.stage_label(), "Set 1 of 3");

        assert_eq!(seq.advance().unwrap(), SequencerState::Active(1));
        assert_eq!(seq.advance().unwrap(), SequencerState::Active(2));
        assert_eq!(seq.advance().unwrap(), SequencerState::Complete);
        assert!(seq.is_complete());
        assert_eq!(seq.current_index(), None);
        assert_eq!(seq.completed_stages(), 3);
    }

    #[test]
    fn complete_is_terminal() {
        let mut seq = StageSequencer::new(1).unwrap();
        seq.advance().unwrap();
        assert!(matches!(
            seq.advance(),
            Err(SessionStateError::SessionComplete { .. })
        ));
        assert!(seq.is_complete());
    }

    #[test]
    fn progress_is_monotonic_and_reaches_one_only_at_complete() {
        let mut seq = StageSequencer::new(3).unwrap();
        let mut seen = vec![seq.progress_fraction()];
        while !seq.is_complete() {
            assert!(seq.progress_fraction() < 1.0);
            seq.advance().unwrap();
            seen.push(seq.progress_fraction());
        }
        assert_eq!(seen, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn single_stage_progress() {
        let mut seq = StageSequencer::new(1).unwrap();
        assert_eq!(seq.progress_fraction(), 0.5);
        seq.advance().unwrap();
        assert_eq!(seq.progress_fraction(), 1.0);
    }

    #[test]
    fn zero_stages_is_invalid() {
        assert!(matches!(StageSequencer::new(0), Err(ValidationError::NoStages)));
    }

    #[test]
    fn resume_validates_position() {
        assert_eq!(
            StageSequencer::resume(3, Some(2)).unwrap().state(),
            SequencerState::Active(2)
        );
        assert!(StageSequencer::resume(3, None).unwrap().is_complete());
        assert!(StageSequencer::resume(3, Some(3)).is_err());
    }

    #[test]
    fn persisted_position_past_the_end_is_refused() {
        let seq = StageSequencer::resume(3, Some(2)).unwrap();
        let json = serde_json::to_value(&seq).unwrap();
        assert_eq!(json["state"]["index"], 2);

        assert!(matches!(
            StageSequencer::resume(3, Some(7)),
            Err(ValidationError::SnapshotMismatch { .. })
        ));
    }

    #[test]
    fn state_serializes_tagged() {
        let json = serde_json::to_string(&SequencerState::Active(1)).unwrap();
        assert_eq!(json, r#"{"state":"active","index":1}"#);
        let json = serde_json::to_string(&SequencerState::Complete).unwrap();
        assert_eq!(json, r#"{"state":"complete"}"#);
    }
}
