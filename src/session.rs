//! Elicitation session: allocation ledger + staged ranking flow.
//!
//! The session is the sole writer of the current stage index and the
//! accumulated results. Every mutating operation takes `&mut self`, so edits
//! are serialized and atomic with respect to one another.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bundle::BundleId;
use crate::chat::ChatTranscript;
use crate::command::{Command, CommandOutcome};
use crate::config::ElicitationConfig;
use crate::error::{
    EditOutcome, ElicitError, ElicitResult, RejectReason, SessionStateError, ValidationError,
};
use crate::ledger::{AllocationLedger, PriorityId};
use crate::rank::RankSlot;
use crate::sequencer::StageSequencer;
use crate::snapshot::{AllocationRecord, SessionSnapshot, StageRecord};
use crate::stage::Stage;
use crate::view::{LedgerView, SessionView, StageView};

/// Unique identifier of one respondent's pass through the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frozen ranking of one confirmed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage the ranking belongs to.
    pub stage_index: usize,
    /// Most preferred first.
    pub ordered_bundle_ids: Vec<BundleId>,
    /// When the stage was confirmed.
    pub confirmed_at: DateTime<Utc>,
}

/// One respondent's pass through allocation and ranking.
///
/// # Examples
///
/// ```
/// use prefsync::{BundleId, ElicitationConfig, ElicitationSession};
///
/// let mut session = ElicitationSession::new(&ElicitationConfig::demo())?;
/// let order: Vec<BundleId> = ["optionC", "optionA", "optionB"]
///     .into_iter()
///     .map(BundleId::new)
///     .collect();
/// assert!(session.reorder(&order)?.is_applied());
///
/// let result = session.confirm_stage()?;
/// assert_eq!(result.stage_index, 0);
/// assert_eq!(result.ordered_bundle_ids, order);
/// assert_eq!(session.current_stage_index(), Some(1));
/// # Ok::<(), prefsync::ElicitError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ElicitationSession {
    id: SessionId,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    ledger: AllocationLedger,
    stages: Vec<Stage>,
    sequencer: StageSequencer,
    results: Vec<StageResult>,
    chat: ChatTranscript,
}

impl ElicitationSession {
    /// Starts a session at the first stage with an empty ledger.
    pub fn new(config: &ElicitationConfig) -> ElicitResult<Self> {
        let session = Self::build(config)?;
        info!(
            session_id = %session.id,
            budget = config.budget,
            stage_count = session.stages.len(),
            "elicitation session started"
        );
        Ok(session)
    }

    fn build(config: &ElicitationConfig) -> ElicitResult<Self> {
        config.validate()?;

        let ledger = AllocationLedger::with_thresholds(
            config.budget,
            config.priorities.clone(),
            config.depletion,
        )?;
        let stages = config
            .stages
            .iter()
            .enumerate()
            .map(|(index, spec)| Stage::from_spec(index, spec, config.bundles_per_stage))
            .collect::<Result<Vec<_>, _>>()?;
        let sequencer = StageSequencer::new(stages.len())?;

        Ok(Self {
            id: SessionId::new(),
            started_at: Utc::now(),
            completed_at: None,
            ledger,
            stages,
            sequencer,
            results: Vec::new(),
            chat: ChatTranscript::new(),
        })
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// When the session was created.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the last stage was confirmed.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    // ---------------------------------------------------------------------
    // Allocation
    // ---------------------------------------------------------------------

    /// The allocation step's ledger.
    #[must_use]
    pub const fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    /// Routes an allocation edit to the ledger. Over-budget edits are
    /// rejected silently.
    pub fn set_allocation(&mut self, priority_id: &PriorityId, value: u32) -> EditOutcome {
        self.ledger.set_allocation(priority_id, value)
    }

    // ---------------------------------------------------------------------
    // Navigation surface
    // ---------------------------------------------------------------------

    /// Index of the active stage, `None` once complete.
    #[must_use]
    pub const fn current_stage_index(&self) -> Option<usize> {
        self.sequencer.current_index()
    }

    /// Returns true once every stage is confirmed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.sequencer.is_complete()
    }

    /// Derived from the sequencer position on every call.
    #[must_use]
    pub fn progress_fraction(&self) -> f64 {
        self.sequencer.progress_fraction()
    }

    /// e.g. `"Set 2 of 3"`.
    #[must_use]
    pub fn stage_label(&self) -> String {
        self.sequencer.stage_label()
    }

    /// Stage position and progress state.
    #[must_use]
    pub const fn sequencer(&self) -> &StageSequencer {
        &self.sequencer
    }

    // ---------------------------------------------------------------------
    // Stages
    // ---------------------------------------------------------------------

    /// All stages in flow order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stage by 0-based index.
    #[must_use]
    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// The stage currently accepting reorders.
    #[must_use]
    pub fn active_stage(&self) -> Option<&Stage> {
        self.current_stage_index().and_then(|i| self.stages.get(i))
    }

    fn active_stage_mut(&mut self, operation: &'static str) -> ElicitResult<&mut Stage> {
        let index = self
            .sequencer
            .current_index()
            .ok_or(SessionStateError::SessionComplete { operation })?;
        self.stages
            .get_mut(index)
            .ok_or_else(|| ElicitError::internal(format!("active stage {index} missing")))
    }

    /// Replaces the active stage's order. A non-permutation is a silent no-op.
    pub fn reorder(&mut self, order: &[BundleId]) -> ElicitResult<EditOutcome> {
        Ok(self.active_stage_mut("reorder")?.reorder(order))
    }

    /// Drags one bundle of the active stage to `slot`.
    pub fn move_bundle(&mut self, bundle_id: &BundleId, slot: RankSlot) -> ElicitResult<EditOutcome> {
        Ok(self.active_stage_mut("move_bundle")?.move_bundle(bundle_id, slot))
    }

    /// Shows or hides the active stage's goal overlay.
    pub fn set_goal_visible(&mut self, visible: bool) -> ElicitResult<EditOutcome> {
        Ok(self.active_stage_mut("set_goal_visible")?.set_goal_visible(visible))
    }

    // ---------------------------------------------------------------------
    // Confirmation
    // ---------------------------------------------------------------------

    /// Freezes the active stage's order, records it, and advances.
    ///
    /// # Errors
    ///
    /// `InvalidSessionState` if the session is already complete. Nothing is
    /// appended in that case.
    pub fn confirm_stage(&mut self) -> ElicitResult<StageResult> {
        let stage = self.active_stage_mut("confirm_stage")?;
        let stage_index = stage.index();

        // Always holds via RankableSet; never record a broken bijection.
        let original: HashSet<&BundleId> = stage.original_order().iter().collect();
        let current = stage.ranking().ordered_ids();
        if current.len() != original.len() || !current.iter().all(|id| original.contains(id)) {
            return Err(SessionStateError::MalformedPermutation {
                stage_index,
                reason: RejectReason::NotAPermutation {
                    expected_len: original.len(),
                    actual_len: current.len(),
                },
            }
            .into());
        }

        let ordered_bundle_ids = stage.freeze();
        let result = StageResult {
            stage_index,
            ordered_bundle_ids,
            confirmed_at: Utc::now(),
        };
        self.results.push(result.clone());
        self.sequencer.advance()?;

        info!(
            session_id = %self.id,
            stage_index,
            order = ?result.ordered_bundle_ids,
            progress = self.sequencer.progress_fraction(),
            "stage confirmed"
        );
        if self.sequencer.is_complete() {
            self.completed_at = Some(result.confirmed_at);
            info!(session_id = %self.id, stages = self.results.len(), "elicitation session complete");
        }
        Ok(result)
    }

    /// Applies `order` and confirms in one step.
    ///
    /// Unlike [`Self::reorder`], a malformed permutation here is reported as
    /// `InvalidSessionState` and the stage is left untouched.
    pub fn confirm_order(&mut self, order: &[BundleId]) -> ElicitResult<StageResult> {
        let stage = self.active_stage_mut("confirm_order")?;
        let stage_index = stage.index();
        if let EditOutcome::Rejected { reason } = stage.reorder(order) {
            warn!(stage_index, %reason, "confirmation with malformed order");
            return Err(SessionStateError::MalformedPermutation {
                stage_index,
                reason,
            }
            .into());
        }
        self.confirm_stage()
    }

    /// Frozen rankings, one per confirmed stage, in stage order.
    #[must_use]
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Applies one recorded respondent action.
    pub fn apply(&mut self, command: Command) -> ElicitResult<CommandOutcome> {
        debug!(op = command.name(), "applying command");
        let outcome = match command {
            Command::SetAllocation { priority_id, value } => self.set_allocation(&priority_id, value),
            Command::Reorder { order } => self.reorder(&order)?,
            Command::MoveBundle { bundle_id, rank } => match RankSlot::new(rank) {
                Some(slot) => self.move_bundle(&bundle_id, slot)?,
                None => {
                    let len = self.active_stage().map_or(0, |s| s.ranking().len());
                    // Surface the completed-session error before the slot error.
                    self.active_stage_mut("move_bundle")?;
                    EditOutcome::rejected(RejectReason::SlotOutOfRange { slot: rank, len })
                }
            },
            Command::SetGoalVisible { visible } => self.set_goal_visible(visible)?,
            Command::ConfirmStage => {
                return Ok(CommandOutcome::Confirmed {
                    result: self.confirm_stage()?,
                })
            }
        };
        Ok(CommandOutcome::Edit { outcome })
    }

    // ---------------------------------------------------------------------
    // Collaborator surfaces
    // ---------------------------------------------------------------------

    /// The side-panel transcript.
    #[must_use]
    pub const fn chat(&self) -> &ChatTranscript {
        &self.chat
    }

    /// Mutable transcript access for appending messages.
    pub fn chat_mut(&mut self) -> &mut ChatTranscript {
        &mut self.chat
    }

    /// Read-only snapshot for rendering.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            ledger: LedgerView::from_ledger(&self.ledger),
            stage: self.active_stage().map(StageView::from_stage),
            current_stage_index: self.current_stage_index(),
            stage_count: self.stages.len(),
            stage_label: self.stage_label(),
            progress_fraction: self.progress_fraction(),
            is_complete: self.is_complete(),
        }
    }

    /// Persistable state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            started_at: self.started_at,
            completed_at: self.completed_at,
            budget: self.ledger.budget(),
            allocations: self
                .ledger
                .priorities()
                .iter()
                .map(|p| AllocationRecord {
                    priority_id: p.id.clone(),
                    value: p.allocation(),
                })
                .collect(),
            stages: self
                .stages
                .iter()
                .map(|stage| StageRecord {
                    stage_index: stage.index(),
                    bundles: stage.bundles().to_vec(),
                    order: stage.ranking().ordered_ids(),
                    goal_visible: stage.goal().map(|g| g.is_visible()),
                })
                .collect(),
            current_stage_index: self.current_stage_index(),
            completed_results: self.results.clone(),
            chat: self.chat.clone(),
        }
    }

    /// Rebuilds a session from a snapshot, re-validating every invariant
    /// against `config`.
    pub fn restore(config: &ElicitationConfig, snapshot: SessionSnapshot) -> ElicitResult<Self> {
        let mut session = Self::build(config)?;
        let mismatch = |reason: String| ElicitError::from(ValidationError::SnapshotMismatch { reason });

        if snapshot.budget != config.budget {
            return Err(mismatch(format!(
                "budget {} differs from configured {}",
                snapshot.budget, config.budget
            )));
        }
        session.ledger.load_allocations(
            snapshot
                .allocations
                .iter()
                .map(|record| (&record.priority_id, record.value)),
        )?;

        if snapshot.stages.len() != session.stages.len() {
            return Err(mismatch(format!(
                "{} stages recorded, {} configured",
                snapshot.stages.len(),
                session.stages.len()
            )));
        }

        let sequencer = StageSequencer::resume(session.stages.len(), snapshot.current_stage_index)?;
        let completed = sequencer.completed_stages();
        if snapshot.completed_results.len() != completed {
            return Err(mismatch(format!(
                "{} results recorded for {completed} completed stages",
                snapshot.completed_results.len()
            )));
        }

        for (position, record) in snapshot.stages.iter().enumerate() {
            let stage = &mut session.stages[position];
            if record.stage_index != position {
                return Err(mismatch(format!(
                    "stage record {position} claims index {}",
                    record.stage_index
                )));
            }
            if record.bundles.as_slice() != stage.bundles() {
                // Bundles are immutable; compare as a set since order may differ.
                let recorded: HashSet<&BundleId> = record.bundles.iter().map(|b| &b.id).collect();
                let configured: HashSet<&BundleId> = stage.original_order().iter().collect();
                if recorded != configured
                    || record.bundles.iter().any(|b| !stage.bundles().contains(b))
                {
                    return Err(mismatch(format!("stage {position} bundles differ from configuration")));
                }
            }
            stage.restore(&record.order, record.goal_visible, position < completed)?;
        }

        for (position, result) in snapshot.completed_results.iter().enumerate() {
            let stage = &session.stages[position];
            if result.stage_index != position || result.ordered_bundle_ids != stage.ranking().ordered_ids() {
                return Err(mismatch(format!(
                    "result {position} does not match the frozen order of stage {position}"
                )));
            }
        }

        if sequencer.is_complete() != snapshot.completed_at.is_some() {
            return Err(mismatch("completed_at does not match session state".to_string()));
        }

        session.id = snapshot.session_id;
        session.started_at = snapshot.started_at;
        session.completed_at = snapshot.completed_at;
        session.sequencer = sequencer;
        session.results = snapshot.completed_results;
        session.chat = snapshot.chat;
        info!(
            session_id = %session.id,
            current_stage_index = ?session.current_stage_index(),
            "elicitation session restored"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    fn ids(names: &[&str]) -> Vec<BundleId> {
        names.iter().map(|n| BundleId::new(*n)).collect()
    }

    fn demo() -> ElicitationSession {
        ElicitationSession::new(&ElicitationConfig::demo()).unwrap()
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn confirm_records_order_and_advances() {
        let mut session = demo();
        let order = ids(&["optionC", "optionA", "optionB"]);
        assert!(session.reorder(&order).unwrap().is_applied());

        let result = session.confirm_stage().unwrap();
        assert_eq!(result.stage_index, 0);
        assert_eq!(result.ordered_bundle_ids, order);
        assert_eq!(session.current_stage_index(), Some(1));
        assert!(session.stage(0).unwrap().is_frozen());
        assert_eq!(session.results().len(), 1);
    }

    #[test]
    fn confirm_after_complete_is_rejected_without_append() {
        let mut session = demo();
        for _ in 0..3 {
            session.confirm_stage().unwrap();
        }
        assert!(session.is_complete());
        assert!(session.completed_at().is_some());
        assert_eq!(session.progress_fraction(), 1.0);

        let err = session.confirm_stage().unwrap_err();
        assert!(err.is_invalid_session_state());
        assert_eq!(session.results().len(), 3);

        assert!(session.reorder(&ids(&["optionA"])).unwrap_err().is_invalid_session_state());
        assert!(session.set_goal_visible(true).unwrap_err().is_invalid_session_state());
    }

    #[test]
    fn confirm_order_reports_malformed_permutation() {
        let mut session = demo();
        let err = session
            .confirm_order(&ids(&["optionA", "optionA", "optionB"]))
            .unwrap_err();
        assert!(matches!(
            err,
            ElicitError::InvalidSessionState(SessionStateError::MalformedPermutation {
                stage_index: 0,
                ..
            })
        ));
        assert_eq!(session.current_stage_index(), Some(0));
        assert!(session.results().is_empty());
        assert!(!session.stage(0).unwrap().is_frozen());
    }

    #[test]
    fn confirm_order_applies_then_confirms() {
        let mut session = demo();
        let order = ids(&["optionB", "optionC", "optionA"]);
        let result = session.confirm_order(&order).unwrap();
        assert_eq!(result.ordered_bundle_ids, order);
    }

    #[test]
    fn goal_toggle_is_scoped_to_active_stage() {
        let mut session = demo();
        assert!(session.set_goal_visible(false).unwrap().is_applied());
        let before = session.active_stage().unwrap().ranking().ordered_ids();
        session.confirm_stage().unwrap();
        assert_eq!(session.results()[0].ordered_bundle_ids, before);
        // Stage 1 (cost) has no goal.
        assert!(session.set_goal_visible(true).unwrap().is_rejected());
    }

    #[test]
    fn apply_routes_commands() {
        let mut session = demo();
        let outcome = session
            .apply(Command::SetAllocation {
                priority_id: PriorityId::new("sweetness"),
                value: 40,
            })
            .unwrap();
        assert!(matches!(
            outcome,
            CommandOutcome::Edit { outcome } if outcome.is_rejected()
        ));

        let outcome = session
            .apply(Command::MoveBundle {
                bundle_id: BundleId::new("optionC"),
                rank: 0,
            })
            .unwrap();
        assert!(matches!(
            outcome,
            CommandOutcome::Edit { outcome: EditOutcome::Rejected { reason: RejectReason::SlotOutOfRange { slot: 0, len: 3 } } }
        ));

        session
            .apply(Command::MoveBundle {
                bundle_id: BundleId::new("optionC"),
                rank: 1,
            })
            .unwrap();
        let CommandOutcome::Confirmed { result } = session.apply(Command::ConfirmStage).unwrap() else {
            panic!("expected CommandOutcome::Confirmed");
        };
        assert_eq!(result.ordered_bundle_ids, ids(&["optionC", "optionA", "optionB"]));
    }

    #[test]
    fn view_tracks_active_stage() {
        let mut session = demo();
        let view = session.view();
        assert_eq!(view.stage_label, "Set 1 of 3");
        assert_eq!(view.progress_fraction, 0.25);
        assert_eq!(view.stage.as_ref().unwrap().stage_index, 0);

        for _ in 0..3 {
            session.confirm_stage().unwrap();
        }
        let view = session.view();
        assert!(view.is_complete);
        assert!(view.stage.is_none());
        assert_eq!(view.current_stage_index, None);
    }

    #[test]
    fn restore_roundtrips_mid_session() {
        let config = ElicitationConfig::demo();
        let mut session = ElicitationSession::new(&config).unwrap();
        session.set_allocation(&PriorityId::new("tanginess"), 12);
        session.confirm_order(&ids(&["optionC", "optionB", "optionA"])).unwrap();
        session.set_goal_visible(true).unwrap();
        session.chat_mut().push_user("cost matters most");

        let restored = ElicitationSession::restore(&config, session.snapshot()).unwrap();
        assert_eq!(restored.id(), session.id());
        assert_eq!(restored.current_stage_index(), Some(1));
        assert_eq!(restored.results(), session.results());
        assert_eq!(restored.ledger().allocation(&PriorityId::new("tanginess")), Some(12));
        assert!(restored.stage(0).unwrap().is_frozen());
        assert!(!restored.stage(1).unwrap().is_frozen());
        assert_eq!(restored.chat().len(), 1);
        assert_eq!(restored.snapshot(), session.snapshot());
    }

    #[test]
    fn restore_logs_only_the_restored_id() {
        let config = ElicitationConfig::demo();
        let session = demo();
        let snapshot = session.snapshot();

        let logs = capture_logs(|| {
            ElicitationSession::restore(&config, snapshot).unwrap();
        });
        assert!(logs.contains("elicitation session restored"));
        assert!(logs.contains(&session.id().to_string()));
        assert!(!logs.contains("elicitation session started"));
    }

    #[test]
    fn restore_rejects_stage_index_past_the_end() {
        let config = ElicitationConfig::demo();
        let mut snapshot = demo().snapshot();
        snapshot.current_stage_index = Some(7);
        let err = ElicitationSession::restore(&config, snapshot).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn restore_rejects_over_budget_allocations() {
        let config = ElicitationConfig::demo();
        let session = ElicitationSession::new(&config).unwrap();
        let mut snapshot = session.snapshot();
        snapshot.allocations[0].value = 30;
        snapshot.allocations[1].value = 30;
        let err = ElicitationSession::restore(&config, snapshot).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn restore_rejects_inconsistent_results() {
        let config = ElicitationConfig::demo();
        let mut session = ElicitationSession::new(&config).unwrap();
        session.confirm_stage().unwrap();

        let mut snapshot = session.snapshot();
        snapshot.completed_results.clear();
        assert!(ElicitationSession::restore(&config, snapshot).is_err());

        let mut snapshot = session.snapshot();
        snapshot.completed_results[0].ordered_bundle_ids.reverse();
        assert!(ElicitationSession::restore(&config, snapshot).is_err());

        let mut snapshot = session.snapshot();
        snapshot.stages[1].order.pop();
        assert!(ElicitationSession::restore(&config, snapshot).is_err());
    }
}
