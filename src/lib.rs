//! # prefsync - Preference Elicitation Engine
//!
//! prefsync captures structured human preference data and conserves it for
//! later analysis. It does not compute utilities or any other derived
//! analytics.
//!
//! ## Core Concepts
//!
//! - **AllocationLedger**: distributes a fixed chip budget across priorities;
//!   the total never exceeds the budget
//! - **RankableSet**: a stage's bundles in strict preference order; rank is
//!   position
//! - **GoalOverlay**: a reference bundle shown for comparison, never ranked
//! - **StageSequencer**: stage order, derived progress, terminal `Complete`
//! - **ElicitationSession**: composes the above and accumulates one frozen
//!   ranking per confirmed stage
//!
//! ## Usage
//!
//! ```rust
//! use prefsync::{ElicitationConfig, ElicitationSession, PriorityId};
//!
//! let mut session = ElicitationSession::new(&ElicitationConfig::demo())?;
//!
//! // Allocation: edits that would overspend the budget are dropped.
//! assert!(session.set_allocation(&PriorityId::new("sweetness"), 20).is_applied());
//! assert!(session.set_allocation(&PriorityId::new("sourness"), 20).is_rejected());
//! assert_eq!(session.ledger().remaining(), 16);
//!
//! // Ranking: confirm each stage in turn.
//! while !session.is_complete() {
//!     session.confirm_stage()?;
//! }
//! assert_eq!(session.results().len(), 3);
//! assert_eq!(session.progress_fraction(), 1.0);
//! # Ok::<(), prefsync::ElicitError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod bundle;
pub mod chat;
pub mod command;
pub mod config;
pub mod error;
pub mod goal;
pub mod ledger;
pub mod rank;
pub mod sequencer;
pub mod session;
pub mod snapshot;
pub mod stage;
pub mod view;

// Re-export primary types at crate root for convenience
pub use bundle::{AttributeSpec, Bundle, BundleId};
pub use chat::{ChatMessage, ChatRole, ChatTranscript};
pub use command::{parse_command_log, Command, CommandOutcome};
pub use config::{ElicitationConfig, StageSpec};
pub use error::{
    EditOutcome, ElicitError, ElicitResult, RejectReason, SessionStateError, ValidationError,
};
pub use goal::{GoalBundle, GoalOverlay};
pub use ledger::{
    AllocationLedger, DepletionBand, DepletionThresholds, Priority, PriorityId, PrioritySpec,
};
pub use rank::{RankSlot, RankableSet};
pub use sequencer::{SequencerState, StageSequencer};
pub use session::{ElicitationSession, SessionId, StageResult};
pub use snapshot::{AllocationRecord, SessionSnapshot, StageRecord};
pub use stage::Stage;
pub use view::{AttributeRow, BundleCard, GoalCard, LedgerView, PriorityRow, SessionView, StageView};
