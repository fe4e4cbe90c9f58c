//! Participant lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one participant within a run
///
/// ```text
/// Initial -> Preparing -> Prepared -> Committing -> Committed
///     \          |            |            |
///      `-> Aborted / Failed / Timeout <----'
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantState {
	#[default]
	Initial,
	Preparing,
	Prepared,
	Committing,
	Committed,
	Failed,
	Aborted,
	Timeout,
}

impl ParticipantState {
	/// Whether the state machine allows moving from `self` to `next`
	///
	/// # Examples
	///
	/// ```
	/// use consort_db::saga::ParticipantState;
	///
	/// assert!(ParticipantState::Initial.can_transition_to(ParticipantState::Preparing));
	/// assert!(!ParticipantState::Committed.can_transition_to(ParticipantState::Failed));
	/// ```
	pub fn can_transition_to(self, next: ParticipantState) -> bool {
		use ParticipantState::*;
		matches!(
			(self, next),
			(Initial, Preparing)
				| (Initial, Aborted)
				| (Preparing, Prepared)
				| (Preparing, Failed)
				| (Preparing, Timeout)
				| (Prepared, Committing)
				| (Prepared, Aborted)
				| (Committing, Committed)
				| (Committing, Failed)
				| (Committing, Timeout)
		)
	}

	/// No further transition is possible
	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			ParticipantState::Committed
				| ParticipantState::Failed
				| ParticipantState::Aborted
				| ParticipantState::Timeout
		)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ParticipantState::Initial => "INITIAL",
			ParticipantState::Preparing => "PREPARING",
			ParticipantState::Prepared => "PREPARED",
			ParticipantState::Committing => "COMMITTING",
			ParticipantState::Committed => "COMMITTED",
			ParticipantState::Failed => "FAILED",
			ParticipantState::Aborted => "ABORTED",
			ParticipantState::Timeout => "TIMEOUT",
		}
	}
}

impl fmt::Display for ParticipantState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
