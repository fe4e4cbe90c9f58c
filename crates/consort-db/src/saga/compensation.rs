//! Compensation of committed participants

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use super::error::ParticipantError;
use super::executor::TransactionExecutor;
use super::participant::Participant;

/// What happened when undoing one committed participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompensationOutcome {
	Compensated { result: Value },
	Failed { error: ParticipantError },
	/// No rollback closure was registered
	Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationResult {
	pub database: String,
	#[serde(flatten)]
	pub outcome: CompensationOutcome,
	#[serde(with = "super::result::duration_ms")]
	pub duration: Duration,
}

impl CompensationResult {
	pub fn is_compensated(&self) -> bool {
		matches!(self.outcome, CompensationOutcome::Compensated { .. })
	}

	/// Committed changes stay in place and need a human
	pub fn requires_manual_intervention(&self) -> bool {
		!self.is_compensated()
	}
}

/// Undo committed participants in reverse commit order
///
/// `committed` is in commit order. Every participant is attempted even when
/// an earlier compensation fails.
pub(crate) async fn compensate(
	executor: &TransactionExecutor,
	committed: Vec<(&Participant, Value)>,
	commit_timeout: Duration,
) -> Vec<CompensationResult> {
	let mut results = Vec::with_capacity(committed.len());

	for (participant, value) in committed.into_iter().rev() {
		let database = participant.database();
		let started = Instant::now();

		let Some(rollback) = participant.rollback() else {
			tracing::warn!(
				database,
				"No rollback operation registered; committed changes require manual intervention"
			);
			results.push(CompensationResult {
				database: database.to_string(),
				outcome: CompensationOutcome::Missing,
				duration: started.elapsed(),
			});
			continue;
		};

		let timeout = participant.effective_timeout(commit_timeout);
		let outcome = tokio::time::timeout(timeout, executor.compensate(participant, rollback, value))
			.await
			.unwrap_or_else(|_| Err(ParticipantError::timeout(database, timeout)));

		let outcome = match outcome {
			Ok(result) => {
				tracing::info!(database, "Compensation succeeded");
				CompensationOutcome::Compensated { result }
			}
			Err(error) => {
				tracing::error!(database, error = %error, "Compensation failed; manual intervention required");
				CompensationOutcome::Failed { error }
			}
		};

		results.push(CompensationResult {
			database: database.to_string(),
			outcome,
			duration: started.elapsed(),
		});
	}

	results
}
