//! Post-run failure analysis
//!
//! Classifies how a run ended into a recovery strategy and produces
//! recommendations an operator can act on.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::compensation::{CompensationOutcome, CompensationResult};
use super::error::ParticipantError;
use super::result::ParticipantReport;
use super::state::ParticipantState;

/// What to do about a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
	/// The run succeeded
	None,
	/// Nothing committed; running again is safe
	Retry,
	/// Committed changes remain that nobody undid
	ManualIntervention,
	/// Committed changes were undone by compensation
	CompensatingTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAnalysis {
	pub strategy: RecoveryStrategy,
	/// Databases whose participant failed or timed out
	pub failed_databases: Vec<String>,
	/// Databases whose participant committed
	pub committed_databases: Vec<String>,
	pub recommendations: Vec<String>,
}

impl FailureAnalysis {
	pub fn success() -> Self {
		Self {
			strategy: RecoveryStrategy::None,
			failed_databases: Vec::new(),
			committed_databases: Vec::new(),
			recommendations: Vec::new(),
		}
	}

	pub fn requires_manual_intervention(&self) -> bool {
		self.strategy == RecoveryStrategy::ManualIntervention
	}
}

/// Classify a finished run
///
/// `compensation` is `None` when compensation did not run.
pub fn analyze(
	success: bool,
	participants: &[ParticipantReport],
	compensation: Option<&[CompensationResult]>,
) -> FailureAnalysis {
	let committed_databases: Vec<String> = participants
		.iter()
		.filter(|p| p.state == ParticipantState::Committed)
		.map(|p| p.database.clone())
		.collect();

	if success {
		return FailureAnalysis {
			committed_databases,
			..FailureAnalysis::success()
		};
	}

	let failed_databases: Vec<String> = participants
		.iter()
		.filter(|p| matches!(p.state, ParticipantState::Failed | ParticipantState::Timeout))
		.map(|p| p.database.clone())
		.collect();

	// One result per committed participant; several may share a database.
	let fully_compensated = compensation.is_some_and(|results| {
		results.len() == committed_databases.len()
			&& results.iter().all(CompensationResult::is_compensated)
	});

	let strategy = if committed_databases.is_empty() {
		RecoveryStrategy::Retry
	} else if fully_compensated {
		RecoveryStrategy::CompensatingTransaction
	} else {
		RecoveryStrategy::ManualIntervention
	};

	let mut recommendations = IndexSet::new();
	for error in participants.iter().filter_map(|p| p.error.as_ref()) {
		recommendations.insert(recommend(error));
	}
	match compensation {
		Some(results) => {
			for result in results {
				if matches!(
					result.outcome,
					CompensationOutcome::Failed { .. } | CompensationOutcome::Missing
				) {
					recommendations.insert(reconcile(&result.database));
				}
			}
		}
		None => {
			for database in &committed_databases {
				recommendations.insert(reconcile(database));
			}
		}
	}

	FailureAnalysis {
		strategy,
		failed_databases,
		committed_databases,
		recommendations: recommendations.into_iter().collect(),
	}
}

fn recommend(error: &ParticipantError) -> String {
	match error {
		ParticipantError::Timeout { database, .. } => {
			format!("Increase timeout for database {}", database)
		}
		ParticipantError::Unhealthy { database, .. } => {
			format!("Check connectivity of database {}", database)
		}
		ParticipantError::LockUnavailable { database, lock, .. } => {
			format!("Retry after lock {} on database {} is released", lock, database)
		}
		ParticipantError::Operation { database, .. } | ParticipantError::Panicked { database, .. } => {
			format!("Inspect operation error on database {}", database)
		}
		ParticipantError::Database { database, .. } => {
			format!("Inspect database error on database {}", database)
		}
	}
}

fn reconcile(database: &str) -> String {
	format!("Manually reconcile committed changes on database {}", database)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;
	use std::time::Duration;

	fn report(database: &str, state: ParticipantState, error: Option<ParticipantError>) -> ParticipantReport {
		ParticipantReport {
			database: database.to_string(),
			priority: 0,
			state,
			error,
			prepare_duration: None,
			commit_duration: None,
		}
	}

	fn compensated(database: &str) -> CompensationResult {
		CompensationResult {
			database: database.to_string(),
			outcome: CompensationOutcome::Compensated { result: json!(null) },
			duration: Duration::ZERO,
		}
	}

	fn missing(database: &str) -> CompensationResult {
		CompensationResult {
			database: database.to_string(),
			outcome: CompensationOutcome::Missing,
			duration: Duration::ZERO,
		}
	}

	#[rstest]
	fn test_success_needs_no_recovery() {
		let participants = vec![report("a", ParticipantState::Committed, None)];

		let analysis = analyze(true, &participants, None);

		assert_eq!(analysis.strategy, RecoveryStrategy::None);
		assert_eq!(analysis.committed_databases, vec!["a"]);
		assert!(analysis.recommendations.is_empty());
	}

	#[rstest]
	fn test_nothing_committed_is_retry() {
		let participants = vec![
			report(
				"a",
				ParticipantState::Timeout,
				Some(ParticipantError::timeout("a", Duration::from_secs(1))),
			),
			report("b", ParticipantState::Aborted, None),
		];

		let analysis = analyze(false, &participants, None);

		assert_eq!(analysis.strategy, RecoveryStrategy::Retry);
		assert_eq!(analysis.failed_databases, vec!["a"]);
		assert_eq!(analysis.recommendations, vec!["Increase timeout for database a"]);
	}

	#[rstest]
	fn test_full_compensation() {
		let participants = vec![
			report("a", ParticipantState::Committed, None),
			report(
				"b",
				ParticipantState::Failed,
				Some(ParticipantError::Operation {
					database: "b".into(),
					message: "boom".into(),
				}),
			),
		];
		let compensation = vec![compensated("a")];

		let analysis = analyze(false, &participants, Some(&compensation));

		assert_eq!(analysis.strategy, RecoveryStrategy::CompensatingTransaction);
		assert_eq!(
			analysis.recommendations,
			vec!["Inspect operation error on database b"]
		);
	}

	#[rstest]
	fn test_missing_rollback_needs_manual_intervention() {
		let participants = vec![
			report("a", ParticipantState::Committed, None),
			report("b", ParticipantState::Committed, None),
			report("c", ParticipantState::Failed, None),
		];
		let compensation = vec![compensated("b"), missing("a")];

		let analysis = analyze(false, &participants, Some(&compensation));

		assert!(analysis.requires_manual_intervention());
		assert_eq!(
			analysis.recommendations,
			vec!["Manually reconcile committed changes on database a"]
		);
	}

	#[rstest]
	fn test_shared_database_missing_rollback_is_not_hidden() {
		let participants = vec![
			report("a", ParticipantState::Committed, None),
			report("a", ParticipantState::Committed, None),
			report("b", ParticipantState::Failed, None),
		];
		let compensation = vec![missing("a"), compensated("a")];

		let analysis = analyze(false, &participants, Some(&compensation));

		assert_eq!(analysis.strategy, RecoveryStrategy::ManualIntervention);
		assert_eq!(analysis.committed_databases, vec!["a", "a"]);
	}

	#[rstest]
	fn test_disabled_compensation_needs_manual_intervention() {
		let participants = vec![
			report("a", ParticipantState::Committed, None),
			report(
				"b",
				ParticipantState::Failed,
				Some(ParticipantError::LockUnavailable {
					database: "b".into(),
					lock: "t:1".into(),
					holder: None,
				}),
			),
		];

		let analysis = analyze(false, &participants, None);

		assert_eq!(analysis.strategy, RecoveryStrategy::ManualIntervention);
		assert_eq!(
			analysis.recommendations,
			vec![
				"Retry after lock t:1 on database b is released",
				"Manually reconcile committed changes on database a",
			]
		);
	}
}
