//! Coordinator counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::analysis::RecoveryStrategy;
use super::compensation::CompensationOutcome;
use super::result::{DistributedTransactionResult, FailureKind};

/// Point-in-time copy of the coordinator's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
	pub total_runs: u64,
	pub successful_runs: u64,
	pub validation_failures: u64,
	pub commit_failures: u64,
	pub partial_commits: u64,
	pub compensations_attempted: u64,
	pub compensation_failures: u64,
	pub manual_interventions: u64,
}

impl CoordinatorStats {
	/// Share of runs that succeeded, `0.0` before any run
	pub fn success_rate(&self) -> f64 {
		if self.total_runs == 0 {
			return 0.0;
		}
		self.successful_runs as f64 / self.total_runs as f64
	}
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
	total_runs: AtomicU64,
	successful_runs: AtomicU64,
	validation_failures: AtomicU64,
	commit_failures: AtomicU64,
	partial_commits: AtomicU64,
	compensations_attempted: AtomicU64,
	compensation_failures: AtomicU64,
	manual_interventions: AtomicU64,
}

impl StatsCounters {
	pub(crate) fn record(&self, result: &DistributedTransactionResult) {
		self.total_runs.fetch_add(1, Ordering::Relaxed);
		if result.success {
			self.successful_runs.fetch_add(1, Ordering::Relaxed);
		}

		match result.failure {
			Some(FailureKind::Validation) => {
				self.validation_failures.fetch_add(1, Ordering::Relaxed);
			}
			Some(FailureKind::CommitFailed) => {
				self.commit_failures.fetch_add(1, Ordering::Relaxed);
			}
			Some(FailureKind::PartialCommit | FailureKind::CompensationFailed) => {
				self.partial_commits.fetch_add(1, Ordering::Relaxed);
			}
			None => {}
		}

		if let Some(compensations) = &result.compensation_results {
			let attempted = compensations
				.iter()
				.filter(|c| c.outcome != CompensationOutcome::Missing)
				.count() as u64;
			let failed = compensations
				.iter()
				.filter(|c| matches!(c.outcome, CompensationOutcome::Failed { .. }))
				.count() as u64;
			self.compensations_attempted
				.fetch_add(attempted, Ordering::Relaxed);
			self.compensation_failures.fetch_add(failed, Ordering::Relaxed);
		}

		if result.analysis.strategy == RecoveryStrategy::ManualIntervention {
			self.manual_interventions.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn snapshot(&self) -> CoordinatorStats {
		CoordinatorStats {
			total_runs: self.total_runs.load(Ordering::Relaxed),
			successful_runs: self.successful_runs.load(Ordering::Relaxed),
			validation_failures: self.validation_failures.load(Ordering::Relaxed),
			commit_failures: self.commit_failures.load(Ordering::Relaxed),
			partial_commits: self.partial_commits.load(Ordering::Relaxed),
			compensations_attempted: self.compensations_attempted.load(Ordering::Relaxed),
			compensation_failures: self.compensation_failures.load(Ordering::Relaxed),
			manual_interventions: self.manual_interventions.load(Ordering::Relaxed),
		}
	}
}
