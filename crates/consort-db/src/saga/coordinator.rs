//! Saga coordinator
//!
//! Runs a distributed transaction in three phases:
//!
//! 1. Validation: every participant is health checked, its required locks are
//!    probed and its operation is dry run. All participants validate
//!    concurrently; any failure aborts the run before anything commits.
//! 2. Commit: participants commit one at a time, highest priority first. The
//!    first failure stops the phase and the rest are aborted.
//! 3. Compensation: after a partial commit, committed participants are undone
//!    in reverse commit order.

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use super::analysis::analyze;
use super::compensation::{CompensationResult, compensate};
use super::error::{CoordinatorError, ParticipantError};
use super::executor::{ExecutionMode, TransactionExecutor};
use super::journal::{RunJournal, RunJournalEntry, RunPhase};
use super::options::TransactionOptions;
use super::participant::Participant;
use super::result::{
	CommittedResult, DistributedTransactionResult, FailureKind, ParticipantReport,
};
use super::state::ParticipantState;
use super::stats::{CoordinatorStats, StatsCounters};

macro_rules! phase_info {
	($options:expr, $($arg:tt)+) => {
		if $options.enable_logging {
			tracing::info!($($arg)+);
		}
	};
}

/// Coordinates distributed transactions across databases
///
/// Cheap to clone; clones share statistics and journal.
///
/// # Examples
///
/// ```rust,no_run
/// use consort_db::saga::{Participant, SagaCoordinator, TransactionOptions};
///
/// # async fn example(participants: Vec<Participant>) -> Result<(), Box<dyn std::error::Error>> {
/// let coordinator = SagaCoordinator::new();
/// let result = coordinator
///     .execute(participants, TransactionOptions::default())
///     .await?;
///
/// if !result.success {
///     for recommendation in &result.analysis.recommendations {
///         eprintln!("{}", recommendation);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct SagaCoordinator {
	journal: Option<Arc<dyn RunJournal>>,
	stats: Arc<StatsCounters>,
}

impl SagaCoordinator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record run progress to a journal
	pub fn with_journal(mut self, journal: Arc<dyn RunJournal>) -> Self {
		self.journal = Some(journal);
		self
	}

	pub fn journal(&self) -> Option<&Arc<dyn RunJournal>> {
		self.journal.as_ref()
	}

	pub fn stats(&self) -> CoordinatorStats {
		self.stats.snapshot()
	}

	/// Run a distributed transaction
	///
	/// Failures of participants are reported in the returned result. `Err` is
	/// only returned for input that cannot be run at all.
	pub async fn execute(
		&self,
		participants: Vec<Participant>,
		options: TransactionOptions,
	) -> Result<DistributedTransactionResult, CoordinatorError> {
		if participants.is_empty() {
			return Err(CoordinatorError::NoParticipants);
		}
		options.validate()?;
		if let Some(participant) = participants
			.iter()
			.find(|p| p.timeout().is_some_and(|t| t.is_zero()))
		{
			return Err(CoordinatorError::InvalidOptions(format!(
				"timeout for database {} must be greater than zero",
				participant.database()
			)));
		}

		let global_transaction_id = format!("gtx_{}", Uuid::new_v4().simple());
		let span = tracing::info_span!(
			"distributed_transaction",
			global_transaction_id = %global_transaction_id,
			participants = participants.len(),
		);

		let run = Run::new(
			global_transaction_id,
			&participants,
			&options,
			self.journal.as_deref(),
		);
		let result = run.drive().instrument(span).await?;

		self.stats.record(&result);
		Ok(result)
	}
}

impl std::fmt::Debug for SagaCoordinator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SagaCoordinator")
			.field("journal", &self.journal.is_some())
			.field("stats", &self.stats.snapshot())
			.finish()
	}
}

/// Indices of `participants` in commit order
///
/// Highest priority first; equal priorities keep input order.
pub(crate) fn commit_order(participants: &[Participant]) -> Vec<usize> {
	let mut order: Vec<usize> = (0..participants.len()).collect();
	order.sort_by_key(|&index| std::cmp::Reverse(participants[index].priority()));
	order
}

/// Mutable bookkeeping for one participant during a run
#[derive(Debug, Default)]
struct ParticipantRun {
	state: ParticipantState,
	result: Option<Value>,
	error: Option<ParticipantError>,
	prepare_duration: Option<Duration>,
	commit_duration: Option<Duration>,
}

impl ParticipantRun {
	fn transition(&mut self, database: &str, next: ParticipantState) -> Result<(), CoordinatorError> {
		if !self.state.can_transition_to(next) {
			return Err(CoordinatorError::InvalidTransition {
				database: database.to_string(),
				from: self.state,
				to: next,
			});
		}
		tracing::trace!(database, from = %self.state, to = %next, "Participant state change");
		self.state = next;
		Ok(())
	}

	fn fail(&mut self, database: &str, error: ParticipantError) -> Result<(), CoordinatorError> {
		let next = if error.is_timeout() {
			ParticipantState::Timeout
		} else {
			ParticipantState::Failed
		};
		self.transition(database, next)?;
		self.error = Some(error);
		Ok(())
	}
}

struct Run<'a> {
	global_transaction_id: String,
	participants: &'a [Participant],
	runs: Vec<ParticipantRun>,
	options: &'a TransactionOptions,
	executor: TransactionExecutor,
	journal: Option<&'a dyn RunJournal>,
	started: Instant,
}

impl<'a> Run<'a> {
	fn new(
		global_transaction_id: String,
		participants: &'a [Participant],
		options: &'a TransactionOptions,
		journal: Option<&'a dyn RunJournal>,
	) -> Self {
		Self {
			global_transaction_id,
			participants,
			runs: participants.iter().map(|_| ParticipantRun::default()).collect(),
			options,
			executor: TransactionExecutor::new(options.isolation_level),
			journal,
			started: Instant::now(),
		}
	}

	async fn drive(mut self) -> Result<DistributedTransactionResult, CoordinatorError> {
		phase_info!(
			self.options,
			isolation_level = self.options.isolation_level.to_sql(),
			"Starting distributed transaction"
		);
		self.record(
			self.entry(RunPhase::Started)
				.with_metadata("isolation_level", self.options.isolation_level.to_sql()),
		);

		let phase1_started = Instant::now();
		let failures = self.validate().await?;
		let phase1_duration = phase1_started.elapsed();

		if !failures.is_empty() {
			return self.abort_validation(failures, phase1_duration);
		}
		phase_info!(self.options, phase = "validation", "All participants validated");
		self.record(self.entry(RunPhase::Validated));

		let phase2_started = Instant::now();
		let (committed, commit_failure) = self.commit().await?;
		let phase2_duration = phase2_started.elapsed();

		let Some(error) = commit_failure else {
			phase_info!(
				self.options,
				committed = committed.len(),
				"Distributed transaction committed"
			);
			self.record(self.entry(RunPhase::Committed));
			return Ok(self.finish(
				true,
				None,
				None,
				&committed,
				None,
				phase1_duration,
				phase2_duration,
			));
		};

		self.record(
			self.entry(RunPhase::CommitFailed)
				.with_metadata("failed_database", error.database())
				.with_metadata("committed", committed.len()),
		);

		let compensation = self.compensate_committed(&committed).await;

		let failure = if committed.is_empty() {
			FailureKind::CommitFailed
		} else if compensation
			.as_ref()
			.is_some_and(|results| results.iter().any(|c| c.requires_manual_intervention()))
		{
			FailureKind::CompensationFailed
		} else {
			FailureKind::PartialCommit
		};

		Ok(self.finish(
			false,
			Some(failure),
			Some(error.to_string()),
			&committed,
			compensation,
			phase1_duration,
			phase2_duration,
		))
	}

	async fn validate(&mut self) -> Result<Vec<ParticipantError>, CoordinatorError> {
		let participants = self.participants;
		for (participant, run) in participants.iter().zip(self.runs.iter_mut()) {
			run.transition(participant.database(), ParticipantState::Preparing)?;
		}

		let executor = self.executor;
		let prepare_timeout = self.options.prepare_timeout;
		let attempts = participants.iter().map(|participant| async move {
			let timeout = participant.effective_timeout(prepare_timeout);
			let started = Instant::now();
			let outcome = tokio::time::timeout(timeout, async {
				executor.health_check(participant).await?;
				executor.execute(participant, ExecutionMode::DryRun).await
			})
			.await
			.unwrap_or_else(|_| Err(ParticipantError::timeout(participant.database(), timeout)));
			(outcome, started.elapsed())
		});
		let outcomes = join_all(attempts).await;

		let mut failures = Vec::new();
		for ((participant, run), (outcome, elapsed)) in participants
			.iter()
			.zip(self.runs.iter_mut())
			.zip(outcomes)
		{
			let database = participant.database();
			run.prepare_duration = Some(elapsed);
			match outcome {
				Ok(_) => {
					run.transition(database, ParticipantState::Prepared)?;
					tracing::debug!(database, elapsed_ms = elapsed.as_millis() as u64, "Dry run succeeded");
				}
				Err(error) => {
					tracing::warn!(database, phase = "validation", error = %error, "Participant failed validation");
					failures.push(error.clone());
					run.fail(database, error)?;
				}
			}
		}

		Ok(failures)
	}

	fn abort_validation(
		mut self,
		failures: Vec<ParticipantError>,
		phase1_duration: Duration,
	) -> Result<DistributedTransactionResult, CoordinatorError> {
		let participants = self.participants;
		for (participant, run) in participants.iter().zip(self.runs.iter_mut()) {
			if run.state == ParticipantState::Prepared {
				run.transition(participant.database(), ParticipantState::Aborted)?;
			}
		}

		let message = failures
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("; ");
		tracing::warn!(
			failed = failures.len(),
			error = %message,
			"Validation failed; nothing was committed"
		);
		self.record(
			self.entry(RunPhase::ValidationFailed)
				.with_metadata("failed", failures.len()),
		);

		Ok(self.finish(
			false,
			Some(FailureKind::Validation),
			Some(message),
			&[],
			None,
			phase1_duration,
			Duration::ZERO,
		))
	}

	/// Returns committed participant indices in commit order and the error
	/// that stopped the phase, if any
	async fn commit(&mut self) -> Result<(Vec<usize>, Option<ParticipantError>), CoordinatorError> {
		let participants = self.participants;
		let order = commit_order(participants);
		let mut committed = Vec::with_capacity(order.len());

		for (position, &index) in order.iter().enumerate() {
			let participant = &participants[index];
			let database = participant.database();
			let run = &mut self.runs[index];
			run.transition(database, ParticipantState::Committing)?;

			let timeout = participant.effective_timeout(self.options.commit_timeout);
			let started = Instant::now();
			let outcome = tokio::time::timeout(
				timeout,
				self.executor.execute(participant, ExecutionMode::Commit),
			)
			.await
			.unwrap_or_else(|_| Err(ParticipantError::timeout(database, timeout)));
			run.commit_duration = Some(started.elapsed());

			match outcome {
				Ok(value) => {
					run.transition(database, ParticipantState::Committed)?;
					run.result = Some(value);
					committed.push(index);
					phase_info!(
						self.options,
						database,
						priority = participant.priority(),
						phase = "commit",
						"Participant committed"
					);
				}
				Err(error) => {
					tracing::error!(
						database,
						priority = participant.priority(),
						phase = "commit",
						committed = committed.len(),
						error = %error,
						"Commit failed"
					);
					run.fail(database, error.clone())?;
					for &rest in &order[position + 1..] {
						self.runs[rest].transition(participants[rest].database(), ParticipantState::Aborted)?;
					}
					return Ok((committed, Some(error)));
				}
			}
		}

		Ok((committed, None))
	}

	async fn compensate_committed(&self, committed: &[usize]) -> Option<Vec<CompensationResult>> {
		if committed.is_empty() {
			return None;
		}
		if !self.options.enable_compensation {
			tracing::warn!(
				committed = committed.len(),
				"Compensation disabled; committed changes require manual intervention"
			);
			return None;
		}

		phase_info!(
			self.options,
			phase = "compensation",
			committed = committed.len(),
			"Compensating committed participants"
		);
		let targets = committed
			.iter()
			.map(|&index| {
				let value = self.runs[index].result.clone().unwrap_or(Value::Null);
				(&self.participants[index], value)
			})
			.collect();
		let results = compensate(&self.executor, targets, self.options.commit_timeout).await;

		let outstanding = results
			.iter()
			.filter(|c| c.requires_manual_intervention())
			.count();
		let phase = if outstanding == 0 {
			RunPhase::Compensated
		} else {
			RunPhase::CompensationFailed
		};
		self.record(self.entry(phase).with_metadata("outstanding", outstanding));

		Some(results)
	}

	#[allow(clippy::too_many_arguments)]
	fn finish(
		&self,
		success: bool,
		failure: Option<FailureKind>,
		error: Option<String>,
		committed: &[usize],
		compensation_results: Option<Vec<CompensationResult>>,
		phase1_duration: Duration,
		phase2_duration: Duration,
	) -> DistributedTransactionResult {
		let results = committed
			.iter()
			.map(|&index| CommittedResult {
				database: self.participants[index].database().to_string(),
				priority: self.participants[index].priority(),
				result: self.runs[index].result.clone().unwrap_or(Value::Null),
			})
			.collect();

		let participants: Vec<ParticipantReport> = self
			.participants
			.iter()
			.zip(&self.runs)
			.map(|(participant, run)| ParticipantReport {
				database: participant.database().to_string(),
				priority: participant.priority(),
				state: run.state,
				error: run.error.clone(),
				prepare_duration: run.prepare_duration,
				commit_duration: run.commit_duration,
			})
			.collect();

		let analysis = analyze(success, &participants, compensation_results.as_deref());
		if analysis.requires_manual_intervention() {
			tracing::warn!(
				recommendations = ?analysis.recommendations,
				"Distributed transaction requires manual intervention"
			);
		}

		DistributedTransactionResult {
			success,
			global_transaction_id: self.global_transaction_id.clone(),
			results,
			participants,
			phase1_duration,
			phase2_duration,
			total_duration: self.started.elapsed(),
			error,
			failure,
			compensation_results,
			partial_success: !success && !committed.is_empty(),
			analysis,
		}
	}

	fn entry(&self, phase: RunPhase) -> RunJournalEntry {
		RunJournalEntry::new(
			self.global_transaction_id.clone(),
			phase,
			self.participants
				.iter()
				.map(|p| p.database().to_string())
				.collect(),
		)
	}

	fn record(&self, entry: RunJournalEntry) {
		if let Some(journal) = self.journal
			&& let Err(error) = journal.record(&entry)
		{
			tracing::warn!(phase = ?entry.phase, error = %error, "Failed to write run journal entry");
		}
	}
}
