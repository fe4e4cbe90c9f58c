//! Running distributed transactions by database alias

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::backends::DatabaseError;
use crate::lock::RequiredLock;
use crate::registry::DatabaseRegistry;
use crate::saga::{
	CompensationOp, CoordinatorError, DistributedTransactionResult, FileRunJournal, JournalError,
	Operation, Participant, SagaCoordinator, TransactionOptions,
};
use consort_conf::Settings;

/// Failure building a [`Repository`] from settings
#[derive(Debug, Error)]
pub enum SetupError {
	#[error(transparent)]
	Database(#[from] DatabaseError),

	#[error(transparent)]
	Journal(#[from] JournalError),
}

/// One step of a distributed transaction, addressed by database alias
#[derive(Clone)]
pub struct DistributedStep {
	database: String,
	operation: Operation,
	rollback: Option<CompensationOp>,
	priority: i32,
	timeout: Option<Duration>,
	required_locks: Vec<RequiredLock>,
}

impl DistributedStep {
	pub fn new(database: impl Into<String>, operation: Operation) -> Self {
		Self {
			database: database.into(),
			operation,
			rollback: None,
			priority: 0,
			timeout: None,
			required_locks: Vec::new(),
		}
	}

	pub fn with_rollback(mut self, rollback: CompensationOp) -> Self {
		self.rollback = Some(rollback);
		self
	}

	pub fn with_priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn with_required_lock(mut self, lock: RequiredLock) -> Self {
		self.required_locks.push(lock);
		self
	}

	pub fn database(&self) -> &str {
		&self.database
	}
}

/// Entry point for applications
///
/// Resolves aliases through a shared [`DatabaseRegistry`] and hands the
/// resulting participants to a [`SagaCoordinator`].
///
/// # Examples
///
/// ```rust,no_run
/// use consort_db::registry::DatabaseRegistry;
/// use consort_db::repository::{DistributedStep, Repository};
/// use consort_db::saga::operation;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example(registry: DatabaseRegistry) -> Result<(), Box<dyn std::error::Error>> {
/// let repository = Repository::new(Arc::new(registry));
/// let result = repository
///     .run_with_defaults(vec![DistributedStep::new(
///         "orders",
///         operation(|tx| Box::pin(async move {
///             tx.execute("DELETE FROM carts WHERE expired", vec![]).await?;
///             Ok(json!(null))
///         })),
///     )])
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Repository {
	registry: Arc<DatabaseRegistry>,
	coordinator: SagaCoordinator,
	defaults: TransactionOptions,
}

impl Repository {
	pub fn new(registry: Arc<DatabaseRegistry>) -> Self {
		Self {
			registry,
			coordinator: SagaCoordinator::new(),
			defaults: TransactionOptions::default(),
		}
	}

	/// Connect configured databases and apply transaction settings
	///
	/// A file journal is attached when `transaction.journal_dir` is set.
	pub async fn from_settings(settings: &Settings) -> Result<Self, SetupError> {
		let registry = DatabaseRegistry::connect(settings).await?;

		let mut coordinator = SagaCoordinator::new();
		if let Some(dir) = &settings.transaction.journal_dir {
			coordinator = coordinator.with_journal(Arc::new(FileRunJournal::new(dir)?));
		}

		Ok(Self {
			registry: Arc::new(registry),
			coordinator,
			defaults: TransactionOptions::from(&settings.transaction),
		})
	}

	pub fn with_coordinator(mut self, coordinator: SagaCoordinator) -> Self {
		self.coordinator = coordinator;
		self
	}

	pub fn with_defaults(mut self, defaults: TransactionOptions) -> Self {
		self.defaults = defaults;
		self
	}

	pub fn registry(&self) -> &Arc<DatabaseRegistry> {
		&self.registry
	}

	pub fn coordinator(&self) -> &SagaCoordinator {
		&self.coordinator
	}

	pub fn defaults(&self) -> &TransactionOptions {
		&self.defaults
	}

	/// Run steps as one distributed transaction
	///
	/// Every alias is resolved before any database is touched.
	pub async fn run_distributed_transaction(
		&self,
		steps: Vec<DistributedStep>,
		options: TransactionOptions,
	) -> Result<DistributedTransactionResult, CoordinatorError> {
		let participants = steps
			.into_iter()
			.map(|step| self.resolve(step))
			.collect::<Result<Vec<_>, _>>()?;

		tracing::debug!(participants = participants.len(), "Resolved distributed transaction steps");
		self.coordinator.execute(participants, options).await
	}

	/// Run steps with the repository's default options
	pub async fn run_with_defaults(
		&self,
		steps: Vec<DistributedStep>,
	) -> Result<DistributedTransactionResult, CoordinatorError> {
		self.run_distributed_transaction(steps, self.defaults.clone())
			.await
	}

	fn resolve(&self, step: DistributedStep) -> Result<Participant, CoordinatorError> {
		let handle = self.registry.require(&step.database)?;

		let mut participant = handle
			.participant(step.operation)
			.with_priority(step.priority)
			.with_required_locks(step.required_locks);
		if let Some(rollback) = step.rollback {
			participant = participant.with_rollback(rollback);
		}
		if let Some(timeout) = step.timeout {
			participant = participant.with_timeout(timeout);
		}
		Ok(participant)
	}
}
