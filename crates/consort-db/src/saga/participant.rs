//! Participants of a distributed transaction

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::backends::{DatabaseClient, TransactionContext};
use crate::lock::{LockProbe, RequiredLock, probe_for};

/// Future returned by participant operations
pub type OperationFuture<'c> = BoxFuture<'c, anyhow::Result<Value>>;

/// Work a participant performs inside a transaction
///
/// Called once for the dry run and once more for the real commit, each time
/// with a fresh transaction.
pub type Operation =
	Arc<dyn for<'c> Fn(&'c mut dyn TransactionContext) -> OperationFuture<'c> + Send + Sync>;

/// Undo for a committed operation, given the value the operation returned
pub type CompensationOp = Arc<
	dyn for<'c> Fn(&'c mut dyn TransactionContext, Value) -> OperationFuture<'c> + Send + Sync,
>;

/// Wrap a closure as an [`Operation`]
///
/// # Examples
///
/// ```
/// use consort_db::backends::QueryValue;
/// use consort_db::saga::operation;
/// use serde_json::json;
///
/// let insert = operation(|tx| {
///     Box::pin(async move {
///         let result = tx
///             .execute("INSERT INTO orders (id) VALUES (?)", vec![QueryValue::Int(1)])
///             .await?;
///         Ok(json!({ "rows": result.rows_affected }))
///     })
/// });
/// ```
pub fn operation<F>(f: F) -> Operation
where
	F: for<'c> Fn(&'c mut dyn TransactionContext) -> OperationFuture<'c> + Send + Sync + 'static,
{
	Arc::new(f)
}

/// Wrap a closure as a [`CompensationOp`]
pub fn compensation<F>(f: F) -> CompensationOp
where
	F: for<'c> Fn(&'c mut dyn TransactionContext, Value) -> OperationFuture<'c>
		+ Send
		+ Sync
		+ 'static,
{
	Arc::new(f)
}

/// One database-scoped unit of work
///
/// # Examples
///
/// ```rust,no_run
/// use consort_db::backends::DatabaseClient;
/// use consort_db::lock::RequiredLock;
/// use consort_db::saga::{Participant, compensation, operation};
/// use serde_json::json;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example(client: Arc<dyn DatabaseClient>) {
/// let participant = Participant::new(
///     "orders",
///     client,
///     operation(|tx| Box::pin(async move {
///         tx.execute("UPDATE orders SET state = 'paid' WHERE id = 7", vec![]).await?;
///         Ok(json!(7))
///     })),
/// )
/// .with_rollback(compensation(|tx, _committed| Box::pin(async move {
///     tx.execute("UPDATE orders SET state = 'open' WHERE id = 7", vec![]).await?;
///     Ok(json!(null))
/// })))
/// .with_priority(10)
/// .with_timeout(Duration::from_secs(5))
/// .with_required_lock(RequiredLock::new("orders", 7));
/// # }
/// ```
#[derive(Clone)]
pub struct Participant {
	database: String,
	client: Arc<dyn DatabaseClient>,
	lock_probe: Arc<dyn LockProbe>,
	operation: Operation,
	rollback: Option<CompensationOp>,
	priority: i32,
	timeout: Option<Duration>,
	required_locks: Vec<RequiredLock>,
}

impl Participant {
	/// Create a participant with default priority and no rollback
	///
	/// The lock probe is picked from the client's engine.
	pub fn new(database: impl Into<String>, client: Arc<dyn DatabaseClient>, operation: Operation) -> Self {
		let lock_probe = probe_for(client.engine());
		Self {
			database: database.into(),
			client,
			lock_probe,
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

	/// Higher priorities commit first
	pub fn with_priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}

	/// Per-participant bound, capped by the phase timeout
	///
	/// A zero timeout is rejected when the run starts.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn with_required_lock(mut self, lock: RequiredLock) -> Self {
		self.required_locks.push(lock);
		self
	}

	pub fn with_required_locks(mut self, locks: impl IntoIterator<Item = RequiredLock>) -> Self {
		self.required_locks.extend(locks);
		self
	}

	pub fn with_lock_probe(mut self, probe: Arc<dyn LockProbe>) -> Self {
		self.lock_probe = probe;
		self
	}

	pub fn database(&self) -> &str {
		&self.database
	}

	pub fn client(&self) -> &Arc<dyn DatabaseClient> {
		&self.client
	}

	pub fn lock_probe(&self) -> &Arc<dyn LockProbe> {
		&self.lock_probe
	}

	pub fn operation(&self) -> &Operation {
		&self.operation
	}

	pub fn rollback(&self) -> Option<&CompensationOp> {
		self.rollback.as_ref()
	}

	pub fn priority(&self) -> i32 {
		self.priority
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	pub fn required_locks(&self) -> &[RequiredLock] {
		&self.required_locks
	}

	/// Bound for one phase: the smaller of the participant's own timeout and
	/// the phase timeout
	pub fn effective_timeout(&self, phase_timeout: Duration) -> Duration {
		self.timeout
			.map_or(phase_timeout, |own| own.min(phase_timeout))
	}
}

impl fmt::Debug for Participant {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Participant")
			.field("database", &self.database)
			.field("engine", &self.client.engine())
			.field("priority", &self.priority)
			.field("timeout", &self.timeout)
			.field("has_rollback", &self.rollback.is_some())
			.field("required_locks", &self.required_locks)
			.finish()
	}
}
