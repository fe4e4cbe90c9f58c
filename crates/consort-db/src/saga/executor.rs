//! Running participant operations inside database transactions
//!
//! The validation phase is a dry run: the operation executes inside a real
//! transaction that is always rolled back. This catches constraint violations
//! and missing rows before anything commits, but it is not two-phase commit.
//! Nothing stops another writer from changing the data between the dry run
//! and the real commit.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;

use super::error::ParticipantError;
use super::participant::{CompensationOp, Participant};
use crate::backends::TransactionContext;
use crate::lock::LockStatus;
use consort_conf::IsolationLevel;

/// How a transaction ends once the operation succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
	/// Probe required locks, run the operation, roll back
	DryRun,
	/// Run the operation and commit
	Commit,
}

/// Executes participant work in transactions of one isolation level
#[derive(Debug, Clone, Copy)]
pub struct TransactionExecutor {
	isolation: IsolationLevel,
}

impl TransactionExecutor {
	pub fn new(isolation: IsolationLevel) -> Self {
		Self { isolation }
	}

	pub fn isolation(&self) -> IsolationLevel {
		self.isolation
	}

	/// Ping the participant's database
	pub async fn health_check(&self, participant: &Participant) -> Result<(), ParticipantError> {
		participant
			.client()
			.ping()
			.await
			.map_err(|e| ParticipantError::Unhealthy {
				database: participant.database().to_string(),
				message: e.to_string(),
			})
	}

	/// Run the participant's operation in a fresh transaction
	///
	/// Panics inside the operation are caught and reported as
	/// [`ParticipantError::Panicked`].
	pub async fn execute(
		&self,
		participant: &Participant,
		mode: ExecutionMode,
	) -> Result<Value, ParticipantError> {
		let database = participant.database();
		let mut tx = participant
			.client()
			.begin(Some(self.isolation))
			.await
			.map_err(|e| ParticipantError::database_error(database, e))?;

		if mode == ExecutionMode::DryRun
			&& let Err(error) = check_locks(participant, tx.as_mut()).await
		{
			discard(database, tx).await;
			return Err(error);
		}

		let outcome = AssertUnwindSafe(async { (participant.operation())(tx.as_mut()).await })
			.catch_unwind()
			.await;
		let outcome = settle(database, outcome);

		finish(database, tx, outcome, mode == ExecutionMode::Commit).await
	}

	/// Run a rollback closure against committed work, in its own committed
	/// transaction
	pub async fn compensate(
		&self,
		participant: &Participant,
		rollback: &CompensationOp,
		committed: Value,
	) -> Result<Value, ParticipantError> {
		let database = participant.database();
		let mut tx = participant
			.client()
			.begin(Some(self.isolation))
			.await
			.map_err(|e| ParticipantError::database_error(database, e))?;

		let outcome = AssertUnwindSafe(async { rollback(tx.as_mut(), committed).await })
			.catch_unwind()
			.await;
		let outcome = settle(database, outcome);

		finish(database, tx, outcome, true).await
	}
}

async fn check_locks(
	participant: &Participant,
	tx: &mut dyn TransactionContext,
) -> Result<(), ParticipantError> {
	let database = participant.database();
	for lock in participant.required_locks() {
		let status = participant
			.lock_probe()
			.probe(tx, lock)
			.await
			.map_err(|e| ParticipantError::database_error(database, e))?;

		if let LockStatus::Held { holder } = status {
			return Err(ParticipantError::LockUnavailable {
				database: database.to_string(),
				lock: lock.name(),
				holder,
			});
		}
		tracing::debug!(database, lock = %lock, "Lock available");
	}
	Ok(())
}

fn settle(
	database: &str,
	outcome: Result<anyhow::Result<Value>, Box<dyn Any + Send>>,
) -> Result<Value, ParticipantError> {
	match outcome {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(error)) => Err(ParticipantError::operation(database, error)),
		Err(payload) => Err(ParticipantError::Panicked {
			database: database.to_string(),
			message: panic_message(payload.as_ref()),
		}),
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		return (*message).to_string();
	}
	if let Some(message) = payload.downcast_ref::<String>() {
		return message.clone();
	}
	"panic with non-string payload".to_string()
}

async fn finish(
	database: &str,
	tx: Box<dyn TransactionContext>,
	outcome: Result<Value, ParticipantError>,
	commit: bool,
) -> Result<Value, ParticipantError> {
	match outcome {
		Ok(value) => {
			let ended = if commit {
				tx.commit().await
			} else {
				tx.rollback().await
			};
			ended.map_err(|e| ParticipantError::database_error(database, e))?;
			Ok(value)
		}
		Err(error) => {
			discard(database, tx).await;
			Err(error)
		}
	}
}

async fn discard(database: &str, tx: Box<dyn TransactionContext>) {
	if let Err(error) = tx.rollback().await {
		tracing::warn!(database, error = %error, "Rollback of failed transaction also failed");
	}
}
