//! Advisory lock probing
//!
//! Before a participant's dry run the coordinator checks whether the rows it
//! declares are locked by someone else. Each backend answers through its own
//! [`LockProbe`]; the probe for a database is chosen from its configured
//! [`Engine`] by [`probe_for`].
//!
//! A probe never holds a lock past the check. Anything may take the lock
//! between the probe and the commit.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlLockProbe;
pub use postgres::PostgresLockProbe;
pub use sqlite::SqliteLockProbe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

use crate::backends::{DatabaseError, TransactionContext};
use consort_conf::Engine;

/// A row a participant needs to be free before it runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequiredLock {
	pub table: String,
	pub record_id: String,
}

impl RequiredLock {
	pub fn new(table: impl Into<String>, record_id: impl ToString) -> Self {
		Self {
			table: table.into(),
			record_id: record_id.to_string(),
		}
	}

	/// Stable textual identifier, `table:record_id`
	pub fn name(&self) -> String {
		format!("{}:{}", self.table, self.record_id)
	}

	/// 64-bit key for integer-keyed advisory locks
	///
	/// Derived from a SHA-256 digest of [`name`](Self::name), so every process
	/// computes the same key for the same row.
	///
	/// # Examples
	///
	/// ```
	/// use consort_db::lock::RequiredLock;
	///
	/// let a = RequiredLock::new("accounts", 42);
	/// let b = RequiredLock::new("accounts", "42");
	/// assert_eq!(a.key(), b.key());
	/// assert_ne!(a.key(), RequiredLock::new("accounts", 43).key());
	/// ```
	pub fn key(&self) -> i64 {
		let digest = Sha256::digest(self.name().as_bytes());
		let mut bytes = [0u8; 8];
		bytes.copy_from_slice(&digest[..8]);
		i64::from_be_bytes(bytes)
	}
}

impl fmt::Display for RequiredLock {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.table, self.record_id)
	}
}

/// Outcome of probing one lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
	Available,
	/// Held elsewhere; the holder is reported when the backend exposes it
	Held { holder: Option<String> },
}

impl LockStatus {
	pub fn is_available(&self) -> bool {
		matches!(self, LockStatus::Available)
	}
}

/// Backend-specific advisory lock check
#[async_trait]
pub trait LockProbe: Send + Sync {
	/// Check one lock using the given transaction's connection
	async fn probe(
		&self,
		tx: &mut dyn TransactionContext,
		lock: &RequiredLock,
	) -> Result<LockStatus, DatabaseError>;
}

/// Select the lock probe matching a database engine
///
/// # Examples
///
/// ```
/// use consort_conf::Engine;
/// use consort_db::lock::probe_for;
///
/// let probe = probe_for(Engine::Postgres);
/// ```
pub fn probe_for(engine: Engine) -> Arc<dyn LockProbe> {
	match engine {
		Engine::Postgres => Arc::new(PostgresLockProbe),
		Engine::Mysql => Arc::new(MySqlLockProbe),
		Engine::Sqlite => Arc::new(SqliteLockProbe),
	}
}

/// Transaction double for probe tests: answers queries with queued rows and
/// records every statement it sees
#[cfg(test)]
pub(crate) mod scripted {
	use std::collections::VecDeque;

	use async_trait::async_trait;

	use crate::backends::{DatabaseError, QueryResult, QueryValue, Row, TransactionContext};

	#[derive(Debug, Default)]
	pub(crate) struct ScriptedTransaction {
		replies: VecDeque<Vec<Row>>,
		pub(crate) statements: Vec<(String, Vec<QueryValue>)>,
	}

	impl ScriptedTransaction {
		pub(crate) fn replying(replies: Vec<Vec<Row>>) -> Self {
			Self {
				replies: replies.into(),
				statements: Vec::new(),
			}
		}

		pub(crate) fn sql(&self) -> Vec<&str> {
			self.statements.iter().map(|(sql, _)| sql.as_str()).collect()
		}
	}

	pub(crate) fn row(column: &str, value: QueryValue) -> Row {
		let mut row = Row::new();
		row.insert(column, value);
		row
	}

	#[async_trait]
	impl TransactionContext for ScriptedTransaction {
		async fn execute(
			&mut self,
			sql: &str,
			params: Vec<QueryValue>,
		) -> Result<QueryResult, DatabaseError> {
			self.statements.push((sql.to_string(), params));
			Ok(QueryResult { rows_affected: 0 })
		}

		async fn fetch_all(
			&mut self,
			sql: &str,
			params: Vec<QueryValue>,
		) -> Result<Vec<Row>, DatabaseError> {
			self.statements.push((sql.to_string(), params));
			Ok(self.replies.pop_front().unwrap_or_default())
		}

		async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
			Ok(())
		}

		async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
			Ok(())
		}
	}
}
