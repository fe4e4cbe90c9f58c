//! rstest fixtures and ready-made participant operations

use anyhow::anyhow;
use rstest::*;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use crate::mock::{EventLog, MockDatabase};
use consort_conf::DatabaseConfig;
use consort_db::backends::{DatabaseError, SqlxClient};
use consort_db::saga::{CompensationOp, Operation, compensation, operation};

/// Mock databases sharing one event log
#[derive(Debug, Clone)]
pub struct MockCluster {
	events: EventLog,
	databases: Vec<MockDatabase>,
}

impl MockCluster {
	pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
		let events = EventLog::new();
		let databases = names
			.into_iter()
			.map(|name| MockDatabase::new(name).with_event_log(events.clone()))
			.collect();
		Self { events, databases }
	}

	/// Database by name
	///
	/// # Panics
	///
	/// Panics when the cluster has no database of that name.
	pub fn db(&self, name: &str) -> &MockDatabase {
		self.databases
			.iter()
			.find(|db| db.name() == name)
			.unwrap_or_else(|| panic!("no mock database named {}", name))
	}

	pub fn databases(&self) -> &[MockDatabase] {
		&self.databases
	}

	pub fn events(&self) -> &EventLog {
		&self.events
	}
}

/// Three mock databases: `orders`, `billing` and `inventory`
#[fixture]
pub fn cluster() -> MockCluster {
	MockCluster::new(["orders", "billing", "inventory"])
}

/// Temporary directory removed when dropped
#[fixture]
pub fn temp_dir() -> TempDir {
	TempDir::new().unwrap_or_else(|e| panic!("failed to create temp dir: {}", e))
}

/// Connect a SQLite database file inside `dir`
pub async fn sqlite_client(dir: &Path, name: &str) -> Result<SqlxClient, DatabaseError> {
	let path = dir.join(format!("{}.db", name));
	let config = DatabaseConfig::sqlite(path.to_string_lossy()).with_max_connections(2);
	SqlxClient::connect(&config).await
}

/// Write `key = value`; returns `{"key", "value"}`
pub fn put(key: impl Into<String>, value: impl Into<String>) -> Operation {
	let key = key.into();
	let value = value.into();
	operation(move |tx| {
		let key = key.clone();
		let value = value.clone();
		Box::pin(async move {
			tx.execute("PUT", vec![key.clone().into(), value.clone().into()])
				.await?;
			Ok(json!({ "key": key, "value": value }))
		})
	})
}

/// Delete the key named in the committed result of [`put`]
pub fn delete_committed_key() -> CompensationOp {
	compensation(|tx, committed: Value| {
		Box::pin(async move {
			let key = committed
				.get("key")
				.and_then(Value::as_str)
				.ok_or_else(|| anyhow!("committed result has no key"))?
				.to_string();
			tx.execute("DELETE", vec![key.clone().into()]).await?;
			Ok(json!({ "deleted": key }))
		})
	})
}

/// Operation that always fails
pub fn fail_with(message: &'static str) -> Operation {
	operation(move |_tx| Box::pin(async move { Err::<Value, _>(anyhow!(message)) }))
}

/// Compensation that always fails
pub fn failing_compensation(message: &'static str) -> CompensationOp {
	compensation(move |_tx, _| Box::pin(async move { Err::<Value, _>(anyhow!(message)) }))
}

/// Operation that panics
pub fn panic_with(message: &'static str) -> Operation {
	operation(move |_tx| Box::pin(async move { panic!("{}", message) }))
}

/// Run `inner` for the first `successes` calls, then fail
///
/// A participant calls its operation once for the dry run and once for the
/// commit, so `fail_after(1, ..)` passes validation and fails the commit.
pub fn fail_after(successes: usize, inner: Operation) -> Operation {
	let calls = Arc::new(AtomicUsize::new(0));
	operation(move |tx| {
		let call = calls.fetch_add(1, Ordering::SeqCst);
		if call < successes {
			inner(tx)
		} else {
			Box::pin(async move { Err(anyhow!("operation failed on call {}", call + 1)) })
		}
	})
}

/// Count how often `inner` is called
pub fn counted(inner: Operation) -> (Operation, Arc<AtomicUsize>) {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let op = operation(move |tx| {
		counter.fetch_add(1, Ordering::SeqCst);
		inner(tx)
	});
	(op, calls)
}
