//! Mock databases and lock probes

use async_trait::async_trait;
use mockall::mock;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use consort_conf::{Engine, IsolationLevel};
use consort_db::backends::{
	DatabaseClient, DatabaseError, QueryResult, QueryValue, Result, Row, TransactionContext,
};
use consort_db::lock::{LockProbe, LockStatus, RequiredLock};

/// Something a [`MockDatabase`] observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
	Ping,
	Begin(Option<IsolationLevel>),
	Execute(String),
	Commit,
	CommitFailed,
	Rollback,
	/// Transaction dropped without commit or rollback
	Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
	pub database: String,
	pub event: MockEvent,
}

/// Ordered record of events, shareable between databases
#[derive(Debug, Clone, Default)]
pub struct EventLog {
	events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl EventLog {
	pub fn new() -> Self {
		Self::default()
	}

	fn push(&self, database: &str, event: MockEvent) {
		self.events.lock().push(RecordedEvent {
			database: database.to_string(),
			event,
		});
	}

	pub fn events(&self) -> Vec<RecordedEvent> {
		self.events.lock().clone()
	}

	/// Events seen by one database
	pub fn for_database(&self, database: &str) -> Vec<MockEvent> {
		self.events
			.lock()
			.iter()
			.filter(|e| e.database == database)
			.map(|e| e.event.clone())
			.collect()
	}

	/// Databases in the order they committed
	pub fn commit_order(&self) -> Vec<String> {
		self.events
			.lock()
			.iter()
			.filter(|e| e.event == MockEvent::Commit)
			.map(|e| e.database.clone())
			.collect()
	}

	pub fn count(&self, database: &str, event: &MockEvent) -> usize {
		self.events
			.lock()
			.iter()
			.filter(|e| e.database == database && &e.event == event)
			.count()
	}

	pub fn clear(&self) {
		self.events.lock().clear();
	}
}

#[derive(Debug, Default)]
struct MockState {
	data: BTreeMap<String, String>,
	fail_ping: bool,
	fail_begin: bool,
	fail_commit: bool,
	latency: Duration,
	commits: usize,
}

/// In-memory key/value database
///
/// Writes made inside a transaction are staged and only become visible once
/// the transaction commits. Clones share data and configuration.
///
/// # Examples
///
/// ```
/// use consort_db::backends::DatabaseClient;
/// use consort_test::MockDatabase;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let db = MockDatabase::new("orders");
/// let mut tx = db.begin(None).await.unwrap();
/// tx.execute("PUT", vec!["order:1".into(), "paid".into()]).await.unwrap();
/// assert_eq!(db.value("order:1"), None);
///
/// tx.commit().await.unwrap();
/// assert_eq!(db.value("order:1").as_deref(), Some("paid"));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockDatabase {
	name: String,
	engine: Engine,
	state: Arc<Mutex<MockState>>,
	events: EventLog,
}

impl MockDatabase {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			engine: Engine::Sqlite,
			state: Arc::new(Mutex::new(MockState::default())),
			events: EventLog::new(),
		}
	}

	/// Report a different engine; lock probes picked from it follow
	pub fn with_engine(mut self, engine: Engine) -> Self {
		self.engine = engine;
		self
	}

	/// Record events into a shared log
	pub fn with_event_log(mut self, events: EventLog) -> Self {
		self.events = events;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn events(&self) -> &EventLog {
		&self.events
	}

	/// This database as a shareable client
	pub fn client(&self) -> Arc<dyn DatabaseClient> {
		Arc::new(self.clone())
	}

	/// Committed value for a key
	pub fn value(&self, key: &str) -> Option<String> {
		self.state.lock().data.get(key).cloned()
	}

	/// All committed data
	pub fn snapshot(&self) -> BTreeMap<String, String> {
		self.state.lock().data.clone()
	}

	/// Write committed data directly
	pub fn seed(&self, key: impl Into<String>, value: impl Into<String>) {
		self.state.lock().data.insert(key.into(), value.into());
	}

	pub fn set_fail_ping(&self, fail: bool) {
		self.state.lock().fail_ping = fail;
	}

	pub fn set_fail_begin(&self, fail: bool) {
		self.state.lock().fail_begin = fail;
	}

	/// Fail every commit; rollbacks still succeed, so dry runs pass
	pub fn set_fail_commit(&self, fail: bool) {
		self.state.lock().fail_commit = fail;
	}

	/// Delay applied to begin and every statement
	pub fn set_latency(&self, latency: Duration) {
		self.state.lock().latency = latency;
	}

	/// Number of successful commits
	pub fn commit_count(&self) -> usize {
		self.state.lock().commits
	}

	fn record(&self, event: MockEvent) {
		self.events.push(&self.name, event);
	}

	async fn delay(&self) {
		let latency = self.state.lock().latency;
		if !latency.is_zero() {
			tokio::time::sleep(latency).await;
		}
	}

	fn read(&self, key: &str, staged: &[(String, Option<String>)]) -> Option<String> {
		match staged.iter().rev().find(|(k, _)| k == key) {
			Some((_, value)) => value.clone(),
			None => self.value(key),
		}
	}
}

fn text_param(params: &[QueryValue], index: usize, statement: &str) -> Result<String> {
	match params.get(index) {
		Some(QueryValue::String(s)) => Ok(s.clone()),
		Some(QueryValue::Int(i)) => Ok(i.to_string()),
		Some(other) => Err(DatabaseError::TypeError(format!(
			"{} parameter {} must be text, got {:?}",
			statement, index, other
		))),
		None => Err(DatabaseError::Query(format!(
			"{} is missing parameter {}",
			statement, index
		))),
	}
}

fn value_row(value: Option<String>) -> Row {
	let mut row = Row::new();
	row.insert("value", value.into());
	row
}

fn one_row() -> Row {
	let mut row = Row::new();
	row.insert("1", QueryValue::Int(1));
	row
}

#[async_trait]
impl DatabaseClient for MockDatabase {
	fn engine(&self) -> Engine {
		self.engine
	}

	async fn ping(&self) -> Result<()> {
		self.record(MockEvent::Ping);
		if self.state.lock().fail_ping {
			return Err(DatabaseError::Connection(format!(
				"{} is unreachable",
				self.name
			)));
		}
		Ok(())
	}

	async fn begin(&self, isolation: Option<IsolationLevel>) -> Result<Box<dyn TransactionContext>> {
		self.delay().await;
		self.record(MockEvent::Begin(isolation));
		if self.state.lock().fail_begin {
			return Err(DatabaseError::Transaction(format!(
				"{} refused to begin a transaction",
				self.name
			)));
		}
		Ok(Box::new(MockTransaction {
			database: self.clone(),
			staged: Vec::new(),
			finished: false,
		}))
	}

	async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		let mut tx = self.begin(None).await?;
		let result = tx.execute(sql, params).await?;
		tx.commit().await?;
		Ok(result)
	}

	async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		self.delay().await;
		match sql.trim() {
			"GET" => {
				let key = text_param(&params, 0, "GET")?;
				Ok(vec![value_row(self.value(&key))])
			}
			"SELECT 1" => Ok(vec![one_row()]),
			other => Err(DatabaseError::Query(format!("unsupported statement: {}", other))),
		}
	}
}

struct MockTransaction {
	database: MockDatabase,
	staged: Vec<(String, Option<String>)>,
	finished: bool,
}

#[async_trait]
impl TransactionContext for MockTransaction {
	async fn execute(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		self.database.delay().await;
		let statement = sql.trim();
		self.database
			.record(MockEvent::Execute(statement.to_string()));

		match statement {
			"PUT" => {
				let key = text_param(&params, 0, "PUT")?;
				let value = text_param(&params, 1, "PUT")?;
				self.staged.push((key, Some(value)));
			}
			"DELETE" => {
				let key = text_param(&params, 0, "DELETE")?;
				self.staged.push((key, None));
			}
			other => {
				return Err(DatabaseError::Query(format!(
					"unsupported statement: {}",
					other
				)));
			}
		}
		Ok(QueryResult { rows_affected: 1 })
	}

	async fn fetch_all(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		self.database.delay().await;
		match sql.trim() {
			"GET" => {
				let key = text_param(&params, 0, "GET")?;
				Ok(vec![value_row(self.database.read(&key, &self.staged))])
			}
			"SELECT 1" => Ok(vec![one_row()]),
			other => Err(DatabaseError::Query(format!("unsupported statement: {}", other))),
		}
	}

	async fn commit(mut self: Box<Self>) -> Result<()> {
		self.finished = true;
		let staged = std::mem::take(&mut self.staged);
		let mut state = self.database.state.lock();
		if state.fail_commit {
			drop(state);
			self.database.record(MockEvent::CommitFailed);
			return Err(DatabaseError::Transaction(format!(
				"{} rejected the commit",
				self.database.name
			)));
		}

		for (key, value) in staged {
			match value {
				Some(value) => {
					state.data.insert(key, value);
				}
				None => {
					state.data.remove(&key);
				}
			}
		}
		state.commits += 1;
		drop(state);

		self.database.record(MockEvent::Commit);
		Ok(())
	}

	async fn rollback(mut self: Box<Self>) -> Result<()> {
		self.finished = true;
		self.staged.clear();
		self.database.record(MockEvent::Rollback);
		Ok(())
	}
}

impl Drop for MockTransaction {
	fn drop(&mut self) {
		if !self.finished {
			self.database.record(MockEvent::Dropped);
		}
	}
}

/// Lock probe with a configurable set of held locks
#[derive(Debug, Clone, Default)]
pub struct MockLockProbe {
	held: Arc<Mutex<HashSet<String>>>,
	probed: Arc<Mutex<Vec<String>>>,
}

impl MockLockProbe {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn hold(&self, lock: &RequiredLock) {
		self.held.lock().insert(lock.name());
	}

	pub fn release(&self, lock: &RequiredLock) {
		self.held.lock().remove(&lock.name());
	}

	/// Names of every lock probed so far
	pub fn probed(&self) -> Vec<String> {
		self.probed.lock().clone()
	}

	pub fn probe_arc(&self) -> Arc<dyn LockProbe> {
		Arc::new(self.clone())
	}
}

#[async_trait]
impl LockProbe for MockLockProbe {
	async fn probe(
		&self,
		_tx: &mut dyn TransactionContext,
		lock: &RequiredLock,
	) -> std::result::Result<LockStatus, DatabaseError> {
		let name = lock.name();
		self.probed.lock().push(name.clone());
		if self.held.lock().contains(&name) {
			Ok(LockStatus::Held {
				holder: Some("mock holder".to_string()),
			})
		} else {
			Ok(LockStatus::Available)
		}
	}
}

mock! {
	/// mockall-generated client for verifying calls
	///
	/// ```
	/// use consort_conf::Engine;
	/// use consort_db::backends::DatabaseClient;
	/// use consort_test::MockClient;
	///
	/// let mut client = MockClient::new();
	/// client.expect_engine().return_const(Engine::Postgres);
	/// assert_eq!(client.engine(), Engine::Postgres);
	/// ```
	pub Client {}

	#[async_trait]
	impl DatabaseClient for Client {
		fn engine(&self) -> Engine;
		async fn ping(&self) -> Result<()>;
		async fn begin(&self, isolation: Option<IsolationLevel>) -> Result<Box<dyn TransactionContext>>;
		async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult>;
		async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>>;
	}
}
