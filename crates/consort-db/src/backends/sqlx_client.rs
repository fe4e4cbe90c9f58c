//! sqlx-backed client for PostgreSQL, MySQL and SQLite
//!
//! Uses the `Any` driver so one client type serves every configured engine.
//! Transactions are driven with raw `BEGIN`/`COMMIT`/`ROLLBACK` statements on
//! a dedicated pool connection, which lets the isolation level be set where
//! each engine expects it.

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column as _, Row as _};

use super::client::{DatabaseClient, TransactionContext};
use super::error::{DatabaseError, Result};
use super::types::{QueryResult, QueryValue, Row};
use consort_conf::{DatabaseConfig, Engine, IsolationLevel};

/// Database client over a sqlx `Any` pool
#[derive(Clone, Debug)]
pub struct SqlxClient {
	pool: AnyPool,
	engine: Engine,
}

impl SqlxClient {
	/// Connect using a database configuration
	///
	/// # Examples
	///
	/// ```rust,no_run
	/// use consort_conf::DatabaseConfig;
	/// use consort_db::backends::SqlxClient;
	///
	/// # async fn example() -> Result<(), consort_db::backends::DatabaseError> {
	/// let config = DatabaseConfig::postgresql("billing", "app", "secret", "localhost", 5432);
	/// let client = SqlxClient::connect(&config).await?;
	/// # Ok(())
	/// # }
	/// ```
	pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
		sqlx::any::install_default_drivers();

		let pool = AnyPoolOptions::new()
			.max_connections(config.max_connections)
			.connect(&config.to_url())
			.await
			.map_err(|e| DatabaseError::Connection(format!("{}: {}", config.name, e)))?;

		Ok(Self {
			pool,
			engine: config.engine,
		})
	}

	/// Wrap an existing pool
	///
	/// The caller states the engine; it is not inferred from the URL.
	pub fn from_pool(pool: AnyPool, engine: Engine) -> Self {
		Self { pool, engine }
	}

	pub fn pool(&self) -> &AnyPool {
		&self.pool
	}
}

#[async_trait]
impl DatabaseClient for SqlxClient {
	fn engine(&self) -> Engine {
		self.engine
	}

	async fn ping(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}

	async fn begin(
		&self,
		isolation: Option<IsolationLevel>,
	) -> Result<Box<dyn TransactionContext>> {
		let mut connection = self.pool.acquire().await?;

		// MySQL applies SET TRANSACTION to the next transaction only, so it
		// must precede START TRANSACTION. PostgreSQL requires it inside.
		if let (Engine::Mysql, Some(level)) = (self.engine, isolation) {
			let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", level.to_sql());
			sqlx::query(&sql).execute(&mut *connection).await?;
		}

		let begin = match self.engine {
			Engine::Mysql => "START TRANSACTION",
			Engine::Postgres | Engine::Sqlite => "BEGIN",
		};
		sqlx::query(begin).execute(&mut *connection).await?;

		if let (Engine::Postgres, Some(level)) = (self.engine, isolation) {
			let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", level.to_sql());
			if let Err(e) = sqlx::query(&sql).execute(&mut *connection).await {
				let _ = sqlx::query("ROLLBACK").execute(&mut *connection).await;
				return Err(e.into());
			}
		}

		if let (Engine::Sqlite, Some(level)) = (self.engine, isolation)
			&& level != IsolationLevel::Serializable
		{
			tracing::debug!(
				isolation = level.to_sql(),
				"SQLite transactions are always serializable; isolation level ignored"
			);
		}

		Ok(Box::new(SqlxTransaction {
			connection: Some(connection),
		}))
	}

	async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		let result = bind_all(sql, params).execute(&self.pool).await?;
		Ok(QueryResult {
			rows_affected: result.rows_affected(),
		})
	}

	async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		let rows = bind_all(sql, params).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(decode_row).collect())
	}
}

/// Open transaction on a dedicated pool connection
pub struct SqlxTransaction {
	connection: Option<PoolConnection<Any>>,
}

impl SqlxTransaction {
	fn connection(&mut self) -> Result<&mut PoolConnection<Any>> {
		self.connection
			.as_mut()
			.ok_or_else(|| DatabaseError::Transaction("transaction already finished".to_string()))
	}

	async fn finish(mut self: Box<Self>, statement: &str) -> Result<()> {
		let mut connection = self
			.connection
			.take()
			.ok_or_else(|| DatabaseError::Transaction("transaction already finished".to_string()))?;

		match sqlx::query(statement).execute(&mut *connection).await {
			Ok(_) => Ok(()),
			Err(e) => {
				// State of the session is unknown; never return it to the pool.
				drop(connection.detach());
				Err(e.into())
			}
		}
	}
}

#[async_trait]
impl TransactionContext for SqlxTransaction {
	async fn execute(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		let connection = self.connection()?;
		let result = bind_all(sql, params).execute(&mut **connection).await?;
		Ok(QueryResult {
			rows_affected: result.rows_affected(),
		})
	}

	async fn fetch_all(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		let connection = self.connection()?;
		let rows = bind_all(sql, params).fetch_all(&mut **connection).await?;
		Ok(rows.iter().map(decode_row).collect())
	}

	async fn commit(self: Box<Self>) -> Result<()> {
		self.finish("COMMIT").await
	}

	async fn rollback(self: Box<Self>) -> Result<()> {
		self.finish("ROLLBACK").await
	}
}

impl Drop for SqlxTransaction {
	fn drop(&mut self) {
		if let Some(connection) = self.connection.take() {
			tracing::warn!("Transaction dropped while open; closing its connection");
			drop(connection.detach());
		}
	}
}

fn bind_all(sql: &str, params: Vec<QueryValue>) -> Query<'_, Any, AnyArguments<'_>> {
	params.into_iter().fold(sqlx::query(sql), |query, value| match value {
		QueryValue::Null => query.bind(Option::<String>::None),
		QueryValue::Bool(b) => query.bind(b),
		QueryValue::Int(i) => query.bind(i),
		QueryValue::Float(f) => query.bind(f),
		QueryValue::String(s) => query.bind(s),
		QueryValue::Bytes(b) => query.bind(b),
		QueryValue::Timestamp(ts) => query.bind(ts.to_rfc3339()),
	})
}

fn decode_row(row: &AnyRow) -> Row {
	let mut decoded = Row::new();
	for (index, column) in row.columns().iter().enumerate() {
		decoded.insert(column.name().to_string(), decode_column(row, index));
	}
	decoded
}

fn decode_column(row: &AnyRow, index: usize) -> QueryValue {
	if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
		return value.into();
	}
	if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
		return value.into();
	}
	if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
		return value.into();
	}
	if let Ok(value) = row.try_get::<Option<String>, _>(index) {
		return value.into();
	}
	if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
		return value.into();
	}
	QueryValue::Null
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	async fn memory_client() -> SqlxClient {
		sqlx::any::install_default_drivers();
		// A single connection keeps every query on the same in-memory database.
		let pool = AnyPoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		SqlxClient::from_pool(pool, Engine::Sqlite)
	}

	#[rstest]
	#[tokio::test]
	async fn test_ping_and_engine() {
		let client = memory_client().await;

		assert!(client.ping().await.is_ok());
		assert_eq!(client.engine(), Engine::Sqlite);
	}

	#[rstest]
	#[tokio::test]
	async fn test_rollback_discards_writes() {
		// Arrange
		let client = memory_client().await;
		client
			.execute("CREATE TABLE items (name TEXT NOT NULL)", vec![])
			.await
			.unwrap();

		// Act
		let mut tx = client.begin(None).await.unwrap();
		tx.execute("INSERT INTO items (name) VALUES (?)", vec!["a".into()])
			.await
			.unwrap();
		tx.rollback().await.unwrap();

		// Assert
		let rows = client
			.fetch_all("SELECT COUNT(*) AS n FROM items", vec![])
			.await
			.unwrap();
		assert_eq!(rows[0].get::<i64>("n").unwrap(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_commit_persists_and_decodes_columns() {
		let client = memory_client().await;
		client
			.execute(
				"CREATE TABLE items (name TEXT NOT NULL, qty INTEGER, price REAL)",
				vec![],
			)
			.await
			.unwrap();

		let mut tx = client.begin(Some(IsolationLevel::Serializable)).await.unwrap();
		tx.execute(
			"INSERT INTO items (name, qty, price) VALUES (?, ?, ?)",
			vec!["widget".into(), 3i64.into(), QueryValue::Null],
		)
		.await
		.unwrap();
		tx.commit().await.unwrap();

		let rows = client
			.fetch_all("SELECT name, qty, price FROM items", vec![])
			.await
			.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].get::<String>("name").unwrap(), "widget");
		assert_eq!(rows[0].get::<i64>("qty").unwrap(), 3);
		assert!(rows[0].value("price").unwrap().is_null());
	}

	#[rstest]
	#[tokio::test]
	async fn test_dropped_transaction_is_not_committed() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("dropped.db");
		let config = DatabaseConfig::sqlite(path.to_string_lossy()).with_max_connections(2);
		let client = SqlxClient::connect(&config).await.unwrap();
		client
			.execute("CREATE TABLE items (name TEXT NOT NULL)", vec![])
			.await
			.unwrap();

		// Act
		{
			let mut tx = client.begin(None).await.unwrap();
			tx.execute("INSERT INTO items (name) VALUES ('lost')", vec![])
				.await
				.unwrap();
		}

		// Assert
		let rows = client
			.fetch_all("SELECT COUNT(*) AS n FROM items", vec![])
			.await
			.unwrap();
		assert_eq!(rows[0].get::<i64>("n").unwrap(), 0);
	}
}
