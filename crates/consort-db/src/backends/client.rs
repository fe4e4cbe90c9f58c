//! Client contract for databases taking part in distributed transactions

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::error::Result;
use super::types::{QueryResult, QueryValue, Row};
use consort_conf::{Engine, IsolationLevel};

/// A database the coordinator can talk to
///
/// Implementations own their connection management. The coordinator only
/// asks for health, raw queries and connection-scoped transactions.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
	/// Engine behind this client
	fn engine(&self) -> Engine;

	/// Liveness probe
	async fn ping(&self) -> Result<()>;

	/// Open a transaction on a dedicated connection
	async fn begin(
		&self,
		isolation: Option<IsolationLevel>,
	) -> Result<Box<dyn TransactionContext>>;

	/// Execute a statement outside any explicit transaction
	async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult>;

	/// Fetch rows outside any explicit transaction
	async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>>;
}

/// An open transaction bound to one connection
///
/// Dropping a context without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) must not hand a connection with an open
/// transaction back to a pool.
#[async_trait]
pub trait TransactionContext: Send {
	async fn execute(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult>;

	async fn fetch_all(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>>;

	async fn fetch_optional(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>> {
		let rows = self.fetch_all(sql, params).await?;
		Ok(rows.into_iter().next())
	}

	async fn commit(self: Box<Self>) -> Result<()>;

	async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Run a closure inside a transaction
///
/// Commits when the closure returns `Ok`, rolls back when it returns `Err`.
///
/// # Examples
///
/// ```rust,no_run
/// use consort_db::backends::{DatabaseClient, transaction};
///
/// # async fn example(client: &dyn DatabaseClient) -> Result<(), anyhow::Error> {
/// let count = transaction(client, None, |tx| {
///     Box::pin(async move {
///         let rows = tx.fetch_all("SELECT id FROM orders", vec![]).await?;
///         Ok(rows.len())
///     })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn transaction<F, T>(
	client: &dyn DatabaseClient,
	isolation: Option<IsolationLevel>,
	f: F,
) -> std::result::Result<T, anyhow::Error>
where
	F: for<'c> FnOnce(&'c mut dyn TransactionContext) -> BoxFuture<'c, anyhow::Result<T>>,
{
	let mut tx = client.begin(isolation).await?;
	match f(tx.as_mut()).await {
		Ok(value) => {
			tx.commit().await?;
			Ok(value)
		}
		Err(err) => {
			if let Err(rollback_err) = tx.rollback().await {
				tracing::warn!(error = %rollback_err, "Rollback after failed closure also failed");
			}
			Err(err)
		}
	}
}
