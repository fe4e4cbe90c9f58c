//! Named databases available to distributed transactions
//!
//! A [`DatabaseRegistry`] is built once at startup, either from [`Settings`]
//! or by registering handles, and passed to whatever runs transactions.

use futures::future::join_all;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::backends::{DatabaseClient, DatabaseError, SqlxClient};
use crate::lock::{LockProbe, probe_for};
use crate::saga::{CoordinatorError, Operation, Participant};
use consort_conf::Settings;

/// A database client registered under an alias
#[derive(Clone)]
pub struct DatabaseHandle {
	alias: String,
	client: Arc<dyn DatabaseClient>,
	lock_probe: Arc<dyn LockProbe>,
}

impl DatabaseHandle {
	/// Create a handle whose lock probe matches the client's engine
	pub fn new(alias: impl Into<String>, client: Arc<dyn DatabaseClient>) -> Self {
		let lock_probe = probe_for(client.engine());
		Self {
			alias: alias.into(),
			client,
			lock_probe,
		}
	}

	pub fn with_lock_probe(mut self, lock_probe: Arc<dyn LockProbe>) -> Self {
		self.lock_probe = lock_probe;
		self
	}

	pub fn alias(&self) -> &str {
		&self.alias
	}

	pub fn client(&self) -> &Arc<dyn DatabaseClient> {
		&self.client
	}

	pub fn lock_probe(&self) -> &Arc<dyn LockProbe> {
		&self.lock_probe
	}

	/// Start a participant running `operation` against this database
	pub fn participant(&self, operation: Operation) -> Participant {
		Participant::new(self.alias.clone(), Arc::clone(&self.client), operation)
			.with_lock_probe(Arc::clone(&self.lock_probe))
	}
}

impl fmt::Debug for DatabaseHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DatabaseHandle")
			.field("alias", &self.alias)
			.field("engine", &self.client.engine())
			.finish()
	}
}

/// Alias to database mapping, in registration order
#[derive(Debug, Clone, Default)]
pub struct DatabaseRegistry {
	handles: IndexMap<String, DatabaseHandle>,
}

impl DatabaseRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Connect every database configured in `settings`
	///
	/// # Examples
	///
	/// ```rust,no_run
	/// use consort_conf::{DatabaseConfig, Settings};
	/// use consort_db::registry::DatabaseRegistry;
	///
	/// # async fn example() -> Result<(), consort_db::backends::DatabaseError> {
	/// let mut settings = Settings::default();
	/// settings
	///     .databases
	///     .insert("orders".to_string(), DatabaseConfig::sqlite("orders.db"));
	///
	/// let registry = DatabaseRegistry::connect(&settings).await?;
	/// assert!(registry.get("orders").is_some());
	/// # Ok(())
	/// # }
	/// ```
	pub async fn connect(settings: &Settings) -> Result<Self, DatabaseError> {
		let mut registry = Self::new();
		for (alias, config) in &settings.databases {
			let client = SqlxClient::connect(config).await?;
			tracing::info!(database = %alias, engine = %config.engine, "Connected database");
			registry.register(DatabaseHandle::new(alias.clone(), Arc::new(client)));
		}
		Ok(registry)
	}

	/// Add a handle, returning any handle previously registered under its alias
	pub fn register(&mut self, handle: DatabaseHandle) -> Option<DatabaseHandle> {
		let previous = self.handles.insert(handle.alias.clone(), handle);
		if let Some(previous) = &previous {
			tracing::warn!(database = %previous.alias, "Replaced registered database");
		}
		previous
	}

	pub fn with_handle(mut self, handle: DatabaseHandle) -> Self {
		self.register(handle);
		self
	}

	pub fn get(&self, alias: &str) -> Option<&DatabaseHandle> {
		self.handles.get(alias)
	}

	/// Look up an alias, failing for unknown ones
	pub fn require(&self, alias: &str) -> Result<&DatabaseHandle, CoordinatorError> {
		self.get(alias)
			.ok_or_else(|| CoordinatorError::UnknownDatabase(alias.to_string()))
	}

	pub fn aliases(&self) -> impl Iterator<Item = &str> {
		self.handles.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}

	/// Ping every database concurrently
	pub async fn health_check_all(&self) -> IndexMap<String, Result<(), DatabaseError>> {
		let pings = self.handles.values().map(|handle| async move {
			(handle.alias.clone(), handle.client.ping().await)
		});
		let results: IndexMap<_, _> = join_all(pings).await.into_iter().collect();

		for (alias, result) in &results {
			if let Err(error) = result {
				tracing::warn!(database = %alias, error = %error, "Health check failed");
			}
		}
		results
	}
}
