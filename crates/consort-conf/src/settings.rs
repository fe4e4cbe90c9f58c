//! Settings types and the builder that assembles them from layered sources.

pub mod database_config;
pub mod sources;

pub use database_config::{DatabaseConfig, Engine};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sources::{ConfigSource, SourceError};
use std::time::Duration;

/// Errors raised while assembling or validating settings
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Failed to load {source_name}: {error}")]
	Source {
		source_name: String,
		#[source]
		error: SourceError,
	},

	#[error("Failed to deserialize settings: {0}")]
	Deserialize(#[from] serde_json::Error),

	#[error("Invalid setting `{key}`: {reason}")]
	Invalid { key: String, reason: String },
}

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
	ReadUncommitted,
	#[default]
	ReadCommitted,
	RepeatableRead,
	Serializable,
}

impl IsolationLevel {
	/// Convert isolation level to SQL string
	///
	/// # Examples
	///
	/// ```
	/// use consort_conf::settings::IsolationLevel;
	///
	/// assert_eq!(IsolationLevel::Serializable.to_sql(), "SERIALIZABLE");
	/// assert_eq!(IsolationLevel::ReadCommitted.to_sql(), "READ COMMITTED");
	/// ```
	pub fn to_sql(&self) -> &'static str {
		match self {
			IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
			IsolationLevel::ReadCommitted => "READ COMMITTED",
			IsolationLevel::RepeatableRead => "REPEATABLE READ",
			IsolationLevel::Serializable => "SERIALIZABLE",
		}
	}
}

/// Defaults applied to every distributed transaction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionSettings {
	/// Upper bound for a single participant's dry run, in milliseconds
	pub prepare_timeout_ms: u64,
	/// Upper bound for a single participant's commit, in milliseconds
	pub commit_timeout_ms: u64,
	pub isolation_level: IsolationLevel,
	/// Emit informational phase logs
	pub enable_logging: bool,
	/// Run rollback closures after a partial commit
	pub enable_compensation: bool,
	/// Directory for the file-backed run journal; no journal when unset
	pub journal_dir: Option<String>,
}

impl Default for TransactionSettings {
	fn default() -> Self {
		Self {
			prepare_timeout_ms: 30_000,
			commit_timeout_ms: 60_000,
			isolation_level: IsolationLevel::default(),
			enable_logging: true,
			enable_compensation: true,
			journal_dir: None,
		}
	}
}

impl TransactionSettings {
	pub fn prepare_timeout(&self) -> Duration {
		Duration::from_millis(self.prepare_timeout_ms)
	}

	pub fn commit_timeout(&self) -> Duration {
		Duration::from_millis(self.commit_timeout_ms)
	}
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
	/// Filter directive, e.g. `info` or `consort_db=debug,info`
	pub level: String,
	/// Emit JSON lines instead of human-readable output
	pub json: bool,
	pub with_target: bool,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			json: false,
			with_target: true,
		}
	}
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
	/// Database configurations keyed by alias
	pub databases: IndexMap<String, DatabaseConfig>,
	pub transaction: TransactionSettings,
	pub logging: LoggingSettings,
}

impl Settings {
	/// Check cross-field constraints that serde cannot express
	///
	/// # Examples
	///
	/// ```
	/// use consort_conf::Settings;
	///
	/// let mut settings = Settings::default();
	/// assert!(settings.validate().is_ok());
	///
	/// settings.transaction.prepare_timeout_ms = 0;
	/// assert!(settings.validate().is_err());
	/// ```
	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.transaction.prepare_timeout_ms == 0 {
			return Err(SettingsError::Invalid {
				key: "transaction.prepare_timeout_ms".to_string(),
				reason: "must be greater than zero".to_string(),
			});
		}
		if self.transaction.commit_timeout_ms == 0 {
			return Err(SettingsError::Invalid {
				key: "transaction.commit_timeout_ms".to_string(),
				reason: "must be greater than zero".to_string(),
			});
		}

		for (alias, db) in &self.databases {
			if alias.trim().is_empty() {
				return Err(SettingsError::Invalid {
					key: "databases".to_string(),
					reason: "database alias must not be empty".to_string(),
				});
			}
			if db.name.trim().is_empty() {
				return Err(SettingsError::Invalid {
					key: format!("databases.{}.name", alias),
					reason: "must not be empty".to_string(),
				});
			}
			if db.max_connections == 0 {
				return Err(SettingsError::Invalid {
					key: format!("databases.{}.max_connections", alias),
					reason: "must be greater than zero".to_string(),
				});
			}
		}

		Ok(())
	}
}

/// Builder merging configuration sources into [`Settings`]
///
/// Sources are applied in ascending priority, so a higher-priority source
/// overrides keys set by a lower one. Nested objects are merged key by key.
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a configuration source
	pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Merge all sources without deserializing
	pub fn merged(&self) -> Result<Map<String, Value>, SettingsError> {
		let mut ordered: Vec<&dyn ConfigSource> = self.sources.iter().map(|s| s.as_ref()).collect();
		ordered.sort_by_key(|s| s.priority());

		let mut merged = Map::new();
		for source in ordered {
			let values: IndexMap<String, Value> =
				source.load().map_err(|error| SettingsError::Source {
					source_name: source.description(),
					error,
				})?;
			for (key, value) in values {
				merge_value(&mut merged, key, value);
			}
		}

		Ok(merged)
	}

	/// Merge, deserialize and validate
	pub fn build(self) -> Result<Settings, SettingsError> {
		let merged = self.merged()?;
		let settings: Settings = serde_json::from_value(Value::Object(merged))?;
		settings.validate()?;
		Ok(settings)
	}
}

fn merge_value(target: &mut Map<String, Value>, key: String, value: Value) {
	match (target.get_mut(&key), value) {
		(Some(Value::Object(existing)), Value::Object(incoming)) => {
			for (k, v) in incoming {
				merge_value(existing, k, v);
			}
		}
		(_, value) => {
			target.insert(key, value);
		}
	}
}
