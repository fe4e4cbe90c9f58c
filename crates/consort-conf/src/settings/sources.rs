//! Configuration sources for layered settings
//!
//! Provides different sources of configuration that can be merged together
//! in priority order (environment variables > config files > defaults).

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Environment variable configuration source
///
/// Keys are lowercased after the prefix is stripped, and a double underscore
/// descends into a nested table: `CONSORT_TRANSACTION__COMMIT_TIMEOUT_MS=500`
/// sets `transaction.commit_timeout_ms`.
pub struct EnvSource {
	prefix: String,
	separator: String,
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	/// Create a source reading variables starting with `CONSORT_`
	///
	/// # Examples
	///
	/// ```
	/// use consort_conf::settings::sources::{ConfigSource, EnvSource};
	///
	/// let source = EnvSource::new();
	/// assert_eq!(source.priority(), 100);
	/// ```
	pub fn new() -> Self {
		Self {
			prefix: "CONSORT_".to_string(),
			separator: "__".to_string(),
			vars: None,
		}
	}

	/// Replace the variable prefix
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	/// Read from the given pairs instead of the process environment
	///
	/// # Examples
	///
	/// ```
	/// use consort_conf::settings::sources::{ConfigSource, EnvSource};
	///
	/// let source = EnvSource::new().with_vars([("CONSORT_LOGGING__LEVEL", "debug")]);
	/// let values = source.load().unwrap();
	/// assert_eq!(values["logging"]["level"], "debug");
	/// ```
	pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.vars = Some(
			vars.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		);
		self
	}

	fn parse_scalar(value: &str) -> Value {
		let trimmed = value.trim();
		if let Ok(num) = trimmed.parse::<i64>() {
			return Value::Number(num.into());
		}
		match trimmed.to_lowercase().as_str() {
			"true" | "yes" | "on" => Value::Bool(true),
			"false" | "no" | "off" => Value::Bool(false),
			_ => Value::String(value.to_string()),
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let vars: Vec<(String, String)> = match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		};

		let mut config: IndexMap<String, Value> = IndexMap::new();

		for (key, value) in vars {
			let Some(clean_key) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			let path: Vec<String> = clean_key
				.split(&self.separator)
				.map(|segment| segment.to_lowercase())
				.collect();
			if path.iter().any(|segment| segment.is_empty()) {
				return Err(SourceError::Parse(format!(
					"Invalid environment variable name: {}",
					key
				)));
			}

			let parsed = Self::parse_scalar(&value);
			let Some((head, rest)) = path.split_first() else {
				continue;
			};

			if rest.is_empty() {
				config.insert(head.clone(), parsed);
				continue;
			}

			let entry = config
				.entry(head.clone())
				.or_insert_with(|| Value::Object(Map::new()));
			if !entry.is_object() {
				*entry = Value::Object(Map::new());
			}
			insert_path(entry, rest, parsed);
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

fn insert_path(target: &mut Value, path: &[String], value: Value) {
	let Value::Object(map) = target else {
		return;
	};
	match path {
		[] => {}
		[last] => {
			map.insert(last.clone(), value);
		}
		[head, rest @ ..] => {
			let child = map
				.entry(head.clone())
				.or_insert_with(|| Value::Object(Map::new()));
			if !child.is_object() {
				*child = Value::Object(Map::new());
			}
			insert_path(child, rest, value);
		}
	}
}

/// TOML file configuration source
///
/// A missing file yields no values rather than an error.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	/// Create a new TOML file configuration source
	///
	/// # Examples
	///
	/// ```
	/// use consort_conf::settings::sources::TomlFileSource;
	///
	/// let source = TomlFileSource::new("consort.toml");
	/// ```
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;
		let json_value = serde_json::to_value(toml_value)?;

		let map = json_value
			.as_object()
			.ok_or_else(|| SourceError::Parse("Expected table at root".to_string()))?;

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Default values configuration source
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	/// Create a new default values configuration source
	///
	/// # Examples
	///
	/// ```
	/// use consort_conf::settings::sources::DefaultSource;
	/// use serde_json::json;
	///
	/// let source = DefaultSource::new()
	///     .with_value("transaction", json!({ "prepare_timeout_ms": 5000 }));
	/// ```
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// Add a default value for a top-level key
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}
