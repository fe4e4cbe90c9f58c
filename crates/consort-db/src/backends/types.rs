//! Value types exchanged with database clients

use super::error::DatabaseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Query parameter and column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	Timestamp(chrono::DateTime<chrono::Utc>),
}

impl QueryValue {
	pub fn is_null(&self) -> bool {
		matches!(self, QueryValue::Null)
	}
}

impl From<&str> for QueryValue {
	fn from(s: &str) -> Self {
		QueryValue::String(s.to_string())
	}
}

impl From<String> for QueryValue {
	fn from(s: String) -> Self {
		QueryValue::String(s)
	}
}

impl From<i64> for QueryValue {
	fn from(i: i64) -> Self {
		QueryValue::Int(i)
	}
}

impl From<i32> for QueryValue {
	fn from(i: i32) -> Self {
		QueryValue::Int(i as i64)
	}
}

impl From<f64> for QueryValue {
	fn from(f: f64) -> Self {
		QueryValue::Float(f)
	}
}

impl From<bool> for QueryValue {
	fn from(b: bool) -> Self {
		QueryValue::Bool(b)
	}
}

impl From<Vec<u8>> for QueryValue {
	fn from(b: Vec<u8>) -> Self {
		QueryValue::Bytes(b)
	}
}

impl From<chrono::DateTime<chrono::Utc>> for QueryValue {
	fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
		QueryValue::Timestamp(dt)
	}
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or(QueryValue::Null)
	}
}

/// Query result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
	pub rows_affected: u64,
}

/// Row from query result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
	data: HashMap<String, QueryValue>,
}

impl Row {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, key: impl Into<String>, value: QueryValue) {
		self.data.insert(key.into(), value);
	}

	/// Raw access to a column value
	pub fn value(&self, key: &str) -> Option<&QueryValue> {
		self.data.get(key)
	}

	/// Typed access to a column value
	///
	/// # Examples
	///
	/// ```
	/// use consort_db::backends::{QueryValue, Row};
	///
	/// let mut row = Row::new();
	/// row.insert("acquired", QueryValue::Bool(true));
	///
	/// let acquired: bool = row.get("acquired").unwrap();
	/// assert!(acquired);
	/// assert!(row.get::<i64>("missing").is_err());
	/// ```
	pub fn get<T>(&self, key: &str) -> std::result::Result<T, DatabaseError>
	where
		T: TryFrom<QueryValue, Error = DatabaseError>,
	{
		self.data
			.get(key)
			.cloned()
			.ok_or_else(|| DatabaseError::ColumnNotFound(key.to_string()))
			.and_then(T::try_from)
	}

	/// Typed access treating SQL `NULL` as `None`
	pub fn get_optional<T>(&self, key: &str) -> std::result::Result<Option<T>, DatabaseError>
	where
		T: TryFrom<QueryValue, Error = DatabaseError>,
	{
		match self.data.get(key) {
			None => Err(DatabaseError::ColumnNotFound(key.to_string())),
			Some(QueryValue::Null) => Ok(None),
			Some(value) => T::try_from(value.clone()).map(Some),
		}
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

impl TryFrom<QueryValue> for i64 {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Int(i) => Ok(i),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to i64",
				value
			))),
		}
	}
}

impl TryFrom<QueryValue> for String {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::String(s) => Ok(s),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to String",
				value
			))),
		}
	}
}

// Drivers report booleans as integers on MySQL and SQLite.
impl TryFrom<QueryValue> for bool {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Bool(b) => Ok(b),
			QueryValue::Int(0) => Ok(false),
			QueryValue::Int(1) => Ok(true),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to bool",
				value
			))),
		}
	}
}

impl TryFrom<QueryValue> for f64 {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Float(f) => Ok(f),
			QueryValue::Int(i) => Ok(i as f64),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to f64",
				value
			))),
		}
	}
}
