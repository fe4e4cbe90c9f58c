//! Saga error types

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::state::ParticipantState;
use crate::backends::DatabaseError;

/// Why one participant failed
///
/// Captured into the run result rather than propagated, so it is cloneable and
/// serializable.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParticipantError {
	#[error("database '{database}' failed its health check: {message}")]
	Unhealthy { database: String, message: String },

	#[error("lock {lock} on database '{database}' is held{}", holder.as_ref().map(|h| format!(" by {}", h)).unwrap_or_default())]
	LockUnavailable {
		database: String,
		lock: String,
		holder: Option<String>,
	},

	#[error("operation on database '{database}' failed: {message}")]
	Operation { database: String, message: String },

	#[error("database '{database}' error: {message}")]
	Database { database: String, message: String },

	#[error("database '{database}' timed out after {timeout_ms}ms")]
	Timeout { database: String, timeout_ms: u64 },

	#[error("operation on database '{database}' panicked: {message}")]
	Panicked { database: String, message: String },
}

impl ParticipantError {
	pub fn database(&self) -> &str {
		match self {
			ParticipantError::Unhealthy { database, .. }
			| ParticipantError::LockUnavailable { database, .. }
			| ParticipantError::Operation { database, .. }
			| ParticipantError::Database { database, .. }
			| ParticipantError::Timeout { database, .. }
			| ParticipantError::Panicked { database, .. } => database,
		}
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, ParticipantError::Timeout { .. })
	}

	pub(crate) fn database_error(database: &str, error: DatabaseError) -> Self {
		ParticipantError::Database {
			database: database.to_string(),
			message: error.to_string(),
		}
	}

	pub(crate) fn operation(database: &str, error: anyhow::Error) -> Self {
		ParticipantError::Operation {
			database: database.to_string(),
			message: format!("{:#}", error),
		}
	}

	pub(crate) fn timeout(database: &str, timeout: Duration) -> Self {
		ParticipantError::Timeout {
			database: database.to_string(),
			timeout_ms: timeout.as_millis() as u64,
		}
	}
}

/// Input the coordinator refuses to run
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CoordinatorError {
	#[error("a distributed transaction needs at least one participant")]
	NoParticipants,

	#[error("invalid transaction options: {0}")]
	InvalidOptions(String),

	#[error("unknown database alias '{0}'")]
	UnknownDatabase(String),

	#[error("participant '{database}' cannot move from {from} to {to}")]
	InvalidTransition {
		database: String,
		from: ParticipantState,
		to: ParticipantState,
	},
}
