//! Outcome of a distributed transaction run

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::analysis::FailureAnalysis;
use super::compensation::CompensationResult;
use super::error::ParticipantError;
use super::state::ParticipantState;

/// Public classification of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	/// Validation failed; nothing was committed
	Validation,
	/// Some participants committed before a later commit failed
	PartialCommit,
	/// The first commit failed; nothing was committed
	CommitFailed,
	/// Committed work could not be fully compensated
	CompensationFailed,
}

/// Value produced by a committed participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedResult {
	pub database: String,
	pub priority: i32,
	pub result: Value,
}

/// Final view of one participant, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantReport {
	pub database: String,
	pub priority: i32,
	pub state: ParticipantState,
	pub error: Option<ParticipantError>,
	#[serde(with = "option_duration_ms")]
	pub prepare_duration: Option<Duration>,
	#[serde(with = "option_duration_ms")]
	pub commit_duration: Option<Duration>,
}

/// Everything known about a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedTransactionResult {
	pub success: bool,
	pub global_transaction_id: String,
	/// Committed results in commit order
	pub results: Vec<CommittedResult>,
	pub participants: Vec<ParticipantReport>,
	#[serde(with = "duration_ms")]
	pub phase1_duration: Duration,
	#[serde(with = "duration_ms")]
	pub phase2_duration: Duration,
	#[serde(with = "duration_ms")]
	pub total_duration: Duration,
	pub error: Option<String>,
	pub failure: Option<FailureKind>,
	/// Present when compensation ran, in compensation order
	pub compensation_results: Option<Vec<CompensationResult>>,
	pub partial_success: bool,
	pub analysis: FailureAnalysis,
}

impl DistributedTransactionResult {
	pub fn participant(&self, database: &str) -> Option<&ParticipantReport> {
		self.participants.iter().find(|p| p.database == database)
	}

	/// Databases in the order they committed
	pub fn committed_databases(&self) -> Vec<&str> {
		self.results.iter().map(|r| r.database.as_str()).collect()
	}

	/// Databases in the order compensation visited them
	pub fn compensated_databases(&self) -> Vec<&str> {
		self.compensation_results
			.iter()
			.flatten()
			.map(|c| c.database.as_str())
			.collect()
	}
}

/// Serialize a [`Duration`] as whole milliseconds
pub mod duration_ms {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(duration.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}

/// Serialize an optional [`Duration`] as whole milliseconds
pub mod option_duration_ms {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S: Serializer>(
		duration: &Option<Duration>,
		serializer: S,
	) -> Result<S::Ok, S::Error> {
		match duration {
			Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(
		deserializer: D,
	) -> Result<Option<Duration>, D::Error> {
		Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
	}
}
