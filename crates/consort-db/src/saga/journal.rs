//! Run journal
//!
//! Audit trail of how each distributed transaction progressed. The
//! coordinator appends an entry when a run starts and whenever a phase
//! finishes. Entries are informational; nothing replays them.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Milestone recorded for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
	Started,
	Validated,
	ValidationFailed,
	Committed,
	CommitFailed,
	Compensated,
	CompensationFailed,
}

/// One journal record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunJournalEntry {
	pub global_transaction_id: String,
	pub phase: RunPhase,
	/// Database aliases in participant order
	pub participants: Vec<String>,
	pub timestamp: chrono::DateTime<chrono::Utc>,
	pub metadata: BTreeMap<String, String>,
}

impl RunJournalEntry {
	pub fn new(
		global_transaction_id: impl Into<String>,
		phase: RunPhase,
		participants: Vec<String>,
	) -> Self {
		Self {
			global_transaction_id: global_transaction_id.into(),
			phase,
			participants,
			timestamp: chrono::Utc::now(),
			metadata: BTreeMap::new(),
		}
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.metadata.insert(key.into(), value.to_string());
		self
	}
}

#[derive(Debug, Error)]
pub enum JournalError {
	#[error("journal I/O error at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("journal serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Storage for run journal entries
pub trait RunJournal: Send + Sync {
	/// Append an entry to its run
	fn record(&self, entry: &RunJournalEntry) -> Result<(), JournalError>;

	/// Entries of one run in the order they were recorded
	fn entries(&self, global_transaction_id: &str) -> Result<Vec<RunJournalEntry>, JournalError>;

	/// Identifiers of every journaled run
	fn run_ids(&self) -> Result<Vec<String>, JournalError>;

	/// Most recent entry of a run
	fn latest(&self, global_transaction_id: &str) -> Result<Option<RunJournalEntry>, JournalError> {
		Ok(self.entries(global_transaction_id)?.pop())
	}
}

/// Journal kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRunJournal {
	runs: Arc<Mutex<HashMap<String, Vec<RunJournalEntry>>>>,
}

impl InMemoryRunJournal {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every entry of every run, oldest first
	pub fn all_entries(&self) -> Vec<RunJournalEntry> {
		let mut entries: Vec<_> = self.runs.lock().values().flatten().cloned().collect();
		entries.sort_by_key(|entry| entry.timestamp);
		entries
	}
}

impl RunJournal for InMemoryRunJournal {
	fn record(&self, entry: &RunJournalEntry) -> Result<(), JournalError> {
		self.runs
			.lock()
			.entry(entry.global_transaction_id.clone())
			.or_default()
			.push(entry.clone());
		Ok(())
	}

	fn entries(&self, global_transaction_id: &str) -> Result<Vec<RunJournalEntry>, JournalError> {
		Ok(self
			.runs
			.lock()
			.get(global_transaction_id)
			.cloned()
			.unwrap_or_default())
	}

	fn run_ids(&self) -> Result<Vec<String>, JournalError> {
		let mut ids: Vec<String> = self.runs.lock().keys().cloned().collect();
		ids.sort();
		Ok(ids)
	}
}

/// Journal writing one JSON file per run
///
/// Each file holds the run's entries as a JSON array and is rewritten on
/// every append.
#[derive(Debug)]
pub struct FileRunJournal {
	dir: PathBuf,
	write_lock: Mutex<()>,
}

impl FileRunJournal {
	/// Open a journal directory, creating it when missing
	///
	/// # Examples
	///
	/// ```no_run
	/// use consort_db::saga::FileRunJournal;
	///
	/// let journal = FileRunJournal::new("/var/lib/consort/journal").unwrap();
	/// ```
	pub fn new(dir: impl Into<PathBuf>) -> Result<Self, JournalError> {
		let dir = dir.into();
		std::fs::create_dir_all(&dir).map_err(|source| JournalError::Io {
			path: dir.clone(),
			source,
		})?;
		Ok(Self {
			dir,
			write_lock: Mutex::new(()),
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn run_path(&self, global_transaction_id: &str) -> PathBuf {
		self.dir.join(format!("{}.json", global_transaction_id))
	}

	fn read_file(path: &Path) -> Result<Vec<RunJournalEntry>, JournalError> {
		if !path.exists() {
			return Ok(Vec::new());
		}
		let json = std::fs::read_to_string(path).map_err(|source| JournalError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Ok(serde_json::from_str(&json)?)
	}
}

impl RunJournal for FileRunJournal {
	fn record(&self, entry: &RunJournalEntry) -> Result<(), JournalError> {
		let _guard = self.write_lock.lock();
		let path = self.run_path(&entry.global_transaction_id);

		let mut entries = Self::read_file(&path)?;
		entries.push(entry.clone());
		let json = serde_json::to_string_pretty(&entries)?;

		std::fs::write(&path, json).map_err(|source| JournalError::Io { path, source })
	}

	fn entries(&self, global_transaction_id: &str) -> Result<Vec<RunJournalEntry>, JournalError> {
		Self::read_file(&self.run_path(global_transaction_id))
	}

	fn run_ids(&self) -> Result<Vec<String>, JournalError> {
		let read_dir = std::fs::read_dir(&self.dir).map_err(|source| JournalError::Io {
			path: self.dir.clone(),
			source,
		})?;

		let mut ids = Vec::new();
		for dir_entry in read_dir {
			let path = dir_entry
				.map_err(|source| JournalError::Io {
					path: self.dir.clone(),
					source,
				})?
				.path();
			if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
				continue;
			}
			if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
				ids.push(stem.to_string());
			}
		}
		ids.sort();
		Ok(ids)
	}
}
