//! Per-run transaction options

use std::time::Duration;

use super::error::CoordinatorError;
use consort_conf::{IsolationLevel, TransactionSettings};

/// Options for one distributed transaction run
///
/// # Examples
///
/// ```
/// use consort_db::saga::TransactionOptions;
/// use std::time::Duration;
///
/// let options = TransactionOptions::default()
///     .with_prepare_timeout(Duration::from_secs(5))
///     .with_compensation(false);
/// assert_eq!(options.commit_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOptions {
	pub prepare_timeout: Duration,
	pub commit_timeout: Duration,
	pub isolation_level: IsolationLevel,
	/// Emit informational phase logs; warnings and errors are always logged
	pub enable_logging: bool,
	pub enable_compensation: bool,
}

impl Default for TransactionOptions {
	fn default() -> Self {
		Self {
			prepare_timeout: Duration::from_secs(30),
			commit_timeout: Duration::from_secs(60),
			isolation_level: IsolationLevel::ReadCommitted,
			enable_logging: true,
			enable_compensation: true,
		}
	}
}

impl TransactionOptions {
	pub fn with_prepare_timeout(mut self, timeout: Duration) -> Self {
		self.prepare_timeout = timeout;
		self
	}

	pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
		self.commit_timeout = timeout;
		self
	}

	pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
		self.isolation_level = level;
		self
	}

	pub fn with_logging(mut self, enabled: bool) -> Self {
		self.enable_logging = enabled;
		self
	}

	pub fn with_compensation(mut self, enabled: bool) -> Self {
		self.enable_compensation = enabled;
		self
	}

	pub fn validate(&self) -> Result<(), CoordinatorError> {
		if self.prepare_timeout.is_zero() {
			return Err(CoordinatorError::InvalidOptions(
				"prepare_timeout must be greater than zero".to_string(),
			));
		}
		if self.commit_timeout.is_zero() {
			return Err(CoordinatorError::InvalidOptions(
				"commit_timeout must be greater than zero".to_string(),
			));
		}
		Ok(())
	}
}

impl From<&TransactionSettings> for TransactionOptions {
	fn from(settings: &TransactionSettings) -> Self {
		Self {
			prepare_timeout: settings.prepare_timeout(),
			commit_timeout: settings.commit_timeout(),
			isolation_level: settings.isolation_level,
			enable_logging: settings.enable_logging,
			enable_compensation: settings.enable_compensation,
		}
	}
}
