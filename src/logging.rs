//! Process-wide logging setup

use consort_conf::LoggingSettings;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;

#[derive(Debug, Error)]
pub enum LoggingError {
	#[error("invalid log filter '{directive}': {source}")]
	Filter {
		directive: String,
		#[source]
		source: ParseError,
	},

	#[error("a global tracing subscriber is already installed: {0}")]
	AlreadyInstalled(#[from] TryInitError),
}

/// Build the filter for `settings`
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter, LoggingError> {
	if let Ok(filter) = EnvFilter::try_from_default_env() {
		return Ok(filter);
	}
	EnvFilter::try_new(&settings.level).map_err(|source| LoggingError::Filter {
		directive: settings.level.clone(),
		source,
	})
}

/// Install the global tracing subscriber
///
/// # Examples
///
/// ```
/// use consort::conf::LoggingSettings;
///
/// let settings = LoggingSettings {
///     level: "warn".to_string(),
///     ..LoggingSettings::default()
/// };
/// consort::init_logging(&settings).unwrap();
/// assert!(consort::init_logging(&settings).is_err());
/// ```
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
	use tracing_subscriber::util::SubscriberInitExt as _;

	let filter = env_filter(settings)?;
	let builder = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(settings.with_target);

	if settings.json {
		builder.json().finish().try_init()?;
	} else {
		builder.finish().try_init()?;
	}
	Ok(())
}
