//! Test logging utilities
//!
//! [`init_test_logging`] routes tracing output through the test harness so it
//! shows up only for failing tests. [`LogCapture`] records events for
//! assertions about what was logged.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Once};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt as _};
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: Once = Once::new();

/// Initialize logging for tests (call once)
///
/// Honors `RUST_LOG`, defaulting to `warn`.
///
/// # Examples
///
/// ```
/// use consort_test::logging::init_test_logging;
///
/// init_test_logging();
/// init_test_logging();
/// ```
pub fn init_test_logging() {
	INIT.call_once(|| {
		let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
		let _ = tracing_subscriber::fmt()
			.with_env_filter(filter)
			.with_test_writer()
			.try_init();
	});
}

/// One captured tracing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLog {
	pub level: Level,
	pub message: String,
	pub fields: BTreeMap<String, String>,
}

/// Layer that stores every event it sees
///
/// # Examples
///
/// ```
/// use consort_test::logging::LogCapture;
/// use tracing::Level;
///
/// let capture = LogCapture::new();
/// {
///     let _guard = capture.set_default();
///     tracing::warn!(database = "orders", "Compensation skipped");
/// }
///
/// assert!(capture.contains(Level::WARN, "Compensation skipped"));
/// assert_eq!(capture.logs()[0].fields["database"], "orders");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
	logs: Arc<Mutex<Vec<CapturedLog>>>,
}

impl LogCapture {
	pub fn new() -> Self {
		Self::default()
	}

	/// Capture events on the current thread until the guard drops
	pub fn set_default(&self) -> DefaultGuard {
		tracing_subscriber::registry()
			.with(self.clone())
			.set_default()
	}

	pub fn logs(&self) -> Vec<CapturedLog> {
		self.logs.lock().clone()
	}

	/// Captured events at `level`
	pub fn at_level(&self, level: Level) -> Vec<CapturedLog> {
		self.logs
			.lock()
			.iter()
			.filter(|log| log.level == level)
			.cloned()
			.collect()
	}

	/// Whether an event at `level` has a message containing `needle`
	pub fn contains(&self, level: Level, needle: &str) -> bool {
		self.logs
			.lock()
			.iter()
			.any(|log| log.level == level && log.message.contains(needle))
	}

	pub fn clear(&self) {
		self.logs.lock().clear();
	}
}

impl<S: Subscriber> Layer<S> for LogCapture {
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let mut visitor = FieldVisitor::default();
		event.record(&mut visitor);

		self.logs.lock().push(CapturedLog {
			level: *event.metadata().level(),
			message: visitor.message,
			fields: visitor.fields,
		});
	}
}

#[derive(Default)]
struct FieldVisitor {
	message: String,
	fields: BTreeMap<String, String>,
}

impl Visit for FieldVisitor {
	fn record_str(&mut self, field: &Field, value: &str) {
		if field.name() == "message" {
			self.message = value.to_string();
		} else {
			self.fields.insert(field.name().to_string(), value.to_string());
		}
	}

	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		if field.name() == "message" {
			self.message = format!("{:?}", value);
		} else {
			self.fields
				.insert(field.name().to_string(), format!("{:?}", value));
		}
	}
}
