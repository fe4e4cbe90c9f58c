//! # Consort Configuration
//!
//! Layered settings for Consort applications.
//!
//! Settings are assembled from several [`ConfigSource`](settings::sources::ConfigSource)s,
//! merged in priority order (environment variables > TOML file > defaults) and
//! deserialized into a typed [`Settings`] value.
//!
//! ## Example
//!
//! ```
//! use consort_conf::settings::SettingsBuilder;
//! use consort_conf::settings::sources::DefaultSource;
//! use serde_json::json;
//!
//! let settings = SettingsBuilder::new()
//!     .add_source(DefaultSource::new().with_value(
//!         "databases",
//!         json!({ "orders": { "engine": "sqlite", "name": "orders.db" } }),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! assert!(settings.databases.contains_key("orders"));
//! ```
//!
//! ## Module Organization
//!
//! - [`settings`]: settings types, sources and the builder that merges them

pub mod settings;

pub use settings::{
	DatabaseConfig, Engine, IsolationLevel, LoggingSettings, Settings, SettingsBuilder,
	SettingsError, TransactionSettings,
};
