//! # Consort
//!
//! Saga-style distributed transactions across independent SQL databases.
//!
//! A run validates every participant with a dry run inside a rolled-back
//! transaction, commits participants one at a time in priority order, and
//! compensates committed work in reverse order when a later commit fails.
//! Nothing here is two-phase commit: a run can end partially committed, and
//! the result says so together with a recovery strategy.
//!
//! ## Crates
//!
//! - [`conf`]: layered settings (defaults, TOML file, `CONSORT_` environment)
//! - [`db`]: database clients, lock probes, the coordinator, registry and
//!   repository
//! - `test` (feature `test`): mock databases and fixtures
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use consort::conf::SettingsBuilder;
//! use consort::conf::settings::sources::{EnvSource, TomlFileSource};
//! use consort::db::{DistributedStep, Repository, operation};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SettingsBuilder::new()
//!     .add_source(TomlFileSource::new("consort.toml"))
//!     .add_source(EnvSource::new())
//!     .build()?;
//! consort::init_logging(&settings.logging)?;
//!
//! let repository = Repository::from_settings(&settings).await?;
//! let result = repository
//!     .run_with_defaults(vec![
//!         DistributedStep::new(
//!             "orders",
//!             operation(|tx| Box::pin(async move {
//!                 tx.execute("UPDATE orders SET state = 'paid' WHERE id = 7", vec![]).await?;
//!                 Ok(json!({ "order": 7 }))
//!             })),
//!         )
//!         .with_priority(10),
//!         DistributedStep::new(
//!             "billing",
//!             operation(|tx| Box::pin(async move {
//!                 tx.execute("INSERT INTO invoices (order_id) VALUES (7)", vec![]).await?;
//!                 Ok(json!({ "invoice_for": 7 }))
//!             })),
//!         ),
//!     ])
//!     .await?;
//!
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod logging;

pub use consort_conf as conf;
pub use consort_db as db;

#[cfg(feature = "test")]
pub use consort_test as test;

pub use logging::{LoggingError, init_logging};

pub use consort_conf::{DatabaseConfig, Engine, IsolationLevel, Settings, SettingsBuilder};
pub use consort_db::{
	DistributedStep, DistributedTransactionResult, FailureKind, Participant, RecoveryStrategy,
	Repository, SagaCoordinator, TransactionOptions,
};
