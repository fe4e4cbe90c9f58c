//! # Database Backends
//!
//! The client contract the transaction coordinator drives, plus a sqlx-backed
//! implementation covering PostgreSQL, MySQL and SQLite.
//!
//! ## Core Traits
//!
//! - **[`DatabaseClient`]**: health check, raw query execution and
//!   connection-scoped transactions
//! - **[`TransactionContext`]**: one open transaction on a dedicated connection
//!
//! ## Example
//!
//! ```rust,no_run
//! use consort_conf::DatabaseConfig;
//! use consort_db::backends::{DatabaseClient, SqlxClient, transaction};
//!
//! # async fn example() -> Result<(), anyhow::Error> {
//! let client = SqlxClient::connect(&DatabaseConfig::sqlite("orders.db")).await?;
//!
//! let inserted = transaction(&client, None, |tx| {
//!     Box::pin(async move {
//!         let result = tx
//!             .execute("INSERT INTO orders (sku) VALUES (?)", vec!["A-1".into()])
//!             .await?;
//!         Ok(result.rows_affected)
//!     })
//! })
//! .await?;
//! assert_eq!(inserted, 1);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod sqlx_client;
pub mod types;

pub use client::{DatabaseClient, TransactionContext, transaction};
pub use consort_conf::{Engine, IsolationLevel};
pub use error::{DatabaseError, Result};
pub use sqlx_client::SqlxClient;
pub use types::{QueryResult, QueryValue, Row};
