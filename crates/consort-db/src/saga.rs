//! Saga-style distributed transactions
//!
//! A run validates every participant with a dry run, commits them one by one
//! in priority order and compensates committed work when a later commit
//! fails. See [`SagaCoordinator`] for the phases.
//!
//! ## Example
//!
//! ```rust,no_run
//! use consort_db::backends::DatabaseClient;
//! use consort_db::saga::{
//!     Participant, SagaCoordinator, TransactionOptions, compensation, operation,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     orders: Arc<dyn DatabaseClient>,
//! #     billing: Arc<dyn DatabaseClient>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let participants = vec![
//!     Participant::new(
//!         "orders",
//!         orders,
//!         operation(|tx| Box::pin(async move {
//!             tx.execute("UPDATE orders SET state = 'paid' WHERE id = 7", vec![]).await?;
//!             Ok(json!({ "order": 7 }))
//!         })),
//!     )
//!     .with_priority(10)
//!     .with_rollback(compensation(|tx, _| Box::pin(async move {
//!         tx.execute("UPDATE orders SET state = 'open' WHERE id = 7", vec![]).await?;
//!         Ok(json!(null))
//!     }))),
//!     Participant::new(
//!         "billing",
//!         billing,
//!         operation(|tx| Box::pin(async move {
//!             tx.execute("INSERT INTO invoices (order_id) VALUES (7)", vec![]).await?;
//!             Ok(json!({ "invoice_for": 7 }))
//!         })),
//!     ),
//! ];
//!
//! let result = SagaCoordinator::new()
//!     .execute(participants, TransactionOptions::default())
//!     .await?;
//! assert_eq!(result.committed_databases(), vec!["orders", "billing"]);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod journal;
pub mod options;
pub mod participant;
pub mod result;
pub mod state;
pub mod stats;

pub use analysis::{FailureAnalysis, RecoveryStrategy, analyze};
pub use compensation::{CompensationOutcome, CompensationResult};
pub use coordinator::SagaCoordinator;
pub use error::{CoordinatorError, ParticipantError};
pub use executor::{ExecutionMode, TransactionExecutor};
pub use journal::{
	FileRunJournal, InMemoryRunJournal, JournalError, RunJournal, RunJournalEntry, RunPhase,
};
pub use options::TransactionOptions;
pub use participant::{
	CompensationOp, Operation, OperationFuture, Participant, compensation, operation,
};
pub use result::{CommittedResult, DistributedTransactionResult, FailureKind, ParticipantReport};
pub use state::ParticipantState;
pub use stats::CoordinatorStats;
