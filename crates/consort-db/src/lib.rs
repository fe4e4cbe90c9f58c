//! # consort-db
//!
//! Distributed transactions over independent databases.
//!
//! ## Modules
//!
//! - [`backends`]: database client contract and the sqlx implementation
//! - [`lock`]: advisory lock probes per engine
//! - [`saga`]: the coordinator, its participants and results
//! - [`registry`]: databases by alias
//! - [`repository`]: alias-based entry point for applications
//!
//! Runs are sagas, not two-phase commit. A run that fails after some
//! participants committed relies on compensation, and reports what it could
//! not undo.

pub mod backends;
pub mod lock;
pub mod registry;
pub mod repository;
pub mod saga;

pub use backends::{DatabaseClient, DatabaseError, SqlxClient, TransactionContext};
pub use lock::{LockProbe, LockStatus, RequiredLock};
pub use registry::{DatabaseHandle, DatabaseRegistry};
pub use repository::{DistributedStep, Repository, SetupError};
pub use saga::{
	CoordinatorError, DistributedTransactionResult, FailureKind, Participant, ParticipantError,
	ParticipantState, RecoveryStrategy, SagaCoordinator, TransactionOptions, compensation,
	operation,
};
