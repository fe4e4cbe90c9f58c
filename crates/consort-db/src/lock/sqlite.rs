//! SQLite lock probe

use async_trait::async_trait;

use super::{LockProbe, LockStatus, RequiredLock};
use crate::backends::{DatabaseError, TransactionContext};

/// SQLite has no advisory locks; every lock reports available
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteLockProbe;

#[async_trait]
impl LockProbe for SqliteLockProbe {
	async fn probe(
		&self,
		_tx: &mut dyn TransactionContext,
		lock: &RequiredLock,
	) -> Result<LockStatus, DatabaseError> {
		tracing::trace!(lock = %lock, "SQLite has no advisory locks; reporting available");
		Ok(LockStatus::Available)
	}
}
