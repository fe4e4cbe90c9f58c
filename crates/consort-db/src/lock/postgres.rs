//! PostgreSQL advisory lock probe

use async_trait::async_trait;

use super::{LockProbe, LockStatus, RequiredLock};
use crate::backends::{DatabaseError, TransactionContext};

/// Probe using `pg_try_advisory_lock`
///
/// A successful try is released on the same connection right away, so the
/// probe never keeps the lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresLockProbe;

#[async_trait]
impl LockProbe for PostgresLockProbe {
	async fn probe(
		&self,
		tx: &mut dyn TransactionContext,
		lock: &RequiredLock,
	) -> Result<LockStatus, DatabaseError> {
		let key = lock.key();

		let row = tx
			.fetch_optional(
				"SELECT pg_try_advisory_lock($1) AS acquired",
				vec![key.into()],
			)
			.await?
			.ok_or_else(|| DatabaseError::Query("pg_try_advisory_lock returned no row".into()))?;

		if !row.get::<bool>("acquired")? {
			return Ok(LockStatus::Held { holder: None });
		}

		tx.execute("SELECT pg_advisory_unlock($1)", vec![key.into()])
			.await?;
		Ok(LockStatus::Available)
	}
}
