//! MySQL named lock probe

use async_trait::async_trait;

use super::{LockProbe, LockStatus, RequiredLock};
use crate::backends::{DatabaseError, TransactionContext};

/// Probe using `IS_USED_LOCK`
///
/// MySQL lock names are limited to 64 characters, so the lock is named after
/// its numeric key rather than its table and record.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlLockProbe;

impl MySqlLockProbe {
	pub fn lock_name(lock: &RequiredLock) -> String {
		format!("consort:{}", lock.key())
	}
}

#[async_trait]
impl LockProbe for MySqlLockProbe {
	async fn probe(
		&self,
		tx: &mut dyn TransactionContext,
		lock: &RequiredLock,
	) -> Result<LockStatus, DatabaseError> {
		let row = tx
			.fetch_optional(
				"SELECT IS_USED_LOCK(?) AS holder",
				vec![Self::lock_name(lock).into()],
			)
			.await?
			.ok_or_else(|| DatabaseError::Query("IS_USED_LOCK returned no row".into()))?;

		match row.get_optional::<i64>("holder")? {
			None => Ok(LockStatus::Available),
			Some(connection_id) => Ok(LockStatus::Held {
				holder: Some(format!("connection {}", connection_id)),
			}),
		}
	}
}
