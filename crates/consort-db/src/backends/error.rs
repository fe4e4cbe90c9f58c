//! Database error types

/// Errors raised by database clients
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
	#[error("Connection error: {0}")]
	Connection(String),

	#[error("Query error: {0}")]
	Query(String),

	#[error("Transaction error: {0}")]
	Transaction(String),

	#[error("Column not found: {0}")]
	ColumnNotFound(String),

	#[error("Type error: {0}")]
	TypeError(String),

	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
