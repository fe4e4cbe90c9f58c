//! # consort-test
//!
//! Testing utilities for Consort.
//!
//! - [`MockDatabase`]: in-memory key/value database with staged writes,
//!   failure and latency injection, and a shared event log
//! - [`MockLockProbe`]: lock probe reporting configurable locks as held
//! - [`MockClient`]: mockall-generated [`DatabaseClient`](consort_db::DatabaseClient)
//!   for call verification
//! - [`fixtures`]: rstest fixtures and ready-made operations
//! - [`logging`]: test subscriber setup and log capture
//!
//! ## Statements understood by [`MockDatabase`]
//!
//! | Statement | Parameters | Effect |
//! |-----------|------------|--------|
//! | `PUT`     | key, value | stage a write |
//! | `DELETE`  | key        | stage a delete |
//! | `GET`     | key        | fetch one row with a `value` column |
//! | `SELECT 1`| none       | fetch one row |

pub mod fixtures;
pub mod logging;
pub mod mock;

pub use fixtures::MockCluster;
pub use logging::{CapturedLog, LogCapture, init_test_logging};
pub use mock::{EventLog, MockClient, MockDatabase, MockEvent, MockLockProbe, RecordedEvent};
