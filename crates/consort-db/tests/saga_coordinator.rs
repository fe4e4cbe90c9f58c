//! Saga coordinator integration tests
//!
//! Drives full distributed transactions against mock databases and checks
//! phase behavior, participant states, compensation and failure analysis.

use consort_conf::{Engine, IsolationLevel};
use consort_db::backends::DatabaseError;
use consort_db::lock::RequiredLock;
use consort_db::saga::{
	CompensationOutcome, CoordinatorError, FailureKind, Participant, ParticipantError,
	ParticipantState, RecoveryStrategy, SagaCoordinator, TransactionOptions,
};
use consort_test::fixtures::{
	cluster, counted, delete_committed_key, fail_after, fail_with, failing_compensation,
	panic_with, put,
};
use consort_test::{MockClient, MockCluster, MockEvent, MockLockProbe};
use rstest::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn participant(cluster: &MockCluster, name: &str, op: consort_db::saga::Operation) -> Participant {
	Participant::new(name, cluster.db(name).client(), op)
}

// ============================================================================
// Success path
// ============================================================================

#[rstest]
#[tokio::test]
async fn test_all_participants_commit(cluster: MockCluster) {
	// Arrange
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")),
		participant(&cluster, "billing", put("invoice:1", "open")),
	];

	// Act
	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	// Assert
	assert!(result.success);
	assert!(result.global_transaction_id.starts_with("gtx_"));
	assert_eq!(result.results.len(), 2);
	assert!(result.error.is_none());
	assert!(result.failure.is_none());
	assert!(!result.partial_success);
	assert!(result.compensation_results.is_none());
	assert!(
		result
			.participants
			.iter()
			.all(|p| p.state == ParticipantState::Committed)
	);
	assert_eq!(result.analysis.strategy, RecoveryStrategy::None);
	assert_eq!(cluster.db("orders").value("order:1").as_deref(), Some("paid"));
	assert_eq!(cluster.db("billing").value("invoice:1").as_deref(), Some("open"));
}

#[rstest]
#[tokio::test]
async fn test_dry_run_is_rolled_back_before_commit(cluster: MockCluster) {
	let participants = vec![participant(&cluster, "orders", put("order:1", "paid"))];

	SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	let isolation = Some(IsolationLevel::ReadCommitted);
	assert_eq!(
		cluster.events().for_database("orders"),
		vec![
			MockEvent::Ping,
			MockEvent::Begin(isolation),
			MockEvent::Execute("PUT".to_string()),
			MockEvent::Rollback,
			MockEvent::Begin(isolation),
			MockEvent::Execute("PUT".to_string()),
			MockEvent::Commit,
		]
	);
	assert_eq!(cluster.db("orders").commit_count(), 1);
}

#[rstest]
#[tokio::test]
async fn test_isolation_level_reaches_every_transaction(cluster: MockCluster) {
	let participants = vec![participant(&cluster, "billing", put("invoice:1", "open"))];
	let options = TransactionOptions::default().with_isolation_level(IsolationLevel::Serializable);

	SagaCoordinator::new().execute(participants, options).await.unwrap();

	assert_eq!(
		cluster
			.events()
			.count("billing", &MockEvent::Begin(Some(IsolationLevel::Serializable))),
		2
	);
}

#[rstest]
#[tokio::test]
async fn test_commit_order_follows_priority(cluster: MockCluster) {
	// Arrange
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")).with_priority(1),
		participant(&cluster, "billing", put("invoice:1", "open")).with_priority(5),
	];

	// Act
	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	// Assert
	assert_eq!(cluster.events().commit_order(), vec!["billing", "orders"]);
	assert_eq!(result.committed_databases(), vec!["billing", "orders"]);
	assert_eq!(result.results[0].priority, 5);
}

#[rstest]
#[tokio::test]
async fn test_equal_priorities_keep_input_order(cluster: MockCluster) {
	let participants = vec![
		participant(&cluster, "inventory", put("sku:1", "3")),
		participant(&cluster, "orders", put("order:1", "paid")),
		participant(&cluster, "billing", put("invoice:1", "open")),
	];

	SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	assert_eq!(
		cluster.events().commit_order(),
		vec!["inventory", "orders", "billing"]
	);
}

// ============================================================================
// Validation failures
// ============================================================================

#[rstest]
#[tokio::test]
async fn test_validation_failure_commits_nothing(cluster: MockCluster) {
	// Arrange
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")),
		participant(&cluster, "billing", fail_with("insufficient funds")),
	];

	// Act
	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	// Assert
	assert!(!result.success);
	assert!(!result.partial_success);
	assert_eq!(result.failure, Some(FailureKind::Validation));
	assert!(result.results.is_empty());
	assert!(result.error.as_deref().unwrap().contains("insufficient funds"));
	assert_eq!(result.participant("orders").unwrap().state, ParticipantState::Aborted);
	assert_eq!(result.participant("billing").unwrap().state, ParticipantState::Failed);
	assert!(matches!(
		result.participant("billing").unwrap().error,
		Some(ParticipantError::Operation { .. })
	));
	assert!(cluster.events().commit_order().is_empty());
	assert_eq!(cluster.db("orders").value("order:1"), None);
	assert_eq!(result.phase2_duration, Duration::ZERO);
	assert_eq!(result.analysis.strategy, RecoveryStrategy::Retry);
	assert!(
		result
			.analysis
			.recommendations
			.contains(&"Inspect operation error on database billing".to_string())
	);
}

#[rstest]
#[tokio::test]
async fn test_every_validation_failure_is_reported(cluster: MockCluster) {
	cluster.db("inventory").set_fail_begin(true);
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")),
		participant(&cluster, "billing", fail_with("card declined")),
		participant(&cluster, "inventory", put("sku:1", "2")),
	];

	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	assert_eq!(
		result.analysis.failed_databases,
		vec!["billing".to_string(), "inventory".to_string()]
	);
	assert!(matches!(
		result.participant("inventory").unwrap().error,
		Some(ParticipantError::Database { .. })
	));
	let error = result.error.unwrap();
	assert!(error.contains("card declined"));
	assert!(error.contains("inventory"));
}

#[rstest]
#[tokio::test]
async fn test_unhealthy_database_fails_validation(cluster: MockCluster) {
	cluster.db("billing").set_fail_ping(true);
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")),
		participant(&cluster, "billing", put("invoice:1", "open")),
	];

	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	assert_eq!(result.failure, Some(FailureKind::Validation));
	assert!(matches!(
		result.participant("billing").unwrap().error,
		Some(ParticipantError::Unhealthy { .. })
	));
	assert_eq!(cluster.events().for_database("billing"), vec![MockEvent::Ping]);
	assert!(
		result
			.analysis
			.recommendations
			.contains(&"Check connectivity of database billing".to_string())
	);
}

#[rstest]
#[tokio::test]
async fn test_unhealthy_client_never_opens_transaction() {
	// Arrange
	let mut client = MockClient::new();
	client.expect_engine().return_const(Engine::Postgres);
	client
		.expect_ping()
		.times(1)
		.returning(|| Err(DatabaseError::Connection("connection refused".to_string())));
	client.expect_begin().never();
	let participants = vec![Participant::new("ledger", Arc::new(client), put("entry:1", "1"))];

	// Act
	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	// Assert
	let report = result.participant("ledger").unwrap();
	assert_eq!(report.state, ParticipantState::Failed);
	assert!(
		report
			.error
			.as_ref()
			.unwrap()
			.to_string()
			.contains("connection refused")
	);
}

#[rstest]
#[tokio::test]
async fn test_held_lock_fails_validation_without_running_operation(cluster: MockCluster) {
	// Arrange
	let probe = MockLockProbe::new();
	let lock = RequiredLock::new("orders", 42);
	probe.hold(&lock);
	let (op, calls) = counted(put("invoice:1", "open"));
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")),
		participant(&cluster, "billing", op)
			.with_required_lock(lock.clone())
			.with_lock_probe(probe.probe_arc()),
	];

	// Act
	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	// Assert
	assert_eq!(result.failure, Some(FailureKind::Validation));
	assert_eq!(
		result.participant("billing").unwrap().error,
		Some(ParticipantError::LockUnavailable {
			database: "billing".to_string(),
			lock: "orders:42".to_string(),
			holder: Some("mock holder".to_string()),
		})
	);
	assert_eq!(calls.load(Ordering::SeqCst), 0);
	assert_eq!(probe.probed(), vec!["orders:42"]);
	assert_eq!(
		cluster.events().count("billing", &MockEvent::Rollback),
		1
	);
	assert!(
		result
			.analysis
			.recommendations
			.contains(&"Retry after lock orders:42 on database billing is released".to_string())
	);
}

#[rstest]
#[tokio::test]
async fn test_released_lock_lets_run_commit(cluster: MockCluster) {
	let probe = MockLockProbe::new();
	let lock = RequiredLock::new("invoices", 7);
	probe.hold(&lock);
	probe.release(&lock);
	let participants = vec![
		participant(&cluster, "billing", put("invoice:7", "open"))
			.with_required_lock(lock)
			.with_lock_probe(probe.probe_arc()),
	];

	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	assert!(result.success);
	// Probed during the dry run only
	assert_eq!(probe.probed().len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_panicking_operation_is_contained(cluster: MockCluster) {
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")),
		participant(&cluster, "billing", panic_with("ledger corrupted")),
	];

	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	assert_eq!(result.failure, Some(FailureKind::Validation));
	match &result.participant("billing").unwrap().error {
		Some(ParticipantError::Panicked { message, .. }) => {
			assert_eq!(message, "ledger corrupted");
		}
		other => panic!("expected a panic report, got {:?}", other),
	}
	assert_eq!(cluster.events().count("billing", &MockEvent::Rollback), 1);
	assert_eq!(cluster.db("orders").value("order:1"), None);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_prepare_timeout_never_commits(cluster: MockCluster) {
	// Arrange
	cluster.db("billing").set_latency(Duration::from_secs(10));
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")),
		participant(&cluster, "billing", put("invoice:1", "open")),
	];
	let options = TransactionOptions::default().with_prepare_timeout(Duration::from_secs(1));

	// Act
	let result = SagaCoordinator::new().execute(participants, options).await.unwrap();

	// Assert
	assert_eq!(result.failure, Some(FailureKind::Validation));
	assert_eq!(result.participant("billing").unwrap().state, ParticipantState::Timeout);
	assert_eq!(
		result.participant("billing").unwrap().error,
		Some(ParticipantError::Timeout {
			database: "billing".to_string(),
			timeout_ms: 1000,
		})
	);
	assert!(cluster.events().commit_order().is_empty());
	assert_eq!(result.analysis.strategy, RecoveryStrategy::Retry);
	assert!(
		result
			.analysis
			.recommendations
			.contains(&"Increase timeout for database billing".to_string())
	);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_participant_timeout_caps_phase_timeout(cluster: MockCluster) {
	cluster.db("orders").set_latency(Duration::from_millis(500));
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")).with_timeout(Duration::from_millis(100)),
	];

	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	assert_eq!(
		result.participant("orders").unwrap().error,
		Some(ParticipantError::Timeout {
			database: "orders".to_string(),
			timeout_ms: 100,
		})
	);
}

// ============================================================================
// Commit failures and compensation
// ============================================================================

#[rstest]
#[tokio::test]
async fn test_partial_commit_is_compensated_in_reverse_order(cluster: MockCluster) {
	// Arrange
	cluster.db("inventory").set_fail_commit(true);
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid"))
			.with_priority(10)
			.with_rollback(delete_committed_key()),
		participant(&cluster, "billing", put("invoice:1", "open"))
			.with_priority(5)
			.with_rollback(delete_committed_key()),
		participant(&cluster, "inventory", put("sku:1", "0"))
			.with_priority(1)
			.with_rollback(delete_committed_key()),
	];

	// Act
	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	// Assert
	assert!(!result.success);
	assert!(result.partial_success);
	assert_eq!(result.failure, Some(FailureKind::PartialCommit));
	assert_eq!(result.committed_databases(), vec!["orders", "billing"]);
	assert_eq!(result.compensated_databases(), vec!["billing", "orders"]);
	assert_eq!(result.participant("orders").unwrap().state, ParticipantState::Committed);
	assert_eq!(result.participant("inventory").unwrap().state, ParticipantState::Failed);
	assert_eq!(cluster.db("orders").value("order:1"), None);
	assert_eq!(cluster.db("billing").value("invoice:1"), None);
	assert_eq!(cluster.db("inventory").value("sku:1"), None);
	assert_eq!(result.analysis.strategy, RecoveryStrategy::CompensatingTransaction);
	// Forward commits, then undo commits in reverse
	assert_eq!(
		cluster.events().commit_order(),
		vec!["orders", "billing", "billing", "orders"]
	);
}

#[rstest]
#[tokio::test]
async fn test_compensation_receives_committed_result(cluster: MockCluster) {
	cluster.db("billing").set_fail_commit(true);
	let participants = vec![
		participant(&cluster, "orders", put("order:9", "paid"))
			.with_priority(2)
			.with_rollback(delete_committed_key()),
		participant(&cluster, "billing", put("invoice:9", "open")).with_priority(1),
	];

	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	let compensation = result.compensation_results.unwrap();
	assert_eq!(compensation.len(), 1);
	assert_eq!(
		compensation[0].outcome,
		CompensationOutcome::Compensated {
			result: serde_json::json!({ "deleted": "order:9" }),
		}
	);
}

#[rstest]
#[tokio::test]
async fn test_missing_rollback_requires_manual_intervention(cluster: MockCluster) {
	// Arrange
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")).with_priority(2),
		participant(&cluster, "billing", fail_after(1, put("invoice:1", "open"))).with_priority(1),
	];

	// Act
	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	// Assert
	assert!(result.partial_success);
	assert_eq!(result.failure, Some(FailureKind::CompensationFailed));
	let compensation = result.compensation_results.as_ref().unwrap();
	assert_eq!(compensation.len(), 1);
	assert_eq!(compensation[0].database, "orders");
	assert_eq!(compensation[0].outcome, CompensationOutcome::Missing);
	assert_eq!(cluster.db("orders").value("order:1").as_deref(), Some("paid"));
	assert_eq!(result.analysis.strategy, RecoveryStrategy::ManualIntervention);
	assert!(
		result
			.analysis
			.recommendations
			.contains(&"Manually reconcile committed changes on database orders".to_string())
	);
}

#[rstest]
#[tokio::test]
async fn test_missing_rollback_on_shared_database_is_not_hidden(cluster: MockCluster) {
	// Arrange
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid"))
			.with_priority(3)
			.with_rollback(delete_committed_key()),
		participant(&cluster, "orders", put("order:2", "paid")).with_priority(2),
		participant(&cluster, "billing", fail_after(1, put("invoice:1", "open"))).with_priority(1),
	];
	let coordinator = SagaCoordinator::new();

	// Act
	let result = coordinator
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	// Assert
	assert_eq!(result.failure, Some(FailureKind::CompensationFailed));
	let compensation = result.compensation_results.as_ref().unwrap();
	assert_eq!(
		compensation
			.iter()
			.map(|c| (c.database.as_str(), c.is_compensated()))
			.collect::<Vec<_>>(),
		vec![("orders", false), ("orders", true)]
	);
	assert_eq!(cluster.db("orders").value("order:1"), None);
	assert_eq!(cluster.db("orders").value("order:2").as_deref(), Some("paid"));
	assert_eq!(result.analysis.strategy, RecoveryStrategy::ManualIntervention);
	assert_eq!(coordinator.stats().manual_interventions, 1);
}

#[rstest]
#[tokio::test]
async fn test_failed_compensation_does_not_stop_others(cluster: MockCluster) {
	cluster.db("inventory").set_fail_commit(true);
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid"))
			.with_priority(3)
			.with_rollback(failing_compensation("refund service down")),
		participant(&cluster, "billing", put("invoice:1", "open"))
			.with_priority(2)
			.with_rollback(delete_committed_key()),
		participant(&cluster, "inventory", put("sku:1", "0")).with_priority(1),
	];

	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	let compensation = result.compensation_results.as_ref().unwrap();
	assert_eq!(compensation[0].database, "billing");
	assert!(compensation[0].is_compensated());
	assert_eq!(compensation[1].database, "orders");
	assert!(matches!(
		&compensation[1].outcome,
		CompensationOutcome::Failed { error } if error.to_string().contains("refund service down")
	));
	assert_eq!(result.failure, Some(FailureKind::CompensationFailed));
	assert_eq!(cluster.db("billing").value("invoice:1"), None);
	assert_eq!(cluster.db("orders").value("order:1").as_deref(), Some("paid"));
	assert_eq!(result.analysis.strategy, RecoveryStrategy::ManualIntervention);
}

#[rstest]
#[tokio::test]
async fn test_first_commit_failure_aborts_the_rest(cluster: MockCluster) {
	let participants = vec![
		participant(&cluster, "orders", fail_after(1, put("order:1", "paid"))).with_priority(9),
		participant(&cluster, "billing", put("invoice:1", "open"))
			.with_priority(1)
			.with_rollback(delete_committed_key()),
	];

	let result = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap();

	assert!(!result.partial_success);
	assert_eq!(result.failure, Some(FailureKind::CommitFailed));
	assert!(result.compensation_results.is_none());
	assert_eq!(result.participant("orders").unwrap().state, ParticipantState::Failed);
	assert_eq!(result.participant("billing").unwrap().state, ParticipantState::Aborted);
	assert!(cluster.events().commit_order().is_empty());
	assert_eq!(result.analysis.strategy, RecoveryStrategy::Retry);
}

#[rstest]
#[tokio::test]
async fn test_disabled_compensation_leaves_commits_in_place(cluster: MockCluster) {
	cluster.db("billing").set_fail_commit(true);
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid"))
			.with_priority(2)
			.with_rollback(delete_committed_key()),
		participant(&cluster, "billing", put("invoice:1", "open")).with_priority(1),
	];
	let options = TransactionOptions::default().with_compensation(false);

	let result = SagaCoordinator::new().execute(participants, options).await.unwrap();

	assert!(result.partial_success);
	assert_eq!(result.failure, Some(FailureKind::PartialCommit));
	assert!(result.compensation_results.is_none());
	assert_eq!(cluster.db("orders").value("order:1").as_deref(), Some("paid"));
	assert_eq!(result.analysis.strategy, RecoveryStrategy::ManualIntervention);
	assert_eq!(result.analysis.committed_databases, vec!["orders".to_string()]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_commit_timeout_marks_participant(cluster: MockCluster) {
	// Dry run fits the prepare timeout, the real commit does not
	cluster.db("billing").set_latency(Duration::from_secs(2));
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid"))
			.with_priority(2)
			.with_rollback(delete_committed_key()),
		participant(&cluster, "billing", put("invoice:1", "open")).with_priority(1),
	];
	let options = TransactionOptions::default()
		.with_prepare_timeout(Duration::from_secs(30))
		.with_commit_timeout(Duration::from_secs(1));

	let result = SagaCoordinator::new().execute(participants, options).await.unwrap();

	assert_eq!(result.participant("billing").unwrap().state, ParticipantState::Timeout);
	assert_eq!(result.failure, Some(FailureKind::PartialCommit));
	assert_eq!(result.compensated_databases(), vec!["orders"]);
	assert_eq!(cluster.db("billing").value("invoice:1"), None);
}

// ============================================================================
// Input errors and statistics
// ============================================================================

#[rstest]
#[tokio::test]
async fn test_no_participants_is_rejected() {
	let error = SagaCoordinator::new()
		.execute(vec![], TransactionOptions::default())
		.await
		.unwrap_err();

	assert!(matches!(error, CoordinatorError::NoParticipants));
}

#[rstest]
#[tokio::test]
async fn test_zero_timeout_is_rejected(cluster: MockCluster) {
	let participants = vec![participant(&cluster, "orders", put("order:1", "paid"))];
	let options = TransactionOptions::default().with_commit_timeout(Duration::ZERO);

	let error = SagaCoordinator::new()
		.execute(participants, options)
		.await
		.unwrap_err();

	assert!(matches!(error, CoordinatorError::InvalidOptions(_)));
	assert!(cluster.events().events().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_zero_participant_timeout_is_rejected(cluster: MockCluster) {
	let participants = vec![
		participant(&cluster, "orders", put("order:1", "paid")),
		participant(&cluster, "billing", put("invoice:1", "open")).with_timeout(Duration::ZERO),
	];

	let error = SagaCoordinator::new()
		.execute(participants, TransactionOptions::default())
		.await
		.unwrap_err();

	assert!(matches!(error, CoordinatorError::InvalidOptions(ref message) if message.contains("billing")));
	assert!(cluster.events().events().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_stats_count_outcomes(cluster: MockCluster) {
	// Arrange
	let coordinator = SagaCoordinator::new();
	let observer = coordinator.clone();
	cluster.db("inventory").set_fail_commit(true);
	let options = TransactionOptions::default();

	// Act
	let runs = vec![
		vec![participant(&cluster, "orders", put("a", "1"))],
		vec![participant(&cluster, "billing", fail_with("nope"))],
		vec![
			participant(&cluster, "orders", put("b", "2"))
				.with_priority(1)
				.with_rollback(delete_committed_key()),
			participant(&cluster, "inventory", put("c", "3")),
		],
		vec![
			participant(&cluster, "billing", put("d", "4")).with_priority(1),
			participant(&cluster, "inventory", put("e", "5")),
		],
	];
	for participants in runs {
		coordinator
			.execute(participants, options.clone())
			.await
			.unwrap();
	}

	// Assert
	let stats = observer.stats();
	assert_eq!(stats.total_runs, 4);
	assert_eq!(stats.successful_runs, 1);
	assert_eq!(stats.validation_failures, 1);
	assert_eq!(stats.commit_failures, 0);
	assert_eq!(stats.partial_commits, 2);
	assert_eq!(stats.compensations_attempted, 1);
	assert_eq!(stats.compensation_failures, 0);
	assert_eq!(stats.manual_interventions, 1);
	assert!((stats.success_rate() - 0.25).abs() < f64::EPSILON);
}
