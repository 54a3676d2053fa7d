use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use campaigner_core::traits::LogQueryService;
use campaigner_dispatcher::{DeliveryReconciler, ReconcileInput, ReconcileOutcome};
use campaigner_testing_utils::MockLogQueryService;

fn inputs(count: usize) -> Vec<ReconcileInput> {
    (0..count)
        .map(|i| ReconcileInput {
            number_id: i as i64 + 1,
            phone_number: format!("+7916{:07}", i),
            request_id: Some(format!("REQ{}", 1_000_000 + i)),
        })
        .collect()
}

#[tokio::test]
async fn batches_requests_and_classifies_delivery() {
    let log_query = Arc::new(MockLogQueryService::with_lines(vec![
        "[2026-08-01 10:00:00] REQ1000000 STATUS=DELIVERED".to_string(),
        "[2026-08-01 10:01:00] REQ1000100 STATUS=DELIVERED".to_string(),
        "[2026-08-01 10:02:00] REQ1000449 STATUS=FAILED".to_string(),
        "unrelated gateway noise".to_string(),
    ]));
    let reconciler =
        DeliveryReconciler::new(log_query.clone() as Arc<dyn LogQueryService>, 200);

    let report = reconciler.reconcile(inputs(450), &AtomicBool::new(false)).await;

    // 450个请求标识按200一批切成3批
    assert_eq!(report.batches_total, 3);
    assert_eq!(report.batches_completed, 3);
    assert_eq!(report.outcome, ReconcileOutcome::Completed);
    assert_eq!(log_query.query_count(), 3);
    for pattern in log_query.queries() {
        assert!(pattern.contains('|'));
    }

    assert_eq!(report.records.len(), 450);
    assert_eq!(report.delivered_count(), 3);
    assert_eq!(report.not_delivered_count(), 447);

    let hit = report
        .records
        .iter()
        .find(|r| r.request_id.as_deref() == Some("REQ1000100"))
        .unwrap();
    assert!(hit.delivered);
    assert_eq!(hit.matches.len(), 1);
    assert_eq!(hit.matches[0].marker.as_deref(), Some("DELIVERED"));
    assert_eq!(
        hit.matches[0].timestamp.as_deref(),
        Some("2026-08-01 10:01:00")
    );
}

#[tokio::test]
async fn numbers_without_request_id_are_not_queried() {
    let log_query = Arc::new(MockLogQueryService::new());
    let reconciler = DeliveryReconciler::new(log_query.clone() as Arc<dyn LogQueryService>, 100);

    let inputs: Vec<ReconcileInput> = (0..5)
        .map(|i| ReconcileInput {
            number_id: i + 1,
            phone_number: format!("+7916000000{i}"),
            request_id: None,
        })
        .collect();

    let report = reconciler.reconcile(inputs, &AtomicBool::new(false)).await;

    assert_eq!(report.batches_total, 0);
    assert_eq!(log_query.query_count(), 0);
    assert_eq!(report.records.len(), 5);
    assert_eq!(report.delivered_count(), 0);
    assert_eq!(report.outcome, ReconcileOutcome::Completed);
}

#[tokio::test]
async fn repeated_log_lines_accumulate_as_matches() {
    let log_query = Arc::new(MockLogQueryService::with_lines(vec![
        "[2026-08-01 10:00:00] REQ1000000 STATUS=SENT".to_string(),
        "[2026-08-01 10:00:05] REQ1000000 STATUS=DELIVERED".to_string(),
    ]));
    let reconciler = DeliveryReconciler::new(log_query as Arc<dyn LogQueryService>, 100);

    let report = reconciler.reconcile(inputs(1), &AtomicBool::new(false)).await;

    assert!(report.records[0].delivered);
    assert_eq!(report.records[0].matches.len(), 2);
}

#[tokio::test]
async fn a_line_mentioning_two_ids_is_attributed_once() {
    let log_query = Arc::new(MockLogQueryService::with_lines(vec![
        "forwarded REQ1000000 after REQ1000001 failed".to_string(),
    ]));
    let reconciler = DeliveryReconciler::new(log_query as Arc<dyn LogQueryService>, 100);

    let report = reconciler.reconcile(inputs(2), &AtomicBool::new(false)).await;

    let total_matches: usize = report.records.iter().map(|r| r.matches.len()).sum();
    assert_eq!(total_matches, 1);
    assert_eq!(report.delivered_count(), 1);
}

#[tokio::test]
async fn cancellation_stops_at_batch_boundary_with_partial_results() {
    let cancel = Arc::new(AtomicBool::new(false));
    let log_query = Arc::new(MockLogQueryService::with_lines(vec![
        "REQ1000000 STATUS=DELIVERED".to_string(),
        "REQ1000001 STATUS=DELIVERED".to_string(),
        "REQ1000002 STATUS=DELIVERED".to_string(),
    ]));
    // 第2批查询完成后置位取消
    log_query.cancel_after(cancel.clone(), 2);
    let reconciler = DeliveryReconciler::new(log_query.clone() as Arc<dyn LogQueryService>, 1);

    let report = reconciler.reconcile(inputs(3), &cancel).await;

    assert_eq!(report.outcome, ReconcileOutcome::Cancelled);
    assert_eq!(report.batches_total, 3);
    assert_eq!(report.batches_completed, 2);
    assert_eq!(log_query.query_count(), 2);
    // 已完成批次的结论保留
    assert_eq!(report.delivered_count(), 2);
}

#[tokio::test]
async fn preset_cancellation_runs_no_batches() {
    let log_query = Arc::new(MockLogQueryService::new());
    let reconciler = DeliveryReconciler::new(log_query.clone() as Arc<dyn LogQueryService>, 10);

    let report = reconciler.reconcile(inputs(5), &AtomicBool::new(true)).await;

    assert_eq!(report.outcome, ReconcileOutcome::Cancelled);
    assert_eq!(report.batches_completed, 0);
    assert_eq!(log_query.query_count(), 0);
}

#[tokio::test]
async fn query_failure_keeps_results_from_earlier_batches() {
    let log_query = Arc::new(MockLogQueryService::with_lines(vec![
        "REQ1000000 STATUS=DELIVERED".to_string(),
        "REQ1000001 STATUS=DELIVERED".to_string(),
    ]));
    log_query.fail_on_query(2);
    let reconciler = DeliveryReconciler::new(log_query.clone() as Arc<dyn LogQueryService>, 1);

    let report = reconciler.reconcile(inputs(2), &AtomicBool::new(false)).await;

    assert!(matches!(report.outcome, ReconcileOutcome::Failed(_)));
    assert_eq!(report.batches_total, 2);
    assert_eq!(report.batches_completed, 1);
    // 第1批归属到的投递结论不丢
    assert_eq!(report.delivered_count(), 1);
}
