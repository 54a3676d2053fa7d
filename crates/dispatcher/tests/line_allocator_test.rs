use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use campaigner_core::errors::CampaignerError;
use campaigner_core::models::LineStatus;
use campaigner_core::traits::LineRepository;
use campaigner_dispatcher::{LineAllocator, OperatorPrefixTable};
use campaigner_testing_utils::{LineBuilder, MockLineRepository};

fn prefix_table() -> OperatorPrefixTable {
    let mut prefixes = HashMap::new();
    prefixes.insert("916".to_string(), "mts".to_string());
    prefixes.insert("903".to_string(), "beeline".to_string());
    OperatorPrefixTable::new("7", prefixes)
}

fn allocator(repo: &Arc<MockLineRepository>) -> LineAllocator {
    LineAllocator::new(repo.clone() as Arc<dyn LineRepository>, prefix_table())
}

#[tokio::test]
async fn prefers_line_of_the_destination_operator() {
    let repo = Arc::new(MockLineRepository::with_lines(vec![
        LineBuilder::new()
            .with_id(1)
            .with_operator("beeline")
            .with_counters(0, 0)
            .build(),
        LineBuilder::new()
            .with_id(2)
            .with_operator("mts")
            // 同运营商线路即使更忙也优先
            .with_counters(5, 2)
            .with_last_call_time(Utc::now())
            .build(),
    ]));

    let line = allocator(&repo).allocate("+79161234567").await.unwrap();
    assert_eq!(line.id, 2);
    assert_eq!(line.operator, "mts");

    let recorded = repo.get_line(2).unwrap();
    assert_eq!(recorded.calls_today, 6);
    assert_eq!(recorded.calls_this_hour, 3);
}

#[tokio::test]
async fn falls_back_when_operator_line_is_over_limit() {
    let repo = Arc::new(MockLineRepository::with_lines(vec![
        LineBuilder::new()
            .with_id(1)
            .with_operator("mts")
            .with_limits(10, 2)
            .with_counters(5, 2)
            .with_last_call_time(Utc::now())
            .build(),
        LineBuilder::new()
            .with_id(2)
            .with_operator("beeline")
            .build(),
    ]));

    let line = allocator(&repo).allocate("+79161234567").await.unwrap();
    assert_eq!(line.id, 2);
}

#[tokio::test]
async fn unknown_prefix_uses_least_loaded_line() {
    let repo = Arc::new(MockLineRepository::with_lines(vec![
        LineBuilder::new()
            .with_id(1)
            .with_operator("mts")
            .with_counters(3, 1)
            .build(),
        LineBuilder::new()
            .with_id(2)
            .with_operator("beeline")
            .with_counters(1, 1)
            .build(),
    ]));

    // 999前缀不在映射表里
    let line = allocator(&repo).allocate("+79991234567").await.unwrap();
    assert_eq!(line.id, 2);
}

#[tokio::test]
async fn errors_when_every_line_is_exhausted() {
    let now = Utc::now();
    let repo = Arc::new(MockLineRepository::with_lines(vec![
        LineBuilder::new()
            .with_id(1)
            .with_operator("mts")
            .with_limits(10, 1)
            .with_counters(4, 1)
            .with_last_call_time(now)
            .build(),
        LineBuilder::new().with_id(2).with_operator("beeline").disabled().build(),
    ]));

    let result = allocator(&repo).allocate("+79161234567").await;
    assert!(matches!(result, Err(CampaignerError::LinesExhausted)));
}

#[tokio::test]
async fn spills_to_fallback_after_hourly_limit_then_exhausts() {
    let repo = Arc::new(MockLineRepository::with_lines(vec![
        LineBuilder::new()
            .with_id(1)
            .with_operator("mts")
            .with_limits(100, 5)
            .build(),
        LineBuilder::new()
            .with_id(2)
            .with_operator("beeline")
            .with_limits(100, 5)
            .build(),
    ]));
    let allocator = allocator(&repo);

    // 前5通吃满mts线路的小时额度
    for _ in 0..5 {
        let line = allocator.allocate("+79161234567").await.unwrap();
        assert_eq!(line.id, 1);
    }

    // 第6通溢出到另一家运营商的线路
    let line = allocator.allocate("+79161234567").await.unwrap();
    assert_eq!(line.id, 2);

    // 兜底线路也没了之后报线路耗尽
    repo.set_status_sync(2, LineStatus::Disabled);
    let result = allocator.allocate("+79161234567").await;
    assert!(matches!(result, Err(CampaignerError::LinesExhausted)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_campaigns_never_push_a_shared_line_over_limit() {
    let repo = Arc::new(MockLineRepository::with_lines(vec![
        LineBuilder::new()
            .with_id(1)
            .with_operator("mts")
            .with_limits(100, 5)
            .build(),
        LineBuilder::new()
            .with_id(2)
            .with_operator("beeline")
            .with_limits(100, 100)
            .build(),
    ]));
    let allocator = Arc::new(allocator(&repo));

    // 两个并发活动共用同一套线路，各自分配3次
    let mut handles = Vec::new();
    for _ in 0..2 {
        let allocator = allocator.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for _ in 0..3 {
                ids.push(allocator.allocate("+79161234567").await.unwrap().id);
            }
            ids
        }));
    }

    let mut allocated = Vec::new();
    for handle in handles {
        allocated.extend(handle.await.unwrap());
    }

    // 合计6次：同运营商线路恰好吃满小时额度，第6次溢出到另一家
    assert_eq!(allocated.len(), 6);
    assert_eq!(allocated.iter().filter(|id| **id == 1).count(), 5);
    assert_eq!(allocated.iter().filter(|id| **id == 2).count(), 1);

    let mts = repo.get_line(1).unwrap();
    assert_eq!(mts.calls_this_hour, 5);
    assert_eq!(mts.calls_today, 5);
    assert_eq!(repo.get_line(2).unwrap().calls_today, 1);
}

#[tokio::test]
async fn stale_hour_bucket_resets_on_allocation() {
    let repo = Arc::new(MockLineRepository::with_lines(vec![LineBuilder::new()
        .with_id(1)
        .with_operator("mts")
        .with_limits(100, 5)
        .with_counters(5, 5)
        .with_last_call_time(Utc::now() - Duration::hours(2))
        .build()]));

    // 小时计数已满但桶早已过期，应当照常分配并重置计数
    let line = allocator(&repo).allocate("+79161234567").await.unwrap();
    assert_eq!(line.id, 1);

    let recorded = repo.get_line(1).unwrap();
    assert_eq!(recorded.calls_this_hour, 1);
    assert_eq!(recorded.calls_today, 6);
}
