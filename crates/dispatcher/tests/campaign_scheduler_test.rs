use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use campaigner_core::models::CampaignStatus;
use campaigner_core::traits::{CampaignRepository, LineRepository};
use campaigner_dispatcher::{
    CampaignScheduler, DispatchWorker, FixedPacing, LineAllocator, OperatorPrefixTable,
};
use campaigner_testing_utils::{
    CampaignBuilder, CampaignNumberBuilder, LineBuilder, MockCallGateway,
    MockCampaignNumberRepository, MockCampaignRepository, MockLineRepository,
    MockRequestIdSequence, MockSmsGateway,
};

struct Harness {
    campaign_repo: Arc<MockCampaignRepository>,
    number_repo: Arc<MockCampaignNumberRepository>,
    call_gateway: Arc<MockCallGateway>,
    scheduler: CampaignScheduler,
}

fn harness() -> Harness {
    let campaign_repo = Arc::new(MockCampaignRepository::new());
    let number_repo = Arc::new(MockCampaignNumberRepository::new());
    let line_repo = Arc::new(MockLineRepository::with_lines(vec![LineBuilder::new()
        .with_limits(1000, 1000)
        .build()]));
    let call_gateway = Arc::new(MockCallGateway::new());

    let allocator = Arc::new(LineAllocator::new(
        line_repo.clone() as Arc<dyn LineRepository>,
        OperatorPrefixTable::new("7", HashMap::new()),
    ));
    let worker = Arc::new(DispatchWorker::new(
        campaign_repo.clone(),
        number_repo.clone(),
        allocator,
        call_gateway.clone(),
        Arc::new(MockSmsGateway::new()),
        Arc::new(MockRequestIdSequence::new()),
        Arc::new(FixedPacing(Duration::ZERO)),
        30,
    ));
    let scheduler = CampaignScheduler::new(campaign_repo.clone(), worker, Duration::from_secs(60));

    Harness {
        campaign_repo,
        number_repo,
        call_gateway,
        scheduler,
    }
}

async fn wait_for_status(h: &Harness, id: i64, status: CampaignStatus) {
    for _ in 0..200 {
        if h.campaign_repo.get_campaign(id).map(|c| c.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("活动 {id} 没有在限期内到达 {status:?}");
}

#[tokio::test(start_paused = true)]
async fn tick_promotes_due_campaigns_and_runs_them() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(
            &CampaignBuilder::new()
                .scheduled_at(Utc::now() - chrono::Duration::minutes(5))
                .build(),
        )
        .await
        .unwrap();
    h.number_repo.insert_number(
        CampaignNumberBuilder::new()
            .with_campaign_id(campaign.id)
            .build(),
    );

    let started = h.scheduler.tick().await.unwrap();
    assert_eq!(started, vec![campaign.id]);
    assert_eq!(
        h.campaign_repo.get_campaign(campaign.id).unwrap().status,
        CampaignStatus::Running
    );

    wait_for_status(&h, campaign.id, CampaignStatus::Completed).await;
    assert_eq!(h.call_gateway.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_tick_does_not_start_the_same_campaign_twice() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(
            &CampaignBuilder::new()
                .scheduled_at(Utc::now() - chrono::Duration::minutes(5))
                .build(),
        )
        .await
        .unwrap();

    let first = h.scheduler.tick().await.unwrap();
    assert_eq!(first, vec![campaign.id]);

    let second = h.scheduler.tick().await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn tick_skips_campaigns_started_by_another_entry_point() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(
            &CampaignBuilder::new()
                .scheduled_at(Utc::now() - chrono::Duration::minutes(5))
                .build(),
        )
        .await
        .unwrap();

    // 手动入口抢先把它拉起来了
    let promoted = h
        .campaign_repo
        .try_transition(
            campaign.id,
            CampaignStatus::Scheduled,
            CampaignStatus::Running,
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(promoted);

    let started = h.scheduler.tick().await.unwrap();
    assert!(started.is_empty());
}

#[tokio::test]
async fn tick_ignores_campaigns_scheduled_in_the_future() {
    let h = harness();
    h.campaign_repo
        .create(
            &CampaignBuilder::new()
                .scheduled_at(Utc::now() + chrono::Duration::hours(1))
                .build(),
        )
        .await
        .unwrap();

    let started = h.scheduler.tick().await.unwrap();
    assert!(started.is_empty());
}
