use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use campaigner_core::errors::CampaignerResult;
use campaigner_core::models::{
    CallStatus, CampaignNumber, CampaignStatus, CampaignType, NumberStatusSummary, SmsStatus,
};
use campaigner_core::traits::{CampaignNumberRepository, CampaignRepository, LineRepository};
use campaigner_dispatcher::{DispatchWorker, FixedPacing, LineAllocator, OperatorPrefixTable};
use campaigner_testing_utils::{
    CampaignBuilder, CampaignNumberBuilder, LineBuilder, MockCallGateway,
    MockCampaignNumberRepository, MockCampaignRepository, MockLineRepository,
    MockRequestIdSequence, MockSmsGateway,
};

struct Harness {
    campaign_repo: Arc<MockCampaignRepository>,
    number_repo: Arc<MockCampaignNumberRepository>,
    line_repo: Arc<MockLineRepository>,
    call_gateway: Arc<MockCallGateway>,
    sms_gateway: Arc<MockSmsGateway>,
    worker: DispatchWorker,
}

fn harness() -> Harness {
    let campaign_repo = Arc::new(MockCampaignRepository::new());
    let number_repo = Arc::new(MockCampaignNumberRepository::new());
    let line_repo = Arc::new(MockLineRepository::new());
    let call_gateway = Arc::new(MockCallGateway::new());
    let sms_gateway = Arc::new(MockSmsGateway::new());

    let mut prefixes = HashMap::new();
    prefixes.insert("916".to_string(), "mts".to_string());
    let allocator = Arc::new(LineAllocator::new(
        line_repo.clone() as Arc<dyn LineRepository>,
        OperatorPrefixTable::new("7", prefixes),
    ));

    let worker = DispatchWorker::new(
        campaign_repo.clone(),
        number_repo.clone(),
        allocator,
        call_gateway.clone(),
        sms_gateway.clone(),
        Arc::new(MockRequestIdSequence::new()),
        Arc::new(FixedPacing(Duration::ZERO)),
        30,
    );

    Harness {
        campaign_repo,
        number_repo,
        line_repo,
        call_gateway,
        sms_gateway,
        worker,
    }
}

fn seed_numbers(h: &Harness, campaign_id: i64, count: usize) {
    for i in 0..count {
        h.number_repo.insert_number(
            CampaignNumberBuilder::new()
                .with_campaign_id(campaign_id)
                .with_phone(&format!("+7916000{i:04}"))
                .build(),
        );
    }
}

#[tokio::test]
async fn call_campaign_runs_to_completion() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(&CampaignBuilder::new().running().build())
        .await
        .unwrap();
    seed_numbers(&h, campaign.id, 3);
    h.line_repo
        .insert_line(LineBuilder::new().with_limits(100, 100).build());

    h.worker.run(campaign.id).await.unwrap();

    let campaign = h.campaign_repo.get_campaign(campaign.id).unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert!(campaign.completed_at.is_some());
    assert_eq!(campaign.processed_numbers, 3);
    assert_eq!(campaign.successful_calls, 3);
    assert_eq!(campaign.failed_calls, 0);

    let numbers = h.number_repo.get_by_campaign(campaign.id).await.unwrap();
    let mut request_ids = HashSet::new();
    for number in &numbers {
        assert_eq!(number.call_status, CallStatus::Answered);
        assert_eq!(number.call_attempts, 1);
        assert!(request_ids.insert(number.request_id.clone().unwrap()));
    }

    assert_eq!(h.call_gateway.call_count(), 3);
    let line = h.line_repo.list().await.unwrap().remove(0);
    assert_eq!(line.calls_today, 3);
}

#[tokio::test]
async fn call_and_sms_sends_no_answer_text_only_when_enabled() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(
            &CampaignBuilder::new()
                .with_type(CampaignType::CallAndSms)
                .with_sms_on_no_answer("перезвоните нам")
                .running()
                .build(),
        )
        .await
        .unwrap();
    seed_numbers(&h, campaign.id, 2);
    h.line_repo
        .insert_line(LineBuilder::new().with_limits(100, 100).build());

    // 第二个号码呼不通
    h.call_gateway.fail_for("+79160000001");

    h.worker.run(campaign.id).await.unwrap();

    let numbers = h.number_repo.get_by_campaign(campaign.id).await.unwrap();
    let answered = &numbers[0];
    let unanswered = &numbers[1];

    assert_eq!(answered.call_status, CallStatus::Answered);
    // 接通侧开关未开，不追发短信
    assert_eq!(answered.sms_status, SmsStatus::None);

    assert_eq!(unanswered.call_status, CallStatus::NoAnswer);
    assert_eq!(unanswered.sms_status, SmsStatus::Sent);
    assert_eq!(unanswered.sms_text_sent.as_deref(), Some("перезвоните нам"));
    assert!(unanswered.sms_sent_at.is_some());

    let sms_requests = h.sms_gateway.requests();
    assert_eq!(sms_requests.len(), 1);
    assert_eq!(sms_requests[0].destination, "+79160000001");
    assert_eq!(
        Some(sms_requests[0].request_id.clone()),
        unanswered.request_id
    );

    let campaign = h.campaign_repo.get_campaign(campaign.id).unwrap();
    assert_eq!(campaign.processed_numbers, 2);
    assert_eq!(campaign.successful_calls, 1);
    assert_eq!(campaign.failed_calls, 1);
    assert_eq!(campaign.sms_sent, 1);
}

#[tokio::test]
async fn call_and_sms_sends_success_text_when_enabled() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(
            &CampaignBuilder::new()
                .with_type(CampaignType::CallAndSms)
                .with_sms_on_success("спасибо за ответ")
                .running()
                .build(),
        )
        .await
        .unwrap();
    seed_numbers(&h, campaign.id, 1);
    h.line_repo
        .insert_line(LineBuilder::new().with_limits(100, 100).build());

    h.worker.run(campaign.id).await.unwrap();

    let numbers = h.number_repo.get_by_campaign(campaign.id).await.unwrap();
    assert_eq!(numbers[0].call_status, CallStatus::Answered);
    assert_eq!(numbers[0].sms_status, SmsStatus::Sent);
    assert_eq!(numbers[0].sms_text_sent.as_deref(), Some("спасибо за ответ"));
}

#[tokio::test]
async fn sms_only_campaign_skips_calls_and_lines() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(
            &CampaignBuilder::new()
                .with_type(CampaignType::Sms)
                .running()
                .build(),
        )
        .await
        .unwrap();
    seed_numbers(&h, campaign.id, 2);
    // 故意不配线路：纯短信活动不应该碰线路

    h.worker.run(campaign.id).await.unwrap();

    assert_eq!(h.call_gateway.call_count(), 0);
    let sms_requests = h.sms_gateway.requests();
    assert_eq!(sms_requests.len(), 2);
    for request in &sms_requests {
        assert_eq!(request.line_id, None);
        // 未配置文本时使用兜底内容
        assert_eq!(request.text, "Уведомление");
    }

    let campaign = h.campaign_repo.get_campaign(campaign.id).unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.processed_numbers, 2);
    assert_eq!(campaign.successful_calls, 0);
    assert_eq!(campaign.failed_calls, 0);
    assert_eq!(campaign.sms_sent, 2);

    let numbers = h.number_repo.get_by_campaign(campaign.id).await.unwrap();
    for number in &numbers {
        assert_eq!(number.call_status, CallStatus::NoAnswer);
        assert!(number.request_id.is_some());
    }
}

#[tokio::test]
async fn pause_takes_effect_on_next_iteration() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(&CampaignBuilder::new().running().build())
        .await
        .unwrap();
    seed_numbers(&h, campaign.id, 3);
    h.line_repo
        .insert_line(LineBuilder::new().with_limits(100, 100).build());

    // 第一通电话拨出时运营侧按下暂停
    let repo = h.campaign_repo.clone();
    let campaign_id = campaign.id;
    h.call_gateway.set_on_call(move |_| {
        repo.set_status_sync(campaign_id, CampaignStatus::Paused);
    });

    h.worker.run(campaign.id).await.unwrap();

    let campaign = h.campaign_repo.get_campaign(campaign.id).unwrap();
    // 循环退出但活动没有被标记完成
    assert_eq!(campaign.status, CampaignStatus::Paused);
    assert_eq!(campaign.processed_numbers, 1);
    assert_eq!(h.call_gateway.call_count(), 1);

    let numbers = h.number_repo.get_by_campaign(campaign.id).await.unwrap();
    let pending = numbers
        .iter()
        .filter(|n| n.call_status == CallStatus::Pending)
        .count();
    assert_eq!(pending, 2);
}

#[tokio::test]
async fn exhausted_lines_fail_numbers_but_not_the_campaign() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(&CampaignBuilder::new().running().build())
        .await
        .unwrap();
    seed_numbers(&h, campaign.id, 2);
    // 没有任何线路

    h.worker.run(campaign.id).await.unwrap();

    let campaign = h.campaign_repo.get_campaign(campaign.id).unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.failed_calls, 2);
    assert_eq!(h.call_gateway.call_count(), 0);

    let numbers = h.number_repo.get_by_campaign(campaign.id).await.unwrap();
    for number in &numbers {
        assert_eq!(number.call_status, CallStatus::Failed);
    }
}

#[tokio::test]
async fn sms_only_text_selection_prefers_no_answer_then_template() {
    let h = harness();

    // 同时配置了未接通文本与模板时，未接通文本优先
    let with_both = h
        .campaign_repo
        .create(
            &CampaignBuilder::new()
                .with_type(CampaignType::Sms)
                .with_sms_on_no_answer("перезвоните нам")
                .with_sms_template("шаблон")
                .running()
                .build(),
        )
        .await
        .unwrap();
    seed_numbers(&h, with_both.id, 1);
    h.worker.run(with_both.id).await.unwrap();

    // 只有模板时模板充当兜底文本
    let template_only = h
        .campaign_repo
        .create(
            &CampaignBuilder::new()
                .with_type(CampaignType::Sms)
                .with_sms_template("шаблон")
                .running()
                .build(),
        )
        .await
        .unwrap();
    seed_numbers(&h, template_only.id, 1);
    h.worker.run(template_only.id).await.unwrap();

    let requests = h.sms_gateway.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].text, "перезвоните нам");
    assert_eq!(requests[1].text, "шаблон");
}

/// 在领取落空的同一瞬间把活动改成cancelled，
/// 复现取消赶在"无号可领"判定之前落库的竞争窗口。
struct CancelBeforeEmptyClaim {
    inner: Arc<MockCampaignNumberRepository>,
    campaign_repo: Arc<MockCampaignRepository>,
}

#[async_trait]
impl CampaignNumberRepository for CancelBeforeEmptyClaim {
    async fn bulk_insert(&self, campaign_id: i64, phones: &[String]) -> CampaignerResult<usize> {
        self.inner.bulk_insert(campaign_id, phones).await
    }

    async fn claim_next_pending(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
    ) -> CampaignerResult<Option<CampaignNumber>> {
        let claimed = self.inner.claim_next_pending(campaign_id, now).await?;
        if claimed.is_none() {
            self.campaign_repo
                .set_status_sync(campaign_id, CampaignStatus::Cancelled);
        }
        Ok(claimed)
    }

    async fn record_call_result(
        &self,
        number_id: i64,
        status: CallStatus,
        request_id: Option<&str>,
    ) -> CampaignerResult<()> {
        self.inner
            .record_call_result(number_id, status, request_id)
            .await
    }

    async fn record_sms_result(
        &self,
        number_id: i64,
        status: SmsStatus,
        text: &str,
        at: DateTime<Utc>,
    ) -> CampaignerResult<()> {
        self.inner.record_sms_result(number_id, status, text, at).await
    }

    async fn get_by_campaign(&self, campaign_id: i64) -> CampaignerResult<Vec<CampaignNumber>> {
        self.inner.get_by_campaign(campaign_id).await
    }

    async fn status_summary(&self, campaign_id: i64) -> CampaignerResult<NumberStatusSummary> {
        self.inner.status_summary(campaign_id).await
    }
}

#[tokio::test]
async fn empty_claim_does_not_overwrite_a_concurrent_cancel() {
    let campaign_repo = Arc::new(MockCampaignRepository::new());
    let number_repo = Arc::new(MockCampaignNumberRepository::new());
    let line_repo = Arc::new(MockLineRepository::new());

    let campaign = campaign_repo
        .create(&CampaignBuilder::new().running().build())
        .await
        .unwrap();

    let allocator = Arc::new(LineAllocator::new(
        line_repo as Arc<dyn LineRepository>,
        OperatorPrefixTable::new("7", HashMap::new()),
    ));
    let worker = DispatchWorker::new(
        campaign_repo.clone(),
        Arc::new(CancelBeforeEmptyClaim {
            inner: number_repo,
            campaign_repo: campaign_repo.clone(),
        }),
        allocator,
        Arc::new(MockCallGateway::new()),
        Arc::new(MockSmsGateway::new()),
        Arc::new(MockRequestIdSequence::new()),
        Arc::new(FixedPacing(Duration::ZERO)),
        30,
    );

    worker.run(campaign.id).await.unwrap();

    // 取消先赢，completed不得覆盖
    let campaign = campaign_repo.get_campaign(campaign.id).unwrap();
    assert_eq!(campaign.status, CampaignStatus::Cancelled);
    assert!(campaign.completed_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn persistent_store_failure_halts_without_completion() {
    let h = harness();
    let campaign = h
        .campaign_repo
        .create(&CampaignBuilder::new().running().build())
        .await
        .unwrap();
    seed_numbers(&h, campaign.id, 2);
    h.line_repo
        .insert_line(LineBuilder::new().with_limits(100, 100).build());

    h.number_repo.fail_call_results(true);

    let result = h.worker.run(campaign.id).await;
    assert!(result.is_err());

    // 活动保持running，绝不能被误标完成
    let campaign = h.campaign_repo.get_campaign(campaign.id).unwrap();
    assert_eq!(campaign.status, CampaignStatus::Running);
    assert_eq!(campaign.processed_numbers, 0);
}
