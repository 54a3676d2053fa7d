use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use campaigner_core::errors::{CampaignerError, CampaignerResult};
use campaigner_core::models::{
    CallStatus, Campaign, CampaignNumber, CampaignStatus, CampaignType, CounterDeltas, SmsStatus,
};
use campaigner_core::traits::{
    CallGateway, CallRequest, CampaignNumberRepository, CampaignRepository, RequestIdSequence,
    SmsGateway, SmsRequest,
};

use crate::line_allocator::LineAllocator;
use crate::pacing::PacingPolicy;

/// 状态写回失败的重试次数与间隔
const PERSIST_RETRIES: u32 = 2;
const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(500);

/// 纯短信活动未配置文本时的兜底内容
const DEFAULT_SMS_TEXT: &str = "Уведомление";

/// 单场活动的派发循环。每次迭代重读活动状态、原子领取一个号码、
/// 按活动类型执行呼叫/短信路径、累加计数，然后按节奏策略休眠。
pub struct DispatchWorker {
    campaign_repo: Arc<dyn CampaignRepository>,
    number_repo: Arc<dyn CampaignNumberRepository>,
    allocator: Arc<LineAllocator>,
    call_gateway: Arc<dyn CallGateway>,
    sms_gateway: Arc<dyn SmsGateway>,
    request_ids: Arc<dyn RequestIdSequence>,
    pacing: Arc<dyn PacingPolicy>,
    call_timeout_seconds: u64,
}

impl DispatchWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        number_repo: Arc<dyn CampaignNumberRepository>,
        allocator: Arc<LineAllocator>,
        call_gateway: Arc<dyn CallGateway>,
        sms_gateway: Arc<dyn SmsGateway>,
        request_ids: Arc<dyn RequestIdSequence>,
        pacing: Arc<dyn PacingPolicy>,
        call_timeout_seconds: u64,
    ) -> Self {
        Self {
            campaign_repo,
            number_repo,
            allocator,
            call_gateway,
            sms_gateway,
            request_ids,
            pacing,
            call_timeout_seconds,
        }
    }

    /// 运行派发循环直到号码用尽或活动离开running状态。
    /// 仓储持续不可写时返回Err，活动保持原状不会被误标完成。
    pub async fn run(&self, campaign_id: i64) -> CampaignerResult<()> {
        info!("活动 {} 的派发循环启动", campaign_id);

        loop {
            // 每次迭代重读状态，暂停/取消最多延迟一个号码生效
            let Some(campaign) = self.campaign_repo.get_by_id(campaign_id).await? else {
                warn!("活动 {} 不存在，派发循环退出", campaign_id);
                return Ok(());
            };
            if campaign.status != CampaignStatus::Running {
                info!(
                    "活动 {} 当前状态 {:?}，派发循环退出",
                    campaign_id, campaign.status
                );
                return Ok(());
            }

            let Some(number) = self
                .number_repo
                .claim_next_pending(campaign_id, Utc::now())
                .await?
            else {
                // 条件迁移：若取消/暂停赶在领取之前落库，这里不得覆盖
                let marked = self
                    .campaign_repo
                    .try_transition(
                        campaign_id,
                        CampaignStatus::Running,
                        CampaignStatus::Completed,
                        Utc::now(),
                    )
                    .await?;
                if marked {
                    info!("活动 {} 的号码已全部处理，标记为completed", campaign_id);
                } else {
                    info!(
                        "活动 {} 的号码已全部处理，但状态已被其他入口改写，保持原状",
                        campaign_id
                    );
                }
                return Ok(());
            };

            self.process_number(&campaign, &number).await?;

            let delay = self.pacing.next_delay();
            debug!(
                "活动 {} 下一次派发前等待 {:.0} 秒",
                campaign_id,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn process_number(
        &self,
        campaign: &Campaign,
        number: &CampaignNumber,
    ) -> CampaignerResult<()> {
        let request_id = self.request_ids.next_id().await?;
        let mut deltas = CounterDeltas {
            processed_numbers: 1,
            ..Default::default()
        };

        match campaign.campaign_type {
            CampaignType::Call => {
                self.call_path(campaign, number, &request_id, &mut deltas)
                    .await?;
            }
            CampaignType::Sms => {
                self.sms_only_path(campaign, number, &request_id, &mut deltas)
                    .await?;
            }
            CampaignType::CallAndSms => {
                let (answered, line_id) = self
                    .call_path(campaign, number, &request_id, &mut deltas)
                    .await?;
                self.conditional_sms(campaign, number, answered, line_id, &request_id, &mut deltas)
                    .await?;
            }
        }

        self.with_persist_retry("活动计数", || {
            self.campaign_repo.increment_counters(campaign.id, &deltas)
        })
        .await
    }

    /// 呼叫路径。返回 (是否接通, 使用的线路id)。
    /// 网关侧故障折叠为未接通；无线路可用则该号码记failed，活动继续。
    async fn call_path(
        &self,
        campaign: &Campaign,
        number: &CampaignNumber,
        request_id: &str,
        deltas: &mut CounterDeltas,
    ) -> CampaignerResult<(bool, Option<i64>)> {
        let (status, line_id, answered) =
            match self.allocator.allocate(&number.phone_number).await {
                Ok(line) => {
                    let request = CallRequest {
                        destination: number.phone_number.clone(),
                        line_id: line.id,
                        voice_text: campaign.voice_text.clone(),
                        request_id: request_id.to_string(),
                        timeout_seconds: self.call_timeout_seconds,
                    };
                    match self.call_gateway.place_call(&request).await {
                        Ok(outcome) if outcome.success => {
                            info!("号码 {} 接通 ({})", number.phone_number, request_id);
                            (CallStatus::Answered, Some(line.id), true)
                        }
                        Ok(_) => {
                            debug!("号码 {} 未接通 ({})", number.phone_number, request_id);
                            (CallStatus::NoAnswer, Some(line.id), false)
                        }
                        Err(e) => {
                            warn!(
                                "号码 {} 呼叫网关故障，按未接通处理 ({}): {}",
                                number.phone_number, request_id, e
                            );
                            (CallStatus::NoAnswer, Some(line.id), false)
                        }
                    }
                }
                Err(CampaignerError::LinesExhausted) => {
                    warn!("号码 {} 无可用线路，标记为failed", number.phone_number);
                    (CallStatus::Failed, None, false)
                }
                Err(e) => return Err(e),
            };

        if answered {
            deltas.successful_calls += 1;
        } else {
            deltas.failed_calls += 1;
        }

        self.with_persist_retry("呼叫结果", || {
            self.number_repo
                .record_call_result(number.id, status, Some(request_id))
        })
        .await?;

        Ok((answered, line_id))
    }

    /// call_and_sms的短信追发：按呼叫结果与对应开关选择文本，
    /// 每个号码每轮至多一条短信。
    async fn conditional_sms(
        &self,
        campaign: &Campaign,
        number: &CampaignNumber,
        answered: bool,
        line_id: Option<i64>,
        request_id: &str,
        deltas: &mut CounterDeltas,
    ) -> CampaignerResult<()> {
        let text = if answered {
            campaign
                .send_sms_on_success
                .then(|| campaign.sms_on_success.clone())
                .flatten()
        } else {
            campaign
                .send_sms_on_no_answer
                .then(|| campaign.sms_on_no_answer.clone())
                .flatten()
        };

        match text {
            Some(text) => self.send_sms(number, line_id, &text, request_id, deltas).await,
            None => Ok(()),
        }
    }

    /// 纯短信路径：不占用线路限额，发送方由网关配置决定。
    /// 号码以no_answer收尾，呼叫计数保持为零。
    /// 文本选取链：sms_on_no_answer、sms_on_success、sms_template、内置兜底。
    async fn sms_only_path(
        &self,
        campaign: &Campaign,
        number: &CampaignNumber,
        request_id: &str,
        deltas: &mut CounterDeltas,
    ) -> CampaignerResult<()> {
        let text = campaign
            .sms_on_no_answer
            .clone()
            .or_else(|| campaign.sms_on_success.clone())
            .or_else(|| campaign.sms_template.clone())
            .unwrap_or_else(|| DEFAULT_SMS_TEXT.to_string());

        self.send_sms(number, None, &text, request_id, deltas)
            .await?;

        self.with_persist_retry("呼叫结果", || {
            self.number_repo
                .record_call_result(number.id, CallStatus::NoAnswer, Some(request_id))
        })
        .await
    }

    async fn send_sms(
        &self,
        number: &CampaignNumber,
        line_id: Option<i64>,
        text: &str,
        request_id: &str,
        deltas: &mut CounterDeltas,
    ) -> CampaignerResult<()> {
        let request = SmsRequest {
            destination: number.phone_number.clone(),
            line_id,
            text: text.to_string(),
            request_id: request_id.to_string(),
        };

        let sent = match self.sms_gateway.send_sms(&request).await {
            Ok(outcome) => outcome.success,
            Err(e) => {
                warn!(
                    "号码 {} 短信网关故障，按发送失败处理 ({}): {}",
                    number.phone_number, request_id, e
                );
                false
            }
        };

        let status = if sent {
            deltas.sms_sent += 1;
            SmsStatus::Sent
        } else {
            deltas.sms_failed += 1;
            SmsStatus::Failed
        };

        self.with_persist_retry("短信结果", || {
            self.number_repo
                .record_sms_result(number.id, status, text, Utc::now())
        })
        .await
    }

    /// 状态写回带有限重试。重试耗尽即上抛，调用方中止循环，
    /// 宁可停在原地也不能让库内状态与实际派发脱节。
    async fn with_persist_retry<T, F, Fut>(&self, what: &str, operation: F) -> CampaignerResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CampaignerResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < PERSIST_RETRIES => {
                    attempt += 1;
                    warn!("{what} 写入失败（第 {attempt} 次重试）: {e}");
                    tokio::time::sleep(PERSIST_RETRY_DELAY).await;
                }
                Err(e) => {
                    error!("{what} 写入持续失败，派发循环将中止: {e}");
                    return Err(e);
                }
            }
        }
    }
}
