use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use campaigner_core::errors::{CampaignerError, CampaignerResult};
use campaigner_core::models::{
    Campaign, CampaignStatus, CampaignType, NumberStatusSummary,
};
use campaigner_core::phone::normalize_phone;
use campaigner_core::traits::{CampaignNumberRepository, CampaignRepository};

use crate::dispatch_worker::DispatchWorker;
use crate::reconciler::{DeliveryReconciler, ReconcileInput, ReconcileReport};

/// 创建活动的请求参数
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub description: Option<String>,
    pub campaign_type: CampaignType,
    pub voice_text: Option<String>,
    pub sms_on_no_answer: Option<String>,
    pub sms_on_success: Option<String>,
    pub send_sms_on_no_answer: bool,
    pub send_sms_on_success: bool,
    pub sender_line: Option<String>,
    pub sms_template: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
}

/// 活动的聚合视图：活动本身的计数加上号码表的状态分布
#[derive(Debug)]
pub struct CampaignStats {
    pub campaign: Campaign,
    pub numbers: NumberStatusSummary,
}

/// 活动管理命令面。所有启停命令以条件状态迁移兜底，
/// 与调度器tick并发竞争时恰好一方生效，重复调用是无副作用的。
pub struct CampaignController {
    campaign_repo: Arc<dyn CampaignRepository>,
    number_repo: Arc<dyn CampaignNumberRepository>,
    worker: Arc<DispatchWorker>,
    reconciler: Arc<DeliveryReconciler>,
}

impl CampaignController {
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        number_repo: Arc<dyn CampaignNumberRepository>,
        worker: Arc<DispatchWorker>,
        reconciler: Arc<DeliveryReconciler>,
    ) -> Self {
        Self {
            campaign_repo,
            number_repo,
            worker,
            reconciler,
        }
    }

    /// 创建活动。带计划启动时间的直接进scheduled，等调度器扫描拉起
    pub async fn create_campaign(&self, request: NewCampaign) -> CampaignerResult<Campaign> {
        let mut campaign = Campaign::new(&request.name, request.campaign_type);
        campaign.description = request.description;
        campaign.voice_text = request.voice_text;
        campaign.sms_on_no_answer = request.sms_on_no_answer;
        campaign.sms_on_success = request.sms_on_success;
        campaign.send_sms_on_no_answer = request.send_sms_on_no_answer;
        campaign.send_sms_on_success = request.send_sms_on_success;
        campaign.sender_line = request.sender_line;
        campaign.sms_template = request.sms_template;

        if let Some(at) = request.scheduled_start_time {
            campaign.status = CampaignStatus::Scheduled;
            campaign.scheduled_start_time = Some(at);
        }

        let created = self.campaign_repo.create(&campaign).await?;
        info!(
            "创建活动 {} ({}, {:?}, {:?})",
            created.id, created.name, created.campaign_type, created.status
        );
        Ok(created)
    }

    pub async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
    ) -> CampaignerResult<Vec<Campaign>> {
        self.campaign_repo.list(status).await
    }

    /// 导入号码：归一化、去重，无效条目跳过，返回实际入库条数
    pub async fn import_numbers(
        &self,
        campaign_id: i64,
        raw_phones: Vec<String>,
    ) -> CampaignerResult<usize> {
        let campaign = self.get_campaign(campaign_id).await?;
        if campaign.is_finished() {
            return Err(CampaignerError::Internal(format!(
                "活动 {campaign_id} 已结束，不能再导入号码"
            )));
        }

        let mut seen = std::collections::HashSet::new();
        let mut normalized = Vec::new();
        let mut skipped = 0usize;
        for raw in &raw_phones {
            match normalize_phone(raw) {
                Some(phone) => {
                    if seen.insert(phone.clone()) {
                        normalized.push(phone);
                    }
                }
                None => {
                    debug!("跳过无法归一化的号码: {raw:?}");
                    skipped += 1;
                }
            }
        }

        let inserted = self
            .number_repo
            .bulk_insert(campaign_id, &normalized)
            .await?;
        info!(
            "活动 {} 导入号码: 提交 {} 条，入库 {} 条，无效 {} 条",
            campaign_id,
            raw_phones.len(),
            inserted,
            skipped
        );
        Ok(inserted)
    }

    /// 启动活动并拉起派发循环。已在运行则直接返回Ok。
    pub async fn start_campaign(&self, campaign_id: i64) -> CampaignerResult<()> {
        let campaign = self.get_campaign(campaign_id).await?;
        let now = Utc::now();

        match campaign.status {
            CampaignStatus::Running => {
                debug!("活动 {} 已在运行，忽略重复启动", campaign_id);
                Ok(())
            }
            from @ (CampaignStatus::Draft | CampaignStatus::Scheduled) => {
                if self
                    .campaign_repo
                    .try_transition(campaign_id, from, CampaignStatus::Running, now)
                    .await?
                {
                    info!("活动 {} 手动启动", campaign_id);
                    self.spawn_worker(campaign_id);
                } else {
                    // 迁移被抢先意味着另一个入口刚刚启动了它
                    debug!("活动 {} 的启动迁移被其他入口抢先", campaign_id);
                }
                Ok(())
            }
            from => Err(CampaignerError::InvalidStatusTransition {
                from,
                to: CampaignStatus::Running,
            }),
        }
    }

    /// 暂停活动。派发循环在下一次迭代看到paused后退出。
    pub async fn pause_campaign(&self, campaign_id: i64) -> CampaignerResult<()> {
        let campaign = self.get_campaign(campaign_id).await?;
        let now = Utc::now();

        match campaign.status {
            CampaignStatus::Paused => Ok(()),
            CampaignStatus::Running => {
                if self
                    .campaign_repo
                    .try_transition(
                        campaign_id,
                        CampaignStatus::Running,
                        CampaignStatus::Paused,
                        now,
                    )
                    .await?
                {
                    info!("活动 {} 已暂停", campaign_id);
                }
                Ok(())
            }
            from => Err(CampaignerError::InvalidStatusTransition {
                from,
                to: CampaignStatus::Paused,
            }),
        }
    }

    /// 恢复被暂停的活动并重新拉起派发循环
    pub async fn resume_campaign(&self, campaign_id: i64) -> CampaignerResult<()> {
        let campaign = self.get_campaign(campaign_id).await?;
        let now = Utc::now();

        match campaign.status {
            CampaignStatus::Running => Ok(()),
            CampaignStatus::Paused => {
                if self
                    .campaign_repo
                    .try_transition(
                        campaign_id,
                        CampaignStatus::Paused,
                        CampaignStatus::Running,
                        now,
                    )
                    .await?
                {
                    info!("活动 {} 已恢复", campaign_id);
                    self.spawn_worker(campaign_id);
                }
                Ok(())
            }
            from => Err(CampaignerError::InvalidStatusTransition {
                from,
                to: CampaignStatus::Running,
            }),
        }
    }

    /// 取消活动，终态。剩余pending号码不再派发。
    pub async fn cancel_campaign(&self, campaign_id: i64) -> CampaignerResult<()> {
        let campaign = self.get_campaign(campaign_id).await?;
        let now = Utc::now();

        match campaign.status {
            CampaignStatus::Cancelled => Ok(()),
            CampaignStatus::Completed => Err(CampaignerError::InvalidStatusTransition {
                from: CampaignStatus::Completed,
                to: CampaignStatus::Cancelled,
            }),
            from => {
                if self
                    .campaign_repo
                    .try_transition(campaign_id, from, CampaignStatus::Cancelled, now)
                    .await?
                {
                    warn!("活动 {} 已取消", campaign_id);
                } else {
                    // 状态在读取后被并发修改，重走一遍当前状态的裁决
                    return Box::pin(self.cancel_campaign(campaign_id)).await;
                }
                Ok(())
            }
        }
    }

    pub async fn campaign_stats(&self, campaign_id: i64) -> CampaignerResult<CampaignStats> {
        let campaign = self.get_campaign(campaign_id).await?;
        let numbers = self.number_repo.status_summary(campaign_id).await?;
        Ok(CampaignStats { campaign, numbers })
    }

    /// 对整场活动做投递对账。cancel置位后在批次边界停止并返回部分结果。
    pub async fn reconcile_campaign(
        &self,
        campaign_id: i64,
        cancel: &AtomicBool,
    ) -> CampaignerResult<ReconcileReport> {
        let _campaign = self.get_campaign(campaign_id).await?;
        let numbers = self.number_repo.get_by_campaign(campaign_id).await?;

        let inputs: Vec<ReconcileInput> = numbers
            .into_iter()
            .map(|n| ReconcileInput {
                number_id: n.id,
                phone_number: n.phone_number,
                request_id: n.request_id,
            })
            .collect();

        Ok(self.reconciler.reconcile(inputs, cancel).await)
    }

    async fn get_campaign(&self, campaign_id: i64) -> CampaignerResult<Campaign> {
        self.campaign_repo
            .get_by_id(campaign_id)
            .await?
            .ok_or(CampaignerError::CampaignNotFound { id: campaign_id })
    }

    fn spawn_worker(&self, campaign_id: i64) -> JoinHandle<()> {
        let worker = Arc::clone(&self.worker);
        tokio::spawn(async move {
            if let Err(e) = worker.run(campaign_id).await {
                error!("活动 {} 的派发循环异常中止: {e}", campaign_id);
            }
        })
    }
}
