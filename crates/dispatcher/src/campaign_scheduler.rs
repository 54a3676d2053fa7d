use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use campaigner_core::errors::CampaignerResult;
use campaigner_core::models::CampaignStatus;
use campaigner_core::traits::CampaignRepository;

use crate::dispatch_worker::DispatchWorker;

/// 定时活动调度器。周期性扫描到期的scheduled活动，
/// 以条件迁移scheduled->running作为幂等闸门后拉起派发循环。
pub struct CampaignScheduler {
    campaign_repo: Arc<dyn CampaignRepository>,
    worker: Arc<DispatchWorker>,
    tick_interval: Duration,
}

impl CampaignScheduler {
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        worker: Arc<DispatchWorker>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            campaign_repo,
            worker,
            tick_interval,
        }
    }

    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "活动调度器启动，扫描间隔 {} 秒",
            self.tick_interval.as_secs()
        );
        let mut ticker = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("调度扫描失败: {e}");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("活动调度器收到关闭信号，退出");
                    break;
                }
            }
        }
    }

    /// 单次扫描。返回本次实际拉起的活动id。
    /// 迁移失败说明手动启动或上一个tick已经抢先，直接跳过即可，
    /// 同一活动绝不会产生第二个派发循环。
    pub async fn tick(&self) -> CampaignerResult<Vec<i64>> {
        let now = Utc::now();
        let due = self.campaign_repo.get_due_scheduled(now).await?;
        let mut started = Vec::new();

        for campaign in due {
            let promoted = self
                .campaign_repo
                .try_transition(
                    campaign.id,
                    CampaignStatus::Scheduled,
                    CampaignStatus::Running,
                    now,
                )
                .await?;

            if promoted {
                info!("定时活动 {} ({}) 提升为running", campaign.id, campaign.name);
                self.spawn_worker(campaign.id);
                started.push(campaign.id);
            } else {
                debug!("活动 {} 已被其他入口启动，跳过", campaign.id);
            }
        }

        if !started.is_empty() {
            info!("本次扫描拉起了 {} 个定时活动", started.len());
        }
        Ok(started)
    }

    fn spawn_worker(&self, campaign_id: i64) {
        let worker = Arc::clone(&self.worker);
        tokio::spawn(async move {
            if let Err(e) = worker.run(campaign_id).await {
                error!("活动 {} 的派发循环异常中止: {e}", campaign_id);
            }
        });
    }
}
