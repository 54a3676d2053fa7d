use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{error, info};

use campaigner_core::models::CampaignStatus;
use campaigner_core::traits::CampaignRepository;
use campaigner_core::AppConfig;
use campaigner_dispatcher::{
    AntiDetectPacing, CampaignController, CampaignScheduler, DeliveryReconciler, DispatchWorker,
    LineAllocator, OperatorPrefixTable,
};
use campaigner_infrastructure::{
    DatabaseManager, HttpCallGateway, HttpLogQueryService, HttpSmsGateway,
    SqliteCampaignNumberRepository, SqliteCampaignRepository, SqliteLineRepository,
    SqliteRequestIdSequence,
};

/// 主应用程序。组装存储、网关与派发组件并驱动调度循环。
pub struct Application {
    campaign_repo: Arc<SqliteCampaignRepository>,
    worker: Arc<DispatchWorker>,
    scheduler: CampaignScheduler,
    controller: CampaignController,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        // 连接数据库并确保表结构就绪
        let pool = DatabaseManager::connect(&config.database.url, config.database.max_connections)
            .await
            .context("连接数据库失败")?;
        DatabaseManager::initialize_schema(&pool)
            .await
            .context("初始化表结构失败")?;

        // 存储层
        let campaign_repo = Arc::new(SqliteCampaignRepository::new(pool.clone()));
        let number_repo = Arc::new(SqliteCampaignNumberRepository::new(pool.clone()));
        let line_repo = Arc::new(SqliteLineRepository::new(pool.clone()));
        let request_ids = Arc::new(SqliteRequestIdSequence::new(pool));

        // 外部服务
        let call_gateway = Arc::new(HttpCallGateway::new(&config.gateways.call_base_url));
        let sms_gateway = Arc::new(HttpSmsGateway::new(&config.gateways.sms_base_url));
        let log_query = Arc::new(HttpLogQueryService::new(&config.gateways.log_store_base_url));

        // 派发组件
        let allocator = Arc::new(LineAllocator::new(
            line_repo,
            OperatorPrefixTable::from_config(&config.operators),
        ));
        let pacing = Arc::new(AntiDetectPacing::new(&config.pacing));
        let worker = Arc::new(DispatchWorker::new(
            campaign_repo.clone(),
            number_repo.clone(),
            allocator,
            call_gateway,
            sms_gateway,
            request_ids,
            pacing,
            config.dispatcher.call_timeout_seconds,
        ));
        let scheduler = CampaignScheduler::new(
            campaign_repo.clone(),
            worker.clone(),
            Duration::from_secs(config.dispatcher.scheduler_tick_seconds),
        );
        let reconciler = Arc::new(DeliveryReconciler::new(
            log_query,
            config.reconcile.batch_size,
        ));
        let controller = CampaignController::new(
            campaign_repo.clone(),
            number_repo,
            worker.clone(),
            reconciler,
        );

        Ok(Self {
            campaign_repo,
            worker,
            scheduler,
            controller,
        })
    }

    /// 运行应用程序
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.resume_running_campaigns().await?;
        self.scheduler.run(shutdown_rx).await;
        Ok(())
    }

    /// 一次性对账：比对活动号码的请求标识与网关日志，输出投递结论
    pub async fn reconcile_campaign(&self, campaign_id: i64) -> Result<()> {
        let cancel = AtomicBool::new(false);
        let report = self
            .controller
            .reconcile_campaign(campaign_id, &cancel)
            .await
            .with_context(|| format!("活动 {campaign_id} 对账失败"))?;

        info!(
            "活动 {} 对账结束 ({:?}): {}/{} 批，送达 {}，未送达 {}",
            campaign_id,
            report.outcome,
            report.batches_completed,
            report.batches_total,
            report.delivered_count(),
            report.not_delivered_count()
        );
        Ok(())
    }

    /// 上次进程退出时还在running的活动，重启后继续派发。
    /// pending号码从断点接着跑，已派发的号码不会重复。
    async fn resume_running_campaigns(&self) -> Result<()> {
        let running = self
            .campaign_repo
            .list(Some(CampaignStatus::Running))
            .await
            .context("查询运行中的活动失败")?;

        for campaign in running {
            info!("恢复运行中的活动 {} ({})", campaign.id, campaign.name);
            let worker = Arc::clone(&self.worker);
            let campaign_id = campaign.id;
            tokio::spawn(async move {
                if let Err(e) = worker.run(campaign_id).await {
                    error!("活动 {} 的派发循环异常中止: {e}", campaign_id);
                }
            });
        }

        Ok(())
    }
}
