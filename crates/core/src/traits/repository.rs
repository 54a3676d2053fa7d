use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::CampaignerResult;
use crate::models::{
    CallStatus, Campaign, CampaignNumber, CampaignStatus, CounterDeltas, Line,
    NumberStatusSummary, SmsStatus,
};

/// 活动仓储接口
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn create(&self, campaign: &Campaign) -> CampaignerResult<Campaign>;

    async fn get_by_id(&self, id: i64) -> CampaignerResult<Option<Campaign>>;

    async fn list(&self, status: Option<CampaignStatus>) -> CampaignerResult<Vec<Campaign>>;

    /// 条件状态迁移，仅当当前状态等于from时生效，返回是否迁移成功。
    /// 状态只能经由这里改写，多个入口（调度器tick、手动启动、
    /// 派发循环收尾）竞争同一迁移时恰好一个成功。
    async fn try_transition(
        &self,
        id: i64,
        from: CampaignStatus,
        to: CampaignStatus,
        at: DateTime<Utc>,
    ) -> CampaignerResult<bool>;

    /// 原子累加活动聚合计数
    async fn increment_counters(&self, id: i64, deltas: &CounterDeltas) -> CampaignerResult<()>;

    /// 取出所有已到计划启动时间的scheduled活动
    async fn get_due_scheduled(&self, now: DateTime<Utc>) -> CampaignerResult<Vec<Campaign>>;
}

/// 活动号码仓储接口
#[async_trait]
pub trait CampaignNumberRepository: Send + Sync {
    /// 批量插入pending号码，重复号码静默跳过，返回实际插入条数
    async fn bulk_insert(&self, campaign_id: i64, phones: &[String]) -> CampaignerResult<usize>;

    /// 原子领取下一个pending号码：置为calling、attempts+1、记录领取时间。
    /// 并发领取同一活动时每个号码恰好被领取一次。
    async fn claim_next_pending(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
    ) -> CampaignerResult<Option<CampaignNumber>>;

    async fn record_call_result(
        &self,
        number_id: i64,
        status: CallStatus,
        request_id: Option<&str>,
    ) -> CampaignerResult<()>;

    async fn record_sms_result(
        &self,
        number_id: i64,
        status: SmsStatus,
        text: &str,
        at: DateTime<Utc>,
    ) -> CampaignerResult<()>;

    async fn get_by_campaign(&self, campaign_id: i64) -> CampaignerResult<Vec<CampaignNumber>>;

    async fn status_summary(&self, campaign_id: i64) -> CampaignerResult<NumberStatusSummary>;
}

/// 线路仓储接口
#[async_trait]
pub trait LineRepository: Send + Sync {
    async fn create(&self, line: &Line) -> CampaignerResult<Line>;

    async fn get_by_id(&self, id: i64) -> CampaignerResult<Option<Line>>;

    async fn list(&self) -> CampaignerResult<Vec<Line>>;

    /// 按负载最小取一条active线路，operator为Some时限定运营商且不做限额过滤
    async fn least_loaded_active(&self, operator: Option<&str>)
        -> CampaignerResult<Option<Line>>;

    /// 按负载最小取一条限额内的active线路
    async fn least_loaded_under_limits(
        &self,
        now: DateTime<Utc>,
    ) -> CampaignerResult<Option<Line>>;

    /// 原子记账一次呼叫：限额内则calls_today+1、按小时桶规则更新calls_this_hour
    /// 并写last_call_time，返回是否成功。限额已满时不修改任何计数并返回false。
    async fn try_record_call(&self, line_id: i64, now: DateTime<Utc>) -> CampaignerResult<bool>;
}
