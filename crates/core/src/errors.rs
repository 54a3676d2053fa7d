use thiserror::Error;

use crate::models::CampaignStatus;

/// 外呼活动系统错误类型定义
#[derive(Debug, Error)]
pub enum CampaignerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("活动未找到: {id}")]
    CampaignNotFound { id: i64 },

    #[error("号码记录未找到: {id}")]
    NumberNotFound { id: i64 },

    #[error("线路未找到: {id}")]
    LineNotFound { id: i64 },

    #[error("没有符合限额的可用线路")]
    LinesExhausted,

    #[error("非法的活动状态迁移: {from:?} -> {to:?}")]
    InvalidStatusTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("呼叫网关错误: {0}")]
    CallGateway(String),

    #[error("短信网关错误: {0}")]
    SmsGateway(String),

    #[error("日志存储查询错误: {0}")]
    LogStore(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type CampaignerResult<T> = std::result::Result<T, CampaignerError>;
