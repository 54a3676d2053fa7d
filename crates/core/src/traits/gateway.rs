use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CampaignerResult;

/// 发起一次外呼的请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    pub destination: String,
    pub line_id: i64,
    pub voice_text: Option<String>,
    /// 全局唯一请求标识，写入网关日志用于投递对账
    pub request_id: String,
    pub timeout_seconds: u64,
}

/// 呼叫结果，success表示被叫接通
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOutcome {
    pub success: bool,
    pub provider_response: Option<serde_json::Value>,
}

/// 呼叫网关接口。实现方应把供应商侧的失败折叠为success=false，
/// 只有传输层故障才返回Err。
#[async_trait]
pub trait CallGateway: Send + Sync {
    async fn place_call(&self, request: &CallRequest) -> CampaignerResult<CallOutcome>;
}

/// 发送一条短信的请求，line_id为None时由网关使用默认发送方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsRequest {
    pub destination: String,
    pub line_id: Option<i64>,
    pub text: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsOutcome {
    pub success: bool,
    pub provider_response: Option<serde_json::Value>,
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_sms(&self, request: &SmsRequest) -> CampaignerResult<SmsOutcome>;
}

/// 外部日志存储的检索接口，pattern为正则（对账时使用请求标识的交替式）。
/// 返回所有命中的原始日志行。
#[async_trait]
pub trait LogQueryService: Send + Sync {
    async fn search(&self, pattern: &str) -> CampaignerResult<Vec<String>>;
}

/// 请求标识序列，必须跨并发派发循环全局单调且无重复
#[async_trait]
pub trait RequestIdSequence: Send + Sync {
    async fn next_id(&self) -> CampaignerResult<String>;
}
