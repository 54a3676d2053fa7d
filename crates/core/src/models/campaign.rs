use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 外呼活动
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub campaign_type: CampaignType,
    pub status: CampaignStatus,
    /// 呼叫播放的文本内容
    pub voice_text: Option<String>,
    /// 未接通时发送的短信文本
    pub sms_on_no_answer: Option<String>,
    /// 接通后发送的短信文本
    pub sms_on_success: Option<String>,
    pub send_sms_on_no_answer: bool,
    pub send_sms_on_success: bool,
    /// 纯短信活动的发送方标识
    pub sender_line: Option<String>,
    pub sms_template: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub total_numbers: i64,
    pub processed_numbers: i64,
    pub successful_calls: i64,
    pub failed_calls: i64,
    pub sms_sent: i64,
    pub sms_failed: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CampaignType {
    #[serde(rename = "call")]
    Call,
    #[serde(rename = "sms")]
    Sms,
    #[serde(rename = "call_and_sms")]
    CallAndSms,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CampaignStatus {
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "scheduled")]
    Scheduled,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl sqlx::Type<sqlx::Sqlite> for CampaignType {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for CampaignType {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "call" => Ok(CampaignType::Call),
            "sms" => Ok(CampaignType::Sms),
            "call_and_sms" => Ok(CampaignType::CallAndSms),
            _ => Err(format!("Invalid campaign type: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for CampaignType {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let s = match self {
            CampaignType::Call => "call",
            CampaignType::Sms => "sms",
            CampaignType::CallAndSms => "call_and_sms",
        };
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(s, buf)
    }
}

impl sqlx::Type<sqlx::Sqlite> for CampaignStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for CampaignStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "running" => Ok(CampaignStatus::Running),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            _ => Err(format!("Invalid campaign status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for CampaignStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let s = match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        };
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(s, buf)
    }
}

impl Campaign {
    pub fn new(name: &str, campaign_type: CampaignType) -> Self {
        Self {
            id: 0, // 将由数据库生成
            name: name.to_string(),
            description: None,
            campaign_type,
            status: CampaignStatus::Draft,
            voice_text: None,
            sms_on_no_answer: None,
            sms_on_success: None,
            send_sms_on_no_answer: false,
            send_sms_on_success: false,
            sender_line: None,
            sms_template: None,
            scheduled_start_time: None,
            total_numbers: 0,
            processed_numbers: 0,
            successful_calls: 0,
            failed_calls: 0,
            sms_sent: 0,
            sms_failed: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, CampaignStatus::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            CampaignStatus::Completed | CampaignStatus::Cancelled
        )
    }

    /// 状态迁移合法性检查，running与paused之间可以往返，终态不可离开
    pub fn can_transition_to(&self, to: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self.status, to),
            (Draft, Scheduled | Running | Cancelled)
                | (Scheduled, Running | Cancelled)
                | (Running, Paused | Completed | Cancelled)
                | (Paused, Running | Cancelled)
        )
    }

    /// 是否需要拨打电话
    pub fn places_calls(&self) -> bool {
        matches!(
            self.campaign_type,
            CampaignType::Call | CampaignType::CallAndSms
        )
    }
}

/// 每处理一个号码后对活动聚合计数的增量
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterDeltas {
    pub processed_numbers: i64,
    pub successful_calls: i64,
    pub failed_calls: i64,
    pub sms_sent: i64,
    pub sms_failed: i64,
}
