use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 活动中的单个目标号码
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignNumber {
    pub id: i64,
    pub campaign_id: i64,
    /// E.164格式的目标号码
    pub phone_number: String,
    pub timezone_offset: Option<i32>,
    pub call_status: CallStatus,
    pub sms_status: SmsStatus,
    pub call_attempts: i32,
    /// 派发时分配的请求标识，用于投递对账
    pub request_id: Option<String>,
    /// 实际发送的短信文本
    pub sms_text_sent: Option<String>,
    pub sms_sent_at: Option<DateTime<Utc>>,
    pub last_attempt_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CallStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "calling")]
    Calling,
    #[serde(rename = "answered")]
    Answered,
    #[serde(rename = "no_answer")]
    NoAnswer,
    #[serde(rename = "failed")]
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SmsStatus {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "sent")]
    Sent,
    #[serde(rename = "failed")]
    Failed,
}

impl sqlx::Type<sqlx::Sqlite> for CallStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for CallStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "pending" => Ok(CallStatus::Pending),
            "calling" => Ok(CallStatus::Calling),
            "answered" => Ok(CallStatus::Answered),
            "no_answer" => Ok(CallStatus::NoAnswer),
            "failed" => Ok(CallStatus::Failed),
            _ => Err(format!("Invalid call status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for CallStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let s = match self {
            CallStatus::Pending => "pending",
            CallStatus::Calling => "calling",
            CallStatus::Answered => "answered",
            CallStatus::NoAnswer => "no_answer",
            CallStatus::Failed => "failed",
        };
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(s, buf)
    }
}

impl sqlx::Type<sqlx::Sqlite> for SmsStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for SmsStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "none" => Ok(SmsStatus::None),
            "sent" => Ok(SmsStatus::Sent),
            "failed" => Ok(SmsStatus::Failed),
            _ => Err(format!("Invalid sms status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for SmsStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let s = match self {
            SmsStatus::None => "none",
            SmsStatus::Sent => "sent",
            SmsStatus::Failed => "failed",
        };
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(s, buf)
    }
}

impl CampaignNumber {
    pub fn new(campaign_id: i64, phone_number: &str) -> Self {
        Self {
            id: 0, // 将由数据库生成
            campaign_id,
            phone_number: phone_number.to_string(),
            timezone_offset: None,
            call_status: CallStatus::Pending,
            sms_status: SmsStatus::None,
            call_attempts: 0,
            request_id: None,
            sms_text_sent: None,
            sms_sent_at: None,
            last_attempt_time: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.call_status,
            CallStatus::Answered | CallStatus::NoAnswer | CallStatus::Failed
        )
    }
}

/// 活动内号码按状态的分布统计
#[derive(Debug, Default, Clone)]
pub struct NumberStatusSummary {
    pub pending: i64,
    pub calling: i64,
    pub answered: i64,
    pub no_answer: i64,
    pub failed: i64,
    pub sms_sent: i64,
    pub sms_failed: i64,
}

impl NumberStatusSummary {
    pub fn total(&self) -> i64 {
        self.pending + self.calling + self.answered + self.no_answer + self.failed
    }

    pub fn terminal(&self) -> i64 {
        self.answered + self.no_answer + self.failed
    }
}
