use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 出局呼叫线路（SIM卡）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: i64,
    /// 所属运营商标识
    pub operator: String,
    /// 线路自身的号码
    pub phone_number: String,
    pub status: LineStatus,
    pub calls_today: i32,
    pub calls_this_hour: i32,
    pub daily_call_limit: i32,
    pub hourly_call_limit: i32,
    pub last_call_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LineStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "disabled")]
    Disabled,
}

impl sqlx::Type<sqlx::Sqlite> for LineStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for LineStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "active" => Ok(LineStatus::Active),
            "disabled" => Ok(LineStatus::Disabled),
            _ => Err(format!("Invalid line status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for LineStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let s = match self {
            LineStatus::Active => "active",
            LineStatus::Disabled => "disabled",
        };
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(s, buf)
    }
}

impl Line {
    pub fn new(operator: &str, phone_number: &str) -> Self {
        Self {
            id: 0, // 将由数据库生成
            operator: operator.to_string(),
            phone_number: phone_number.to_string(),
            status: LineStatus::Active,
            calls_today: 0,
            calls_this_hour: 0,
            daily_call_limit: 100,
            hourly_call_limit: 10,
            last_call_time: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, LineStatus::Active)
    }

    /// 小时计数桶是否已过期，上次呼叫距今超过一小时（严格大于）则桶内计数作废
    pub fn hour_bucket_expired(&self, now: DateTime<Utc>) -> bool {
        match self.last_call_time {
            Some(last) => last < now - Duration::hours(1),
            None => true,
        }
    }

    /// 线路当前是否还在日/小时限额之内
    pub fn is_within_limits(&self, now: DateTime<Utc>) -> bool {
        if self.calls_today >= self.daily_call_limit {
            return false;
        }
        self.hour_bucket_expired(now) || self.calls_this_hour < self.hourly_call_limit
    }
}
