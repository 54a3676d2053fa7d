use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use campaigner_core::errors::CampaignerResult;
use campaigner_core::traits::RequestIdSequence;

/// 库内单行计数器实现的请求标识序列。
/// 单条UPDATE自增并取回新值，跨进程也不会发出重复标识。
pub struct SqliteRequestIdSequence {
    pool: SqlitePool,
}

impl SqliteRequestIdSequence {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestIdSequence for SqliteRequestIdSequence {
    async fn next_id(&self) -> CampaignerResult<String> {
        let row = sqlx::query("UPDATE request_sequence SET value = value + 1 WHERE id = 1 RETURNING value")
            .fetch_one(&self.pool)
            .await?;
        let value: i64 = row.try_get("value")?;
        Ok(format!("REQ{value}"))
    }
}
