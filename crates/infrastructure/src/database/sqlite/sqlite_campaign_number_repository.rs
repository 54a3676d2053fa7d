use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use campaigner_core::errors::{CampaignerError, CampaignerResult};
use campaigner_core::models::{CallStatus, CampaignNumber, NumberStatusSummary, SmsStatus};
use campaigner_core::traits::CampaignNumberRepository;

pub struct SqliteCampaignNumberRepository {
    pool: SqlitePool,
}

const NUMBER_COLUMNS: &str = "id, campaign_id, phone_number, timezone_offset, call_status, \
     sms_status, call_attempts, request_id, sms_text_sent, sms_sent_at, last_attempt_time";

impl SqliteCampaignNumberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_number(row: &sqlx::sqlite::SqliteRow) -> CampaignerResult<CampaignNumber> {
        Ok(CampaignNumber {
            id: row.try_get("id")?,
            campaign_id: row.try_get("campaign_id")?,
            phone_number: row.try_get("phone_number")?,
            timezone_offset: row.try_get("timezone_offset")?,
            call_status: row.try_get("call_status")?,
            sms_status: row.try_get("sms_status")?,
            call_attempts: row.try_get("call_attempts")?,
            request_id: row.try_get("request_id")?,
            sms_text_sent: row.try_get("sms_text_sent")?,
            sms_sent_at: row.try_get("sms_sent_at")?,
            last_attempt_time: row.try_get("last_attempt_time")?,
        })
    }
}

#[async_trait]
impl CampaignNumberRepository for SqliteCampaignNumberRepository {
    async fn bulk_insert(&self, campaign_id: i64, phones: &[String]) -> CampaignerResult<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for phone in phones {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO campaign_numbers (campaign_id, phone_number) VALUES ($1, $2)",
            )
            .bind(campaign_id)
            .bind(phone)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }

        // total_numbers与号码表保持一致
        sqlx::query(
            r#"
            UPDATE campaigns
            SET total_numbers = (SELECT COUNT(*) FROM campaign_numbers WHERE campaign_id = $1)
            WHERE id = $1
            "#,
        )
        .bind(campaign_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("活动 {} 导入 {} 个号码", campaign_id, inserted);
        Ok(inserted)
    }

    async fn claim_next_pending(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
    ) -> CampaignerResult<Option<CampaignNumber>> {
        // 单条UPDATE完成领取，多个派发循环并发领取时每行恰好被领一次
        let sql = format!(
            r#"
            UPDATE campaign_numbers
            SET call_status = 'calling',
                call_attempts = call_attempts + 1,
                last_attempt_time = $2
            WHERE id = (
                SELECT id FROM campaign_numbers
                WHERE campaign_id = $1 AND call_status = 'pending'
                ORDER BY id
                LIMIT 1
            )
            RETURNING {NUMBER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(campaign_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_number(&row)?)),
            None => Ok(None),
        }
    }

    async fn record_call_result(
        &self,
        number_id: i64,
        status: CallStatus,
        request_id: Option<&str>,
    ) -> CampaignerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_numbers
            SET call_status = $2,
                request_id = COALESCE($3, request_id)
            WHERE id = $1
            "#,
        )
        .bind(number_id)
        .bind(status)
        .bind(request_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CampaignerError::NumberNotFound { id: number_id });
        }
        Ok(())
    }

    async fn record_sms_result(
        &self,
        number_id: i64,
        status: SmsStatus,
        text: &str,
        at: DateTime<Utc>,
    ) -> CampaignerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_numbers
            SET sms_status = $2, sms_text_sent = $3, sms_sent_at = $4
            WHERE id = $1
            "#,
        )
        .bind(number_id)
        .bind(status)
        .bind(text)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CampaignerError::NumberNotFound { id: number_id });
        }
        Ok(())
    }

    async fn get_by_campaign(&self, campaign_id: i64) -> CampaignerResult<Vec<CampaignNumber>> {
        let sql = format!(
            "SELECT {NUMBER_COLUMNS} FROM campaign_numbers WHERE campaign_id = $1 ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(campaign_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_number).collect()
    }

    async fn status_summary(&self, campaign_id: i64) -> CampaignerResult<NumberStatusSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(CASE WHEN call_status = 'pending' THEN 1 END) AS pending,
                COUNT(CASE WHEN call_status = 'calling' THEN 1 END) AS calling,
                COUNT(CASE WHEN call_status = 'answered' THEN 1 END) AS answered,
                COUNT(CASE WHEN call_status = 'no_answer' THEN 1 END) AS no_answer,
                COUNT(CASE WHEN call_status = 'failed' THEN 1 END) AS failed,
                COUNT(CASE WHEN sms_status = 'sent' THEN 1 END) AS sms_sent,
                COUNT(CASE WHEN sms_status = 'failed' THEN 1 END) AS sms_failed
            FROM campaign_numbers
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(NumberStatusSummary {
            pending: row.try_get("pending")?,
            calling: row.try_get("calling")?,
            answered: row.try_get("answered")?,
            no_answer: row.try_get("no_answer")?,
            failed: row.try_get("failed")?,
            sms_sent: row.try_get("sms_sent")?,
            sms_failed: row.try_get("sms_failed")?,
        })
    }
}
