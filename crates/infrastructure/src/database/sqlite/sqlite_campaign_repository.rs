use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use campaigner_core::errors::{CampaignerError, CampaignerResult};
use campaigner_core::models::{Campaign, CampaignStatus, CounterDeltas};
use campaigner_core::traits::CampaignRepository;

pub struct SqliteCampaignRepository {
    pool: SqlitePool,
}

const CAMPAIGN_COLUMNS: &str = "id, name, description, campaign_type, status, voice_text, \
     sms_on_no_answer, sms_on_success, send_sms_on_no_answer, send_sms_on_success, \
     sender_line, sms_template, scheduled_start_time, total_numbers, processed_numbers, \
     successful_calls, failed_calls, sms_sent, sms_failed, created_at, started_at, \
     completed_at, cancelled_at";

impl SqliteCampaignRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_campaign(row: &sqlx::sqlite::SqliteRow) -> CampaignerResult<Campaign> {
        Ok(Campaign {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            campaign_type: row.try_get("campaign_type")?,
            status: row.try_get("status")?,
            voice_text: row.try_get("voice_text")?,
            sms_on_no_answer: row.try_get("sms_on_no_answer")?,
            sms_on_success: row.try_get("sms_on_success")?,
            send_sms_on_no_answer: row.try_get("send_sms_on_no_answer")?,
            send_sms_on_success: row.try_get("send_sms_on_success")?,
            sender_line: row.try_get("sender_line")?,
            sms_template: row.try_get("sms_template")?,
            scheduled_start_time: row.try_get("scheduled_start_time")?,
            total_numbers: row.try_get("total_numbers")?,
            processed_numbers: row.try_get("processed_numbers")?,
            successful_calls: row.try_get("successful_calls")?,
            failed_calls: row.try_get("failed_calls")?,
            sms_sent: row.try_get("sms_sent")?,
            sms_failed: row.try_get("sms_failed")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
        })
    }
}

#[async_trait]
impl CampaignRepository for SqliteCampaignRepository {
    async fn create(&self, campaign: &Campaign) -> CampaignerResult<Campaign> {
        let sql = format!(
            r#"
            INSERT INTO campaigns (name, description, campaign_type, status, voice_text,
                                   sms_on_no_answer, sms_on_success, send_sms_on_no_answer,
                                   send_sms_on_success, sender_line, sms_template,
                                   scheduled_start_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&campaign.name)
            .bind(&campaign.description)
            .bind(campaign.campaign_type)
            .bind(campaign.status)
            .bind(&campaign.voice_text)
            .bind(&campaign.sms_on_no_answer)
            .bind(&campaign.sms_on_success)
            .bind(campaign.send_sms_on_no_answer)
            .bind(campaign.send_sms_on_success)
            .bind(&campaign.sender_line)
            .bind(&campaign.sms_template)
            .bind(campaign.scheduled_start_time)
            .bind(campaign.created_at)
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_campaign(&row)?;
        debug!("创建活动 {} ({})", created.id, created.name);
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> CampaignerResult<Option<Campaign>> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_campaign(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, status: Option<CampaignStatus>) -> CampaignerResult<Vec<Campaign>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = $1 ORDER BY id"
                );
                sqlx::query(&sql).bind(status).fetch_all(&self.pool).await?
            }
            None => {
                let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY id");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        rows.iter().map(Self::row_to_campaign).collect()
    }

    async fn try_transition(
        &self,
        id: i64,
        from: CampaignStatus,
        to: CampaignStatus,
        at: DateTime<Utc>,
    ) -> CampaignerResult<bool> {
        // 条件更新作为并发入口之间的唯一裁决点
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $3,
                started_at = CASE WHEN $3 = 'running' AND started_at IS NULL
                                  THEN $4 ELSE started_at END,
                completed_at = CASE WHEN $3 = 'completed' THEN $4 ELSE completed_at END,
                cancelled_at = CASE WHEN $3 = 'cancelled' THEN $4 ELSE cancelled_at END
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_counters(&self, id: i64, deltas: &CounterDeltas) -> CampaignerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET processed_numbers = processed_numbers + $2,
                successful_calls = successful_calls + $3,
                failed_calls = failed_calls + $4,
                sms_sent = sms_sent + $5,
                sms_failed = sms_failed + $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(deltas.processed_numbers)
        .bind(deltas.successful_calls)
        .bind(deltas.failed_calls)
        .bind(deltas.sms_sent)
        .bind(deltas.sms_failed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CampaignerError::CampaignNotFound { id });
        }
        Ok(())
    }

    async fn get_due_scheduled(&self, now: DateTime<Utc>) -> CampaignerResult<Vec<Campaign>> {
        let sql = format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS} FROM campaigns
            WHERE status = 'scheduled'
              AND scheduled_start_time IS NOT NULL
              AND scheduled_start_time <= $1
            ORDER BY scheduled_start_time
            "#
        );
        let rows = sqlx::query(&sql).bind(now).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_campaign).collect()
    }
}
