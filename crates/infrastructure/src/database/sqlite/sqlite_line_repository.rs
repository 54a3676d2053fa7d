use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use campaigner_core::errors::CampaignerResult;
use campaigner_core::models::Line;
use campaigner_core::traits::LineRepository;

pub struct SqliteLineRepository {
    pool: SqlitePool,
}

const LINE_COLUMNS: &str = "id, operator, phone_number, status, calls_today, calls_this_hour, \
     daily_call_limit, hourly_call_limit, last_call_time, created_at";

impl SqliteLineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> CampaignerResult<Line> {
        Ok(Line {
            id: row.try_get("id")?,
            operator: row.try_get("operator")?,
            phone_number: row.try_get("phone_number")?,
            status: row.try_get("status")?,
            calls_today: row.try_get("calls_today")?,
            calls_this_hour: row.try_get("calls_this_hour")?,
            daily_call_limit: row.try_get("daily_call_limit")?,
            hourly_call_limit: row.try_get("hourly_call_limit")?,
            last_call_time: row.try_get("last_call_time")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl LineRepository for SqliteLineRepository {
    async fn create(&self, line: &Line) -> CampaignerResult<Line> {
        let sql = format!(
            r#"
            INSERT INTO lines (operator, phone_number, status, calls_today, calls_this_hour,
                               daily_call_limit, hourly_call_limit, last_call_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LINE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&line.operator)
            .bind(&line.phone_number)
            .bind(line.status)
            .bind(line.calls_today)
            .bind(line.calls_this_hour)
            .bind(line.daily_call_limit)
            .bind(line.hourly_call_limit)
            .bind(line.last_call_time)
            .bind(line.created_at)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_line(&row)
    }

    async fn get_by_id(&self, id: i64) -> CampaignerResult<Option<Line>> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM lines WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(Self::row_to_line(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> CampaignerResult<Vec<Line>> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM lines ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_line).collect()
    }

    async fn least_loaded_active(
        &self,
        operator: Option<&str>,
    ) -> CampaignerResult<Option<Line>> {
        // 负载最轻优先，同负载随机打散，避免并发循环都压到同一条线路
        let row = match operator {
            Some(operator) => {
                let sql = format!(
                    r#"
                    SELECT {LINE_COLUMNS} FROM lines
                    WHERE operator = $1 AND status = 'active'
                    ORDER BY calls_today ASC, calls_this_hour ASC, RANDOM()
                    LIMIT 1
                    "#
                );
                sqlx::query(&sql)
                    .bind(operator)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    r#"
                    SELECT {LINE_COLUMNS} FROM lines
                    WHERE status = 'active'
                    ORDER BY calls_today ASC, calls_this_hour ASC, RANDOM()
                    LIMIT 1
                    "#
                );
                sqlx::query(&sql).fetch_optional(&self.pool).await?
            }
        };

        match row {
            Some(row) => Ok(Some(Self::row_to_line(&row)?)),
            None => Ok(None),
        }
    }

    async fn least_loaded_under_limits(
        &self,
        now: DateTime<Utc>,
    ) -> CampaignerResult<Option<Line>> {
        let hour_ago = now - Duration::hours(1);
        let sql = format!(
            r#"
            SELECT {LINE_COLUMNS} FROM lines
            WHERE status = 'active'
              AND calls_today < daily_call_limit
              AND (calls_this_hour < hourly_call_limit
                   OR last_call_time IS NULL
                   OR last_call_time < $1)
            ORDER BY calls_today ASC, calls_this_hour ASC, RANDOM()
            LIMIT 1
            "#
        );
        let row = sqlx::query(&sql)
            .bind(hour_ago)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_line(&row)?)),
            None => Ok(None),
        }
    }

    async fn try_record_call(&self, line_id: i64, now: DateTime<Utc>) -> CampaignerResult<bool> {
        let hour_ago = now - Duration::hours(1);
        // 选取和记账之间存在竞争窗口，限额条件在这里重新裁决：
        // 超限时一行都不更新，调用方回退重选。
        // 距上次呼叫超过一小时（严格大于）则小时计数重置为1，整一小时仍累加。
        let result = sqlx::query(
            r#"
            UPDATE lines
            SET calls_today = calls_today + 1,
                calls_this_hour = CASE
                    WHEN last_call_time IS NOT NULL AND last_call_time >= $2
                    THEN calls_this_hour + 1
                    ELSE 1
                END,
                last_call_time = $3
            WHERE id = $1
              AND status = 'active'
              AND calls_today < daily_call_limit
              AND (calls_this_hour < hourly_call_limit
                   OR last_call_time IS NULL
                   OR last_call_time < $2)
            "#,
        )
        .bind(line_id)
        .bind(hour_ago)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let recorded = result.rows_affected() == 1;
        if !recorded {
            debug!("线路 {} 已达限额，记账被拒绝", line_id);
        }
        Ok(recorded)
    }
}
