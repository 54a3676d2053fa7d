pub mod sqlite;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use campaigner_core::errors::CampaignerResult;

/// 建库语句。计数器一律带默认值，request_sequence只有一行，
/// 种子值与历史数据保持同一量级。
const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS campaigns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        campaign_type TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft',
        voice_text TEXT,
        sms_on_no_answer TEXT,
        sms_on_success TEXT,
        send_sms_on_no_answer INTEGER NOT NULL DEFAULT 0,
        send_sms_on_success INTEGER NOT NULL DEFAULT 0,
        sender_line TEXT,
        sms_template TEXT,
        scheduled_start_time TEXT,
        total_numbers INTEGER NOT NULL DEFAULT 0,
        processed_numbers INTEGER NOT NULL DEFAULT 0,
        successful_calls INTEGER NOT NULL DEFAULT 0,
        failed_calls INTEGER NOT NULL DEFAULT 0,
        sms_sent INTEGER NOT NULL DEFAULT 0,
        sms_failed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT,
        cancelled_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS campaign_numbers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        campaign_id INTEGER NOT NULL REFERENCES campaigns(id),
        phone_number TEXT NOT NULL,
        timezone_offset INTEGER,
        call_status TEXT NOT NULL DEFAULT 'pending',
        sms_status TEXT NOT NULL DEFAULT 'none',
        call_attempts INTEGER NOT NULL DEFAULT 0,
        request_id TEXT,
        sms_text_sent TEXT,
        sms_sent_at TEXT,
        last_attempt_time TEXT,
        UNIQUE (campaign_id, phone_number)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_campaign_numbers_status
        ON campaign_numbers (campaign_id, call_status)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        operator TEXT NOT NULL,
        phone_number TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        calls_today INTEGER NOT NULL DEFAULT 0,
        calls_this_hour INTEGER NOT NULL DEFAULT 0,
        daily_call_limit INTEGER NOT NULL DEFAULT 100,
        hourly_call_limit INTEGER NOT NULL DEFAULT 10,
        last_call_time TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS request_sequence (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        value INTEGER NOT NULL
    )
    "#,
    r#"
    INSERT OR IGNORE INTO request_sequence (id, value) VALUES (1, 1000000)
    "#,
];

/// 数据库连接与建表管理
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(url: &str, max_connections: u32) -> CampaignerResult<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!("数据库连接池已建立: {url}");
        Ok(pool)
    }

    pub async fn initialize_schema(pool: &SqlitePool) -> CampaignerResult<()> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(pool).await?;
        }
        info!("数据库表结构初始化完成");
        Ok(())
    }
}
