use std::collections::HashMap;

use serde::Deserialize;

use crate::errors::{CampaignerError, CampaignerResult};

/// 应用配置，从TOML文件加载并允许CAMPAIGNER_*环境变量覆盖
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub gateways: GatewayConfig,
    #[serde(default)]
    pub operators: OperatorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// 调度器扫描scheduled活动的间隔
    #[serde(default = "default_scheduler_tick_seconds")]
    pub scheduler_tick_seconds: u64,
    /// 单次呼叫的等待上限
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: u64,
}

/// 拟人化节奏参数：基础间隔均匀分布，叠加小概率长停顿
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_base_min_seconds")]
    pub base_min_seconds: f64,
    #[serde(default = "default_base_max_seconds")]
    pub base_max_seconds: f64,
    #[serde(default = "default_long_pause_probability")]
    pub long_pause_probability: f64,
    #[serde(default = "default_long_pause_min_seconds")]
    pub long_pause_min_seconds: f64,
    #[serde(default = "default_long_pause_max_seconds")]
    pub long_pause_max_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_reconcile_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_call_gateway_url")]
    pub call_base_url: String,
    #[serde(default = "default_sms_gateway_url")]
    pub sms_base_url: String,
    #[serde(default = "default_log_store_url")]
    pub log_store_base_url: String,
}

/// 运营商前缀表：被叫号码去掉国家码后的前三位 -> 运营商标识
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default)]
    pub prefixes: HashMap<String, String>,
}

fn default_database_url() -> String {
    "sqlite://campaigner.db".to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_scheduler_tick_seconds() -> u64 {
    60
}
fn default_call_timeout_seconds() -> u64 {
    30
}
fn default_base_min_seconds() -> f64 {
    45.0
}
fn default_base_max_seconds() -> f64 {
    180.0
}
fn default_long_pause_probability() -> f64 {
    0.15
}
fn default_long_pause_min_seconds() -> f64 {
    300.0
}
fn default_long_pause_max_seconds() -> f64 {
    900.0
}
fn default_reconcile_batch_size() -> usize {
    200
}
fn default_call_gateway_url() -> String {
    "http://localhost:8088".to_string()
}
fn default_sms_gateway_url() -> String {
    "http://localhost:8089".to_string()
}
fn default_log_store_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_country_code() -> String {
    "7".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            scheduler_tick_seconds: default_scheduler_tick_seconds(),
            call_timeout_seconds: default_call_timeout_seconds(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_min_seconds: default_base_min_seconds(),
            base_max_seconds: default_base_max_seconds(),
            long_pause_probability: default_long_pause_probability(),
            long_pause_min_seconds: default_long_pause_min_seconds(),
            long_pause_max_seconds: default_long_pause_max_seconds(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: default_reconcile_batch_size(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            call_base_url: default_call_gateway_url(),
            sms_base_url: default_sms_gateway_url(),
            log_store_base_url: default_log_store_url(),
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            prefixes: HashMap::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            dispatcher: DispatcherConfig::default(),
            pacing: PacingConfig::default(),
            reconcile: ReconcileConfig::default(),
            gateways: GatewayConfig::default(),
            operators: OperatorConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置。path为None时只使用默认值和环境变量
    pub fn load(path: Option<&str>) -> CampaignerResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGNER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| CampaignerError::Configuration(e.to_string()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| CampaignerError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CampaignerResult<()> {
        if self.pacing.base_min_seconds >= self.pacing.base_max_seconds {
            return Err(CampaignerError::Configuration(
                "pacing.base_min_seconds 必须小于 base_max_seconds".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.pacing.long_pause_probability) {
            return Err(CampaignerError::Configuration(
                "pacing.long_pause_probability 必须在 [0, 1] 之间".to_string(),
            ));
        }
        if self.reconcile.batch_size == 0 {
            return Err(CampaignerError::Configuration(
                "reconcile.batch_size 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}
