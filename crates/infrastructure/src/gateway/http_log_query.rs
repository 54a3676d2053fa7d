use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use campaigner_core::errors::{CampaignerError, CampaignerResult};
use campaigner_core::traits::LogQueryService;

const LOG_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// 网关日志存储的检索客户端。与呼叫/短信网关不同，
/// 这里的故障直接上抛：对账必须把"查不到日志"与"没投递"区分开。
pub struct HttpLogQueryService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLogQueryService {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LogQueryService for HttpLogQueryService {
    async fn search(&self, pattern: &str) -> CampaignerResult<Vec<String>> {
        let url = format!("{}/search", self.base_url);
        let payload = json!({ "pattern": pattern });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(LOG_QUERY_TIMEOUT)
            .send()
            .await
            .map_err(|e| CampaignerError::LogStore(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CampaignerError::LogStore(format!(
                "日志存储返回 {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CampaignerError::LogStore(e.to_string()))?;

        let lines: Vec<String> = body
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(String::from)
            .collect();

        debug!("日志检索命中 {} 行", lines.len());
        Ok(lines)
    }
}
