use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use campaigner_core::errors::CampaignerResult;
use campaigner_core::traits::{CallGateway, CallOutcome, CallRequest};

/// 呼叫网关的HTTP客户端。网关侧的任何失败（连接拒绝、超时、非2xx、
/// success=false响应体）统一折叠为"未接通"，派发循环不因单次呼叫故障中断。
pub struct HttpCallGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCallGateway {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CallGateway for HttpCallGateway {
    async fn place_call(&self, request: &CallRequest) -> CampaignerResult<CallOutcome> {
        let url = format!("{}/calls", self.base_url);
        let payload = json!({
            "destination": request.destination,
            "line_id": request.line_id,
            "voice_text": request.voice_text,
            "request_id": request.request_id,
            "timeout_seconds": request.timeout_seconds,
        });

        debug!(
            "发起呼叫: {} 经线路 {} ({})",
            request.destination, request.line_id, request.request_id
        );

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(Duration::from_secs(request.timeout_seconds + 10))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("呼叫网关传输失败 ({}): {}", request.request_id, e);
                return Ok(CallOutcome {
                    success: false,
                    provider_response: Some(json!({ "transport_error": e.to_string() })),
                });
            }
        };

        let http_ok = response.status().is_success();
        let body: serde_json::Value = response.json().await.unwrap_or(json!(null));
        let success = http_ok
            && body
                .get("success")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

        Ok(CallOutcome {
            success,
            provider_response: Some(body),
        })
    }
}
