use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use campaigner_core::errors::CampaignerResult;
use campaigner_core::traits::{SmsGateway, SmsOutcome, SmsRequest};

const SMS_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// 短信网关的HTTP客户端。传输失败折叠为发送失败。
pub struct HttpSmsGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSmsGateway {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send_sms(&self, request: &SmsRequest) -> CampaignerResult<SmsOutcome> {
        let url = format!("{}/sms", self.base_url);
        let payload = json!({
            "destination": request.destination,
            "line_id": request.line_id,
            "text": request.text,
            "request_id": request.request_id,
        });

        debug!("发送短信: {} ({})", request.destination, request.request_id);

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(SMS_REQUEST_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("短信网关传输失败 ({}): {}", request.request_id, e);
                return Ok(SmsOutcome {
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

        Ok(SmsOutcome {
            success,
            provider_response: Some(body),
        })
    }
}
