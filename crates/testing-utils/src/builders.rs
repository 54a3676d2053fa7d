//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::{DateTime, Utc};

use campaigner_core::models::{
    CallStatus, Campaign, CampaignNumber, CampaignStatus, CampaignType, Line, LineStatus,
};

/// Builder for creating test Campaign entities
pub struct CampaignBuilder {
    campaign: Campaign,
}

impl CampaignBuilder {
    pub fn new() -> Self {
        let mut campaign = Campaign::new("test_campaign", CampaignType::Call);
        campaign.id = 1;
        campaign.voice_text = Some("test voice text".to_string());
        Self { campaign }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.campaign.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.campaign.name = name.to_string();
        self
    }

    pub fn with_type(mut self, campaign_type: CampaignType) -> Self {
        self.campaign.campaign_type = campaign_type;
        self
    }

    pub fn with_status(mut self, status: CampaignStatus) -> Self {
        self.campaign.status = status;
        self
    }

    pub fn with_voice_text(mut self, text: &str) -> Self {
        self.campaign.voice_text = Some(text.to_string());
        self
    }

    pub fn with_sms_on_no_answer(mut self, text: &str) -> Self {
        self.campaign.sms_on_no_answer = Some(text.to_string());
        self.campaign.send_sms_on_no_answer = true;
        self
    }

    pub fn with_sms_on_success(mut self, text: &str) -> Self {
        self.campaign.sms_on_success = Some(text.to_string());
        self.campaign.send_sms_on_success = true;
        self
    }

    pub fn with_sms_template(mut self, text: &str) -> Self {
        self.campaign.sms_template = Some(text.to_string());
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.campaign.status = CampaignStatus::Scheduled;
        self.campaign.scheduled_start_time = Some(at);
        self
    }

    pub fn running(mut self) -> Self {
        self.campaign.status = CampaignStatus::Running;
        self.campaign.started_at = Some(Utc::now());
        self
    }

    pub fn build(self) -> Campaign {
        self.campaign
    }
}

impl Default for CampaignBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test CampaignNumber entities
pub struct CampaignNumberBuilder {
    number: CampaignNumber,
}

impl CampaignNumberBuilder {
    pub fn new() -> Self {
        Self {
            number: CampaignNumber::new(1, "+79161234567"),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.number.id = id;
        self
    }

    pub fn with_campaign_id(mut self, campaign_id: i64) -> Self {
        self.number.campaign_id = campaign_id;
        self
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.number.phone_number = phone.to_string();
        self
    }

    pub fn with_call_status(mut self, status: CallStatus) -> Self {
        self.number.call_status = status;
        self
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.number.request_id = Some(request_id.to_string());
        self
    }

    pub fn build(self) -> CampaignNumber {
        self.number
    }
}

impl Default for CampaignNumberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Line entities
pub struct LineBuilder {
    line: Line,
}

impl LineBuilder {
    pub fn new() -> Self {
        Self {
            line: Line::new("mts", "+79160000001"),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.line.id = id;
        self
    }

    pub fn with_operator(mut self, operator: &str) -> Self {
        self.line.operator = operator.to_string();
        self
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.line.phone_number = phone.to_string();
        self
    }

    pub fn with_limits(mut self, daily: i32, hourly: i32) -> Self {
        self.line.daily_call_limit = daily;
        self.line.hourly_call_limit = hourly;
        self
    }

    pub fn with_counters(mut self, today: i32, this_hour: i32) -> Self {
        self.line.calls_today = today;
        self.line.calls_this_hour = this_hour;
        self
    }

    pub fn with_last_call_time(mut self, at: DateTime<Utc>) -> Self {
        self.line.last_call_time = Some(at);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.line.status = LineStatus::Disabled;
        self
    }

    pub fn build(self) -> Line {
        self.line
    }
}

impl Default for LineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
