//! Mock implementations for all repository and gateway traits
//!
//! This module provides in-memory mock implementations that can be used
//! for unit testing without requiring actual database connections or
//! external services. The mocks mirror the SQLite repositories' semantics
//! (atomic claims, guarded line accounting, conditional transitions) but
//! are deterministic: ties are broken by id instead of randomly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use campaigner_core::errors::{CampaignerError, CampaignerResult};
use campaigner_core::models::{
    CallStatus, Campaign, CampaignNumber, CampaignStatus, CounterDeltas, Line, LineStatus,
    NumberStatusSummary, SmsStatus,
};
use campaigner_core::traits::{
    CallGateway, CallOutcome, CallRequest, CampaignNumberRepository, CampaignRepository,
    LineRepository, LogQueryService, RequestIdSequence, SmsGateway, SmsOutcome, SmsRequest,
};

/// Mock implementation of CampaignRepository for testing
#[derive(Clone, Default)]
pub struct MockCampaignRepository {
    campaigns: Arc<Mutex<HashMap<i64, Campaign>>>,
    next_id: Arc<Mutex<i64>>,
    fail_counter_updates: Arc<AtomicBool>,
}

impl MockCampaignRepository {
    pub fn new() -> Self {
        Self {
            campaigns: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            fail_counter_updates: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make increment_counters return a database error, simulating a
    /// store outage mid-campaign.
    pub fn fail_counter_updates(&self, fail: bool) {
        self.fail_counter_updates.store(fail, Ordering::SeqCst);
    }

    pub fn get_campaign(&self, id: i64) -> Option<Campaign> {
        self.campaigns.lock().unwrap().get(&id).cloned()
    }

    /// Synchronous status override, usable from gateway callbacks to
    /// simulate an operator pausing a campaign mid-flight.
    pub fn set_status_sync(&self, id: i64, status: CampaignStatus) {
        if let Some(campaign) = self.campaigns.lock().unwrap().get_mut(&id) {
            campaign.status = status;
        }
    }

    fn apply_timestamps(campaign: &mut Campaign, status: CampaignStatus, at: DateTime<Utc>) {
        campaign.status = status;
        match status {
            CampaignStatus::Running => {
                if campaign.started_at.is_none() {
                    campaign.started_at = Some(at);
                }
            }
            CampaignStatus::Completed => campaign.completed_at = Some(at),
            CampaignStatus::Cancelled => campaign.cancelled_at = Some(at),
            _ => {}
        }
    }
}

#[async_trait]
impl CampaignRepository for MockCampaignRepository {
    async fn create(&self, campaign: &Campaign) -> CampaignerResult<Campaign> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_campaign = campaign.clone();
        new_campaign.id = *next_id;
        *next_id += 1;

        campaigns.insert(new_campaign.id, new_campaign.clone());
        Ok(new_campaign)
    }

    async fn get_by_id(&self, id: i64) -> CampaignerResult<Option<Campaign>> {
        Ok(self.campaigns.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self, status: Option<CampaignStatus>) -> CampaignerResult<Vec<Campaign>> {
        let campaigns = self.campaigns.lock().unwrap();
        let mut result: Vec<Campaign> = campaigns
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        result.sort_by_key(|c| c.id);
        Ok(result)
    }

    async fn try_transition(
        &self,
        id: i64,
        from: CampaignStatus,
        to: CampaignStatus,
        at: DateTime<Utc>,
    ) -> CampaignerResult<bool> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let campaign = campaigns
            .get_mut(&id)
            .ok_or(CampaignerError::CampaignNotFound { id })?;
        if campaign.status != from {
            return Ok(false);
        }
        Self::apply_timestamps(campaign, to, at);
        Ok(true)
    }

    async fn increment_counters(&self, id: i64, deltas: &CounterDeltas) -> CampaignerResult<()> {
        if self.fail_counter_updates.load(Ordering::SeqCst) {
            return Err(CampaignerError::Internal(
                "simulated store failure".to_string(),
            ));
        }
        let mut campaigns = self.campaigns.lock().unwrap();
        let campaign = campaigns
            .get_mut(&id)
            .ok_or(CampaignerError::CampaignNotFound { id })?;
        campaign.processed_numbers += deltas.processed_numbers;
        campaign.successful_calls += deltas.successful_calls;
        campaign.failed_calls += deltas.failed_calls;
        campaign.sms_sent += deltas.sms_sent;
        campaign.sms_failed += deltas.sms_failed;
        Ok(())
    }

    async fn get_due_scheduled(&self, now: DateTime<Utc>) -> CampaignerResult<Vec<Campaign>> {
        let campaigns = self.campaigns.lock().unwrap();
        let mut due: Vec<Campaign> = campaigns
            .values()
            .filter(|c| {
                c.status == CampaignStatus::Scheduled
                    && c.scheduled_start_time.is_some_and(|t| t <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|c| c.scheduled_start_time);
        Ok(due)
    }
}

/// Mock implementation of CampaignNumberRepository for testing
#[derive(Clone, Default)]
pub struct MockCampaignNumberRepository {
    numbers: Arc<Mutex<HashMap<i64, CampaignNumber>>>,
    next_id: Arc<Mutex<i64>>,
    fail_call_results: Arc<AtomicBool>,
}

impl MockCampaignNumberRepository {
    pub fn new() -> Self {
        Self {
            numbers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            fail_call_results: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make record_call_result fail persistently.
    pub fn fail_call_results(&self, fail: bool) {
        self.fail_call_results.store(fail, Ordering::SeqCst);
    }

    pub fn insert_number(&self, number: CampaignNumber) -> CampaignNumber {
        let mut numbers = self.numbers.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();
        let mut new_number = number;
        if new_number.id == 0 {
            new_number.id = *next_id;
            *next_id += 1;
        } else if new_number.id >= *next_id {
            *next_id = new_number.id + 1;
        }
        numbers.insert(new_number.id, new_number.clone());
        new_number
    }

    pub fn get_number(&self, id: i64) -> Option<CampaignNumber> {
        self.numbers.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl CampaignNumberRepository for MockCampaignNumberRepository {
    async fn bulk_insert(&self, campaign_id: i64, phones: &[String]) -> CampaignerResult<usize> {
        let mut inserted = 0usize;
        for phone in phones {
            let duplicate = {
                let numbers = self.numbers.lock().unwrap();
                numbers
                    .values()
                    .any(|n| n.campaign_id == campaign_id && &n.phone_number == phone)
            };
            if !duplicate {
                self.insert_number(CampaignNumber::new(campaign_id, phone));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn claim_next_pending(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
    ) -> CampaignerResult<Option<CampaignNumber>> {
        let mut numbers = self.numbers.lock().unwrap();
        let next_id = numbers
            .values()
            .filter(|n| n.campaign_id == campaign_id && n.call_status == CallStatus::Pending)
            .map(|n| n.id)
            .min();

        match next_id {
            Some(id) => {
                let number = numbers.get_mut(&id).expect("id came from the map");
                number.call_status = CallStatus::Calling;
                number.call_attempts += 1;
                number.last_attempt_time = Some(now);
                Ok(Some(number.clone()))
            }
            None => Ok(None),
        }
    }

    async fn record_call_result(
        &self,
        number_id: i64,
        status: CallStatus,
        request_id: Option<&str>,
    ) -> CampaignerResult<()> {
        if self.fail_call_results.load(Ordering::SeqCst) {
            return Err(CampaignerError::Internal(
                "simulated store failure".to_string(),
            ));
        }
        let mut numbers = self.numbers.lock().unwrap();
        let number = numbers
            .get_mut(&number_id)
            .ok_or(CampaignerError::NumberNotFound { id: number_id })?;
        number.call_status = status;
        if let Some(request_id) = request_id {
            number.request_id = Some(request_id.to_string());
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
        let mut numbers = self.numbers.lock().unwrap();
        let number = numbers
            .get_mut(&number_id)
            .ok_or(CampaignerError::NumberNotFound { id: number_id })?;
        number.sms_status = status;
        number.sms_text_sent = Some(text.to_string());
        number.sms_sent_at = Some(at);
        Ok(())
    }

    async fn get_by_campaign(&self, campaign_id: i64) -> CampaignerResult<Vec<CampaignNumber>> {
        let numbers = self.numbers.lock().unwrap();
        let mut result: Vec<CampaignNumber> = numbers
            .values()
            .filter(|n| n.campaign_id == campaign_id)
            .cloned()
            .collect();
        result.sort_by_key(|n| n.id);
        Ok(result)
    }

    async fn status_summary(&self, campaign_id: i64) -> CampaignerResult<NumberStatusSummary> {
        let numbers = self.numbers.lock().unwrap();
        let mut summary = NumberStatusSummary::default();
        for number in numbers.values().filter(|n| n.campaign_id == campaign_id) {
            match number.call_status {
                CallStatus::Pending => summary.pending += 1,
                CallStatus::Calling => summary.calling += 1,
                CallStatus::Answered => summary.answered += 1,
                CallStatus::NoAnswer => summary.no_answer += 1,
                CallStatus::Failed => summary.failed += 1,
            }
            match number.sms_status {
                SmsStatus::Sent => summary.sms_sent += 1,
                SmsStatus::Failed => summary.sms_failed += 1,
                SmsStatus::None => {}
            }
        }
        Ok(summary)
    }
}

/// Mock implementation of LineRepository for testing
#[derive(Clone, Default)]
pub struct MockLineRepository {
    lines: Arc<Mutex<HashMap<i64, Line>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockLineRepository {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_lines(lines: Vec<Line>) -> Self {
        let repo = Self::new();
        for line in lines {
            repo.insert_line(line);
        }
        repo
    }

    pub fn insert_line(&self, line: Line) -> Line {
        let mut lines = self.lines.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();
        let mut new_line = line;
        if new_line.id == 0 {
            new_line.id = *next_id;
            *next_id += 1;
        } else if new_line.id >= *next_id {
            *next_id = new_line.id + 1;
        }
        lines.insert(new_line.id, new_line.clone());
        new_line
    }

    pub fn get_line(&self, id: i64) -> Option<Line> {
        self.lines.lock().unwrap().get(&id).cloned()
    }

    pub fn set_status_sync(&self, id: i64, status: LineStatus) {
        if let Some(line) = self.lines.lock().unwrap().get_mut(&id) {
            line.status = status;
        }
    }
}

#[async_trait]
impl LineRepository for MockLineRepository {
    async fn create(&self, line: &Line) -> CampaignerResult<Line> {
        Ok(self.insert_line(line.clone()))
    }

    async fn get_by_id(&self, id: i64) -> CampaignerResult<Option<Line>> {
        Ok(self.lines.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self) -> CampaignerResult<Vec<Line>> {
        let lines = self.lines.lock().unwrap();
        let mut result: Vec<Line> = lines.values().cloned().collect();
        result.sort_by_key(|l| l.id);
        Ok(result)
    }

    async fn least_loaded_active(
        &self,
        operator: Option<&str>,
    ) -> CampaignerResult<Option<Line>> {
        let lines = self.lines.lock().unwrap();
        Ok(lines
            .values()
            .filter(|l| l.is_active() && operator.is_none_or(|op| l.operator == op))
            .min_by_key(|l| (l.calls_today, l.calls_this_hour, l.id))
            .cloned())
    }

    async fn least_loaded_under_limits(
        &self,
        now: DateTime<Utc>,
    ) -> CampaignerResult<Option<Line>> {
        let lines = self.lines.lock().unwrap();
        Ok(lines
            .values()
            .filter(|l| l.is_active() && l.is_within_limits(now))
            .min_by_key(|l| (l.calls_today, l.calls_this_hour, l.id))
            .cloned())
    }

    async fn try_record_call(&self, line_id: i64, now: DateTime<Utc>) -> CampaignerResult<bool> {
        let mut lines = self.lines.lock().unwrap();
        let line = lines
            .get_mut(&line_id)
            .ok_or(CampaignerError::LineNotFound { id: line_id })?;
        if !line.is_active() || !line.is_within_limits(now) {
            return Ok(false);
        }
        line.calls_today += 1;
        line.calls_this_hour = if line.hour_bucket_expired(now) {
            1
        } else {
            line.calls_this_hour + 1
        };
        line.last_call_time = Some(now);
        Ok(true)
    }
}

type CallHook = Box<dyn Fn(&CallRequest) + Send + Sync>;

/// Mock implementation of CallGateway for testing
///
/// Calls succeed by default. Individual destinations can be scripted to
/// fail, and an optional hook runs before each call to let tests mutate
/// shared state (e.g. pause the campaign mid-flight).
#[derive(Default)]
pub struct MockCallGateway {
    requests: Mutex<Vec<CallRequest>>,
    failing_destinations: Mutex<Vec<String>>,
    on_call: Mutex<Option<CallHook>>,
}

impl MockCallGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, destination: &str) {
        self.failing_destinations
            .lock()
            .unwrap()
            .push(destination.to_string());
    }

    pub fn set_on_call<F>(&self, hook: F)
    where
        F: Fn(&CallRequest) + Send + Sync + 'static,
    {
        *self.on_call.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn requests(&self) -> Vec<CallRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CallGateway for MockCallGateway {
    async fn place_call(&self, request: &CallRequest) -> CampaignerResult<CallOutcome> {
        if let Some(hook) = self.on_call.lock().unwrap().as_ref() {
            hook(request);
        }
        self.requests.lock().unwrap().push(request.clone());
        let success = !self
            .failing_destinations
            .lock()
            .unwrap()
            .contains(&request.destination);
        Ok(CallOutcome {
            success,
            provider_response: Some(json!({ "mock": true })),
        })
    }
}

/// Mock implementation of SmsGateway for testing
#[derive(Default)]
pub struct MockSmsGateway {
    requests: Mutex<Vec<SmsRequest>>,
    failing_destinations: Mutex<Vec<String>>,
}

impl MockSmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, destination: &str) {
        self.failing_destinations
            .lock()
            .unwrap()
            .push(destination.to_string());
    }

    pub fn requests(&self) -> Vec<SmsRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SmsGateway for MockSmsGateway {
    async fn send_sms(&self, request: &SmsRequest) -> CampaignerResult<SmsOutcome> {
        self.requests.lock().unwrap().push(request.clone());
        let success = !self
            .failing_destinations
            .lock()
            .unwrap()
            .contains(&request.destination);
        Ok(SmsOutcome {
            success,
            provider_response: Some(json!({ "mock": true })),
        })
    }
}

/// Mock implementation of LogQueryService for testing
///
/// Returns a fixed set of log lines for every query, records the queries
/// it received, and can be scripted to fail on the N-th query or to set a
/// cancellation flag after the N-th query completes.
#[derive(Default)]
pub struct MockLogQueryService {
    lines: Mutex<Vec<String>>,
    queries: Mutex<Vec<String>>,
    fail_on_query: Mutex<Option<usize>>,
    cancel_after: Mutex<Option<(Arc<AtomicBool>, usize)>>,
}

impl MockLogQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(lines: Vec<String>) -> Self {
        Self {
            lines: Mutex::new(lines),
            ..Self::default()
        }
    }

    /// Fail the n-th query (1-based) with a log store error.
    pub fn fail_on_query(&self, n: usize) {
        *self.fail_on_query.lock().unwrap() = Some(n);
    }

    /// Set `flag` to true once `n` queries have completed.
    pub fn cancel_after(&self, flag: Arc<AtomicBool>, n: usize) {
        *self.cancel_after.lock().unwrap() = Some((flag, n));
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl LogQueryService for MockLogQueryService {
    async fn search(&self, pattern: &str) -> CampaignerResult<Vec<String>> {
        let count = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(pattern.to_string());
            queries.len()
        };

        if let Some(n) = *self.fail_on_query.lock().unwrap() {
            if count == n {
                return Err(CampaignerError::LogStore(
                    "simulated log store failure".to_string(),
                ));
            }
        }

        if let Some((flag, n)) = self.cancel_after.lock().unwrap().as_ref() {
            if count == *n {
                flag.store(true, Ordering::SeqCst);
            }
        }

        Ok(self.lines.lock().unwrap().clone())
    }
}

/// Mock implementation of RequestIdSequence for testing
pub struct MockRequestIdSequence {
    counter: AtomicI64,
}

impl MockRequestIdSequence {
    pub fn new() -> Self {
        Self {
            counter: AtomicI64::new(1_000_000),
        }
    }
}

impl Default for MockRequestIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestIdSequence for MockRequestIdSequence {
    async fn next_id(&self) -> CampaignerResult<String> {
        let value = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("REQ{value}"))
    }
}
