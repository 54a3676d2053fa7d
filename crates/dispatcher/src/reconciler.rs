use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use campaigner_core::traits::LogQueryService;

/// 对账输入：一个号码及其派发时使用的请求标识
#[derive(Debug, Clone)]
pub struct ReconcileInput {
    pub number_id: i64,
    pub phone_number: String,
    pub request_id: Option<String>,
}

/// 命中的一条网关日志。时间戳和状态标记是尽力而为解析的，
/// 日志格式不保证，解析不出来就保持None。
#[derive(Debug, Clone)]
pub struct LogMatch {
    pub raw: String,
    pub timestamp: Option<String>,
    pub marker: Option<String>,
}

/// 单个号码的对账结论
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub number_id: i64,
    pub phone_number: String,
    pub request_id: Option<String>,
    pub delivered: bool,
    pub matches: Vec<LogMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// 对账报告。取消或查询失败时records仍然带着已完成批次的结论。
#[derive(Debug)]
pub struct ReconcileReport {
    pub records: Vec<DeliveryRecord>,
    pub batches_total: usize,
    pub batches_completed: usize,
    pub outcome: ReconcileOutcome,
}

impl ReconcileReport {
    pub fn delivered_count(&self) -> usize {
        self.records.iter().filter(|r| r.delivered).count()
    }

    pub fn not_delivered_count(&self) -> usize {
        self.records.len() - self.delivered_count()
    }
}

/// 投递对账器。把请求标识按批拼成交替式正则，每批只查一次日志存储，
/// 命中行按首个字面量匹配归属到对应号码。
pub struct DeliveryReconciler {
    log_query: Arc<dyn LogQueryService>,
    batch_size: usize,
}

impl DeliveryReconciler {
    pub fn new(log_query: Arc<dyn LogQueryService>, batch_size: usize) -> Self {
        Self {
            log_query,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn reconcile(
        &self,
        inputs: Vec<ReconcileInput>,
        cancel: &AtomicBool,
    ) -> ReconcileReport {
        let mut records: Vec<DeliveryRecord> = inputs
            .iter()
            .map(|input| DeliveryRecord {
                number_id: input.number_id,
                phone_number: input.phone_number.clone(),
                request_id: input.request_id.clone(),
                delivered: false,
                matches: Vec::new(),
            })
            .collect();

        // 没有请求标识的号码从未被派发过，直接算未投递
        let mut index_by_request_id: HashMap<String, usize> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            if let Some(request_id) = &record.request_id {
                index_by_request_id.insert(request_id.clone(), i);
            }
        }

        let request_ids: Vec<String> = index_by_request_id.keys().cloned().collect();
        let batches: Vec<&[String]> = request_ids.chunks(self.batch_size).collect();
        let batches_total = batches.len();
        let mut batches_completed = 0usize;
        let mut outcome = ReconcileOutcome::Completed;

        info!(
            "对账开始: {} 个号码，{} 个请求标识，分 {} 批",
            records.len(),
            request_ids.len(),
            batches_total
        );

        for batch in batches {
            // 取消只在批次边界生效，已完成批次的结论保留
            if cancel.load(Ordering::SeqCst) {
                warn!("对账在第 {batches_completed} 批后被取消");
                outcome = ReconcileOutcome::Cancelled;
                break;
            }

            let pattern = batch.join("|");
            let lines = match self.log_query.search(&pattern).await {
                Ok(lines) => lines,
                Err(e) => {
                    error!("日志检索失败，返回部分对账结果: {e}");
                    outcome = ReconcileOutcome::Failed(e.to_string());
                    break;
                }
            };

            for line in lines {
                let Some(request_id) = batch.iter().find(|id| line.contains(id.as_str())) else {
                    continue;
                };
                let record = &mut records[index_by_request_id[request_id]];
                record.delivered = true;
                record.matches.push(parse_log_line(&line));
            }

            batches_completed += 1;
            info!("对账进度: {batches_completed}/{batches_total} 批完成");
        }

        ReconcileReport {
            records,
            batches_total,
            batches_completed,
            outcome,
        }
    }
}

/// 尽力解析一条日志行：方括号前缀当时间戳，STATUS=后面的连续段当状态标记
fn parse_log_line(raw: &str) -> LogMatch {
    let timestamp = raw
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .map(|(ts, _)| ts.to_string());

    let marker = raw.split_once("STATUS=").map(|(_, rest)| {
        rest.split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string()
    });

    LogMatch {
        raw: raw.to_string(),
        timestamp,
        marker,
    }
}
