use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use campaigner_core::config::OperatorConfig;
use campaigner_core::errors::{CampaignerError, CampaignerResult};
use campaigner_core::models::Line;
use campaigner_core::traits::LineRepository;

/// 回退档重选次数上限，吸收选取与记账之间的并发竞争
const FALLBACK_ATTEMPTS: usize = 3;

/// 被叫号码前缀到运营商的映射表
pub struct OperatorPrefixTable {
    country_code: String,
    prefixes: HashMap<String, String>,
}

impl OperatorPrefixTable {
    pub fn new(country_code: &str, prefixes: HashMap<String, String>) -> Self {
        Self {
            country_code: country_code.to_string(),
            prefixes,
        }
    }

    pub fn from_config(config: &OperatorConfig) -> Self {
        Self::new(&config.country_code, config.prefixes.clone())
    }

    /// 去掉非数字与国家码后取前三位查表
    pub fn resolve(&self, phone: &str) -> Option<&str> {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        let national = digits
            .strip_prefix(self.country_code.as_str())
            .unwrap_or(&digits);
        if national.len() < 3 {
            return None;
        }
        self.prefixes.get(&national[..3]).map(String::as_str)
    }
}

/// 同运营商优先的线路分配器。
/// 同网呼叫资费更低且接通率更高，优先选被叫运营商名下负载最轻的线路；
/// 该档限额不够时回退到全体限额内线路。
pub struct LineAllocator {
    line_repo: Arc<dyn LineRepository>,
    prefixes: OperatorPrefixTable,
}

impl LineAllocator {
    pub fn new(line_repo: Arc<dyn LineRepository>, prefixes: OperatorPrefixTable) -> Self {
        Self { line_repo, prefixes }
    }

    /// 为一次呼叫分配线路并原子记账。成功即该线路的计数已+1。
    pub async fn allocate(&self, destination: &str) -> CampaignerResult<Line> {
        let now = Utc::now();

        // 第一档：被叫运营商名下负载最轻的线路，需通过限额复核
        if let Some(operator) = self.prefixes.resolve(destination) {
            if let Some(line) = self.line_repo.least_loaded_active(Some(operator)).await? {
                if line.is_within_limits(now)
                    && self.line_repo.try_record_call(line.id, now).await?
                {
                    debug!(
                        "为 {} 分配同运营商线路 {} ({})",
                        destination, line.id, operator
                    );
                    return Ok(line);
                }
                debug!(
                    "运营商 {} 的首选线路 {} 超限，回退到全体线路",
                    operator, line.id
                );
            }
        }

        // 第二档：全体限额内线路。记账失败说明有并发竞争，换一条重试
        for _ in 0..FALLBACK_ATTEMPTS {
            let Some(line) = self.line_repo.least_loaded_under_limits(now).await? else {
                break;
            };
            if self.line_repo.try_record_call(line.id, now).await? {
                debug!("为 {} 分配回退线路 {}", destination, line.id);
                return Ok(line);
            }
        }

        warn!("没有可为 {} 记账的线路，所有线路均已达限额", destination);
        Err(CampaignerError::LinesExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> OperatorPrefixTable {
        let mut prefixes = HashMap::new();
        prefixes.insert("916".to_string(), "mts".to_string());
        prefixes.insert("903".to_string(), "beeline".to_string());
        OperatorPrefixTable::new("7", prefixes)
    }

    #[test]
    fn resolves_plus_prefixed_numbers() {
        let table = table();
        assert_eq!(table.resolve("+79161234567"), Some("mts"));
        assert_eq!(table.resolve("+79031234567"), Some("beeline"));
        assert_eq!(table.resolve("+79991234567"), None);
    }

    #[test]
    fn resolves_formatted_numbers() {
        let table = table();
        assert_eq!(table.resolve("+7 (916) 123-45-67"), Some("mts"));
    }

    #[test]
    fn short_input_resolves_to_none() {
        let table = table();
        assert_eq!(table.resolve("+7"), None);
        assert_eq!(table.resolve(""), None);
    }
}
