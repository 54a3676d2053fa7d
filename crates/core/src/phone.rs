/// 号码归一化。导入的号码来自不同来源，写法五花八门，
/// 统一成E.164（+7开头）后才入库。
///
/// 规则：
/// - 11位且以8开头：8XXXXXXXXXX -> +7XXXXXXXXXX
/// - 11位且以7开头：7XXXXXXXXXX -> +7XXXXXXXXXX
/// - 10位：XXXXXXXXXX -> +7XXXXXXXXXX
/// - 已带+且不少于10位数字：原样保留（只留数字）
/// - 其余一律拒绝
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if has_plus {
        if digits.len() >= 10 {
            return Some(format!("+{digits}"));
        }
        return None;
    }

    match digits.len() {
        11 if digits.starts_with('8') => Some(format!("+7{}", &digits[1..])),
        11 if digits.starts_with('7') => Some(format!("+{digits}")),
        10 => Some(format!("+7{digits}")),
        _ => None,
    }
}
