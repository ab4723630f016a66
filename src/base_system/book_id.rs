//! 书籍 ID 规范化：接受纯数字 ID 或番茄分享链接。

use std::sync::OnceLock;

use regex::Regex;

fn re_link_id() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)(?:book_?id=|/page/)(\d+)").expect("compile book id regex"))
}

/// 从用户输入中提取 book_id。
///
/// - `7143038691944959011` → 原样返回
/// - `https://fanqienovel.com/page/7143038691944959011?x=1` → 提取路径中的 ID
/// - `...?book_id=7143038691944959011` / `bookId=` → 提取查询参数
pub fn normalize_book_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }
    re_link_id()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
