//! HTML/XHTML 文本处理工具。
//!
//! 把接口返回的章节正文转成合法的 XHTML 段落片段。

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

fn re_markup() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?i)</?(?:p|br|div|span)\b[^>]*>").expect("valid regex")
    })
}

/// 换行类标签：`<br>` 以及段落/块元素的起止。
fn re_line_break() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)<br\b[^>]*>|</?(?:p|div)\b[^>]*>").expect("valid regex"))
}

fn re_all_tags() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<[^>]+>").expect("valid regex"))
}

fn re_script_style() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>").expect("valid regex")
    })
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub(crate) fn unescape_basic_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace("&nbsp;", " ")
            .replace("&quot;", "\"")
            .replace("&#34;", "\"")
            .replace("&#39;", "'")
            .replace("&#x27;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

fn push_paragraph(out: &mut Vec<String>, raw: &str) {
    let text = unescape_basic_entities(raw);
    let text = text.trim();
    if !text.is_empty() {
        out.push(format!("<p>{}</p>", escape_html(text)));
    }
}

/// 章节正文 → XHTML 段落。
///
/// 纯文本按换行切成段落。含 `<p>`/`<br>`/`<div>`/`<span>` 标签的正文先把换行类标签
/// 换成换行，再去掉其余标签，段落内外的文字都会保留，最后重新转义。
pub(crate) fn render_chapter_body(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut out: Vec<String> = Vec::new();

    if re_markup().is_match(&normalized) {
        let cleaned = re_script_style().replace_all(&normalized, "");
        let with_breaks = re_line_break().replace_all(&cleaned, "\n");
        let plain = re_all_tags().replace_all(&with_breaks, "");
        for line in plain.split('\n') {
            push_paragraph(&mut out, line);
        }
    } else {
        for line in normalized.split('\n') {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                out.push(format!("<p>{}</p>", escape_html(trimmed)));
            }
        }
    }

    out.join("\n")
}
