//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息，以及输出文件名的清理规则。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

/// 并发上限；超过 16 时只给出警告，超过该值直接截断。
pub const MAX_WORKERS: usize = 64;
pub const RECOMMENDED_MAX_WORKERS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 网络配置
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_cover_timeout")]
    pub cover_timeout: u64,
    #[serde(default = "default_metadata_probe_limit")]
    pub metadata_probe_limit: usize,

    // API 配置
    #[serde(default = "default_listing_url")]
    pub listing_url: String,
    #[serde(default = "default_content_url")]
    pub content_url: String,

    // 保存配置
    #[serde(default = "default_save_path")]
    pub save_path: String,
    #[serde(default = "default_language")]
    pub language: String,

    // Web UI
    #[serde(default = "default_web_addr")]
    pub web_addr: String,
    #[serde(default = "default_true")]
    pub open_browser: bool,

    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            request_timeout: default_request_timeout(),
            cover_timeout: default_cover_timeout(),
            metadata_probe_limit: default_metadata_probe_limit(),
            listing_url: default_listing_url(),
            content_url: default_content_url(),
            save_path: default_save_path(),
            language: default_language(),
            web_addr: default_web_addr(),
            open_browser: default_true(),
            base_dir: None,
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 10] = [
            FieldMeta {
                name: "max_workers",
                description: "章节下载并发数（建议不要超过 16）",
            },
            FieldMeta {
                name: "request_timeout",
                description: "目录与正文请求超时时间（秒），每章只请求一次",
            },
            FieldMeta {
                name: "cover_timeout",
                description: "封面下载超时时间（秒）",
            },
            FieldMeta {
                name: "metadata_probe_limit",
                description: "获取作者/书名/封面时最多尝试的章节数",
            },
            FieldMeta {
                name: "listing_url",
                description: "章节目录接口地址（参数 book_id）",
            },
            FieldMeta {
                name: "content_url",
                description: "章节正文接口地址（参数 item_id）",
            },
            FieldMeta {
                name: "save_path",
                description: "EPUB 保存目录（相对路径基于数据目录）",
            },
            FieldMeta {
                name: "language",
                description: "EPUB 语言标记",
            },
            FieldMeta {
                name: "web_addr",
                description: "Web UI 监听地址（环境变量 TOMATO_WEB_ADDR 优先）",
            },
            FieldMeta {
                name: "open_browser",
                description: "启动 Web UI 后自动打开浏览器",
            },
        ];
        &FIELDS
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be at least 1".to_string());
        }
        if self.listing_url.trim().is_empty() || self.content_url.trim().is_empty() {
            return Err("listing_url and content_url must not be empty".to_string());
        }
        if self.language.trim().is_empty() {
            return Err("language must not be empty".to_string());
        }
        Ok(())
    }
}

impl Config {
    /// 记录数据目录，用于解析相对的 `save_path`。
    pub fn with_base_dir(mut self, base: Option<&Path>) -> Self {
        self.base_dir = base.map(Path::to_path_buf);
        self
    }

    pub fn default_save_dir(&self) -> PathBuf {
        let raw = self.save_path.trim();
        let save = if raw.is_empty() {
            PathBuf::from(default_save_path())
        } else {
            PathBuf::from(raw)
        };
        if save.is_absolute() {
            return save;
        }
        match &self.base_dir {
            Some(base) => base.join(save),
            None => save,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn cover_timeout(&self) -> Duration {
        Duration::from_secs(self.cover_timeout.max(1))
    }
}

/// 去除文件名中的非法字符（`\ / * ? : " < > |`）以及首尾空白。
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|ch| !matches!(ch, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// 输出文件主名：清理后的书名，清理后为空时回退为 `book_<id>`。
pub fn output_stem(title: &str, book_id: &str) -> String {
    let cleaned = sanitize_filename(title);
    if cleaned.is_empty() {
        format!("book_{}", sanitize_filename(book_id))
    } else {
        cleaned
    }
}

fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    8
}

fn default_request_timeout() -> u64 {
    10
}

fn default_cover_timeout() -> u64 {
    10
}

fn default_metadata_probe_limit() -> usize {
    3
}

fn default_listing_url() -> String {
    "https://api.cenguigui.cn/api/tomato/api/all_items.php".to_string()
}

fn default_content_url() -> String {
    "https://api.cenguigui.cn/api/tomato/content.php".to_string()
}

fn default_save_path() -> String {
    "download".to_string()
}

fn default_language() -> String {
    "zh".to_string()
}

fn default_web_addr() -> String {
    "127.0.0.1:5000".to_string()
}
