//! 导出模块入口：章节正文转 XHTML，并打包为 EPUB。

pub mod epub_generator;
pub(crate) mod html_utils;
