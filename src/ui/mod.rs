//! 交互层入口。
//!
//! 包含无 UI（命令行）与 Web 两套驱动。

pub mod noui;
pub mod web;
