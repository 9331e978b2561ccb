//! tabdown: 多标签下载会话管理
//!
//! 每个标签（会话）绑定一个后台下载任务，接收后台推送的进度快照并投影为可显示的视图。

pub mod cli;
pub mod config;
pub mod core;
pub mod downloader;
pub mod ui;
pub mod utils;
