//! CLI: 命令行参数解析与终端对话框
//!
//! ## 支持的命令
//!
//! - 新建标签并下载：`tabdown <uri>...`（每个地址一个标签）
//! - 选择种子文件：`tabdown --pick`
//! - 指定配置：`tabdown -c config.toml <uri>`
//! - 指定输出目录：`tabdown -d ~/Downloads <uri>`
//!
//! ## 配置文件默认位置
//!
//! - Windows: `%APPDATA%/tabdown/tabdown.toml`
//! - macOS: `~/Library/Application Support/tabdown/tabdown.toml`
//! - Linux: `~/.config/tabdown/tabdown.toml`

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use std::cell::Cell;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::core::backend::{Dialogs, FileFilter};
use crate::ui::print_error;

/// 获取平台默认配置文件路径
pub fn default_config_path() -> String {
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        format!("{}/tabdown/tabdown.toml", appdata)
    }
    #[cfg(target_os = "macos")]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/Library/Application Support/tabdown/tabdown.toml", home)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.config/tabdown/tabdown.toml", home)
    }
}

/// tabdown 命令行参数
///
/// 示例用法：
///   tabdown "magnet:?xt=urn:btih:..."
///   tabdown -d ~/Downloads https://example.com/file.iso https://example.com/other.iso
///   tabdown --pick
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tabdown",
    author = "panzhifu",
    version = env!("CARGO_PKG_VERSION"),
    about = "多标签下载会话管理器",
    long_about = "每个下载地址占用一个标签，独立显示进度与节点信息。\n\n运行时按键：c 取消当前标签，n/p 切换标签，q 关闭所有标签并退出。\n"
)]
pub struct Args {
    /// 下载地址（磁力链接、种子文件或 http 地址），每个地址一个标签
    #[arg(required = false, help = "下载地址列表，每个地址打开一个标签。")]
    pub uris: Vec<String>,

    /// 配置文件路径，默认为平台推荐路径
    #[arg(short = 'c', long, default_value_t = default_config_path(), help = "配置文件路径，默认为平台推荐路径。")]
    pub config: String,

    /// 输出目录，覆盖配置文件中的设置
    #[arg(short = 'd', long, help = "输出目录，覆盖配置文件；未设置时每个标签启动前询问。")]
    pub download_dir: Option<String>,

    /// 为第一个标签选择种子文件
    #[arg(long, help = "为第一个标签选择一个 .torrent 种子文件。")]
    pub pick: bool,

    /// 输出调试日志
    #[arg(short = 'v', long, help = "输出调试日志。")]
    pub verbose: bool,
}

impl Args {
    pub fn parse_args() -> Result<(Self, Config)> {
        let args = Args::parse();
        let config = args.load_config()?;
        Ok((args, config))
    }

    /// 加载配置并合并命令行参数
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config)?;
        config.merge_from_args(self);
        config.validate().context("配置无效")?;
        Ok(config)
    }
}

/// 终端版本的目录/文件选择：有预设值直接返回，否则从标准输入读取
pub struct CliDialogs {
    directory: Option<PathBuf>,
    prompting: Cell<usize>,
    stdin: tokio::sync::Mutex<()>,
}

impl CliDialogs {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self {
            directory,
            prompting: Cell::new(0),
            stdin: tokio::sync::Mutex::new(()),
        }
    }

    /// 有对话框正在等待输入时，主循环不能进入 raw 模式
    pub fn is_prompting(&self) -> bool {
        self.prompting.get() > 0
    }

    async fn prompt(&self, question: String) -> Option<String> {
        self.prompting.set(self.prompting.get() + 1);
        // 多个标签同时询问时逐个进行
        let guard = self.stdin.lock().await;
        let answer = tokio::task::spawn_blocking(move || {
            print!("{}", question);
            let _ = io::stdout().flush();
            let mut line = String::new();
            io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;
        drop(guard);
        self.prompting.set(self.prompting.get() - 1);

        let line = answer.ok()?.ok()?;
        let line = line.trim();
        (!line.is_empty()).then(|| line.to_string())
    }
}

#[async_trait(?Send)]
impl Dialogs for CliDialogs {
    async fn pick_directory(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.directory {
            return Some(dir.clone());
        }
        let dir = PathBuf::from(self.prompt("输出目录（留空取消）: ".to_string()).await?);
        if !dir.is_dir() {
            print_error(&format!("目录不存在: {}", dir.display()));
            return None;
        }
        Some(dir)
    }

    async fn pick_file(&self, filters: &[FileFilter]) -> Option<PathBuf> {
        let names: Vec<&str> = filters.iter().map(|f| f.name.as_str()).collect();
        let question = format!("选择种子文件 [{}]（留空取消）: ", names.join(", "));
        let path = PathBuf::from(self.prompt(question).await?);
        if !path.is_file() || !filters.iter().any(|f| f.matches(&path)) {
            print_error(&format!("不是有效的种子文件: {}", path.display()));
            return None;
        }
        Some(path)
    }
}
