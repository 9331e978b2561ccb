use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use anyhow::{bail, Context, Result};
use log::LevelFilter;

/// 配置结构体
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 默认输出目录，留空表示每次启动下载时询问
    pub download_dir: String,
    /// 网络请求超时时间（秒）
    pub request_timeout: u64,
    /// 后台推送进度的最小间隔（毫秒）
    pub snapshot_interval_ms: u64,
    /// 名称解析失败时，用地址前多少个字符作为标签
    pub label_len: usize,
    /// 日志级别：off / error / warn / info / debug / trace
    pub log_level: String,
    /// 日志文件，留空表示输出到标准错误
    pub log_file: String,
    /// 单个日志文件的最大字节数，超出后轮转
    pub log_max_bytes: usize,
    /// 保留的历史日志文件个数
    pub log_max_files: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: String::new(),
            request_timeout: 30,
            snapshot_interval_ms: 1000,
            label_len: 12,
            log_level: "info".to_string(),
            log_file: String::new(),
            log_max_bytes: 10 * 1024 * 1024,
            log_max_files: 3,
        }
    }
}

impl Config {
    /// 加载配置文件；文件不存在或格式错误时写入默认配置
    pub fn load(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("无法读取配置文件: {}", path))?;
            match toml::from_str(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    eprintln!("配置文件格式错误: {}，将使用默认配置", e);
                    let config = Config::default();
                    config.save_with_tutorial(path)?;
                    Ok(config)
                }
            }
        } else {
            let config = Config::default();
            config.save_with_tutorial(path)?;
            Ok(config)
        }
    }

    /// 保存带说明的配置文件
    pub fn save_with_tutorial(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录: {}", parent.display()))?;
        }
        let config_content = toml::to_string_pretty(self).context("无法序列化配置")?;
        let full_content = format!("{}\n{}", Self::tutorial_content(), config_content);
        fs::write(path, full_content).with_context(|| format!("无法写入配置文件: {}", path))?;
        Ok(())
    }

    fn tutorial_content() -> &'static str {
        r#"# tabdown 配置文件
# ====================
#
# TOML 格式。命令行参数会覆盖这里的设置，优先级：命令行 > 配置文件 > 默认值
#
# download_dir         默认输出目录，留空则每个标签启动时询问
# request_timeout      网络请求超时时间（秒）
# snapshot_interval_ms 进度推送的最小间隔（毫秒），界面按推送整体重绘
# label_len            名称解析失败时标签显示的地址字符数
# log_level            off / error / warn / info / debug / trace，可被 RUST_LOG 覆盖
# log_file             日志文件路径，留空输出到标准错误
# log_max_bytes        单个日志文件的最大字节数，超出后轮转为 <log_file>.1、.2 ...
# log_max_files        保留的历史日志文件个数
#
# 使用示例：
#   tabdown "magnet:?xt=urn:btih:..."                      # 新建一个标签并开始下载
#   tabdown -d ~/Downloads https://example.com/file.iso    # 指定输出目录
#   tabdown --pick                                         # 选择一个 .torrent 文件
"#
    }

    /// 校验配置合法性
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout == 0 {
            bail!("超时时间必须大于0");
        }
        if self.snapshot_interval_ms == 0 {
            bail!("推送间隔必须大于0");
        }
        if self.label_len == 0 {
            bail!("标签长度必须大于0");
        }
        if self.log_max_bytes == 0 || self.log_max_files == 0 {
            bail!("日志文件大小和个数必须大于0");
        }
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| anyhow::anyhow!("未知的日志级别: {}", self.log_level))
    }

    /// 预设的输出目录，未设置时返回 `None`
    pub fn output_dir(&self) -> Option<std::path::PathBuf> {
        let dir = self.download_dir.trim();
        (!dir.is_empty()).then(|| std::path::PathBuf::from(dir))
    }

    /// 合并命令行参数到配置
    pub fn merge_from_args(&mut self, args: &crate::cli::Args) {
        if let Some(dir) = &args.download_dir {
            self.download_dir = dir.clone();
        }
        if args.verbose {
            self.log_level = "debug".to_string();
        }
    }

    /// 获取配置摘要信息
    pub fn get_summary(&self) -> String {
        format!(
            "配置摘要:\n\
            - 输出目录: {}\n\
            - 请求超时: {} 秒\n\
            - 推送间隔: {} 毫秒\n\
            - 标签长度: {}\n\
            - 日志: {} ({}, 最多 {} 个历史文件)",
            if self.download_dir.is_empty() { "每次询问" } else { self.download_dir.as_str() },
            self.request_timeout,
            self.snapshot_interval_ms,
            self.label_len,
            self.log_level,
            if self.log_file.is_empty() { "stderr" } else { self.log_file.as_str() },
            self.log_max_files,
        )
    }
}
