use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Env, Target};
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use std::io::Write;
use std::path::Path;

use crate::config::Config;

/// 初始化全局日志：级别取自配置，`RUST_LOG` 优先；可选写入按大小轮转的日志文件
pub fn init(config: &Config) -> Result<()> {
    let mut builder = Builder::new();
    builder
        .filter_level(config.level_filter()?)
        .parse_env(Env::default())
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        });

    if !config.log_file.is_empty() {
        builder.target(Target::Pipe(Box::new(rotating_file(config)?)));
    }

    builder.try_init().context("日志已初始化")?;
    Ok(())
}

/// 日志文件超过 `log_max_bytes` 时轮转为 `<log_file>.1`，最多保留 `log_max_files` 个
pub fn rotating_file(config: &Config) -> Result<FileRotate<AppendCount>> {
    let path = Path::new(&config.log_file);
    // 确保日志目录存在
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("无法创建日志目录: {}", parent.display()))?;
    }

    let suffix = AppendCount::new(config.log_max_files);
    let limit = ContentLimit::Bytes(config.log_max_bytes);
    #[cfg(unix)]
    let file = FileRotate::new(path, suffix, limit, Compression::None, None);
    #[cfg(not(unix))]
    let file = FileRotate::new(path, suffix, limit, Compression::None);
    Ok(file)
}

/// 版本与构建信息，启动时写入日志
pub fn build_info() -> String {
    format!(
        "tabdown {} (构建时间 {}, git {})",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_BUILD_TIMESTAMP"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    )
}
