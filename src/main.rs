use actix::prelude::*;
use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, terminal,
};
use log::{debug, error, info};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use tabdown::cli::{Args, CliDialogs};
use tabdown::config::Config;
use tabdown::core::{
    ActiveSession, Backend, CancelSession, CloseSession, CreateSession, IdAllocator, ListSessions,
    PickSessionSource, SetActive, StartSession, TabInfo, TabRegistryActor,
};
use tabdown::downloader::HttpBackend;
use tabdown::ui::{print_error, render_text, TerminalAdapter};
use tabdown::utils::logger;

const LOOP_INTERVAL: Duration = Duration::from_millis(50);
const SETTLE_DELAY: Duration = Duration::from_millis(200);

#[actix::main]
async fn main() {
    // 解析参数和配置
    let (args, config) = match Args::parse_args() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("参数解析失败: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logger::init(&config) {
        eprintln!("日志初始化失败: {:#}", e);
        std::process::exit(1);
    }
    info!("{} 启动", logger::build_info());
    debug!("配置文件路径: {}", args.config);
    debug!("{}", config.get_summary());

    if let Err(e) = run(args, config).await {
        error!("运行失败: {:#}", e);
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(args: Args, config: Config) -> Result<()> {
    let backend: Rc<dyn Backend> = Rc::new(HttpBackend::new(&config));
    let dialogs = Rc::new(CliDialogs::new(config.output_dir()));
    let adapter = TerminalAdapter::new();
    let registry = TabRegistryActor::new(
        IdAllocator::new(),
        backend,
        dialogs.clone(),
        Box::new(adapter.clone()),
        config.label_len,
    )
    .start();

    // 启动时总有一个标签
    let first = registry.send(CreateSession { auto_activate: true }).await?;

    let mut uris: VecDeque<String> = args.uris.into_iter().collect();
    if args.pick {
        match registry.send(PickSessionSource { id: first.id }).await?? {
            Some(path) => uris.push_front(path),
            None => info!("未选择种子文件"),
        }
    }
    if uris.is_empty() {
        println!("没有下载地址，使用 --help 查看用法");
        return Ok(());
    }

    let mut target = Some(first.id);
    for uri in uris {
        let id = match target.take() {
            Some(id) => id,
            None => registry.send(CreateSession { auto_activate: false }).await?.id,
        };
        if let Err(e) = registry.send(StartSession { id, uri: uri.clone() }).await? {
            print_error(&format!("{}: {}", uri, e));
        }
    }

    adapter.println("按键: c 取消当前标签, n/p 切换标签, q 关闭所有标签并退出");
    let tabs = run_loop(&registry, &dialogs).await;

    // 恢复终端
    let _ = terminal::disable_raw_mode();
    let _ = execute!(std::io::stdout(), cursor::Show);

    let tabs = tabs?;
    println!();
    for tab in &tabs {
        println!("{}", render_text(&tab.info.view));
    }
    info!("全部标签已结束，共 {} 个", tabs.len());
    Ok(())
}

/// 主循环：处理按键，直到所有标签都稳定下来，返回退出时的标签快照
async fn run_loop(registry: &Addr<TabRegistryActor>, dialogs: &CliDialogs) -> Result<Vec<TabInfo>> {
    let mut raw = false;
    loop {
        // 对话框等待输入时必须让出终端
        let prompting = dialogs.is_prompting();
        if prompting && raw {
            terminal::disable_raw_mode()?;
            raw = false;
        } else if !prompting && !raw {
            terminal::enable_raw_mode()?;
            raw = true;
        }

        if raw && event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let quit = key.code == KeyCode::Esc
                    || matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q'))
                    || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL));
                if quit {
                    info!("用户退出，关闭所有标签");
                    return close_all(registry).await;
                }
                match key.code {
                    KeyCode::Char('c') | KeyCode::Char('C') => cancel_active(registry).await?,
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Right => cycle(registry, 1).await?,
                    KeyCode::Char('p') | KeyCode::Char('P') | KeyCode::Left => cycle(registry, -1).await?,
                    _ => {}
                }
            }
        }

        let tabs = registry.send(ListSessions).await?;
        let settled = tabs
            .iter()
            .all(|tab| !tab.info.pending && !tab.info.session.state.is_active());
        if settled && !dialogs.is_prompting() {
            return Ok(tabs);
        }

        tokio::time::sleep(LOOP_INTERVAL).await;
    }
}

async fn cancel_active(registry: &Addr<TabRegistryActor>) -> Result<()> {
    if let Some(id) = registry.send(ActiveSession).await? {
        match registry.send(CancelSession { id }).await? {
            Ok(true) => info!("会话 {} 已取消", id),
            Ok(false) => debug!("会话 {} 没有可取消的下载", id),
            Err(e) => print_error(&e.to_string()),
        }
    }
    Ok(())
}

/// 按创建顺序切换可见标签，首尾相接
async fn cycle(registry: &Addr<TabRegistryActor>, step: isize) -> Result<()> {
    let tabs = registry.send(ListSessions).await?;
    if tabs.is_empty() {
        return Ok(());
    }
    let current = tabs.iter().position(|tab| tab.active).unwrap_or(0) as isize;
    let next = (current + step).rem_euclid(tabs.len() as isize) as usize;
    registry
        .send(SetActive { id: tabs[next].info.session.id })
        .await?;
    Ok(())
}

async fn close_all(registry: &Addr<TabRegistryActor>) -> Result<Vec<TabInfo>> {
    let tabs = registry.send(ListSessions).await?;
    for tab in &tabs {
        registry.send(CloseSession { id: tab.info.session.id }).await?;
    }
    // 给后台的取消请求留一点时间
    tokio::time::sleep(SETTLE_DELAY).await;
    Ok(tabs)
}
