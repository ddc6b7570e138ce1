//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{
    is_probe_url, validate_config, Config, ConfigLoader, NotificationConfig, StoreConfig,
    TomlConfigLoader, DEFAULT_CONFIG_TEMPLATE,
};
use crate::error::{ConfigError, Result};
use crate::health::{HttpProber, Prober, Scheduler};
use crate::notification::{
    AlertNotifier, CompositeNotifier, LogNotifier, MessageTemplates, WebhookNotifier,
};
use crate::store::{connect_with_retry, MemoryStore, TargetStore};
use crate::web::{WebAppState, WebServer};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            let path = config_path.clone().unwrap_or_else(|| args.get_config_path());
            self.create_config_file(&path, *force).await?;
        }
        Ok(())
    }
}

impl InitCommand {
    /// 创建配置文件
    ///
    /// # 返回
    /// * `Result<bool>` - 是否写入了文件，已存在且未指定 `force` 时返回 `false`
    pub async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<bool> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(false);
        }

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(config_path, DEFAULT_CONFIG_TEMPLATE).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件的 store.seed_targets 或通过 POST /targets 添加监控目标");

        Ok(true)
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate { config_path } = &args.command {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());
            let config = self.validate_config_file(&config_file).await?;

            println!("✓ 配置文件验证通过: {}", config_file.display());
            println!("  检测间隔: {}秒", config.worker.check_interval_seconds);
            println!("  请求超时: {}秒", config.worker.request_timeout_seconds);
            println!("  预置目标: {} 个", config.store.seed_targets.len());
            match &config.store.data_file {
                Some(path) => println!("  快照文件: {}", path.display()),
                None => println!("  快照文件: 未配置（仅内存）"),
            }
            if config.web.enabled {
                println!("  仪表板API: {}:{}", config.web.bind_address, config.web.port);
            } else {
                println!("  仪表板API: 已禁用");
            }
        }
        Ok(())
    }
}

impl ValidateCommand {
    /// 加载并验证配置文件
    pub async fn validate_config_file(&self, config_path: &Path) -> Result<Config> {
        let loader = TomlConfigLoader::new(true);
        loader.load_from_file(config_path).await
    }
}

/// 检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Check {
            url,
            format,
            timeout,
        } = &args.command
        {
            self.perform_check(url, *format, Duration::from_secs(*timeout))
                .await?;
        }
        Ok(())
    }
}

impl CheckCommand {
    /// 对单个URL执行一次探测并输出结果
    async fn perform_check(&self, url: &str, format: OutputFormat, timeout: Duration) -> Result<()> {
        if !is_probe_url(url) {
            return Err(ConfigError::ValidationError(format!("URL格式无效: {url}")).into());
        }

        let prober = HttpProber::new(timeout)?;
        let outcome = prober.probe(url).await;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            OutputFormat::Text => {
                let icon = if outcome.is_success() { "✓" } else { "✗" };
                println!("{icon} {outcome}");
                if let Some(error) = &outcome.error_message {
                    println!("  错误: {error}");
                }
            }
        }

        Ok(())
    }
}

/// 启动命令
pub struct StartCommand;

#[async_trait]
impl Command for StartCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Start {
            interval,
            no_web,
            port,
        } = &args.command
        {
            let loader = TomlConfigLoader::new(true);
            let mut config = loader.load_or_default(args.get_config_path()).await?;
            apply_start_overrides(&mut config, *interval, *no_web, *port)?;

            let (shutdown_tx, _) = broadcast::channel(1);

            let ctrl_c_tx = shutdown_tx.clone();
            tokio::spawn(async move {
                loop {
                    match signal::ctrl_c().await {
                        Ok(()) => {
                            info!("收到中断信号，正在停止服务...");
                            if ctrl_c_tx.send(()).is_err() {
                                warn!("服务尚未就绪，中断信号未送达");
                            }
                        }
                        Err(err) => {
                            error!("监听中断信号失败: {}", err);
                            break;
                        }
                    }
                }
            });

            run_service(config, shutdown_tx).await?;
        }
        Ok(())
    }
}

/// 应用 `start` 子命令的参数覆盖并重新验证
pub fn apply_start_overrides(
    config: &mut Config,
    interval: Option<u64>,
    no_web: bool,
    port: Option<u16>,
) -> Result<()> {
    if let Some(interval) = interval {
        config.worker.check_interval_seconds = interval;
    }
    if no_web {
        config.web.enabled = false;
    }
    if let Some(port) = port {
        config.web.port = port;
    }
    validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
}

/// 打开后端存储，配置了快照文件时按重试策略加载
pub async fn open_store(config: &StoreConfig) -> Result<Arc<MemoryStore>> {
    let retention = config.retention_per_target;
    let store = match &config.data_file {
        Some(path) => {
            connect_with_retry(config.connect_attempts, config.connect_retry_delay(), || {
                MemoryStore::open(path, retention)
            })
            .await?
        }
        None => MemoryStore::new(retention),
    };
    Ok(Arc::new(store))
}

/// 构建通知渠道
///
/// 总是包含日志渠道，配置了 webhook 时再加上 webhook 渠道。
pub fn build_notifier(config: &NotificationConfig) -> Result<Arc<dyn AlertNotifier>> {
    let Some(webhook_url) = &config.webhook_url else {
        return Ok(Arc::new(LogNotifier));
    };

    let templates = MessageTemplates::new(
        config.alert_template.as_deref(),
        config.recovery_template.as_deref(),
    )?;
    let webhook = WebhookNotifier::new(webhook_url.clone(), templates)?;
    info!("启用webhook通知: {}", webhook_url);

    Ok(Arc::new(CompositeNotifier::new(vec![
        Arc::new(LogNotifier),
        Arc::new(webhook),
    ])))
}

/// 运行监控服务，直到 `shutdown_tx` 发出关闭信号
///
/// 存储多次尝试后仍不可用、或Web端口无法绑定时直接返回错误。
/// 连接存储期间收到关闭信号则不再启动。退出前把存储写回快照文件。
pub async fn run_service(config: Config, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
    // 所有接收器在连接存储之前订阅，启动期间的关闭信号不会丢失
    let mut startup_shutdown = shutdown_tx.subscribe();
    let scheduler_shutdown = shutdown_tx.subscribe();
    let web_shutdown = shutdown_tx.subscribe();
    let mut flush_shutdown = shutdown_tx.subscribe();
    info!("启动 {} v{}", crate::APP_NAME, crate::VERSION);

    let store = tokio::select! {
        biased;
        _ = startup_shutdown.recv() => {
            info!("连接存储期间收到关闭信号，服务未启动");
            return Ok(());
        }
        store = open_store(&config.store) => store?,
    };
    drop(startup_shutdown);

    for target in &config.store.seed_targets {
        if store.add_target(target).await? {
            info!("添加预置目标: {}", target);
        }
    }

    let notifier = build_notifier(&config.notification)?;
    let prober: Arc<dyn Prober> = Arc::new(HttpProber::new(config.worker.request_timeout())?);

    let web = if config.web.enabled {
        let state = WebAppState::new(store.clone(), store.clone(), config.web.history_limit);
        let server = WebServer::new(config.web.clone(), state);
        let listener = server.bind().await?;
        Some((server, listener))
    } else {
        info!("仪表板API已禁用");
        None
    };

    let mut scheduler = Scheduler::new(
        store.clone(),
        store.clone(),
        prober,
        notifier,
        config.worker.check_interval(),
    );

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
        scheduler
    });

    let web_handle = web.map(|(server, listener)| {
        tokio::spawn(async move {
            if let Err(e) = server.serve_until(listener, web_shutdown).await {
                error!("Web服务器运行失败: {}", e);
            }
        })
    });

    let flush_handle = store.snapshot_path().is_some().then(|| {
        let store = store.clone();
        let period = config.store.flush_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = flush_shutdown.recv() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = store.flush().await {
                            warn!("写入快照失败: {}", e);
                        }
                    }
                }
            }
        })
    });

    let scheduler = scheduler_handle
        .await
        .map_err(|e| anyhow::anyhow!("调度任务异常退出: {e}"))?;
    let stats = scheduler.stats();
    info!(
        "监控已停止: 共执行 {} 轮，空闲 {} 轮，跳过 {} 轮",
        stats.ticks_run, stats.idle_ticks, stats.skipped_ticks
    );

    if let Some(handle) = web_handle {
        let _ = handle.await;
    }
    if let Some(handle) = flush_handle {
        let _ = handle.await;
    }

    store.flush().await?;
    info!("服务已停止");

    Ok(())
}
