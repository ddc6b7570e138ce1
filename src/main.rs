//! Sentinel 主程序入口
//!
//! HTTP 可用性监控工具

use anyhow::{Context, Result};
use clap::Parser;
use sentinel::cli::args::{Args, Commands};
use sentinel::cli::commands::{
    CheckCommand, Command, InitCommand, StartCommand, ValidateCommand, VersionCommand,
};
use sentinel::config::TomlConfigLoader;
use sentinel::logging::{LogConfig, LoggingSystem};
use tracing::{debug, error, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 日志系统尚未建立，加载错误在初始化之后再输出
    let loaded = TomlConfigLoader::new(true)
        .load_or_default(args.get_config_path())
        .await;
    let log_config = LogConfig::resolve(args.log_level.map(Into::into), loaded.as_ref().ok());
    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    debug!("{} v{} 启动", sentinel::APP_NAME, sentinel::VERSION);
    if let Err(e) = &loaded {
        warn!("配置文件加载失败，日志使用默认设置: {}", e);
    }

    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    let command: Box<dyn Command> = match &args.command {
        Commands::Start { .. } => Box::new(StartCommand),
        Commands::Check { .. } => Box::new(CheckCommand),
        Commands::Init { .. } => Box::new(InitCommand),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    command.execute(args).await.map_err(|e| anyhow::anyhow!(e))
}
