use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nodeminer_rs::api::{ApiServer, AppState};
use nodeminer_rs::config::{Args, ConfigStore};
use nodeminer_rs::mining::{MiningManager, MiningState};

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        return;
    }

    info!("🚀 Starting NodeMiner-RS v{}", nodeminer_rs::VERSION);

    // 打开配置存储（文件缺失时创建默认配置）
    let config_store = match ConfigStore::open(&args.config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open config store: {}", e);
            return;
        }
    };
    info!("📋 Configuration loaded from: {}", args.config);

    // 上次运行遗留的 mining_active 标志只复位，不自动续挖
    if let Ok(config) = config_store.load() {
        if config.mining_active {
            info!("Clearing stale mining_active flag from previous run");
            if let Err(e) = config_store.update(|c| c.mining_active = false) {
                warn!("Failed to clear mining_active flag: {}", e);
            }
        }
    }

    // 创建挖矿管理器（随之启动常驻图表采样任务）
    let manager = Arc::new(MiningManager::new(config_store.clone()));

    // 启动 API 服务器
    let api_server = ApiServer::new(
        args.bind_address.clone(),
        args.port,
        AppState {
            manager: manager.clone(),
            config_store: config_store.clone(),
        },
    );

    if let Err(e) = api_server.start().await {
        error!("❌ Failed to start API server: {}", e);
        return;
    }

    // 等待退出信号
    wait_for_shutdown().await;
    info!("🛑 Received shutdown signal");

    // 优雅关闭：有会话在跑就先停矿
    if manager.state().await == MiningState::Running {
        if let Err(e) = manager.stop().await {
            error!("Error during shutdown: {}", e);
        }
    }
    api_server.stop().await;

    info!("👋 NodeMiner stopped gracefully");
}

fn init_logging(log_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("nodeminer_rs={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to create SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
