//! 积分对账 worker
//!
//! 启动后台对账循环，定时向 accrual 服务查询未终结订单并写回结果。

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use loyalty_shared::{
    config::{AppConfig, ConfigOverrides},
    database::Database,
    error::LoyaltyError,
    observability,
    retry::{RetryPolicy, retry_with_policy},
};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use loyalty_service::{
    accrual_client::{AccrualService, HttpAccrualClient},
    reconciler::Reconciler,
    repository::{OrderStore, PgOrderStore},
};

const SERVICE_NAME: &str = "loyalty-worker";

/// 命令行参数
///
/// 同名环境变量 DATABASE_URI / ACCRUAL_SYSTEM_ADDRESS 优先于命令行。
#[derive(Debug, Parser)]
#[command(name = "loyalty-worker", version, about = "积分订单对账 worker")]
struct Cli {
    /// PostgreSQL 连接串
    #[arg(short = 'd', long = "database-uri")]
    database_uri: Option<String>,

    /// accrual 服务地址，缺少协议时按 http 处理
    #[arg(short = 'r', long = "accrual-address")]
    accrual_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 读取 .env 与命令行参数
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 2. 加载配置并叠加覆盖项
    let mut config = AppConfig::load(SERVICE_NAME)?;
    config.apply_overrides(&ConfigOverrides {
        database_url: cli.database_uri,
        accrual_address: cli.accrual_address,
    });
    config.validate()?;

    // 3. 初始化可观测性
    let _guard = observability::init(&config.service_name, &config.observability).await?;

    info!(
        environment = %config.environment,
        accrual = %config.accrual.base_url,
        "Starting loyalty-worker..."
    );

    // 4. 连接数据库，数据库可能晚于 worker 就绪
    let db = retry_with_policy(
        &RetryPolicy::startup(),
        "database_connect",
        LoyaltyError::is_retryable,
        || Database::connect(&config.database),
    )
    .await?;
    info!("Database connection established");

    // 5. 数据库迁移
    PgOrderStore::migrate(db.pool()).await?;

    // 6. 创建存储与 accrual 客户端
    let store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(db.pool().clone()));
    let accrual: Arc<dyn AccrualService> = Arc::new(HttpAccrualClient::new(&config.accrual)?);

    // 7. 启动对账循环
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler_handle = if config.reconciliation.enabled {
        let reconciler = Arc::new(Reconciler::new(store, accrual, &config.reconciliation));
        Some(tokio::spawn(reconciler.run(shutdown_rx)))
    } else {
        warn!("对账循环已在配置中禁用");
        None
    };

    // 8. 等待关闭信号
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Some(handle) = reconciler_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "对账任务异常退出");
        }
    }

    db.close().await;
    info!("loyalty-worker stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
