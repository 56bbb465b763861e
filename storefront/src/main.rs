use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use storefront::{
    api::create_router,
    app_state::AppState,
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    infrastructure::{database::init_database, logging::init_logging, payment::StripeClient},
    repositories::SqliteProductRepository,
    services::{CatalogService, FulfillmentQueue, spawn_fulfillment_worker},
};

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(about = "商品目录、托管收银台下单与支付回调服务", long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// 监听端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 启动时不写入示例商品
    #[arg(long, default_value_t = false)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化配置
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.no_seed {
        config.database.seed = false;
    }

    // 初始化日志，guard 需持有到进程退出
    let _log_guard = init_logging(&config.logging)?;

    info!(environment = %config.environment, "Starting storefront service...");

    for secret in config.missing_secrets() {
        warn!("{} is not configured", secret);
    }
    if config.webhook.signing_secret.is_empty() {
        warn!("Payment webhooks will be rejected until webhook.signing_secret is set");
    }

    // 初始化数据库连接
    let db_pool = init_database(&config.database).await?;

    if config.database.seed {
        let catalog = CatalogService::new(Arc::new(SqliteProductRepository::new(db_pool.clone())));
        catalog.seed_if_empty().await?;
    }

    // 支付渠道与回调后续任务
    let gateway = Arc::new(StripeClient::new(&config.payment)?);
    let (fulfillment_queue, receiver) = FulfillmentQueue::new(config.webhook.queue_capacity);
    let worker = spawn_fulfillment_worker(receiver);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // 创建应用状态
    let app_state = Arc::new(AppState::new(config, db_pool.clone(), gateway, fulfillment_queue));

    // 初始化路由
    let app = create_router(app_state);

    // 启动服务器
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 路由释放后队列发送端关闭，等待剩余任务处理完
    if let Err(e) = worker.await {
        warn!("Fulfillment worker exited abnormally: {}", e);
    }
    db_pool.close().await;

    info!("Storefront service stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
