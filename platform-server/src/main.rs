mod config;
mod device;
mod http;
mod quic;

use anyhow::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = config::Config::load()?;

    // 初始化日志 - 环境变量 RUST_LOG 优先
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    info!("🚀 Platform server starting...");
    info!("✓ Configuration loaded");

    // 设备注册中心在两个服务之间共享
    let hosts = device::HostsManager::new();

    let quic_server = quic::QuicServer::new(
        config.quic_addr().parse()?,
        hosts.clone(),
        config.max_message_size,
        config.idle_timeout(),
    )?;
    info!("✓ QUIC server listening on {}", quic_server.local_addr()?);

    let http_server = http::HttpServer::new(config.http_addr().parse()?, hosts.clone());
    info!("✓ HTTP server listening on {}", config.http_addr());

    info!("✅ Platform server ready!");

    let quic_handle = tokio::spawn(async move {
        if let Err(e) = quic_server.run().await {
            tracing::error!("QUIC server error: {}", e);
        }
    });

    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = quic_handle => {},
        _ = http_handle => {},
        _ = tokio::signal::ctrl_c() => {
            if hosts.is_empty() {
                info!("Shutting down");
            } else {
                info!("Shutting down, {} device(s) online", hosts.len());
            }
        },
    }

    Ok(())
}
