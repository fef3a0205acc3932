//! 彩票抽奖服务 - 服务器主程序

use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use tracing::info;

use lottery_web_server::config::ServerConfig;
use lottery_web_server::routes::create_routes;
use lottery_web_server::state::ServerState;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("启动彩票抽奖服务器...");

    let config = ServerConfig::from_env().map_err(anyhow::Error::msg).context("读取配置失败")?;
    let state = ServerState::new(config.clone()).map_err(anyhow::Error::msg)?;

    if config.seed_accounts {
        state.seed_default_accounts().await.context("创建演示账户失败")?;
    }

    // 创建路由
    let routes = create_routes(Arc::new(state));

    let addr = SocketAddr::new(config.bind_addr, config.port);
    info!("服务器启动在 {}", addr);

    // 启动服务器
    warp::serve(routes).run(addr).await;
    Ok(())
}
