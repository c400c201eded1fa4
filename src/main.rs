use anyhow::Result;
use tracing::{error, info};

use linli::config::Config;
use linli::database::Database;
use linli::server::{AppState, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // 配置优先级：linli.toml > 环境变量/默认值
    let config = if std::path::Path::new("linli.toml").exists() {
        Config::from_file("linli.toml").await?
    } else {
        Config::from_env()?
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("linli={},info", config.logging.level))
        .init();

    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    info!("Configuration loaded");
    info!(
        "Server will listen on {}:{}",
        config.server.host, config.server.port
    );

    let db = Database::connect(&config.database).await?;
    let state = AppState::new(config, db)?;

    Server::new(state).run().await?;

    Ok(())
}
