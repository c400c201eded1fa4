use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use super::{migrations, DatabaseError, DatabaseResult};
use crate::config::DatabaseConfig;

/// 数据库连接管理器
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// 按配置建立连接池并执行启动迁移
    pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DatabaseError::Connection(e.to_string()))?
            .create_if_missing(true);

        // 内存库的多个连接各自独立，必须收缩到单连接
        let max_connections = if config.url.contains(":memory:") {
            1
        } else {
            config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        info!("Database connected: {}", config.url);

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        Ok(db)
    }

    /// 测试用内存库
    pub async fn connect_in_memory() -> DatabaseResult<Self> {
        Self::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
