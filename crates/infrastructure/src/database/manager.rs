use std::time::Duration;

use anyhow::{Context, Result};
use helpdesk_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use super::migrations::MIGRATIONS;

/// SQLite 连接池与模式迁移
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Self::connect(
            &config.url,
            config.max_connections,
            config.min_connections,
            Duration::from_secs(config.connection_timeout_seconds),
        )
        .await
    }

    /// 内存数据库的每个连接都是独立的库，因此强制单连接
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let max_connections = if in_memory { 1 } else { max_connections };
        let min_connections = min_connections.min(max_connections);

        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("数据库URL无效: {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout);
        if in_memory {
            // 连接被回收后内存库即丢失
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("连接数据库失败: {url}"))?;

        Ok(Self { pool })
    }

    /// 测试与嵌入式使用：单连接内存库并完成迁移
    pub async fn in_memory() -> Result<Self> {
        let manager = Self::connect("sqlite::memory:", 1, 1, Duration::from_secs(5)).await?;
        manager.migrate().await?;
        Ok(manager)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 执行建表语句，全部为幂等语句
    pub async fn migrate(&self) -> Result<()> {
        for (name, statement) in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("执行数据库迁移失败: {name}"))?;
        }
        info!("数据库迁移完成，共 {} 条语句", MIGRATIONS.len());
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_manager_migrates() {
        let manager = DatabaseManager::in_memory().await.unwrap();
        assert!(manager.health_check().await.is_ok());

        // 迁移可重复执行
        manager.migrate().await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'tickets'",
        )
        .fetch_one(manager.pool())
        .await
        .unwrap();
        assert_eq!(count, 1);

        manager.close().await;
    }
}
