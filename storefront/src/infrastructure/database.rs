use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

pub async fn init_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    info!("Initializing database connection pool");

    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database url: {}", config.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.connection_timeout));

    // 内存库随连接关闭而消失，只保留一个常驻连接
    if config.is_in_memory() {
        pool_options = pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    // 测试连接
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("Failed to execute test query")?;

    init_schema(&pool).await.context("Failed to create database schema")?;

    info!("Database connection pool initialized successfully");

    Ok(pool)
}

// 初始化数据库表，可重复执行
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            price TEXT NOT NULL,
            image TEXT NOT NULL DEFAULT '',
            stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            total TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            session_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    upgrade_orders_table(pool).await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_session_id ON orders (session_id)")
        .execute(pool)
        .await?;

    // 已处理的回调事件，用于去重
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_events (
            event_id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            order_id INTEGER,
            received_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// 旧版 store.db 的 orders 表只有 product_id/quantity/total/status，原地补齐缺少的列
async fn upgrade_orders_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('orders')")
        .fetch_all(pool)
        .await?;

    for column in ["session_id", "created_at", "updated_at"] {
        if !columns.iter().any(|existing| existing == column) {
            info!(column, "Adding missing column to orders table");
            sqlx::query(&format!("ALTER TABLE orders ADD COLUMN {} TEXT", column))
                .execute(pool)
                .await?;
        }
    }

    sqlx::query("UPDATE orders SET created_at = ? WHERE created_at IS NULL")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    sqlx::query("UPDATE orders SET updated_at = created_at WHERE updated_at IS NULL")
        .execute(pool)
        .await?;
    sqlx::query("UPDATE orders SET status = 'pending' WHERE status IS NULL")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{NewOrder, OrderStatus};
    use crate::repositories::{OrderRepository, ProductRepository, SqliteOrderRepository, SqliteProductRepository};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_init_in_memory_database() -> Result<()> {
        let pool = init_database(&DatabaseConfig::in_memory()).await?;

        // 重复建表不报错
        init_schema(&pool).await?;

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
                .fetch_all(&pool)
                .await?;
        let names: Vec<&str> = tables.iter().map(|(name,)| name.as_str()).collect();
        assert_eq!(names, vec!["orders", "payment_events", "products"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_upgrades_store_created_by_previous_version() -> Result<()> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        // 旧版本建表语句与示例数据，价格和总额是 REAL
        sqlx::query(
            "CREATE TABLE products (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             name TEXT, description TEXT, price REAL, image TEXT, stock INTEGER)",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             product_id INTEGER, quantity INTEGER, total REAL, status TEXT)",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "INSERT INTO products (name, description, price, image, stock) VALUES \
             ('Sample Product 1', 'A cool item', 19.99, 'https://example.com/image1.jpg', 100), \
             ('Sample Product 2', 'Another great product', 29.99, 'https://example.com/image2.jpg', 50), \
             ('Sample Product 3', 'Budget option', 9.99, 'https://example.com/image3.jpg', 200)",
        )
        .execute(&pool)
        .await?;
        sqlx::query("INSERT INTO orders (product_id, quantity, total, status) VALUES (1, 2, 39.98, NULL)")
            .execute(&pool)
            .await?;

        init_schema(&pool).await?;
        init_schema(&pool).await?;

        let products = SqliteProductRepository::new(pool.clone()).list().await?;
        assert_eq!(products.len(), 3);
        assert_eq!(products[0].price, dec!(19.99));
        assert_eq!(products[2].price, dec!(9.99));

        let orders = SqliteOrderRepository::new(pool.clone());
        let legacy = orders.find_by_id(1).await?.unwrap();
        assert_eq!(legacy.total, dec!(39.98));
        assert_eq!(legacy.status, OrderStatus::Pending);
        assert!(legacy.session_id.is_none());

        let created = orders
            .create(&NewOrder {
                product_id: 2,
                quantity: 1,
                total: dec!(29.99),
            })
            .await?;
        orders.attach_session(created.id, "cs_after_upgrade").await?;
        assert_eq!(orders.find_by_session_id("cs_after_upgrade").await?.unwrap().id, created.id);

        Ok(())
    }
}
