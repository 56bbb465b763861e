use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

use crate::domain::models::{NewProduct, Product};
use crate::error::AppError;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, AppError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, AppError>;
    async fn count(&self) -> Result<i64, AppError>;
    async fn insert_all(&self, products: &[NewProduct]) -> Result<usize, AppError>;
}

pub struct SqliteProductRepository {
    db_pool: SqlitePool,
}

impl SqliteProductRepository {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

// 数据库记录结构体，价格按文本保存
#[derive(Debug, FromRow)]
struct ProductRecord {
    id: i64,
    name: String,
    description: String,
    price: String,
    image: String,
    stock: i64,
}

pub(crate) fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, AppError> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| AppError::internal(format!("Invalid decimal in column {}: '{}' ({})", column, raw, e)))
}

impl TryFrom<ProductRecord> for Product {
    type Error = AppError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            name: record.name,
            description: record.description,
            price: parse_decimal("products.price", &record.price)?,
            image: record.image,
            stock: record.stock,
        })
    }
}

// 旧版本或外部后台写入的价格可能是 REAL，统一按文本读取
const SELECT_PRODUCT: &str = "SELECT id, COALESCE(name, '') AS name, COALESCE(description, '') AS description, \
     CAST(price AS TEXT) AS price, COALESCE(image, '') AS image, COALESCE(stock, 0) AS stock FROM products";

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn list(&self) -> Result<Vec<Product>, AppError> {
        let records = sqlx::query_as::<_, ProductRecord>(&format!("{} ORDER BY id", SELECT_PRODUCT))
            .fetch_all(&self.db_pool)
            .await?;

        records.into_iter().map(Product::try_from).collect()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, AppError> {
        let record = sqlx::query_as::<_, ProductRecord>(&format!("{} WHERE id = ?", SELECT_PRODUCT))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        record.map(Product::try_from).transpose()
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.db_pool)
            .await?;

        Ok(count)
    }

    async fn insert_all(&self, products: &[NewProduct]) -> Result<usize, AppError> {
        let mut tx = self.db_pool.begin().await?;

        for product in products {
            sqlx::query("INSERT INTO products (name, description, price, image, stock) VALUES (?, ?, ?, ?, ?)")
                .bind(&product.name)
                .bind(&product.description)
                .bind(product.price.to_string())
                .bind(&product.image)
                .bind(product.stock)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(products.len())
    }
}
