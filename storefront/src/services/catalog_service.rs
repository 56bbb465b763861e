use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::domain::models::{NewProduct, Product};
use crate::error::AppError;
use crate::repositories::ProductRepository;

/// 首次启动时写入的示例商品
pub fn sample_products() -> Vec<NewProduct> {
    vec![
        NewProduct {
            name: "Sample Product 1".to_string(),
            description: "A cool item".to_string(),
            price: Decimal::new(1999, 2),
            image: "https://example.com/image1.jpg".to_string(),
            stock: 100,
        },
        NewProduct {
            name: "Sample Product 2".to_string(),
            description: "Another great product".to_string(),
            price: Decimal::new(2999, 2),
            image: "https://example.com/image2.jpg".to_string(),
            stock: 50,
        },
        NewProduct {
            name: "Sample Product 3".to_string(),
            description: "Budget option".to_string(),
            price: Decimal::new(999, 2),
            image: "https://example.com/image3.jpg".to_string(),
            stock: 200,
        },
    ]
}

pub struct CatalogService {
    product_repository: Arc<dyn ProductRepository>,
}

impl CatalogService {
    pub fn new(product_repository: Arc<dyn ProductRepository>) -> Self {
        Self { product_repository }
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        self.product_repository.list().await
    }

    pub async fn get_product(&self, id: i64) -> Result<Product, AppError> {
        self.product_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Product with ID {} not found", id)))
    }

    /// 商品表为空时写入示例数据，返回写入条数
    pub async fn seed_if_empty(&self) -> Result<usize, AppError> {
        let existing = self.product_repository.count().await?;
        if existing > 0 {
            info!(existing, "Catalog already populated, skipping seed");
            return Ok(0);
        }

        let inserted = self.product_repository.insert_all(&sample_products()).await?;
        info!(inserted, "Seeded sample products");

        Ok(inserted)
    }
}
